//! Gridcard Core - Dashboard Card Layout Engine
//!
//! # Ground Rules
//! 1. The Registry Is Immutable
//! 2. Validation Returns Values, Never Panics
//! 3. Templates Import Whole Or Not At All
//! 4. Resize Emits Intents, The Host Commits Them

pub mod registry;
pub mod layout;
pub mod validation;
pub mod resize;
pub mod templates;
pub mod state;
pub mod canonical;
pub mod settings;

pub use registry::{CardDescriptor, CardRegistry, ControlKind, PropControl, RegistryError, ValueSource, VisibilityTier};
pub use layout::{CardConfig, CardId, DashboardLayout, PropBag, PropValue, SerialCardConfig, Span};
pub use validation::{CardError, SuggestedAction, ValidationResult, Validator};
pub use resize::{ResizeEffect, ResizeIntent, ResizeMachine};
pub use templates::{LayoutTemplate, TemplateError, TemplateImporter, TemplateVendor, serialize_template};
pub use state::{DashboardState, LayoutError, TemplateRef};
pub use settings::EngineSettings;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CURRENT_TEMPLATE_VERSION: &str = "1.0.0";
