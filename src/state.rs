//! Dashboard State - Persisted Layouts, Templates, History
//!
//! The host owns persistence; this module owns the shape and the rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::canonical;
use crate::layout::{CardConfig, CardId, DashboardLayout};
use crate::registry::{CardRegistry, RegistryError};
use crate::resize::ResizeIntent;
use crate::templates::{LayoutTemplate, TemplateCatalog, TemplateVendor};

/// Reserved layout that always exists.
pub const DEFAULT_LAYOUT_NAME: &str = "default";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("The default layout cannot be deleted or renamed")]
    DefaultLayoutProtected,

    #[error("Layout not found: {0}")]
    LayoutNotFound(String),

    #[error("Layout name already taken: {0}")]
    NameTaken(String),

    #[error("Layout name is empty")]
    EmptyName,

    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    #[error("Card position out of range: {from} -> {to}")]
    PositionOutOfRange { from: usize, to: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Template name already taken: {0}")]
    TemplateNameTaken(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template cannot be deleted: {0}")]
    TemplateNotDeletable(String),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// History entry. Points at a template by `(name, vendor)` and may dangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRef {
    pub name: String,
    pub vendor: TemplateVendor,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    #[serde(default)]
    layouts: Vec<DashboardLayout>,
    #[serde(default)]
    current: usize,
    #[serde(default)]
    templates: Vec<LayoutTemplate>,
    #[serde(default)]
    history: Vec<TemplateRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StateFile")]
pub struct DashboardState {
    layouts: Vec<DashboardLayout>,
    current: usize,
    templates: Vec<LayoutTemplate>,
    history: Vec<TemplateRef>,
}

impl From<StateFile> for DashboardState {
    fn from(file: StateFile) -> Self {
        let mut state = Self {
            layouts: file.layouts,
            current: file.current,
            templates: file.templates,
            history: file.history,
        };
        if state.layout_index(DEFAULT_LAYOUT_NAME).is_none() {
            state.layouts.insert(0, DashboardLayout::new(DEFAULT_LAYOUT_NAME));
            state.current = state.current.saturating_add(1);
        }
        if state.current >= state.layouts.len() {
            state.current = state.default_index();
        }
        state
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            layouts: vec![DashboardLayout::new(DEFAULT_LAYOUT_NAME)],
            current: 0,
            templates: vec![],
            history: vec![],
        }
    }

    /// Read a state file; a missing file is a fresh state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// SHA-256 of the canonical form; equal states give equal fingerprints.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        canonical::fingerprint(self)
    }

    pub fn layouts(&self) -> &[DashboardLayout] {
        &self.layouts
    }

    pub fn templates(&self) -> &[LayoutTemplate] {
        &self.templates
    }

    pub fn history(&self) -> &[TemplateRef] {
        &self.history
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_layout(&self) -> &DashboardLayout {
        &self.layouts[self.current]
    }

    pub fn current_layout_mut(&mut self) -> &mut DashboardLayout {
        &mut self.layouts[self.current]
    }

    pub fn layout(&self, name: &str) -> Option<&DashboardLayout> {
        self.layouts.iter().find(|l| l.name == name)
    }

    fn layout_index(&self, name: &str) -> Option<usize> {
        self.layouts.iter().position(|l| l.name == name)
    }

    fn default_index(&self) -> usize {
        self.layout_index(DEFAULT_LAYOUT_NAME).unwrap_or(0)
    }

    fn check_new_name(&self, name: &str) -> Result<(), LayoutError> {
        if name.trim().is_empty() {
            return Err(LayoutError::EmptyName);
        }
        if self.layout_index(name).is_some() {
            return Err(LayoutError::NameTaken(name.to_string()));
        }
        Ok(())
    }

    fn push_current(&mut self, layout: DashboardLayout) -> &mut DashboardLayout {
        self.layouts.push(layout);
        self.current = self.layouts.len() - 1;
        &mut self.layouts[self.current]
    }

    /// Create a blank layout and make it current.
    pub fn create_layout(&mut self, name: &str) -> Result<&mut DashboardLayout, LayoutError> {
        self.check_new_name(name)?;
        debug!(layout = name, "layout created");
        Ok(self.push_current(DashboardLayout::new(name)))
    }

    /// Create a layout from a template, make it current and record the use.
    pub fn create_from_template(
        &mut self,
        template: &LayoutTemplate,
        name: &str,
        registry: &CardRegistry,
        history_limit: usize,
    ) -> Result<&mut DashboardLayout, LayoutError> {
        self.check_new_name(name)?;
        let layout = template.instantiate(name, registry);
        self.record_template_use(&template.name, template.vendor, history_limit);
        debug!(layout = name, template = %template.name, "layout created from template");
        Ok(self.push_current(layout))
    }

    /// Add a layout built elsewhere (e.g. an uploaded one), made current.
    pub fn insert_layout(&mut self, layout: DashboardLayout) -> Result<(), LayoutError> {
        self.check_new_name(&layout.name)?;
        self.push_current(layout);
        Ok(())
    }

    pub fn delete_layout(&mut self, name: &str) -> Result<DashboardLayout, LayoutError> {
        if name == DEFAULT_LAYOUT_NAME {
            return Err(LayoutError::DefaultLayoutProtected);
        }
        let index = self
            .layout_index(name)
            .ok_or_else(|| LayoutError::LayoutNotFound(name.to_string()))?;

        let removed = self.layouts.remove(index);
        if self.current == index {
            self.current = self.default_index();
        } else if self.current > index {
            self.current -= 1;
        }
        Ok(removed)
    }

    pub fn rename_layout(&mut self, old: &str, new: &str) -> Result<(), LayoutError> {
        if old == DEFAULT_LAYOUT_NAME || new == DEFAULT_LAYOUT_NAME {
            return Err(LayoutError::DefaultLayoutProtected);
        }
        let index = self
            .layout_index(old)
            .ok_or_else(|| LayoutError::LayoutNotFound(old.to_string()))?;
        if old == new {
            return Ok(());
        }
        self.check_new_name(new)?;
        self.layouts[index].name = new.to_string();
        Ok(())
    }

    pub fn set_current(&mut self, name: &str) -> Result<(), LayoutError> {
        self.current = self
            .layout_index(name)
            .ok_or_else(|| LayoutError::LayoutNotFound(name.to_string()))?;
        Ok(())
    }

    /// Flip the favorite flag and return the new value.
    pub fn toggle_favorite(&mut self, name: &str) -> Result<bool, LayoutError> {
        let index = self
            .layout_index(name)
            .ok_or_else(|| LayoutError::LayoutNotFound(name.to_string()))?;
        let layout = &mut self.layouts[index];
        layout.favorite = !layout.favorite;
        Ok(layout.favorite)
    }

    // --- Card intents against the current layout ---

    pub fn add_card(&mut self, card_type: &str, registry: &CardRegistry) -> Result<CardId, LayoutError> {
        let descriptor = registry.lookup_by_name(card_type)?;
        let card = CardConfig::from_descriptor(descriptor);
        let id = card.id.clone();
        self.current_layout_mut().add_card(card);
        Ok(id)
    }

    pub fn remove_card(&mut self, id: &CardId) -> Result<CardConfig, LayoutError> {
        self.current_layout_mut()
            .remove_card(id)
            .ok_or_else(|| LayoutError::CardNotFound(id.clone()))
    }

    pub fn apply_resize(&mut self, intent: &ResizeIntent) -> Result<(), LayoutError> {
        if self.current_layout_mut().set_span(&intent.card_id, intent.span) {
            Ok(())
        } else {
            Err(LayoutError::CardNotFound(intent.card_id.clone()))
        }
    }

    pub fn move_card(&mut self, from: usize, to: usize) -> Result<(), LayoutError> {
        if self.current_layout_mut().move_card(from, to) {
            Ok(())
        } else {
            Err(LayoutError::PositionOutOfRange { from, to })
        }
    }

    // --- User templates ---

    pub fn save_template(&mut self, template: LayoutTemplate) -> Result<(), LayoutError> {
        if self.templates.iter().any(|t| t.name == template.name) {
            return Err(LayoutError::TemplateNameTaken(template.name));
        }
        self.templates.push(template);
        Ok(())
    }

    /// History entries that pointed at the template are left in place.
    pub fn delete_template(
        &mut self,
        name: &str,
        vendor: TemplateVendor,
    ) -> Result<LayoutTemplate, LayoutError> {
        if !vendor.is_deletable() {
            return Err(LayoutError::TemplateNotDeletable(name.to_string()));
        }
        let index = self
            .templates
            .iter()
            .position(|t| t.name == name && t.vendor == vendor)
            .ok_or_else(|| LayoutError::TemplateNotFound(name.to_string()))?;
        Ok(self.templates.remove(index))
    }

    /// Shipped templates plus this state's user templates.
    pub fn catalog(&self, registry: &CardRegistry) -> TemplateCatalog {
        let mut catalog = TemplateCatalog::with_builtins(registry);
        catalog.extend(self.templates.iter().cloned());
        catalog
    }

    // --- Recently used ---

    /// Most recent first, one entry per `(name, vendor)`, at most `limit`.
    pub fn record_template_use(&mut self, name: &str, vendor: TemplateVendor, limit: usize) {
        self.history.retain(|r| !(r.name == name && r.vendor == vendor));
        self.history.insert(
            0,
            TemplateRef {
                name: name.to_string(),
                vendor,
                used_at: Utc::now(),
            },
        );
        self.history.truncate(limit);
    }

    /// Templates the history still points at. Dangling entries are logged
    /// and skipped.
    pub fn resolve_history<'c>(&self, catalog: &'c TemplateCatalog) -> Vec<&'c LayoutTemplate> {
        self.history
            .iter()
            .filter_map(|r| {
                let found = catalog.get(&r.name, r.vendor);
                if found.is_none() {
                    warn!(template = %r.name, vendor = ?r.vendor, "recent template no longer exists");
                }
                found
            })
            .collect()
    }
}
