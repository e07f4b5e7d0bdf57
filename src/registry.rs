//! Card Registry - Immutable Descriptor Table
//!
//! Built once at startup and passed by reference to whatever needs it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::layout::{PropBag, PropValue, Span};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown card type: {0}")]
    UnknownCardType(String),

    #[error("Card type registered twice: {0}")]
    DuplicateCardType(String),

    #[error("Card type {0} has an inconsistent span range")]
    InvalidSpanRange(String),
}

/// Stability gate for card types. `Development < Beta < Production`.
///
/// A card is offered at a requested tier when its own stability is at
/// least that tier, so lower tiers see more cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityTier {
    Development,
    Beta,
    #[default]
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRange {
    pub minimum: Span,
    pub default: Span,
    pub maximum: Span,
}

impl SpanRange {
    pub fn is_consistent(&self) -> bool {
        self.minimum <= self.default && self.default <= self.maximum
    }

    pub fn clamp(&self, span: Span) -> Span {
        span.clamp(self.minimum, self.maximum)
    }
}

/// Row height range. Carried for hosts; nothing in the engine reads it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    pub minimum: u16,
    pub default: u16,
    pub maximum: u16,
}

impl Default for HeightRange {
    fn default() -> Self {
        Self { minimum: 1, default: 1, maximum: 1 }
    }
}

/// Supplier of a select control's values that are only known at runtime.
pub trait OptionProvider: Send + Sync {
    /// Latest snapshot of the streamed value set.
    fn current(&self) -> Vec<PropValue>;
}

#[derive(Clone)]
pub enum ValueSource {
    Static(Vec<PropValue>),
    /// Never checked for membership during validation.
    Dynamic(Arc<dyn OptionProvider>),
}

impl ValueSource {
    pub fn values(&self) -> Vec<PropValue> {
        match self {
            ValueSource::Static(values) => values.clone(),
            ValueSource::Dynamic(provider) => provider.current(),
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Static(values) => f.debug_tuple("Static").field(values).finish(),
            ValueSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ControlKind {
    Boolean,
    Number { min: Option<f64>, max: Option<f64> },
    Text,
    MultilineText,
    Select { options: ValueSource },
}

impl ControlKind {
    pub fn bounded(min: f64, max: f64) -> Self {
        ControlKind::Number { min: Some(min), max: Some(max) }
    }

    pub fn select<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropValue>,
    {
        ControlKind::Select {
            options: ValueSource::Static(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// One configurable property of a card type.
#[derive(Debug, Clone)]
pub struct PropControl {
    pub key: String,
    pub label: String,
    pub kind: ControlKind,
    pub default: PropValue,
}

impl PropControl {
    pub fn new(key: &str, label: &str, kind: ControlKind, default: impl Into<PropValue>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            default: default.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CardDescriptor {
    /// Stable type identifier stored in `CardConfig::name`.
    pub name: String,
    /// Localization key of the display title.
    pub title: String,
    pub stability: VisibilityTier,
    pub span: SpanRange,
    pub height: HeightRange,
    pub controls: Vec<PropControl>,
}

impl CardDescriptor {
    pub fn is_visible_at(&self, tier: VisibilityTier) -> bool {
        self.stability >= tier
    }

    pub fn control(&self, key: &str) -> Option<&PropControl> {
        self.controls.iter().find(|c| c.key == key)
    }

    pub fn default_props(&self) -> PropBag {
        self.controls
            .iter()
            .map(|c| (c.key.clone(), c.default.clone()))
            .collect()
    }
}

/// Resolves localization keys to display strings.
pub trait Localizer {
    fn localize(&self, key: &str) -> String;
}

impl<F> Localizer for F
where
    F: Fn(&str) -> String,
{
    fn localize(&self, key: &str) -> String {
        self(key)
    }
}

/// Immutable card type table.
#[derive(Debug, Clone)]
pub struct CardRegistry {
    descriptors: Vec<CardDescriptor>,
    by_name: HashMap<String, usize>,
}

impl CardRegistry {
    pub fn new(descriptors: Vec<CardDescriptor>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            if !descriptor.span.is_consistent() {
                return Err(RegistryError::InvalidSpanRange(descriptor.name.clone()));
            }
            if by_name.insert(descriptor.name.clone(), index).is_some() {
                return Err(RegistryError::DuplicateCardType(descriptor.name.clone()));
            }
        }
        Ok(Self { descriptors, by_name })
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<&CardDescriptor, RegistryError> {
        self.by_name
            .get(name)
            .map(|&index| &self.descriptors[index])
            .ok_or_else(|| {
                debug!(card_type = name, "card type not registered");
                RegistryError::UnknownCardType(name.to_string())
            })
    }

    pub fn lookup_by_title(
        &self,
        title: &str,
        localizer: &dyn Localizer,
    ) -> Result<&CardDescriptor, RegistryError> {
        self.descriptors
            .iter()
            .find(|d| localizer.localize(&d.title) == title)
            .ok_or_else(|| RegistryError::UnknownCardType(title.to_string()))
    }

    /// Descriptors offered at `tier`, in registration order.
    pub fn list_available(&self, tier: VisibilityTier) -> Vec<&CardDescriptor> {
        self.descriptors.iter().filter(|d| d.is_visible_at(tier)).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Stock card set shipped with the engine.
    pub fn builtin() -> Self {
        let descriptors = builtin_descriptors();
        let by_name = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self { descriptors, by_name }
    }
}

fn span_range(minimum: u8, default: u8, maximum: u8) -> SpanRange {
    SpanRange {
        minimum: Span::clamped(minimum as i64),
        default: Span::clamped(default as i64),
        maximum: Span::clamped(maximum as i64),
    }
}

fn builtin_descriptors() -> Vec<CardDescriptor> {
    vec![
        CardDescriptor {
            name: "Chart".to_string(),
            title: "card.chart.title".to_string(),
            stability: VisibilityTier::Production,
            span: span_range(3, 6, 12),
            height: HeightRange { minimum: 2, default: 3, maximum: 6 },
            controls: vec![
                PropControl::new("title", "Title", ControlKind::Text, "Chart"),
                PropControl::new("duration", "Duration (minutes)", ControlKind::bounded(1.0, 300.0), 60),
                PropControl::new("showLegend", "Show legend", ControlKind::Boolean, true),
                PropControl::new(
                    "style",
                    "Style",
                    ControlKind::select(["line", "area", "bar"]),
                    "line",
                ),
            ],
        },
        CardDescriptor {
            name: "Stat".to_string(),
            title: "card.stat.title".to_string(),
            stability: VisibilityTier::Production,
            span: span_range(2, 3, 6),
            height: HeightRange::default(),
            controls: vec![
                PropControl::new("label", "Label", ControlKind::Text, "Value"),
                PropControl::new("precision", "Decimal places", ControlKind::bounded(0.0, 6.0), 1),
                PropControl::new("unit", "Unit", ControlKind::select(["", "%", "ms", "MB"]), ""),
            ],
        },
        CardDescriptor {
            name: "Notes".to_string(),
            title: "card.notes.title".to_string(),
            stability: VisibilityTier::Production,
            span: span_range(2, 4, 12),
            height: HeightRange { minimum: 1, default: 2, maximum: 8 },
            controls: vec![PropControl::new("body", "Text", ControlKind::MultilineText, "")],
        },
        CardDescriptor {
            name: "Alerts".to_string(),
            title: "card.alerts.title".to_string(),
            stability: VisibilityTier::Production,
            span: span_range(4, 6, 12),
            height: HeightRange { minimum: 2, default: 3, maximum: 8 },
            controls: vec![
                PropControl::new(
                    "severity",
                    "Minimum severity",
                    ControlKind::select(["info", "warning", "critical"]),
                    "warning",
                ),
                PropControl::new("limit", "Rows", ControlKind::bounded(1.0, 100.0), 10),
            ],
        },
        CardDescriptor {
            name: "Uptime".to_string(),
            title: "card.uptime.title".to_string(),
            stability: VisibilityTier::Beta,
            span: span_range(2, 4, 8),
            height: HeightRange::default(),
            controls: vec![PropControl::new("window", "Window (days)", ControlKind::bounded(1.0, 90.0), 30)],
        },
        CardDescriptor {
            name: "Topology".to_string(),
            title: "card.topology.title".to_string(),
            stability: VisibilityTier::Development,
            span: span_range(6, 12, 12),
            height: HeightRange { minimum: 3, default: 4, maximum: 10 },
            controls: vec![PropControl::new("showLabels", "Show labels", ControlKind::Boolean, false)],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_consistent() {
        let registry = CardRegistry::builtin();
        let rebuilt = CardRegistry::new(registry.iter().cloned().collect());
        assert!(rebuilt.is_ok());
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_lookup_by_name_unknown() {
        let registry = CardRegistry::builtin();
        assert_eq!(
            registry.lookup_by_name("Nope").unwrap_err(),
            RegistryError::UnknownCardType("Nope".to_string())
        );
        assert_eq!(registry.lookup_by_name("Chart").unwrap().name, "Chart");
    }

    #[test]
    fn test_lookup_by_title_uses_localizer() {
        let registry = CardRegistry::builtin();
        let localize = |key: &str| match key {
            "card.stat.title" => "Statistik".to_string(),
            other => other.to_string(),
        };
        let found = registry.lookup_by_title("Statistik", &localize).unwrap();
        assert_eq!(found.name, "Stat");
        assert!(registry.lookup_by_title("card.stat.title", &localize).is_err());
    }

    #[test]
    fn test_duplicate_rejected() {
        let chart = CardRegistry::builtin().lookup_by_name("Chart").unwrap().clone();
        let result = CardRegistry::new(vec![chart.clone(), chart]);
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateCardType("Chart".into()));
    }

    #[test]
    fn test_inverted_span_range_rejected() {
        let mut chart = CardRegistry::builtin().lookup_by_name("Chart").unwrap().clone();
        chart.span = span_range(8, 4, 12);
        assert!(matches!(
            CardRegistry::new(vec![chart]),
            Err(RegistryError::InvalidSpanRange(_))
        ));
    }

    #[test]
    fn test_default_tier_is_production() {
        assert_eq!(VisibilityTier::default(), VisibilityTier::Production);
        assert!(VisibilityTier::Development < VisibilityTier::Beta);
    }

    #[test]
    fn test_list_available_by_tier() {
        let registry = CardRegistry::builtin();
        let production: Vec<_> = registry
            .list_available(VisibilityTier::Production)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert!(!production.contains(&"Uptime"));
        assert!(!production.contains(&"Topology"));

        let beta = registry.list_available(VisibilityTier::Beta);
        assert!(beta.iter().any(|d| d.name == "Uptime"));
        assert!(!beta.iter().any(|d| d.name == "Topology"));

        assert_eq!(registry.list_available(VisibilityTier::Development).len(), registry.len());
    }
}
