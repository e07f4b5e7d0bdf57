//! Validation Engine - Card Configs Against Descriptors
//!
//! Rules produce card errors.
//! The validator aggregates them and attaches the remedy.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::layout::{CardConfig, CardId, DashboardLayout, PropValue};
use crate::registry::{CardDescriptor, CardRegistry, ControlKind, PropControl, ValueSource};

#[derive(Debug, Clone, Error, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardError {
    #[error("unknown card type {name:?}")]
    UnknownCardType { name: String },

    #[error("missing property {key:?}")]
    MissingProperty { key: String },

    #[error("invalid value for property {key:?}: {reason}")]
    InvalidPropertyValue { key: String, reason: String },

    #[error("property {key:?} value {value} is out of range")]
    PropertyOutOfRange {
        key: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl CardError {
    pub fn key(&self) -> Option<&str> {
        match self {
            CardError::UnknownCardType { .. } => None,
            CardError::MissingProperty { key }
            | CardError::InvalidPropertyValue { key, .. }
            | CardError::PropertyOutOfRange { key, .. } => Some(key),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    RemoveCard,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid {
        errors: Vec<CardError>,
        suggested_action: SuggestedAction,
    },
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<CardError>) -> Self {
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid {
                errors,
                suggested_action: SuggestedAction::RemoveCard,
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn errors(&self) -> &[CardError] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid { errors, .. } => errors,
        }
    }

    pub fn suggested_action(&self) -> Option<SuggestedAction> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { suggested_action, .. } => Some(*suggested_action),
        }
    }
}

/// Validation rule trait - produces errors for one resolved card
pub trait PropRule {
    fn name(&self) -> &'static str;
    fn check(&self, card: &CardConfig, descriptor: &CardDescriptor) -> Vec<CardError>;
}

/// Controls whose key is present in the card's props, paired with the value.
fn present<'a>(
    card: &'a CardConfig,
    descriptor: &'a CardDescriptor,
) -> impl Iterator<Item = (&'a PropControl, &'a PropValue)> {
    descriptor
        .controls
        .iter()
        .filter_map(move |control| card.props.get(&control.key).map(|value| (control, value)))
}

// --- Concrete Rules ---

pub struct RequiredPropsRule;

impl PropRule for RequiredPropsRule {
    fn name(&self) -> &'static str { "required_props" }

    fn check(&self, card: &CardConfig, descriptor: &CardDescriptor) -> Vec<CardError> {
        descriptor
            .controls
            .iter()
            .filter(|control| !card.props.contains_key(&control.key))
            .map(|control| CardError::MissingProperty { key: control.key.clone() })
            .collect()
    }
}

pub struct DefinedValueRule;

impl PropRule for DefinedValueRule {
    fn name(&self) -> &'static str { "defined_value" }

    fn check(&self, card: &CardConfig, descriptor: &CardDescriptor) -> Vec<CardError> {
        present(card, descriptor)
            .filter(|(_, value)| value.is_null())
            .map(|(control, _)| CardError::InvalidPropertyValue {
                key: control.key.clone(),
                reason: "value is undefined".to_string(),
            })
            .collect()
    }
}

/// Membership in a static option list. Dynamic sources are not checked.
pub struct DeclaredValuesRule;

impl PropRule for DeclaredValuesRule {
    fn name(&self) -> &'static str { "declared_values" }

    fn check(&self, card: &CardConfig, descriptor: &CardDescriptor) -> Vec<CardError> {
        present(card, descriptor)
            .filter(|(_, value)| !value.is_null())
            .filter_map(|(control, value)| match &control.kind {
                ControlKind::Select { options: ValueSource::Static(allowed) }
                    if !allowed.contains(value) =>
                {
                    Some(CardError::InvalidPropertyValue {
                        key: control.key.clone(),
                        reason: format!("{} is not an allowed value", value),
                    })
                }
                _ => None,
            })
            .collect()
    }
}

pub struct NumericBoundsRule;

impl PropRule for NumericBoundsRule {
    fn name(&self) -> &'static str { "numeric_bounds" }

    fn check(&self, card: &CardConfig, descriptor: &CardDescriptor) -> Vec<CardError> {
        let mut errors = vec![];

        for (control, value) in present(card, descriptor) {
            let (min, max) = match control.kind {
                ControlKind::Number { min, max } if min.is_some() || max.is_some() => (min, max),
                _ => continue,
            };
            if value.is_null() {
                continue;
            }

            let Some(number) = value.coerce_number() else {
                errors.push(CardError::InvalidPropertyValue {
                    key: control.key.clone(),
                    reason: format!("{} is not a number", value),
                });
                continue;
            };

            let below = min.is_some_and(|m| number < m);
            let above = max.is_some_and(|m| number > m);
            if below || above {
                errors.push(CardError::PropertyOutOfRange {
                    key: control.key.clone(),
                    value: number,
                    min,
                    max,
                });
            }
        }

        errors
    }
}

/// Per-card results for a whole layout.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub layout: String,
    pub cards: Vec<CardReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardReport {
    pub id: CardId,
    pub name: String,
    /// Names of the rules that reported at least one error.
    pub failed_rules: Vec<&'static str>,
    pub result: ValidationResult,
}

impl LayoutReport {
    pub fn is_clean(&self) -> bool {
        self.cards.iter().all(|c| c.result.is_valid())
    }

    pub fn invalid_cards(&self) -> impl Iterator<Item = &CardReport> {
        self.cards.iter().filter(|c| !c.result.is_valid())
    }
}

/// Reported when the card type itself does not resolve.
const REGISTERED_TYPE_RULE: &str = "registered_type";

/// Validator runs every rule against a resolved card and aggregates.
pub struct Validator {
    rules: Vec<Box<dyn PropRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredPropsRule),
                Box::new(DefinedValueRule),
                Box::new(DeclaredValuesRule),
                Box::new(NumericBoundsRule),
            ],
        }
    }

    pub fn validate(&self, card: &CardConfig, registry: &CardRegistry) -> ValidationResult {
        self.run(card, registry).1
    }

    fn run(&self, card: &CardConfig, registry: &CardRegistry) -> (Vec<&'static str>, ValidationResult) {
        let descriptor = match registry.lookup_by_name(&card.name) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                let errors = vec![CardError::UnknownCardType { name: card.name.clone() }];
                return (vec![REGISTERED_TYPE_RULE], ValidationResult::from_errors(errors));
            }
        };

        let mut failed_rules = vec![];
        let mut errors = vec![];
        for rule in &self.rules {
            let found = rule.check(card, descriptor);
            if !found.is_empty() {
                debug!(rule = rule.name(), card_type = %card.name, errors = found.len(), "rule failed");
                failed_rules.push(rule.name());
                errors.extend(found);
            }
        }

        (failed_rules, ValidationResult::from_errors(errors))
    }

    /// Validate every card of a layout, logging the ones that fail.
    pub fn sanitize_layout(&self, layout: &DashboardLayout, registry: &CardRegistry) -> LayoutReport {
        let cards = layout
            .cards
            .iter()
            .map(|card| {
                let (failed_rules, result) = self.run(card, registry);
                if !result.is_valid() {
                    warn!(
                        layout = %layout.name,
                        card_id = %card.id,
                        card_type = %card.name,
                        errors = result.errors().len(),
                        "card failed validation"
                    );
                }
                CardReport {
                    id: card.id.clone(),
                    name: card.name.clone(),
                    failed_rules,
                    result,
                }
            })
            .collect();

        LayoutReport {
            layout: layout.name.clone(),
            cards,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
