//! Layout Data Model - Cards, Spans, Layouts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::registry::CardDescriptor;

/// Width of the dashboard grid in columns.
pub const GRID_COLUMNS: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("span {0} is outside 1..=12")]
pub struct SpanOutOfRange(pub i64);

/// Column width of a card. Always within `1..=GRID_COLUMNS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Span(u8);

impl Span {
    pub const MIN: Span = Span(1);
    pub const MAX: Span = Span(GRID_COLUMNS);

    pub fn new(value: u8) -> Result<Self, SpanOutOfRange> {
        if (1..=GRID_COLUMNS).contains(&value) {
            Ok(Span(value))
        } else {
            Err(SpanOutOfRange(value as i64))
        }
    }

    /// Saturate any integer into the grid range.
    pub fn clamped(value: i64) -> Self {
        Span(value.clamp(1, GRID_COLUMNS as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Span {
    type Error = SpanOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Span::new(value)
    }
}

impl From<Span> for u8 {
    fn from(span: Span) -> u8 {
        span.0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored property value.
///
/// `Null` stands for a key that is present but holds no value. Shapes the
/// controls never produce (arrays, objects) are kept verbatim in `Other` so
/// that loading and saving a layout never loses data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl PropValue {
    /// Numeric coercion used by bounded number controls.
    ///
    /// Booleans count as 1/0, text is trimmed and parsed (blank text is 0).
    /// Returns `None` when the value has no numeric reading.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => Some(*n),
            PropValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            PropValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Some(0.0);
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            PropValue::Null | PropValue::Other(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => write!(f, "null"),
            PropValue::Bool(b) => write!(f, "{}", b),
            PropValue::Number(n) => write!(f, "{}", n),
            PropValue::Text(s) => write!(f, "{:?}", s),
            PropValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(value as f64)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

/// Open property bag. Keys without a matching control are kept untouched.
pub type PropBag = BTreeMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn generate() -> Self {
        CardId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        CardId(value.to_string())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One placed card on a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    pub id: CardId,
    pub name: String,
    pub span: Span,
    #[serde(default)]
    pub props: PropBag,
}

impl CardConfig {
    /// A freshly placed card: new id, default span, props from the descriptor.
    pub fn from_descriptor(descriptor: &CardDescriptor) -> Self {
        Self {
            id: CardId::generate(),
            name: descriptor.name.clone(),
            span: descriptor.span.default,
            props: descriptor.default_props(),
        }
    }

    pub fn to_serial(&self) -> SerialCardConfig {
        SerialCardConfig {
            name: self.name.clone(),
            span: self.span,
            props: self.props.clone(),
        }
    }
}

/// De-identified card, as stored in templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialCardConfig {
    pub name: String,
    pub span: Span,
    pub props: PropBag,
}

impl SerialCardConfig {
    pub fn into_card(self) -> CardConfig {
        CardConfig {
            id: CardId::generate(),
            name: self.name,
            span: self.span,
            props: self.props,
        }
    }
}

/// A named, ordered arrangement of cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardLayout {
    pub name: String,
    #[serde(default)]
    pub cards: Vec<CardConfig>,
    #[serde(default)]
    pub favorite: bool,
}

impl DashboardLayout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cards: vec![],
            favorite: false,
        }
    }

    pub fn card(&self, id: &CardId) -> Option<&CardConfig> {
        self.cards.iter().find(|c| &c.id == id)
    }

    pub fn add_card(&mut self, card: CardConfig) {
        self.cards.push(card);
    }

    pub fn remove_card(&mut self, id: &CardId) -> Option<CardConfig> {
        let index = self.cards.iter().position(|c| &c.id == id)?;
        Some(self.cards.remove(index))
    }

    /// Returns false when no card has `id`.
    pub fn set_span(&mut self, id: &CardId, span: Span) -> bool {
        match self.cards.iter_mut().find(|c| &c.id == id) {
            Some(card) => {
                card.span = span;
                true
            }
            None => false,
        }
    }

    /// Move the card at `from` so it ends up at index `to`.
    pub fn move_card(&mut self, from: usize, to: usize) -> bool {
        if from >= self.cards.len() || to >= self.cards.len() {
            return false;
        }
        let card = self.cards.remove(from);
        self.cards.insert(to, card);
        true
    }

    pub fn serial_cards(&self) -> Vec<SerialCardConfig> {
        self.cards.iter().map(CardConfig::to_serial).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_bounds() {
        assert!(Span::new(0).is_err());
        assert!(Span::new(13).is_err());
        assert_eq!(Span::new(12).unwrap().get(), 12);
        assert_eq!(Span::clamped(-4), Span::MIN);
        assert_eq!(Span::clamped(40), Span::MAX);
    }

    #[test]
    fn test_span_rejects_zero_on_deserialize() {
        assert!(serde_json::from_str::<Span>("0").is_err());
        assert_eq!(serde_json::from_str::<Span>("6").unwrap().get(), 6);
    }

    #[test]
    fn test_prop_value_untagged_shapes() {
        let bag: PropBag = serde_json::from_str(
            r#"{"a": null, "b": true, "c": 12, "d": "x", "e": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(bag["a"], PropValue::Null);
        assert_eq!(bag["b"], PropValue::Bool(true));
        assert_eq!(bag["c"], PropValue::Number(12.0));
        assert_eq!(bag["d"], PropValue::Text("x".into()));
        assert!(matches!(bag["e"], PropValue::Other(_)));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(PropValue::from(" 42 ").coerce_number(), Some(42.0));
        assert_eq!(PropValue::from("").coerce_number(), Some(0.0));
        assert_eq!(PropValue::from(true).coerce_number(), Some(1.0));
        assert_eq!(PropValue::from("abc").coerce_number(), None);
        assert_eq!(PropValue::from("NaN").coerce_number(), None);
        assert_eq!(PropValue::Null.coerce_number(), None);
    }

    #[test]
    fn test_move_card() {
        let mut layout = DashboardLayout::new("ops");
        for name in ["a", "b", "c"] {
            layout.add_card(CardConfig {
                id: CardId::from(name),
                name: name.to_string(),
                span: Span::MIN,
                props: PropBag::new(),
            });
        }
        assert!(layout.move_card(0, 2));
        let order: Vec<_> = layout.cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert!(!layout.move_card(3, 0));
    }
}
