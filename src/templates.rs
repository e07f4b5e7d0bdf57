//! Template System - Shareable Layouts
//!
//! Uploads are strict: exact shape, known card types, known version, and a
//! name nobody else uses. A template imports whole or not at all.

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::canonical::canonical_json_pretty;
use crate::layout::{DashboardLayout, PropBag, SerialCardConfig, Span};
use crate::registry::CardRegistry;
use crate::CURRENT_TEMPLATE_VERSION;

/// Version tags this engine knows how to read.
pub const KNOWN_TEMPLATE_VERSIONS: &[&str] = &["1.0.0"];

pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_DESCRIPTION_CHARS: usize = 256;
pub const MAX_DESCRIPTION_WORDS: usize = 40;

const TEMPLATE_KEYS: [&str; 4] = ["name", "description", "cards", "version"];
const CARD_KEYS: [&str; 3] = ["name", "span", "props"];

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+( [A-Za-z0-9_.\-]+)*$").expect("name pattern compiles")
});

static DESCRIPTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[\p{L}\p{N}\s.,!?'"()\-:;/&_]+$"#).expect("description pattern compiles")
});

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("Invalid template name: {0}")]
    NameInvalid(String),

    #[error("Template name already taken: {0}")]
    NameTaken(String),

    #[error("Invalid template description: {0}")]
    DescriptionInvalid(String),

    #[error("Unknown template version: {0}")]
    UnknownVersion(String),

    #[error("Unknown card type: {0}")]
    UnknownCardType(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateVendor {
    Blank,
    VendorProvided,
    UserSubmitted,
}

impl TemplateVendor {
    /// Only user templates can be removed.
    pub fn is_deletable(self) -> bool {
        self == TemplateVendor::UserSubmitted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutTemplate {
    pub name: String,
    pub description: String,
    pub cards: Vec<SerialCardConfig>,
    pub version: Version,
    pub vendor: TemplateVendor,
}

impl LayoutTemplate {
    /// Templatize a layout as a user template.
    pub fn from_layout(
        layout: &DashboardLayout,
        name: &str,
        description: &str,
    ) -> Result<Self, TemplateError> {
        validate_name(name)?;
        validate_description(description)?;
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            cards: layout.serial_cards(),
            version: current_version(),
            vendor: TemplateVendor::UserSubmitted,
        })
    }

    /// Build a fresh layout, dropping cards whose type is no longer registered.
    pub fn instantiate(&self, layout_name: &str, registry: &CardRegistry) -> DashboardLayout {
        let mut layout = DashboardLayout::new(layout_name);
        for card in &self.cards {
            if !registry.contains(&card.name) {
                warn!(
                    template = %self.name,
                    card_type = %card.name,
                    "dropping card with unknown type from template"
                );
                continue;
            }
            layout.add_card(card.clone().into_card());
        }
        layout
    }
}

/// On-disk form of a template: exactly the four shareable keys.
#[derive(Debug, Serialize, Deserialize)]
struct TemplateDocument {
    name: String,
    description: String,
    cards: Vec<SerialCardConfig>,
    version: String,
}

fn current_version() -> Version {
    Version::new(1, 0, 0)
}

pub fn parse_version(tag: &str) -> Result<Version, TemplateError> {
    if !KNOWN_TEMPLATE_VERSIONS.contains(&tag) {
        return Err(TemplateError::UnknownVersion(tag.to_string()));
    }
    Version::parse(tag).map_err(|_| TemplateError::UnknownVersion(tag.to_string()))
}

pub fn validate_name(name: &str) -> Result<(), TemplateError> {
    if name.is_empty() {
        return Err(TemplateError::NameInvalid("name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(TemplateError::NameInvalid(format!(
            "name is longer than {} characters",
            MAX_NAME_CHARS
        )));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(TemplateError::NameInvalid(format!(
            "{:?} may only use letters, digits, '_', '-', '.' and single inner spaces",
            name
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), TemplateError> {
    if description.trim().is_empty() {
        return Err(TemplateError::DescriptionInvalid("description is empty".into()));
    }
    if description.chars().count() >= MAX_DESCRIPTION_CHARS {
        return Err(TemplateError::DescriptionInvalid(format!(
            "description must be shorter than {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    if description.split_whitespace().count() > MAX_DESCRIPTION_WORDS {
        return Err(TemplateError::DescriptionInvalid(format!(
            "description has more than {} words",
            MAX_DESCRIPTION_WORDS
        )));
    }
    if !DESCRIPTION_PATTERN.is_match(description) {
        return Err(TemplateError::DescriptionInvalid(
            "description contains unsupported characters".into(),
        ));
    }
    Ok(())
}

fn has_exact_keys(map: &Map<String, Value>, expected: &[&str]) -> bool {
    map.len() == expected.len() && expected.iter().all(|key| map.contains_key(*key))
}

fn string_field<'v>(map: &'v Map<String, Value>, key: &str) -> Result<&'v str, TemplateError> {
    map.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TemplateError::StructuralMismatch(format!("{} must be a string", key)))
}

fn parse_card(
    index: usize,
    value: &Value,
    registry: &CardRegistry,
) -> Result<SerialCardConfig, TemplateError> {
    let mismatch = |what: &str| TemplateError::StructuralMismatch(format!("card {}: {}", index, what));

    let map = value
        .as_object()
        .filter(|map| has_exact_keys(map, &CARD_KEYS))
        .ok_or_else(|| mismatch("expected exactly the keys name, span, props"))?;

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| mismatch("name must be a string"))?;

    let span = map
        .get("span")
        .and_then(Value::as_u64)
        .and_then(|n| u8::try_from(n).ok())
        .and_then(|n| Span::new(n).ok())
        .ok_or_else(|| mismatch("span must be an integer between 1 and 12"))?;

    let props = match map.get("props") {
        Some(Value::Object(props)) => serde_json::from_value::<PropBag>(Value::Object(props.clone()))?,
        _ => return Err(mismatch("props must be an object")),
    };

    if !registry.contains(name) {
        return Err(TemplateError::UnknownCardType(name.to_string()));
    }

    Ok(SerialCardConfig {
        name: name.to_string(),
        span,
        props,
    })
}

/// Strict importer for user uploads.
pub struct TemplateImporter<'a> {
    registry: &'a CardRegistry,
    taken: HashSet<String>,
}

/// Result of one file in a batch upload.
#[derive(Debug)]
pub struct ImportOutcome {
    pub file: String,
    pub result: Result<LayoutTemplate, TemplateError>,
}

impl<'a> TemplateImporter<'a> {
    pub fn new<I, S>(registry: &'a CardRegistry, existing_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry,
            taken: existing_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_catalog(registry: &'a CardRegistry, catalog: &TemplateCatalog) -> Self {
        Self::new(registry, catalog.list().iter().map(|t| t.name.clone()))
    }

    pub fn parse_template(&self, bytes: &[u8]) -> Result<LayoutTemplate, TemplateError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| TemplateError::MalformedDocument(e.to_string()))?;

        let map = document
            .as_object()
            .filter(|map| has_exact_keys(map, &TEMPLATE_KEYS))
            .ok_or_else(|| {
                TemplateError::StructuralMismatch(
                    "expected exactly the keys name, description, cards, version".into(),
                )
            })?;

        let name = string_field(map, "name")?;
        validate_name(name)?;

        let description = string_field(map, "description")?;
        validate_description(description)?;

        if self.taken.contains(name) {
            return Err(TemplateError::NameTaken(name.to_string()));
        }

        let cards = map
            .get("cards")
            .and_then(Value::as_array)
            .ok_or_else(|| TemplateError::StructuralMismatch("cards must be an array".into()))?
            .iter()
            .enumerate()
            .map(|(index, card)| parse_card(index, card, self.registry))
            .collect::<Result<Vec<_>, _>>()?;

        let version = parse_version(string_field(map, "version")?)?;

        Ok(LayoutTemplate {
            name: name.to_string(),
            description: description.to_string(),
            cards,
            version,
            vendor: TemplateVendor::UserSubmitted,
        })
    }

    /// Parse each upload on its own. Names accepted earlier in the batch
    /// count as taken for the files after them.
    pub fn import_batch<I>(&mut self, files: I) -> Vec<ImportOutcome>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        files
            .into_iter()
            .map(|(file, bytes)| {
                let result = self.parse_template(&bytes);
                match &result {
                    Ok(template) => {
                        debug!(file = %file, template = %template.name, "template imported");
                        self.taken.insert(template.name.clone());
                    }
                    Err(e) => warn!(file = %file, error = %e, "template rejected"),
                }
                ImportOutcome { file, result }
            })
            .collect()
    }
}

/// Serialize a layout as a downloadable template document.
pub fn serialize_template(
    layout: &DashboardLayout,
    name: &str,
    description: &str,
) -> Result<Vec<u8>, TemplateError> {
    validate_name(name)?;
    validate_description(description)?;

    let document = TemplateDocument {
        name: name.to_string(),
        description: description.to_string(),
        cards: layout.serial_cards(),
        version: CURRENT_TEMPLATE_VERSION.to_string(),
    };
    Ok(canonical_json_pretty(&document)?.into_bytes())
}

/// Every template a user can pick from: shipped ones plus user uploads.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<LayoutTemplate>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self { templates: vec![] }
    }

    pub fn with_builtins(registry: &CardRegistry) -> Self {
        Self {
            templates: builtin_templates(registry),
        }
    }

    /// Load vendor-provided templates from `*.json` files in `dir`.
    ///
    /// Vendor files are trusted and read leniently; unreadable ones are
    /// skipped with a warning.
    pub fn load_vendor_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let mut loaded = 0;
        if !dir.exists() {
            return Ok(loaded);
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                match read_vendor_template(&path) {
                    Ok(template) => {
                        self.register(template);
                        loaded += 1;
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping vendor template"),
                }
            }
        }
        Ok(loaded)
    }

    /// Adds or replaces the template with the same `(name, vendor)`.
    pub fn register(&mut self, template: LayoutTemplate) {
        self.templates
            .retain(|t| !(t.name == template.name && t.vendor == template.vendor));
        self.templates.push(template);
    }

    pub fn extend<I: IntoIterator<Item = LayoutTemplate>>(&mut self, templates: I) {
        for template in templates {
            self.register(template);
        }
    }

    pub fn get(&self, name: &str, vendor: TemplateVendor) -> Option<&LayoutTemplate> {
        self.templates.iter().find(|t| t.name == name && t.vendor == vendor)
    }

    pub fn list(&self) -> &[LayoutTemplate] {
        &self.templates
    }
}

fn read_vendor_template(path: &Path) -> Result<LayoutTemplate, TemplateError> {
    let content = fs::read_to_string(path)?;
    let document: TemplateDocument = serde_json::from_str(&content)?;
    Ok(LayoutTemplate {
        name: document.name,
        description: document.description,
        cards: document.cards,
        version: parse_version(&document.version)?,
        vendor: TemplateVendor::VendorProvided,
    })
}

fn seed(
    registry: &CardRegistry,
    name: &str,
    description: &str,
    vendor: TemplateVendor,
    card_types: &[&str],
) -> LayoutTemplate {
    let cards = card_types
        .iter()
        .filter_map(|card_type| registry.lookup_by_name(card_type).ok())
        .map(|descriptor| SerialCardConfig {
            name: descriptor.name.clone(),
            span: descriptor.span.default,
            props: descriptor.default_props(),
        })
        .collect();

    LayoutTemplate {
        name: name.to_string(),
        description: description.to_string(),
        cards,
        version: current_version(),
        vendor,
    }
}

/// Templates shipped with the engine.
pub fn builtin_templates(registry: &CardRegistry) -> Vec<LayoutTemplate> {
    vec![
        seed(registry, "Blank", "An empty dashboard.", TemplateVendor::Blank, &[]),
        seed(
            registry,
            "Overview",
            "Key charts and stats for a quick health check.",
            TemplateVendor::VendorProvided,
            &["Chart", "Stat", "Stat", "Alerts"],
        ),
        seed(
            registry,
            "Operations",
            "Alerts first, with a chart and shared notes for the on-call team.",
            TemplateVendor::VendorProvided,
            &["Alerts", "Chart", "Notes"],
        ),
    ]
}
