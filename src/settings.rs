//! Engine Settings - Host-Tunable Knobs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::registry::VisibilityTier;
use crate::resize::EdgeDamping;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    #[serde(default)]
    pub visibility_tier: VisibilityTier,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub edge_damping: EdgeDamping,
}

fn default_history_limit() -> usize { 10 }

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            visibility_tier: VisibilityTier::default(),
            history_limit: default_history_limit(),
            edge_damping: EdgeDamping::default(),
        }
    }
}

impl EngineSettings {
    /// Read settings from a JSON file. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.history_limit == 0 {
            return Err(SettingsError::Invalid("historyLimit", "must be at least 1".into()));
        }
        let factor = self.edge_damping.factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(SettingsError::Invalid(
                "edgeDamping.factor",
                format!("{} is outside (0, 1]", factor),
            ));
        }
        let fraction = self.edge_damping.edge_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(SettingsError::Invalid(
                "edgeDamping.edgeFraction",
                format!("{} is outside [0, 1)", fraction),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = EngineSettings::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.visibility_tier, VisibilityTier::Production);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"visibilityTier": "beta", "edgeDamping": {"factor": 0.8}}"#).unwrap();
        let settings = EngineSettings::load(&path).unwrap();
        assert_eq!(settings.visibility_tier, VisibilityTier::Beta);
        assert_eq!(settings.history_limit, 10);
        assert_eq!(settings.edge_damping.factor, 0.8);
        assert_eq!(settings.edge_damping.edge_fraction, 0.05);
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"edgeDamping": {"factor": 1.5}}"#).unwrap();
        assert!(matches!(EngineSettings::load(&path), Err(SettingsError::Invalid(..))));

        fs::write(&path, r#"{"historyLimit": 0}"#).unwrap();
        assert!(matches!(EngineSettings::load(&path), Err(SettingsError::Invalid(..))));

        fs::write(&path, "{").unwrap();
        assert!(matches!(EngineSettings::load(&path), Err(SettingsError::Malformed(_))));
    }
}
