//! Configuration schema (edmcheck.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::codes;
use crate::diagnostic::Severity;

/// Newest schema version understood by the runtime
pub const LATEST_SCHEMA_VERSION: u8 = 3;

/// First schema version with foreign keys exposed in the conceptual model
pub const FOREIGN_KEYS_IN_MODEL_VERSION: u8 = 2;

/// Severity overrides for specific error codes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeverityOverrides {
    /// Map of code name (or number) to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityOverrides {
    /// Get severity for a numeric code, or default
    pub fn get_severity(&self, code: i32, default: Severity) -> Severity {
        if let Some(name) = codes::code_name(code) {
            if let Some(severity) = self.overrides.get(name) {
                return *severity;
            }
        }

        self.overrides
            .get(&code.to_string())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a designer code
    pub fn set_override(&mut self, code: codes::DesignerCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Newest schema version the target runtime accepts
    #[serde(default = "default_target_version")]
    pub target_version: u8,

    /// Compile the mapping after both schemas compiled cleanly
    #[serde(default = "default_true")]
    pub validate_mapping: bool,

    /// Generate views after the mapping compiled cleanly
    #[serde(default = "default_true")]
    pub generate_views: bool,

    /// Run the model validator even when no error class is dirty
    #[serde(default)]
    pub force: bool,

    /// Override the version-derived foreign-keys-in-model feature state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_keys_in_model: Option<bool>,

    /// Severity overrides applied when building reports
    #[serde(default)]
    pub severity: SeverityOverrides,

    /// File suffix picked up when validating a directory
    #[serde(default = "default_artifact_suffix")]
    pub artifact_suffix: String,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

fn default_target_version() -> u8 {
    LATEST_SCHEMA_VERSION
}

fn default_true() -> bool {
    true
}

fn default_artifact_suffix() -> String {
    ".edm.json".to_string()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            target_version: LATEST_SCHEMA_VERSION,
            validate_mapping: true,
            generate_views: true,
            force: false,
            foreign_keys_in_model: None,
            severity: SeverityOverrides::default(),
            artifact_suffix: default_artifact_suffix(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl ValidationConfig {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: ValidationConfig = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config.target_version == 0 || config.target_version > LATEST_SCHEMA_VERSION {
            return Err(ConfigError::InvalidValue(format!(
                "target_version must be between 1 and {}, got {}",
                LATEST_SCHEMA_VERSION, config.target_version
            )));
        }

        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Whether foreign keys in the conceptual model are enabled for a schema version
    pub fn foreign_keys_in_model(&self, schema_version: u8) -> bool {
        self.foreign_keys_in_model
            .unwrap_or(schema_version >= FOREIGN_KEYS_IN_MODEL_VERSION)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::DesignerCode;

    #[test]
    fn default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.target_version, LATEST_SCHEMA_VERSION);
        assert!(config.validate_mapping);
        assert!(config.generate_views);
        assert!(!config.force);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = ValidationConfig::from_toml("generate_views = false\n").unwrap();
        assert!(!config.generate_views);
        assert!(config.validate_mapping);
        assert_eq!(config.artifact_suffix, ".edm.json");
    }

    #[test]
    fn rejects_unknown_target_version() {
        let result = ValidationConfig::from_toml("target_version = 9\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn severity_override_by_name_and_number() {
        let mut severity = SeverityOverrides::default();
        severity.set_override(DesignerCode::EscherValidatorUnmappedProperty, Severity::Warning);
        severity.overrides.insert("2062".to_string(), Severity::Error);

        assert_eq!(
            severity.get_severity(
                DesignerCode::EscherValidatorUnmappedProperty.code(),
                Severity::Error
            ),
            Severity::Warning
        );
        // 2062 has a symbolic name, but the numeric key still applies
        assert_eq!(severity.get_severity(2062, Severity::Warning), Severity::Error);
        assert_eq!(severity.get_severity(42, Severity::Error), Severity::Error);
    }

    #[test]
    fn foreign_key_feature_follows_version() {
        let mut config = ValidationConfig::default();
        assert!(!config.foreign_keys_in_model(1));
        assert!(config.foreign_keys_in_model(2));

        config.foreign_keys_in_model = Some(false);
        assert!(!config.foreign_keys_in_model(3));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edmcheck.toml");

        let mut config = ValidationConfig::default();
        config.generate_views = false;
        config.save_to_file(&path).unwrap();

        let loaded = ValidationConfig::from_file(&path).unwrap();
        assert!(!loaded.generate_views);
        assert_eq!(loaded.project_root, dir.path());
    }
}
