//! Validation session
//!
//! Ties the passes together for one or more artifacts: loader diagnostics,
//! then the Escher pass, then the runtime pass. The runtime pass is
//! skipped when the Escher pass found an error that compilation would
//! only repeat. Results are turned into report entries with the
//! configured severity overrides applied.

use std::path::Path;

use edmcheck_core::{
    ArtifactReport, ErrorClass, ErrorInfo, ErrorItem, ReportEntry, Severity, SeverityOverrides, ValidationConfig,
    ValidationReport,
};
use edmcheck_model::{AntiDependencyIndex, ContentValidatorRegistry, DocumentError, ModelArtifact};

use crate::artifact_set::ArtifactErrorSet;
use crate::compiler::{GraphMetadataCompiler, MetadataCompiler};
use crate::escher_validator::{self, is_skip_runtime_validation_error, EscherModelValidator};
use crate::runtime_validator::{self, CompiledMetadata, RuntimeMetadataValidator};

/// Errors that prevent an artifact from being validated at all
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Failed to write report {0}: {1}")]
    Report(String, String),
}

/// Everything one artifact produced
#[derive(Debug)]
pub struct ArtifactValidation {
    pub artifact: ModelArtifact,
    pub errors: ArtifactErrorSet,
    pub compiled: CompiledMetadata,

    /// The runtime pass did not run because of Escher findings
    pub runtime_skipped: bool,
}

impl ArtifactValidation {
    pub fn has_errors(&self) -> bool {
        self.errors.error_count() > 0
    }

    /// Whether the error forces raw-document editing
    pub fn is_open_in_editor(&self, error: &ErrorInfo) -> bool {
        escher_validator::is_open_in_editor_error(error) || runtime_validator::is_open_in_editor_error(error, &self.artifact)
    }

    /// Report entries with `overrides` applied, in error order
    pub fn entries(&self, overrides: &SeverityOverrides) -> Vec<ReportEntry> {
        self.errors
            .errors()
            .iter()
            .map(|error| {
                let entry = ReportEntry::from_error(error)
                    .with_severity(overrides.get_severity(error.code(), error.severity()))
                    .with_open_in_editor(self.is_open_in_editor(error));
                match error.item() {
                    ErrorItem::Object(id) => entry.with_object(self.artifact.path_of(id), self.artifact.position(id)),
                    ErrorItem::Artifact => entry,
                }
            })
            .collect()
    }

    pub fn to_report(&self, path: impl Into<String>, overrides: &SeverityOverrides) -> ArtifactReport {
        let contents = self.artifact.source().unwrap_or_default();
        let mut report = ArtifactReport::new(path, contents.as_bytes());
        report.entries = self.entries(overrides);
        report
    }
}

/// Validates artifacts with one configuration
pub struct ValidationSession {
    config: ValidationConfig,
    registry: ContentValidatorRegistry,
    escher: EscherModelValidator,
    runtime: RuntimeMetadataValidator,
    compiler: Box<dyn MetadataCompiler>,
}

impl ValidationSession {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            escher: EscherModelValidator::from_config(&config),
            runtime: RuntimeMetadataValidator::from_config(&config),
            compiler: Box::new(GraphMetadataCompiler::from_config(&config)),
            registry: ContentValidatorRegistry::new(),
            config,
        }
    }

    /// Replace the runtime compiler
    pub fn with_compiler(mut self, compiler: impl MetadataCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate_path(&mut self, path: &Path) -> Result<ArtifactValidation, SessionError> {
        tracing::info!(path = %path.display(), "Validating artifact");
        let artifact = ModelArtifact::load(path, &mut self.registry)?;
        Ok(self.validate_artifact(artifact))
    }

    pub fn validate_str(&mut self, json: &str) -> Result<ArtifactValidation, SessionError> {
        let artifact = ModelArtifact::from_json(json, &mut self.registry)?;
        Ok(self.validate_artifact(artifact))
    }

    pub fn validate_artifact(&self, artifact: ModelArtifact) -> ArtifactValidation {
        let mut errors = ArtifactErrorSet::new();
        for diagnostic in artifact.diagnostics() {
            errors.add_error(diagnostic.clone());
        }
        errors.set_validity_dirty_for_error_class(ErrorClass::PARSE_ERROR | ErrorClass::RESOLVE_ERROR, false);

        let index = AntiDependencyIndex::build(&artifact);
        self.escher
            .validate_escher_model(&mut errors, &artifact, &index, self.config.force);

        let runtime_skipped = errors.errors().iter().any(is_skip_runtime_validation_error);
        let compiled = if runtime_skipped {
            tracing::info!("Escher errors make runtime validation redundant, skipping it");
            CompiledMetadata::default()
        } else {
            self.runtime.validate_artifact_set(
                &mut errors,
                &artifact,
                self.compiler.as_ref(),
                self.config.force,
                self.config.validate_mapping,
                self.config.generate_views,
            )
        };

        tracing::debug!(
            errors = errors.error_count(),
            warnings = errors.warning_count(),
            "Artifact validated"
        );

        ArtifactValidation {
            artifact,
            errors,
            compiled,
            runtime_skipped,
        }
    }

    /// Report over several validated artifacts
    pub fn report<'a>(&self, results: impl IntoIterator<Item = (String, &'a ArtifactValidation)>) -> ValidationReport {
        let mut report = ValidationReport::new();
        for (path, validation) in results {
            report.add_artifact(validation.to_report(path, &self.config.severity));
        }
        report
    }

    pub fn save_report(&self, report: &ValidationReport, path: &Path) -> Result<(), SessionError> {
        report
            .save_to_file(path)
            .map_err(|e| SessionError::Report(path.display().to_string(), e.to_string()))
    }
}

/// Highest severity among entries, if any
pub fn worst_severity(entries: &[ReportEntry]) -> Option<Severity> {
    entries.iter().map(|entry| entry.severity).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UNMAPPED: &str = r#"{
        "version": 3,
        "conceptual": {"namespace": "Shop",
            "entity_types": [{"name": "Customer", "key": ["Id"],
                "properties": [{"name": "Id", "type": "Int32", "nullable": false}]}],
            "entity_containers": [{"name": "ShopContainer",
                "entity_sets": [{"name": "Customers", "entity_type": "Shop.Customer"}]}]},
        "storage": {"namespace": "Shop.Store", "provider": "System.Data.SqlClient",
            "entity_types": [{"name": "customers", "key": ["id"],
                "properties": [{"name": "id", "type": "int", "nullable": false}]}],
            "entity_containers": [{"name": "ShopStore",
                "entity_sets": [{"name": "customers", "entity_type": "Shop.Store.customers"}]}]},
        "mapping": {"entity_container_mappings": [{"storage_entity_container": "ShopStore",
            "cdm_entity_container": "ShopContainer"}]}
    }"#;

    #[test]
    fn escher_findings_skip_the_runtime_pass() {
        let mut session = ValidationSession::new(ValidationConfig::default());
        let validation = session.validate_str(UNMAPPED).unwrap();

        assert!(validation.runtime_skipped);
        assert!(validation.has_errors());
        assert!(validation.compiled.conceptual.is_none());
        assert!(validation
            .errors
            .errors()
            .iter()
            .all(|e| !e.class().intersects(ErrorClass::RUNTIME_ALL)));
    }

    #[test]
    fn overrides_change_report_severity() {
        let mut session = ValidationSession::new(ValidationConfig::default());
        let validation = session.validate_str(UNMAPPED).unwrap();

        let mut overrides = SeverityOverrides::default();
        for error in validation.errors.errors() {
            overrides.overrides.insert(error.code().to_string(), Severity::Warning);
        }
        let entries = validation.entries(&overrides);
        assert_eq!(entries.len(), validation.errors.len());
        assert_eq!(worst_severity(&entries), Some(Severity::Warning));
        assert_eq!(worst_severity(&validation.entries(&SeverityOverrides::default())), Some(Severity::Error));
    }

    #[test]
    fn parse_failures_are_errors() {
        let mut session = ValidationSession::new(ValidationConfig::default());
        assert!(matches!(session.validate_str("{ not json"), Err(SessionError::Document(_))));
    }
}
