//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::diagnostic::{ErrorInfo, Severity, SourcePosition};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of entries
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of artifacts validated
    pub artifacts_checked: usize,

    /// Number of entries that force raw-document editing
    pub open_in_editor: usize,
}

/// One reported error, resolved against its artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Numeric code
    pub code: i32,

    /// Symbolic code name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,

    pub severity: Severity,

    /// Error class names
    pub classes: Vec<String>,

    pub message: String,

    /// Path of the originating object (`Shop/Product/Id`), `None` for the artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,

    /// The error cannot be fixed without editing the raw document
    #[serde(default)]
    pub open_in_editor: bool,
}

impl ReportEntry {
    /// Build an entry from an error record
    pub fn from_error(error: &ErrorInfo) -> Self {
        Self {
            code: error.code(),
            code_name: error.code_name().map(str::to_string),
            severity: error.severity(),
            classes: error.class().names().into_iter().map(str::to_string).collect(),
            message: error.message().to_string(),
            object: None,
            position: None,
            open_in_editor: false,
        }
    }

    pub fn with_object(mut self, path: impl Into<String>, position: Option<SourcePosition>) -> Self {
        self.object = Some(path.into());
        self.position = position;
        self
    }

    pub fn with_open_in_editor(mut self, open_in_editor: bool) -> Self {
        self.open_in_editor = open_in_editor;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Entries for a single artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    /// Artifact path as given
    pub path: String,

    /// SHA-256 of the artifact contents (hex)
    pub fingerprint: String,

    pub entries: Vec<ReportEntry>,
}

impl ArtifactReport {
    pub fn new(path: impl Into<String>, contents: &[u8]) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint(contents),
            entries: Vec::new(),
        }
    }
}

/// Validation report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Per-artifact results
    pub artifacts: Vec<ArtifactReport>,

    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ValidationReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            artifacts: Vec::new(),
            metadata: None,
        }
    }

    /// Add an artifact's results to the report
    pub fn add_artifact(&mut self, artifact: ArtifactReport) {
        for entry in &artifact.entries {
            match entry.severity {
                Severity::Error => self.summary.errors += 1,
                Severity::Warning => self.summary.warnings += 1,
            }
            if entry.open_in_editor {
                self.summary.open_in_editor += 1;
            }
            self.summary.total += 1;
        }

        self.summary.artifacts_checked += 1;
        self.artifacts.push(artifact);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of a byte slice, hex encoded
pub fn fingerprint(contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{ErrorClass, ErrorItem};

    #[test]
    fn empty_report() {
        let report = ValidationReport::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_with_entries() {
        let error = ErrorInfo::new(Severity::Error, "abc", ErrorItem::Artifact, 42, ErrorClass::RUNTIME_CSDL);
        let warning = ErrorInfo::new(
            Severity::Warning,
            "unmapped",
            ErrorItem::Artifact,
            11008,
            ErrorClass::ESCHER_MSL,
        );

        let mut artifact = ArtifactReport::new("shop.edm.json", b"{}");
        artifact.entries.push(ReportEntry::from_error(&error).with_open_in_editor(true));
        artifact.entries.push(ReportEntry::from_error(&warning));

        let mut report = ValidationReport::new();
        report.add_artifact(artifact);

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.open_in_editor, 1);
        assert_eq!(report.summary.artifacts_checked, 1);
        assert!(report.has_errors());
    }

    #[test]
    fn entry_carries_code_name_and_classes() {
        let warning = ErrorInfo::new(
            Severity::Warning,
            "unmapped",
            ErrorItem::Artifact,
            11008,
            ErrorClass::ESCHER_MSL,
        );
        let entry = ReportEntry::from_error(&warning);
        assert_eq!(entry.code_name.as_deref(), Some("ESCHER_VALIDATOR_UNMAPPED_PROPERTY"));
        assert_eq!(entry.classes, vec!["Escher_MSL".to_string()]);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn report_serialization() {
        let report = ValidationReport::new();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"artifacts\""));
    }
}
