//! Error records produced by model and runtime validation
//!
//! IMPORTANT: `ErrorInfo` is immutable once created. A validation pass
//! never patches existing records; it clears a whole error class and
//! rebuilds it.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::codes;

bitflags! {
    /// Error class mask
    ///
    /// Every error belongs to exactly one class. Composite masks are used
    /// to select, clear, or check dirtiness of several classes at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ErrorClass: u32 {
        /// Malformed or unsupported document content
        const PARSE_ERROR = 0x0001;
        /// A named reference could not be bound
        const RESOLVE_ERROR = 0x0002;
        /// Structural checks over the conceptual model
        const ESCHER_CSDL = 0x0004;
        /// Structural checks over the storage model
        const ESCHER_SSDL = 0x0008;
        /// Structural checks over the mapping
        const ESCHER_MSL = 0x0010;
        /// Runtime compilation of the conceptual model
        const RUNTIME_CSDL = 0x0020;
        /// Runtime compilation of the storage model
        const RUNTIME_SSDL = 0x0040;
        /// Runtime compilation of the mapping
        const RUNTIME_MSL = 0x0080;
        /// Runtime view generation
        const RUNTIME_VIEWGEN = 0x0100;

        const ESCHER_ALL = Self::ESCHER_CSDL.bits() | Self::ESCHER_SSDL.bits() | Self::ESCHER_MSL.bits();
        const RUNTIME_ALL = Self::RUNTIME_CSDL.bits()
            | Self::RUNTIME_SSDL.bits()
            | Self::RUNTIME_MSL.bits()
            | Self::RUNTIME_VIEWGEN.bits();
        const ALL = Self::PARSE_ERROR.bits()
            | Self::RESOLVE_ERROR.bits()
            | Self::ESCHER_ALL.bits()
            | Self::RUNTIME_ALL.bits();
    }
}

impl ErrorClass {
    /// The single classes, in declaration order
    pub const SINGLES: [ErrorClass; 9] = [
        ErrorClass::PARSE_ERROR,
        ErrorClass::RESOLVE_ERROR,
        ErrorClass::ESCHER_CSDL,
        ErrorClass::ESCHER_SSDL,
        ErrorClass::ESCHER_MSL,
        ErrorClass::RUNTIME_CSDL,
        ErrorClass::RUNTIME_SSDL,
        ErrorClass::RUNTIME_MSL,
        ErrorClass::RUNTIME_VIEWGEN,
    ];

    /// Stable name of a single class, `None` for composite masks
    pub fn as_str(&self) -> Option<&'static str> {
        const NAMES: [&str; 9] = [
            "ParseError",
            "ResolveError",
            "Escher_CSDL",
            "Escher_SSDL",
            "Escher_MSL",
            "Runtime_CSDL",
            "Runtime_SSDL",
            "Runtime_MSL",
            "Runtime_ViewGen",
        ];

        Self::SINGLES
            .iter()
            .position(|single| single == self)
            .map(|index| NAMES[index])
    }

    /// Names of all single classes contained in this mask
    pub fn names(&self) -> Vec<&'static str> {
        Self::SINGLES
            .iter()
            .filter(|single| self.contains(**single))
            .filter_map(|single| single.as_str())
            .collect()
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.names().join("|"))
    }
}

/// Error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported, but the artifact remains usable
    Warning,

    /// The artifact cannot be used as-is
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Identifier of an object in a loaded schema graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Line/column position in the source document (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The object an error is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorItem {
    /// The artifact as a whole
    Artifact,

    /// A specific object of the schema graph
    Object(ObjectId),
}

impl ErrorItem {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Artifact => None,
            Self::Object(id) => Some(*id),
        }
    }
}

/// A single validation error or warning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorInfo {
    severity: Severity,
    message: String,
    item: ErrorItem,
    code: i32,
    class: ErrorClass,
}

impl ErrorInfo {
    /// Create a new error record
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        item: ErrorItem,
        code: i32,
        class: ErrorClass,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            item,
            code,
            class,
        }
    }

    /// Create an error record carrying a designer code
    pub fn designer(
        severity: Severity,
        message: impl Into<String>,
        item: ErrorItem,
        code: codes::DesignerCode,
        class: ErrorClass,
    ) -> Self {
        Self::new(severity, message, item, code.code(), class)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn item(&self) -> ErrorItem {
        self.item
    }

    /// Numeric error code (designer or runtime registry)
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Symbolic name of the code, if it belongs to a known registry
    pub fn code_name(&self) -> Option<&'static str> {
        codes::code_name(self.code)
    }

    /// Whether this record carries the given designer code
    pub fn has_code(&self, code: codes::DesignerCode) -> bool {
        self.code == code.code()
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code_name() {
            Some(name) => write!(f, "{} {} [{}]: {}", self.severity, self.code, name, self.message),
            None => write!(f, "{} {}: {}", self.severity, self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::DesignerCode;

    #[test]
    fn composite_classes_contain_singles() {
        assert!(ErrorClass::ESCHER_ALL.contains(ErrorClass::ESCHER_MSL));
        assert!(ErrorClass::RUNTIME_ALL.contains(ErrorClass::RUNTIME_VIEWGEN));
        assert!(!ErrorClass::RUNTIME_ALL.intersects(ErrorClass::ESCHER_ALL));
        assert!(ErrorClass::ALL.contains(ErrorClass::PARSE_ERROR | ErrorClass::RESOLVE_ERROR));
    }

    #[test]
    fn class_names_are_stable() {
        assert_eq!(ErrorClass::ESCHER_CSDL.as_str(), Some("Escher_CSDL"));
        assert_eq!(ErrorClass::RUNTIME_VIEWGEN.as_str(), Some("Runtime_ViewGen"));
        assert_eq!(ErrorClass::ESCHER_ALL.as_str(), None);
        assert_eq!(
            (ErrorClass::RUNTIME_CSDL | ErrorClass::RUNTIME_MSL).to_string(),
            "Runtime_CSDL|Runtime_MSL"
        );
    }

    #[test]
    fn error_info_equality_is_structural() {
        let a = ErrorInfo::designer(
            Severity::Warning,
            "EntityType 'Foo' has no EntitySet",
            ErrorItem::Object(ObjectId(3)),
            DesignerCode::EscherValidatorEntityTypeWithoutEntitySet,
            ErrorClass::ESCHER_CSDL,
        );
        let b = a.clone();
        assert_eq!(a, b);
        assert!(a.has_code(DesignerCode::EscherValidatorEntityTypeWithoutEntitySet));
        assert_eq!(a.code_name(), Some("ESCHER_VALIDATOR_ENTITY_TYPE_WITHOUT_ENTITY_SET"));
    }

    #[test]
    fn error_info_serialization() {
        let error = ErrorInfo::new(
            Severity::Error,
            "abc",
            ErrorItem::Artifact,
            42,
            ErrorClass::RUNTIME_CSDL,
        );

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"error\""));
        assert!(json.contains("RUNTIME_CSDL"));

        let parsed: ErrorInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, error);
    }
}
