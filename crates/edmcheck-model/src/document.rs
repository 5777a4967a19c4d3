//! Artifact document parsing
//!
//! An artifact is a single `*.edm.json` file holding up to three layers:
//! the conceptual schema, the storage schema and the mapping between them.
//! Every element may carry `line`/`column` so diagnostics can point back
//! into the source. Keys the loader does not understand are kept in
//! `extra` and later reported as ghost nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use edmcheck_core::SourcePosition;

/// Unknown keys of an element
pub type ExtraKeys = BTreeMap<String, serde_json::Value>;

/// Source location of an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Span {
    pub fn position(&self) -> Option<SourcePosition> {
        self.line
            .map(|line| SourcePosition::new(line, self.column.unwrap_or(1)))
    }
}

/// A whole artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDocument {
    /// Schema version shared by all layers unless a layer overrides it
    #[serde(default = "default_version")]
    pub version: u8,

    #[serde(default)]
    pub conceptual: Option<SchemaDocument>,

    #[serde(default)]
    pub storage: Option<SchemaDocument>,

    #[serde(default)]
    pub mapping: Option<MappingDocument>,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

fn default_version() -> u8 {
    edmcheck_core::LATEST_SCHEMA_VERSION
}

impl ArtifactDocument {
    /// Load an artifact document from file
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DocumentError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse an artifact document from a JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::ParseError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::ParseError(e.to_string()))
    }

    pub fn conceptual_version(&self) -> Option<u8> {
        self.conceptual
            .as_ref()
            .map(|schema| schema.version.unwrap_or(self.version))
    }

    pub fn storage_version(&self) -> Option<u8> {
        self.storage
            .as_ref()
            .map(|schema| schema.version.unwrap_or(self.version))
    }

    pub fn mapping_version(&self) -> Option<u8> {
        self.mapping
            .as_ref()
            .map(|mapping| mapping.version.unwrap_or(self.version))
    }
}

/// Conceptual or storage schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub version: Option<u8>,

    pub namespace: String,

    #[serde(default)]
    pub alias: Option<String>,

    /// Store provider (storage schemas only)
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub usings: Vec<UsingDocument>,

    #[serde(default)]
    pub entity_types: Vec<EntityTypeDocument>,

    #[serde(default)]
    pub complex_types: Vec<ComplexTypeDocument>,

    #[serde(default)]
    pub enum_types: Vec<EnumTypeDocument>,

    #[serde(default)]
    pub associations: Vec<AssociationDocument>,

    #[serde(default)]
    pub functions: Vec<FunctionDocument>,

    #[serde(default)]
    pub entity_containers: Vec<EntityContainerDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsingDocument {
    pub namespace: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDocument {
    pub name: String,

    #[serde(default)]
    pub base_type: Option<String>,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Names of the key properties
    #[serde(default)]
    pub key: Vec<String>,

    #[serde(default)]
    pub properties: Vec<PropertyDocument>,

    #[serde(default)]
    pub navigation_properties: Vec<NavigationPropertyDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// Facet given either as a number or as text (`"Max"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValue {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for FacetValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDocument {
    pub name: String,

    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub nullable: Option<bool>,

    #[serde(default)]
    pub max_length: Option<FacetValue>,

    #[serde(default)]
    pub fixed_length: Option<bool>,

    #[serde(default)]
    pub unicode: Option<bool>,

    #[serde(default)]
    pub precision: Option<u8>,

    #[serde(default)]
    pub scale: Option<u8>,

    #[serde(default)]
    pub store_generated_pattern: Option<String>,

    #[serde(default)]
    pub concurrency_mode: Option<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// Navigation property; everything but the name may still be missing
/// while the model is being authored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationPropertyDocument {
    pub name: String,

    #[serde(default)]
    pub relationship: Option<String>,

    #[serde(default)]
    pub from_role: Option<String>,

    #[serde(default)]
    pub to_role: Option<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexTypeDocument {
    pub name: String,

    #[serde(default)]
    pub properties: Vec<PropertyDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumTypeDocument {
    pub name: String,

    #[serde(default)]
    pub underlying_type: Option<String>,

    #[serde(default)]
    pub is_flags: bool,

    #[serde(default)]
    pub members: Vec<EnumMemberDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumMemberDocument {
    pub name: String,

    #[serde(default)]
    pub value: Option<i64>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationDocument {
    pub name: String,

    #[serde(default)]
    pub ends: Vec<AssociationEndDocument>,

    #[serde(default)]
    pub referential_constraint: Option<ReferentialConstraintDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationEndDocument {
    pub role: String,

    #[serde(rename = "type")]
    pub type_name: String,

    /// `0..1`, `1` or `*`
    pub multiplicity: String,

    #[serde(default)]
    pub on_delete: Option<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferentialConstraintDocument {
    pub principal: ConstraintRoleDocument,

    pub dependent: ConstraintRoleDocument,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRoleDocument {
    pub role: String,

    #[serde(default)]
    pub property_refs: Vec<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDocument {
    pub name: String,

    #[serde(default)]
    pub return_type: Option<String>,

    #[serde(default)]
    pub aggregate: bool,

    #[serde(default)]
    pub is_composable: Option<bool>,

    #[serde(default)]
    pub command_text: Option<String>,

    #[serde(default)]
    pub parameters: Vec<ParameterDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDocument {
    pub name: String,

    #[serde(rename = "type")]
    pub type_name: String,

    /// `In`, `Out` or `InOut`; defaults to `In`
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityContainerDocument {
    pub name: String,

    #[serde(default)]
    pub entity_sets: Vec<EntitySetDocument>,

    #[serde(default)]
    pub association_sets: Vec<AssociationSetDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySetDocument {
    pub name: String,

    pub entity_type: String,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationSetDocument {
    pub name: String,

    pub association: String,

    #[serde(default)]
    pub ends: Vec<AssociationSetEndDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationSetEndDocument {
    pub role: String,

    pub entity_set: String,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// Mapping between the conceptual and storage schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub version: Option<u8>,

    #[serde(default)]
    pub entity_container_mappings: Vec<EntityContainerMappingDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityContainerMappingDocument {
    pub storage_entity_container: String,

    pub cdm_entity_container: String,

    #[serde(default)]
    pub entity_set_mappings: Vec<EntitySetMappingDocument>,

    #[serde(default)]
    pub association_set_mappings: Vec<AssociationSetMappingDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySetMappingDocument {
    pub name: String,

    #[serde(default)]
    pub query_view: Option<String>,

    #[serde(default)]
    pub entity_type_mappings: Vec<EntityTypeMappingDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeMappingDocument {
    /// `Shop.Product` or `IsTypeOf(Shop.Product)`, `;`-separated
    pub type_name: String,

    #[serde(default)]
    pub fragments: Vec<MappingFragmentDocument>,

    #[serde(default)]
    pub modification_function_mapping: Option<ModificationFunctionMappingDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingFragmentDocument {
    pub store_entity_set: String,

    #[serde(default)]
    pub scalar_properties: Vec<ScalarPropertyDocument>,

    #[serde(default)]
    pub complex_properties: Vec<ComplexPropertyMappingDocument>,

    #[serde(default)]
    pub conditions: Vec<ConditionDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarPropertyDocument {
    pub name: String,

    pub column: String,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexPropertyMappingDocument {
    pub name: String,

    #[serde(default)]
    pub type_name: Option<String>,

    #[serde(default)]
    pub scalar_properties: Vec<ScalarPropertyDocument>,

    #[serde(default)]
    pub complex_properties: Vec<ComplexPropertyMappingDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// Mapping condition on either a conceptual property or a store column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionDocument {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub is_null: Option<bool>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModificationFunctionMappingDocument {
    #[serde(default)]
    pub insert_function: Option<String>,

    #[serde(default)]
    pub update_function: Option<String>,

    #[serde(default)]
    pub delete_function: Option<String>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationSetMappingDocument {
    pub name: String,

    pub type_name: String,

    pub store_entity_set: String,

    #[serde(default)]
    pub query_view: Option<String>,

    #[serde(default)]
    pub end_properties: Vec<EndPropertyDocument>,

    #[serde(default)]
    pub conditions: Vec<ConditionDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndPropertyDocument {
    /// Role of the association set end
    pub name: String,

    #[serde(default)]
    pub scalar_properties: Vec<ScalarPropertyDocument>,

    #[serde(flatten)]
    pub span: Span,

    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// Artifact document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read artifact file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse artifact: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_layers_with_versions() {
        let json = r#"{
            "version": 2,
            "conceptual": { "namespace": "Shop", "alias": "Self", "version": 3 },
            "storage": { "namespace": "Shop.Store", "provider": "System.Data.SqlClient" }
        }"#;

        let doc = ArtifactDocument::from_str(json).unwrap();
        assert_eq!(doc.conceptual_version(), Some(3));
        assert_eq!(doc.storage_version(), Some(2));
        assert_eq!(doc.mapping_version(), None);
        assert_eq!(doc.conceptual.unwrap().alias.as_deref(), Some("Self"));
    }

    #[test]
    fn unknown_keys_are_kept_and_span_is_read() {
        let json = r#"{
            "conceptual": {
                "namespace": "Shop",
                "entity_types": [
                    { "name": "Product", "line": 4, "column": 9, "documentation": "x" }
                ]
            }
        }"#;

        let doc = ArtifactDocument::from_str(json).unwrap();
        assert_eq!(doc.version, edmcheck_core::LATEST_SCHEMA_VERSION);

        let product = &doc.conceptual.unwrap().entity_types[0];
        assert_eq!(product.span.position(), Some(SourcePosition::new(4, 9)));
        assert_eq!(product.extra.keys().collect::<Vec<_>>(), vec!["documentation"]);
        assert!(!product.extra.contains_key("line"));
    }

    #[test]
    fn max_length_accepts_number_or_text() {
        let json = r#"{ "name": "Title", "type": "String", "max_length": "Max" }"#;
        let prop: PropertyDocument = serde_json::from_str(json).unwrap();
        assert_eq!(prop.max_length, Some(FacetValue::Text("Max".to_string())));

        let json = r#"{ "name": "Title", "type": "String", "max_length": 50 }"#;
        let prop: PropertyDocument = serde_json::from_str(json).unwrap();
        assert_eq!(prop.max_length.map(|v| v.to_string()), Some("50".to_string()));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = ArtifactDocument::from_str("{ not json");
        assert!(matches!(result, Err(DocumentError::ParseError(_))));

        let missing = ArtifactDocument::from_file(Path::new("/nonexistent/model.edm.json"));
        assert!(matches!(missing, Err(DocumentError::IoError(_, _))));
    }
}
