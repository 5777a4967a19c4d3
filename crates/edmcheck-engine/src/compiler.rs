//! Runtime metadata compilation
//!
//! The runtime validator does not inspect the schema graph itself; it asks
//! a [`MetadataCompiler`] to compile each layer the way the runtime would
//! load it and reports what the compiler complains about. Compiler errors
//! carry numeric runtime codes and an optional source position, which the
//! validator maps back to a schema object.
//!
//! [`GraphMetadataCompiler`] is the built-in compiler. It builds the
//! conceptual and storage item collections, binds the mapping against them
//! and derives query views for every mapped set.

use std::sync::Arc;

use edmcheck_core::config::FOREIGN_KEYS_IN_MODEL_VERSION;
use edmcheck_core::{
    EdmProperty, EntitySetDef, EntityTypeDef, ItemCollection, ObjectId, Severity, SourcePosition, ValidationConfig,
};
use edmcheck_model::{ModelArtifact, ModelSpace};
use serde::{Deserialize, Serialize};

use crate::mapping_compiler::MappingCompiler;
use crate::schema_compiler::SchemaCompiler;
use crate::view_generator::ViewGenerator;

/// An error reported by runtime compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeError {
    pub code: i32,
    pub message: String,
    pub severity: Severity,

    /// Where the offending element starts, when known
    pub position: Option<SourcePosition>,
}

impl RuntimeError {
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            position: None,
        }
    }

    pub fn warning(code: i32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn at(mut self, position: Option<SourcePosition>) -> Self {
        self.position = position;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(position) => write!(f, "{} ({}): {}", position, self.code, self.message),
            None => write!(f, "({}): {}", self.code, self.message),
        }
    }
}

/// Position of an object, or of its nearest positioned ancestor
pub(crate) fn object_position(artifact: &ModelArtifact, id: ObjectId) -> Option<SourcePosition> {
    let mut current = Some(id);
    while let Some(object) = current {
        if let Some(position) = artifact.position(object) {
            return Some(position);
        }
        current = artifact.parent(object);
    }
    None
}

/// Output of one compilation step plus everything reported on the way
///
/// The output is only present when no error (as opposed to warning) was
/// reported.
#[derive(Debug, Clone)]
pub struct Compilation<T> {
    pub output: Option<T>,
    pub errors: Vec<RuntimeError>,
}

impl<T> Compilation<T> {
    pub fn new(output: T, errors: Vec<RuntimeError>) -> Self {
        let failed = errors.iter().any(RuntimeError::is_error);
        Self {
            output: if failed { None } else { Some(output) },
            errors,
        }
    }

    pub fn failed(errors: Vec<RuntimeError>) -> Self {
        Self { output: None, errors }
    }

    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}

/// One scalar member of a mapping fragment
#[derive(Debug, Clone)]
pub struct MemberMapping {
    /// Dotted path from the mapped type, e.g. `Size.Width`
    pub path: String,
    pub property: EdmProperty,
    pub column: String,
    pub is_key: bool,
    pub position: Option<SourcePosition>,
}

/// Mapping of a set of entity types onto one store set
#[derive(Debug, Clone)]
pub struct FragmentMapping {
    /// Mapped types; `true` when the mapping covers derived types too
    pub types: Vec<(Arc<EntityTypeDef>, bool)>,
    pub store_set: Arc<EntitySetDef>,
    pub members: Vec<MemberMapping>,
    pub condition_columns: Vec<String>,
    pub position: Option<SourcePosition>,
}

/// Mapping of a conceptual entity set
#[derive(Debug, Clone)]
pub struct SetMapping {
    pub container: String,
    pub set: Arc<EntitySetDef>,
    pub query_view: Option<String>,
    pub fragments: Vec<FragmentMapping>,
    pub position: Option<SourcePosition>,
}

/// Mapping of a conceptual association set onto a store set
#[derive(Debug, Clone)]
pub struct AssociationMapping {
    pub container: String,
    pub association_set: String,
    pub store_set: Option<Arc<EntitySetDef>>,
    pub query_view: Option<String>,

    /// `(end, property, column)` triples
    pub end_columns: Vec<(String, String, String)>,
    pub condition_columns: Vec<String>,
    pub position: Option<SourcePosition>,
}

/// Bound conceptual-to-storage mapping
#[derive(Debug, Clone, Default)]
pub struct MappingCollection {
    pub version: u8,
    pub set_mappings: Vec<SetMapping>,
    pub association_mappings: Vec<AssociationMapping>,
}

impl MappingCollection {
    pub fn set_mapping(&self, container: &str, set: &str) -> Option<&SetMapping> {
        self.set_mappings
            .iter()
            .find(|mapping| mapping.container == container && mapping.set.name == set)
    }
}

/// A generated query view over the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedView {
    /// `Container.Set` of the conceptual extent
    pub extent: String,
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedViews {
    pub views: Vec<GeneratedView>,
}

impl GeneratedViews {
    pub fn view(&self, extent: &str) -> Option<&GeneratedView> {
        self.views.iter().find(|view| view.extent == extent)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Loads artifact layers the way the runtime would
pub trait MetadataCompiler {
    fn compile_conceptual(&self, artifact: &ModelArtifact) -> Compilation<ItemCollection>;

    fn compile_storage(&self, artifact: &ModelArtifact) -> Compilation<ItemCollection>;

    fn compile_mapping(
        &self,
        artifact: &ModelArtifact,
        conceptual: &ItemCollection,
        storage: &ItemCollection,
    ) -> Compilation<MappingCollection>;

    fn generate_views(
        &self,
        mapping: &MappingCollection,
        conceptual: &ItemCollection,
        storage: &ItemCollection,
    ) -> Compilation<GeneratedViews>;
}

/// Compiles layers straight from the loaded schema graph
#[derive(Debug, Clone, Default)]
pub struct GraphMetadataCompiler {
    foreign_keys_in_model: Option<bool>,
}

impl GraphMetadataCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            foreign_keys_in_model: config.foreign_keys_in_model,
        }
    }

    /// Force foreign-key associations on or off regardless of version
    pub fn with_foreign_keys_in_model(mut self, enabled: Option<bool>) -> Self {
        self.foreign_keys_in_model = enabled;
        self
    }

    fn foreign_keys_in_model(&self, conceptual: &ItemCollection) -> bool {
        self.foreign_keys_in_model
            .unwrap_or(conceptual.version() >= FOREIGN_KEYS_IN_MODEL_VERSION)
    }
}

impl MetadataCompiler for GraphMetadataCompiler {
    fn compile_conceptual(&self, artifact: &ModelArtifact) -> Compilation<ItemCollection> {
        SchemaCompiler::compile(artifact, ModelSpace::Conceptual)
    }

    fn compile_storage(&self, artifact: &ModelArtifact) -> Compilation<ItemCollection> {
        SchemaCompiler::compile(artifact, ModelSpace::Storage)
    }

    fn compile_mapping(
        &self,
        artifact: &ModelArtifact,
        conceptual: &ItemCollection,
        storage: &ItemCollection,
    ) -> Compilation<MappingCollection> {
        MappingCompiler::new(artifact, conceptual, storage)
            .with_foreign_keys_in_model(self.foreign_keys_in_model(conceptual))
            .compile()
    }

    fn generate_views(
        &self,
        mapping: &MappingCollection,
        conceptual: &ItemCollection,
        _storage: &ItemCollection,
    ) -> Compilation<GeneratedViews> {
        ViewGenerator::new(mapping, conceptual).generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn warnings_keep_the_output() {
        let compilation = Compilation::new(1, vec![RuntimeError::warning(2005, "ignored")]);
        assert_eq!(compilation.output, Some(1));

        let compilation = Compilation::new(1, vec![RuntimeError::error(40, "undefined")]);
        assert!(!compilation.is_success());
        assert_eq!(compilation.errors.len(), 1);
    }

    #[test]
    fn error_display_includes_position() {
        let error = RuntimeError::error(159, "no key").at(Some(SourcePosition::new(4, 7)));
        assert_eq!(error.to_string(), "4:7 (159): no key");
        assert_eq!(RuntimeError::error(159, "no key").to_string(), "(159): no key");
    }
}
