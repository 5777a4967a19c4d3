//! Schema graph loading and binding
//!
//! This crate handles:
//! - Parsing `*.edm.json` artifact documents
//! - Building the object graph and binding named references
//! - Anti-dependency (reverse reference) lookups
//! - Attribute paths and per-version attribute content validation

pub mod artifact;
mod binder;
pub mod content_validator;
pub mod document;
pub mod index;
mod loader;
pub mod attribute_path;
pub mod model_helper;

pub use artifact::{Binding, BindingStatus, MappedType, ModelArtifact, ModelObject, ModelSpace, NodeKind, NodeKindTag};
pub use attribute_path::{make_attribute_path_from_string, AttributePath, PathNode, PathNodeType, QualifiedName};
pub use content_validator::{
    AttributeContentValidator, ContentValidatorError, ContentValidatorRegistry, SchemaLayer, SchemaNamespaces,
    SimpleType,
};
pub use document::{ArtifactDocument, DocumentError};
pub use index::AntiDependencyIndex;
