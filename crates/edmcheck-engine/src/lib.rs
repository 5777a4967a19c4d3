//! edmcheck engine - model validation
//!
//! This crate handles:
//! - Per-artifact error sets with class dirty flags
//! - Escher structural checks over the schema graph
//! - Runtime compilation of the conceptual, storage and mapping layers
//! - Query view generation
//! - Open-in-editor and skip-runtime classification
//! - Validation sessions and report building

pub mod artifact_set;
pub mod classification;
pub mod compiler;
pub mod escher_validator;
mod mapping_compiler;
pub mod runtime_validator;
mod schema_compiler;
pub mod session;
mod view_generator;

pub use artifact_set::ArtifactErrorSet;
pub use compiler::{
    AssociationMapping, Compilation, FragmentMapping, GeneratedView, GeneratedViews, GraphMetadataCompiler,
    MappingCollection, MemberMapping, MetadataCompiler, RuntimeError, SetMapping,
};
pub use escher_validator::{EscherModelValidator, EscherVisitor};
pub use runtime_validator::{CompiledMetadata, RuntimeMetadataValidator};
pub use schema_compiler::store_type_kind;
pub use session::{ArtifactValidation, SessionError, ValidationSession};
