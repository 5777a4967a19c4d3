//! edmcheck core
//!
//! Stable domain types shared by every edmcheck crate: EDM metadata,
//! error records and code registries, configuration, and reports.
//! Never renumber error codes - they are part of the public API.

pub mod codes;
pub mod config;
pub mod diagnostic;
pub mod items;
pub mod report;
pub mod schema;

pub use codes::{DesignerCode, MappingErrorCode, SchemaErrorCode, ViewGenErrorCode};
pub use config::{ConfigError, SeverityOverrides, ValidationConfig, LATEST_SCHEMA_VERSION};
pub use diagnostic::{ErrorClass, ErrorInfo, ErrorItem, ObjectId, Severity, SourcePosition};
pub use items::ItemCollection;
pub use report::{ArtifactReport, ReportEntry, ReportVersion, ValidationReport};
pub use schema::{
    AssociationSetDef, AssociationType, ComplexTypeDef, DataSpace, EdmFunction, EdmProperty,
    EdmType, EntityContainerDef, EntitySetDef, EntityTypeDef, EnumTypeDef, Facets,
    FunctionParameter, NavigationPropertyDef, ParameterMode, PrimitiveTypeKind,
    ReferentialConstraintDef, RelationshipEndMember, RelationshipMultiplicity, RowTypeDef,
    TypeUsage,
};
