//! Runtime metadata validation
//!
//! Compiles the layers of an artifact through a [`MetadataCompiler`] in
//! runtime order and records what the compiler reports as runtime-class
//! errors. Stages run conceptual and storage first, then the mapping,
//! then view generation; a stage only runs when everything before it
//! compiled. Compiled collections are handed back to the caller and never
//! kept between passes.

use edmcheck_core::MappingErrorCode as M;
use edmcheck_core::SchemaErrorCode as S;
use edmcheck_core::{
    DesignerCode, ErrorClass, ErrorInfo, ErrorItem, ItemCollection, Severity, ValidationConfig,
    LATEST_SCHEMA_VERSION,
};
use edmcheck_model::{ModelArtifact, NodeKind, NodeKindTag, SchemaLayer};

use crate::artifact_set::ArtifactErrorSet;
use crate::classification::is_unrecoverable_runtime_error;
use crate::compiler::{GeneratedViews, MappingCollection, MetadataCompiler, RuntimeError};

/// Runtime errors that still leave the model editable
pub fn is_open_in_editor_error(error: &ErrorInfo, artifact: &ModelArtifact) -> bool {
    if !error.class().intersects(ErrorClass::RUNTIME_ALL) || error.code() == -1 {
        return false;
    }
    if error.has_code(DesignerCode::EscherValidatorUndefinedComplexPropertyType) {
        return false;
    }

    let code = error.code();
    let kind = match error.item() {
        ErrorItem::Object(id) => artifact.kind(id),
        ErrorItem::Artifact => None,
    };
    let fixable_in_designer = match kind {
        Some(NodeKind::ModificationFunctionMapping { .. }) => code == M::XmlSchemaValidationError.code(),
        Some(NodeKind::ReferentialConstraintRole { .. }) => code == S::XmlError.code(),
        Some(NodeKind::Condition { .. }) => code == M::ConditionError.code(),
        Some(NodeKind::ReferentialConstraint) => code == S::InvalidPropertyInRelationshipConstraint.code(),
        Some(NodeKind::ComplexProperty { .. }) => code == S::NotInNamespace.code(),
        Some(NodeKind::NavigationProperty {
            relationship: None,
            from_role: None,
            to_role: None,
        }) => true,
        _ => false,
    };

    !fixable_in_designer && is_unrecoverable_runtime_error(code)
}

/// Collections compiled by one runtime pass
#[derive(Debug, Default)]
pub struct CompiledMetadata {
    pub conceptual: Option<ItemCollection>,
    pub storage: Option<ItemCollection>,
    pub mapping: Option<MappingCollection>,
    pub views: Option<GeneratedViews>,
}

#[derive(Debug, Clone)]
pub struct RuntimeMetadataValidator {
    target_version: u8,
}

impl Default for RuntimeMetadataValidator {
    fn default() -> Self {
        Self::new(LATEST_SCHEMA_VERSION)
    }
}

impl RuntimeMetadataValidator {
    /// `target_version` is the newest schema version the runtime accepts
    pub fn new(target_version: u8) -> Self {
        Self { target_version }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.target_version)
    }

    pub fn target_version(&self) -> u8 {
        self.target_version
    }

    /// Full runtime validation: conceptual, storage and mapping layers
    pub fn validate(
        &self,
        set: &mut ArtifactErrorSet,
        artifact: &ModelArtifact,
        compiler: &dyn MetadataCompiler,
    ) -> CompiledMetadata {
        self.validate_artifact_set(set, artifact, compiler, true, true, false)
    }

    /// Revalidate dirty runtime classes; `validate_mappings` also compiles
    /// the mapping and generates views
    pub fn validate_and_compile_mappings(
        &self,
        set: &mut ArtifactErrorSet,
        artifact: &ModelArtifact,
        compiler: &dyn MetadataCompiler,
        validate_mappings: bool,
    ) -> CompiledMetadata {
        self.validate_artifact_set(set, artifact, compiler, false, validate_mappings, validate_mappings)
    }

    pub fn validate_artifact_set(
        &self,
        set: &mut ArtifactErrorSet,
        artifact: &ModelArtifact,
        compiler: &dyn MetadataCompiler,
        force: bool,
        validate_mapping: bool,
        run_view_gen: bool,
    ) -> CompiledMetadata {
        let mut compiled = CompiledMetadata::default();
        if !force && !set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_ALL) {
            tracing::debug!("Runtime classes are clean, skipping runtime validation");
            return compiled;
        }

        set.clear_errors(ErrorClass::RUNTIME_ALL);

        if !self.check_schemas_present(set, artifact) {
            return compiled;
        }

        let conceptual = compiler.compile_conceptual(artifact);
        process_errors(set, artifact, &conceptual.errors, ErrorClass::RUNTIME_CSDL);
        let storage = compiler.compile_storage(artifact);
        process_errors(set, artifact, &storage.errors, ErrorClass::RUNTIME_SSDL);

        compiled.conceptual = conceptual.output;
        compiled.storage = storage.output;
        let (Some(conceptual), Some(storage)) = (&compiled.conceptual, &compiled.storage) else {
            tracing::info!("Schema compilation failed, skipping mapping validation");
            return compiled;
        };

        if !validate_mapping {
            return compiled;
        }

        let Some(mapping_root) = artifact.mapping_root() else {
            set.add_error(ErrorInfo::designer(
                Severity::Error,
                "The artifact has no mapping model",
                ErrorItem::Artifact,
                DesignerCode::ErrorValidatingArtifactMappingModelMissing,
                ErrorClass::RUNTIME_MSL,
            ));
            return compiled;
        };
        if let Some(version) = artifact.layer_version(SchemaLayer::Mapping) {
            if version > self.target_version {
                set.add_error(ErrorInfo::designer(
                    Severity::Error,
                    self.too_new_message("mapping", version),
                    ErrorItem::Object(mapping_root),
                    DesignerCode::ErrorValidatingArtifactInvalidMslNamespaceForTargetFrameworkVersion,
                    ErrorClass::RUNTIME_MSL,
                ));
                return compiled;
            }
        }

        let mapping = compiler.compile_mapping(artifact, conceptual, storage);
        process_errors(set, artifact, &mapping.errors, ErrorClass::RUNTIME_MSL);
        let Some(mapping) = mapping.output else {
            return compiled;
        };

        if run_view_gen {
            let views = compiler.generate_views(&mapping, conceptual, storage);
            process_errors(set, artifact, &views.errors, ErrorClass::RUNTIME_VIEWGEN);
            compiled.views = views.output;
        }
        compiled.mapping = Some(mapping);

        tracing::info!(
            errors = set.errors_for_class(ErrorClass::RUNTIME_ALL).len(),
            "Runtime validation complete"
        );
        compiled
    }

    /// Missing layers and too-new versions stop the pass before compiling
    fn check_schemas_present(&self, set: &mut ArtifactErrorSet, artifact: &ModelArtifact) -> bool {
        let (conceptual_root, storage_root) = (artifact.conceptual_root(), artifact.storage_root());
        if conceptual_root.is_none() || storage_root.is_none() {
            if storage_root.is_none() {
                set.add_error(ErrorInfo::designer(
                    Severity::Error,
                    "The artifact has no storage model",
                    ErrorItem::Artifact,
                    DesignerCode::ErrorValidatingArtifactStorageModelMissing,
                    ErrorClass::RUNTIME_SSDL,
                ));
            }
            if conceptual_root.is_none() {
                set.add_error(ErrorInfo::designer(
                    Severity::Error,
                    "The artifact has no conceptual model",
                    ErrorItem::Artifact,
                    DesignerCode::ErrorValidatingArtifactConceptualModelMissing,
                    ErrorClass::RUNTIME_CSDL,
                ));
            }
            return false;
        }

        let mut supported = true;
        if let (Some(root), Some(version)) = (storage_root, artifact.layer_version(SchemaLayer::Storage)) {
            if version > self.target_version {
                set.add_error(ErrorInfo::designer(
                    Severity::Error,
                    self.too_new_message("storage", version),
                    ErrorItem::Object(root),
                    DesignerCode::ErrorValidatingArtifactInvalidSsdlNamespaceForTargetFrameworkVersion,
                    ErrorClass::RUNTIME_SSDL,
                ));
                supported = false;
            }
        }
        if let (Some(root), Some(version)) = (conceptual_root, artifact.layer_version(SchemaLayer::Conceptual)) {
            if version > self.target_version {
                set.add_error(ErrorInfo::designer(
                    Severity::Error,
                    self.too_new_message("conceptual", version),
                    ErrorItem::Object(root),
                    DesignerCode::ErrorValidatingArtifactInvalidCsdlNamespaceForTargetFrameworkVersion,
                    ErrorClass::RUNTIME_CSDL,
                ));
                supported = false;
            }
        }
        supported
    }

    fn too_new_message(&self, layer: &str, version: u8) -> String {
        format!(
            "The {} model uses schema version {}, which is newer than the targeted version {}",
            layer, version, self.target_version
        )
    }
}

/// Translate compiler errors into `class` errors on the objects they point at
///
/// Marks `class` clean afterwards.
pub fn process_errors(set: &mut ArtifactErrorSet, artifact: &ModelArtifact, errors: &[RuntimeError], class: ErrorClass) {
    let storage_empty = artifact.is_storage_model_empty();

    for error in errors {
        let object = error
            .position
            .and_then(|position| artifact.find_object_for_line_and_column(position.line, position.column));
        let item = object.map(ErrorItem::Object).unwrap_or(ErrorItem::Artifact);
        let tag = object.and_then(|id| artifact.tag(id));

        let mut severity = error.severity;
        if error.code == M::NotSpecifiedInstanceForEntitySetOrAssociationSet.code() && storage_empty {
            severity = Severity::Warning;
        }

        let info = if error.code == S::NotInNamespace.code() && tag == Some(NodeKindTag::ComplexProperty) {
            let name = object.map(|id| artifact.name(id)).unwrap_or_default();
            ErrorInfo::designer(
                Severity::Error,
                format!("The type of complex property '{}' is not defined", name),
                item,
                DesignerCode::EscherValidatorUndefinedComplexPropertyType,
                ErrorClass::ESCHER_CSDL,
            )
        } else if error.code == M::InvalidAssociationSet.code()
            && error.severity == Severity::Warning
            && tag == Some(NodeKindTag::AssociationSetMapping)
        {
            let name = object.map(|id| artifact.name(id)).unwrap_or_default();
            ErrorInfo::new(
                severity,
                format!(
                    "The mapping of association set '{}' is ignored because its association is defined by a referential constraint",
                    name
                ),
                item,
                error.code,
                ErrorClass::ESCHER_MSL,
            )
        } else {
            ErrorInfo::new(severity, error.message.clone(), item, error.code, class)
        };
        set.add_error(info);
    }

    set.set_validity_dirty_for_error_class(class, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{Compilation, GraphMetadataCompiler};
    use edmcheck_core::{DataSpace, SourcePosition};
    use edmcheck_model::ContentValidatorRegistry;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Compiler returning canned results and recording the stages it ran
    #[derive(Default)]
    struct MockCompiler {
        conceptual_errors: Vec<RuntimeError>,
        mapping_errors: Vec<RuntimeError>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl MetadataCompiler for MockCompiler {
        fn compile_conceptual(&self, _artifact: &ModelArtifact) -> Compilation<ItemCollection> {
            self.calls.borrow_mut().push("conceptual");
            Compilation::new(ItemCollection::new(DataSpace::CSpace, 3), self.conceptual_errors.clone())
        }

        fn compile_storage(&self, _artifact: &ModelArtifact) -> Compilation<ItemCollection> {
            self.calls.borrow_mut().push("storage");
            Compilation::new(ItemCollection::new(DataSpace::SSpace, 3), Vec::new())
        }

        fn compile_mapping(
            &self,
            _artifact: &ModelArtifact,
            _conceptual: &ItemCollection,
            _storage: &ItemCollection,
        ) -> Compilation<MappingCollection> {
            self.calls.borrow_mut().push("mapping");
            Compilation::new(MappingCollection::default(), self.mapping_errors.clone())
        }

        fn generate_views(
            &self,
            _mapping: &MappingCollection,
            _conceptual: &ItemCollection,
            _storage: &ItemCollection,
        ) -> Compilation<GeneratedViews> {
            self.calls.borrow_mut().push("views");
            Compilation::new(GeneratedViews::default(), Vec::new())
        }
    }

    const FULL: &str = r#"{
        "version": 3,
        "conceptual": {"namespace": "Shop", "line": 2, "column": 5,
            "entity_types": [{"name": "Customer", "line": 3, "column": 9, "key": ["Id"],
                "properties": [{"name": "Id", "type": "Int32", "nullable": false, "line": 4, "column": 13},
                               {"name": "Address", "type": "Shop.Address", "line": 5, "column": 13}]}]},
        "storage": {"namespace": "Shop.Store", "provider": "System.Data.SqlClient", "line": 10, "column": 5},
        "mapping": {"line": 20, "column": 5,
            "entity_container_mappings": [{"storage_entity_container": "ShopStore", "cdm_entity_container": "ShopContainer",
                "line": 21, "column": 9,
                "association_set_mappings": [{"name": "CustomerOrders", "type_name": "Shop.CustomerOrder",
                    "store_entity_set": "orders", "line": 22, "column": 13}]}]}
    }"#;

    fn load(json: &str) -> ModelArtifact {
        let mut registry = ContentValidatorRegistry::new();
        ModelArtifact::from_json(json, &mut registry).unwrap()
    }

    fn codes(set: &ArtifactErrorSet) -> Vec<i32> {
        set.errors().iter().map(|e| e.code()).collect()
    }

    #[test]
    fn missing_models_stop_before_compiling() {
        let artifact = load(r#"{"version": 3}"#);
        let compiler = MockCompiler::default();
        let mut set = ArtifactErrorSet::new();

        RuntimeMetadataValidator::default().validate(&mut set, &artifact, &compiler);

        assert_eq!(
            codes(&set),
            vec![
                DesignerCode::ErrorValidatingArtifactStorageModelMissing.code(),
                DesignerCode::ErrorValidatingArtifactConceptualModelMissing.code(),
            ]
        );
        assert!(compiler.calls.borrow().is_empty());
        assert!(set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_CSDL));
        assert!(set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_VIEWGEN));
    }

    #[test]
    fn versions_newer_than_target_are_rejected() {
        let artifact = load(FULL);
        let compiler = MockCompiler::default();
        let mut set = ArtifactErrorSet::new();

        RuntimeMetadataValidator::new(2).validate(&mut set, &artifact, &compiler);

        assert_eq!(
            codes(&set),
            vec![
                DesignerCode::ErrorValidatingArtifactInvalidSsdlNamespaceForTargetFrameworkVersion.code(),
                DesignerCode::ErrorValidatingArtifactInvalidCsdlNamespaceForTargetFrameworkVersion.code(),
            ]
        );
        assert_eq!(set.errors()[0].item(), ErrorItem::Object(artifact.storage_root().unwrap()));
        assert!(compiler.calls.borrow().is_empty());
    }

    #[test]
    fn clean_run_goes_through_every_stage() {
        let artifact = load(FULL);
        let compiler = MockCompiler::default();
        let mut set = ArtifactErrorSet::new();

        let compiled = RuntimeMetadataValidator::default().validate_and_compile_mappings(
            &mut set,
            &artifact,
            &compiler,
            true,
        );

        assert_eq!(*compiler.calls.borrow(), vec!["conceptual", "storage", "mapping", "views"]);
        assert!(compiled.views.is_some());
        assert!(set.is_empty());
        assert!(!set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_ALL));

        // Nothing dirty and not forced: no recompilation
        RuntimeMetadataValidator::default().validate_and_compile_mappings(&mut set, &artifact, &compiler, true);
        assert_eq!(compiler.calls.borrow().len(), 4);
    }

    #[test]
    fn schema_errors_stop_before_the_mapping() {
        let artifact = load(FULL);
        let compiler = MockCompiler {
            conceptual_errors: vec![RuntimeError::error(159, "no key").at(Some(SourcePosition::new(3, 9)))],
            ..Default::default()
        };
        let mut set = ArtifactErrorSet::new();

        let compiled = RuntimeMetadataValidator::default().validate(&mut set, &artifact, &compiler);

        assert_eq!(*compiler.calls.borrow(), vec!["conceptual", "storage"]);
        assert!(compiled.conceptual.is_none());
        assert!(compiled.storage.is_some());
        assert_eq!(codes(&set), vec![159]);
        let item = set.errors()[0].item().object_id().unwrap();
        assert_eq!(artifact.name(item), "Customer");
        assert_eq!(set.errors()[0].class(), ErrorClass::RUNTIME_CSDL);

        assert!(!set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_CSDL));
        assert!(!set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_SSDL));
        assert!(set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_MSL));
    }

    #[test]
    fn mapping_skipped_without_views() {
        let artifact = load(FULL);
        let compiler = MockCompiler::default();
        let mut set = ArtifactErrorSet::new();

        RuntimeMetadataValidator::default().validate(&mut set, &artifact, &compiler);

        assert_eq!(*compiler.calls.borrow(), vec!["conceptual", "storage", "mapping"]);
        assert!(!set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_MSL));
        assert!(set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_VIEWGEN));
    }

    #[test]
    fn errors_are_remapped() {
        let artifact = load(FULL);
        let mut set = ArtifactErrorSet::new();
        let errors = vec![
            RuntimeError::error(S::NotInNamespace.code(), "Shop.Address is not defined")
                .at(Some(SourcePosition::new(5, 13))),
            RuntimeError::warning(M::InvalidAssociationSet.code(), "ignored").at(Some(SourcePosition::new(22, 13))),
            RuntimeError::error(M::NotSpecifiedInstanceForEntitySetOrAssociationSet.code(), "unmapped"),
        ];

        process_errors(&mut set, &artifact, &errors, ErrorClass::RUNTIME_MSL);

        let errors = set.errors();
        assert_eq!(errors[0].code(), DesignerCode::EscherValidatorUndefinedComplexPropertyType.code());
        assert_eq!(errors[0].severity(), Severity::Error);
        assert_eq!(artifact.name(errors[0].item().object_id().unwrap()), "Address");

        assert_eq!(errors[1].code(), M::InvalidAssociationSet.code());
        assert_eq!(errors[1].severity(), Severity::Warning);
        assert!(errors[1].message().contains("CustomerOrders"));

        // The storage model declares no container
        assert_eq!(errors[2].severity(), Severity::Warning);
        assert_eq!(errors[2].item(), ErrorItem::Artifact);
    }

    #[test]
    fn open_in_editor_classification() {
        let artifact = load(FULL);
        let runtime = |code: i32, item: ErrorItem| ErrorInfo::new(Severity::Error, "", item, code, ErrorClass::RUNTIME_CSDL);

        assert!(!is_open_in_editor_error(
            &ErrorInfo::new(Severity::Error, "", ErrorItem::Artifact, 40, ErrorClass::PARSE_ERROR),
            &artifact
        ));
        assert!(!is_open_in_editor_error(&runtime(-1, ErrorItem::Artifact), &artifact));
        assert!(is_open_in_editor_error(&runtime(40, ErrorItem::Artifact), &artifact));

        let address = artifact
            .find_object_for_line_and_column(5, 13)
            .map(ErrorItem::Object)
            .unwrap();
        assert!(!is_open_in_editor_error(&runtime(40, address), &artifact));
        assert!(!is_open_in_editor_error(
            &runtime(DesignerCode::EscherValidatorUndefinedComplexPropertyType.code(), address),
            &artifact
        ));
    }

    #[test]
    fn graph_compiler_reports_missing_complex_type() {
        let artifact = load(FULL);
        let mut set = ArtifactErrorSet::new();

        let compiled = RuntimeMetadataValidator::default().validate(&mut set, &artifact, &GraphMetadataCompiler::new());

        assert!(compiled.conceptual.is_none());
        assert!(set.errors().iter().any(|e| e.has_code(DesignerCode::EscherValidatorUndefinedComplexPropertyType)));
    }
}
