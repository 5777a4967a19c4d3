//! Escher model validator
//!
//! Structural checks over a bound schema graph that compilation alone
//! does not catch: inheritance and complex-type cycles, entity types and
//! associations without sets, unmapped types, properties, association
//! ends and end keys, enum properties with a store-generated pattern,
//! `Using` directives, unqualified type references and conditions on
//! key members.
//!
//! A pass visits every object once and dispatches on its `NodeKind`.
//! Each pass rebuilds the Escher error classes from scratch.

use std::collections::HashSet;

use edmcheck_core::config::FOREIGN_KEYS_IN_MODEL_VERSION;
use edmcheck_core::{DesignerCode, ErrorClass, ErrorInfo, ErrorItem, ObjectId, Severity, ValidationConfig};
use edmcheck_model::{model_helper, AntiDependencyIndex, ModelArtifact, ModelSpace, NodeKind, NodeKindTag, SchemaLayer};

use crate::artifact_set::ArtifactErrorSet;

/// Errors that force raw-document editing
pub fn is_open_in_editor_error(error: &ErrorInfo) -> bool {
    let class = error.class();
    if class.intersects(ErrorClass::ESCHER_ALL) {
        return [
            DesignerCode::EscherValidatorCircularInheritance,
            DesignerCode::EscherValidatorCircularComplexTypeDefinition,
            DesignerCode::EscherValidatorEntityTypeWithoutEntitySet,
            DesignerCode::EscherValidatorMultipeEntitySetsPerType,
            DesignerCode::EscherValidatorAssociationWithoutAssociationSet,
            DesignerCode::EscherValidatorIncludesUsing,
            DesignerCode::NonQualifiedElement,
        ]
        .iter()
        .any(|code| error.has_code(*code));
    }

    class == ErrorClass::PARSE_ERROR && error.has_code(DesignerCode::ModelParseGhostNodeNotSupportedByDesigner)
}

/// Errors after which runtime validation would only repeat them
pub fn is_skip_runtime_validation_error(error: &ErrorInfo) -> bool {
    if !error.class().intersects(ErrorClass::ESCHER_ALL) {
        return false;
    }

    [
        DesignerCode::EscherValidatorUnmappedEntityType,
        DesignerCode::EscherValidatorUnmappedAssociation,
        DesignerCode::EscherValidatorUnmappedProperty,
        DesignerCode::EscherValidatorUnmappedAssociationEnd,
        DesignerCode::EscherValidatorUnmappedAssociationEndKey,
        DesignerCode::EscherValidatorConditionOnPrimaryKey,
        DesignerCode::NonQualifiedElement,
    ]
    .iter()
    .any(|code| error.has_code(*code))
}

fn conceptual_version(artifact: &ModelArtifact) -> u8 {
    artifact
        .layer_version(SchemaLayer::Conceptual)
        .unwrap_or_else(|| artifact.version())
}

/// Drives Escher passes over artifacts
#[derive(Debug, Clone, Default)]
pub struct EscherModelValidator {
    /// Overrides the version-derived foreign-keys-in-model feature state
    foreign_keys_in_model: Option<bool>,
}

impl EscherModelValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            foreign_keys_in_model: config.foreign_keys_in_model,
        }
    }

    pub fn with_foreign_keys_in_model(mut self, enabled: bool) -> Self {
        self.foreign_keys_in_model = Some(enabled);
        self
    }

    /// Rebuild the Escher error classes of `set`
    ///
    /// Does nothing when no Escher class is dirty, unless `force` is set.
    pub fn validate_escher_model(
        &self,
        set: &mut ArtifactErrorSet,
        artifact: &ModelArtifact,
        index: &AntiDependencyIndex,
        force: bool,
    ) {
        if !force && !set.is_validity_dirty_for_error_class(ErrorClass::ESCHER_ALL) {
            tracing::debug!("Escher classes are clean, skipping model validation");
            return;
        }

        set.clear_errors(ErrorClass::ESCHER_ALL);

        let foreign_keys_in_model = self
            .foreign_keys_in_model
            .unwrap_or_else(|| conceptual_version(artifact) >= FOREIGN_KEYS_IN_MODEL_VERSION);
        let mut visitor = EscherVisitor::new(artifact, index, set).with_foreign_keys_in_model(foreign_keys_in_model);
        visitor.visit_all();

        set.set_validity_dirty_for_error_class(ErrorClass::ESCHER_ALL, false);
        tracing::info!(
            errors = set.errors_for_class(ErrorClass::ESCHER_ALL).len(),
            "Escher model validation complete"
        );
    }
}

/// One pass of Escher checks, adding into an error set
pub struct EscherVisitor<'a> {
    artifact: &'a ModelArtifact,
    index: &'a AntiDependencyIndex,
    set: &'a mut ArtifactErrorSet,
    foreign_keys_in_model: bool,

    /// Sorted member lists of inheritance cycles already reported
    reported_cycles: HashSet<Vec<ObjectId>>,
}

impl<'a> EscherVisitor<'a> {
    pub fn new(artifact: &'a ModelArtifact, index: &'a AntiDependencyIndex, set: &'a mut ArtifactErrorSet) -> Self {
        Self {
            artifact,
            index,
            set,
            foreign_keys_in_model: conceptual_version(artifact) >= FOREIGN_KEYS_IN_MODEL_VERSION,
            reported_cycles: HashSet::new(),
        }
    }

    pub fn with_foreign_keys_in_model(mut self, enabled: bool) -> Self {
        self.foreign_keys_in_model = enabled;
        self
    }

    /// Visit every object in document order
    pub fn visit_all(&mut self) {
        let artifact = self.artifact;
        for (id, _) in artifact.objects() {
            self.check_all(id);
        }
    }

    /// Run every check that applies to the object's kind
    pub fn check_all(&mut self, id: ObjectId) {
        let Some(kind) = self.artifact.kind(id) else {
            return;
        };

        match kind {
            NodeKind::EntityType { space, .. } => {
                self.check_for_entity_type_without_entity_set(id);
                self.check_for_multiple_entity_sets_per_type(id);
                if *space == ModelSpace::Conceptual {
                    self.check_for_unmapped_entity_type(id);
                    self.check_for_circular_inheritance(id);
                    self.check_for_enum_properties_with_store_generated_pattern(id);
                }
            }
            NodeKind::Association { .. } => {
                self.check_for_association_without_association_set(id);
                self.check_for_unmapped_association(id);
                self.check_association_for_unmapped_entity_type_keys(id);
            }
            NodeKind::ConceptualModel { .. } => self.check_for_using(id),
            NodeKind::ComplexType => {
                self.check_for_circular_complex_type_definition(id);
                self.check_for_enum_properties_with_store_generated_pattern(id);
            }
            NodeKind::Condition { .. } => self.check_for_condition_on_primary_key(id),
            _ => {}
        }

        self.check_for_non_qualified_references(id);
    }

    fn add(&mut self, severity: Severity, message: String, item: ObjectId, code: DesignerCode, class: ErrorClass) {
        self.set
            .add_error(ErrorInfo::designer(severity, message, ErrorItem::Object(item), code, class));
    }

    /// Mapping problems are warnings while the storage model is empty
    fn mapping_severity(&self) -> Severity {
        if self.artifact.is_storage_model_empty() {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    fn schema_class(&self, id: ObjectId) -> ErrorClass {
        match self.artifact.layer_of(id) {
            Some(SchemaLayer::Storage) => ErrorClass::ESCHER_SSDL,
            Some(SchemaLayer::Mapping) => ErrorClass::ESCHER_MSL,
            _ => ErrorClass::ESCHER_CSDL,
        }
    }

    fn is_conceptual(&self, id: ObjectId) -> bool {
        self.artifact.layer_of(id) == Some(SchemaLayer::Conceptual)
    }

    fn names(&self, ids: &[ObjectId]) -> String {
        ids.iter()
            .map(|id| self.artifact.name(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn check_for_circular_inheritance(&mut self, entity_type: ObjectId) {
        let mut chain = Vec::new();
        let mut current = Some(entity_type);

        while let Some(t) = current {
            if let Some(start) = chain.iter().position(|seen| *seen == t) {
                let cycle: Vec<ObjectId> = chain[start..].to_vec();
                let mut key = cycle.clone();
                key.sort();
                if !self.reported_cycles.insert(key) {
                    return;
                }

                // Name the members starting at the first declared one
                let first = cycle
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, id)| **id)
                    .map(|(offset, _)| offset)
                    .unwrap_or(0);
                let mut ordered = cycle[first..].to_vec();
                ordered.extend_from_slice(&cycle[..first]);

                let message = format!(
                    "Circular inheritance among entity types: {}",
                    self.names(&ordered)
                );
                self.add(
                    Severity::Error,
                    message,
                    ordered[0],
                    DesignerCode::EscherValidatorCircularInheritance,
                    ErrorClass::ESCHER_CSDL,
                );
                return;
            }
            chain.push(t);
            current = self.artifact.base_type_of(t);
        }
    }

    pub fn check_for_circular_complex_type_definition(&mut self, complex_type: ObjectId) {
        if model_helper::contains_circular_complex_type_definition(self.artifact, complex_type) {
            let message = format!(
                "The complex type '{}' contains itself through its complex properties",
                self.artifact.name(complex_type)
            );
            self.add(
                Severity::Error,
                message,
                complex_type,
                DesignerCode::EscherValidatorCircularComplexTypeDefinition,
                ErrorClass::ESCHER_CSDL,
            );
        }
    }

    pub fn check_for_multiple_entity_sets_per_type(&mut self, entity_type: ObjectId) {
        let sets = self.artifact.entity_sets_of(entity_type);
        if sets.len() > 1 {
            let message = format!(
                "The entity type '{}' is used by more than one entity set: {}",
                self.artifact.name(entity_type),
                self.names(&sets)
            );
            let class = self.schema_class(entity_type);
            self.add(
                Severity::Warning,
                message,
                entity_type,
                DesignerCode::EscherValidatorMultipeEntitySetsPerType,
                class,
            );
        }
    }

    pub fn check_for_entity_type_without_entity_set(&mut self, entity_type: ObjectId) {
        if self.artifact.entity_sets_of(entity_type).is_empty() {
            let message = format!("The entity type '{}' has no entity set", self.artifact.name(entity_type));
            let class = self.schema_class(entity_type);
            self.add(
                Severity::Warning,
                message,
                entity_type,
                DesignerCode::EscherValidatorEntityTypeWithoutEntitySet,
                class,
            );
        }
    }

    pub fn check_for_association_without_association_set(&mut self, association: ObjectId) {
        if !self.is_conceptual(association) {
            return;
        }
        if !self
            .index
            .has_anti_dependency_of_kind(association, NodeKindTag::AssociationSet)
        {
            let message = format!("The association '{}' has no association set", self.artifact.name(association));
            self.add(
                Severity::Warning,
                message,
                association,
                DesignerCode::EscherValidatorAssociationWithoutAssociationSet,
                ErrorClass::ESCHER_CSDL,
            );
        }
    }

    /// Whether the first entity set of the type is mapped through a query view
    fn entity_set_has_query_view(&self, entity_type: ObjectId) -> bool {
        let Some(set) = self.artifact.entity_sets_of(entity_type).into_iter().next() else {
            return false;
        };
        self.index
            .first_anti_dependency_of_kind(set, NodeKindTag::EntitySetMapping)
            .and_then(|mapping| self.artifact.kind(mapping))
            .is_some_and(|kind| matches!(kind, NodeKind::EntitySetMapping { query_view: Some(view), .. } if !view.trim().is_empty()))
    }

    pub fn check_for_unmapped_entity_type(&mut self, entity_type: ObjectId) {
        if matches!(
            self.artifact.kind(entity_type),
            Some(NodeKind::EntityType { is_abstract: true, .. })
        ) {
            return;
        }

        let severity = self.mapping_severity();
        if !self
            .index
            .has_anti_dependency_of_kind(entity_type, NodeKindTag::EntityTypeMapping)
        {
            if self.entity_set_has_query_view(entity_type) {
                return;
            }
            let message = format!("The entity type '{}' is not mapped", self.artifact.name(entity_type));
            self.add(
                severity,
                message,
                entity_type,
                DesignerCode::EscherValidatorUnmappedEntityType,
                ErrorClass::ESCHER_MSL,
            );
            return;
        }

        let artifact = self.artifact;
        for &property in artifact.children(entity_type) {
            match artifact.kind(property) {
                Some(NodeKind::Property { .. }) => {
                    if !self
                        .index
                        .has_anti_dependency_of_kind(property, NodeKindTag::ScalarProperty)
                    {
                        let message = format!("The property '{}' is not mapped", artifact.name(property));
                        self.add(
                            severity,
                            message,
                            property,
                            DesignerCode::EscherValidatorUnmappedProperty,
                            ErrorClass::ESCHER_MSL,
                        );
                    }
                }
                Some(NodeKind::ComplexProperty { complex_type, .. }) => {
                    if let Some(complex_type) = complex_type.known_target() {
                        if !model_helper::contains_circular_complex_type_definition(artifact, complex_type) {
                            self.check_for_unmapped_complex_property(
                                entity_type,
                                property,
                                complex_type,
                                artifact.name(property),
                                severity,
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Scalars nested under a complex property must be mapped by a mapping
    /// of the owning entity type; errors go on the top-level property
    fn check_for_unmapped_complex_property(
        &mut self,
        entity_type: ObjectId,
        entity_property: ObjectId,
        complex_type: ObjectId,
        property_path: &str,
        severity: Severity,
    ) {
        let artifact = self.artifact;
        for &member in artifact.children(complex_type) {
            match artifact.kind(member) {
                Some(NodeKind::Property { .. }) => {
                    let mapped = self
                        .index
                        .anti_dependencies_of_kind(member, NodeKindTag::ScalarProperty)
                        .into_iter()
                        .filter_map(|scalar| artifact.parent_of_kind(scalar, NodeKindTag::EntityTypeMapping))
                        .any(|etm| artifact.first_bound_conceptual_entity_type(etm) == Some(entity_type));

                    if !mapped {
                        let message = format!(
                            "The property '{}.{}' is not mapped",
                            property_path,
                            artifact.name(member)
                        );
                        self.add(
                            severity,
                            message,
                            entity_property,
                            DesignerCode::EscherValidatorUnmappedProperty,
                            ErrorClass::ESCHER_MSL,
                        );
                    }
                }
                Some(NodeKind::ComplexProperty { complex_type: nested, .. }) => {
                    if let Some(nested) = nested.known_target() {
                        if !model_helper::contains_circular_complex_type_definition(artifact, nested) {
                            let path = format!("{}.{}", property_path, artifact.name(member));
                            self.check_for_unmapped_complex_property(
                                entity_type,
                                entity_property,
                                nested,
                                &path,
                                severity,
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    pub fn check_for_unmapped_association(&mut self, association: ObjectId) {
        if !self.is_conceptual(association) {
            return;
        }

        let artifact = self.artifact;
        let severity = self.mapping_severity();

        if !self
            .index
            .has_anti_dependency_of_kind(association, NodeKindTag::AssociationSetMapping)
        {
            let has_constraint = !artifact
                .children_of_kind(association, NodeKindTag::ReferentialConstraint)
                .is_empty();
            if has_constraint && self.foreign_keys_in_model {
                return;
            }

            let mapped_by_query_view = self
                .index
                .first_anti_dependency_of_kind(association, NodeKindTag::AssociationSet)
                .map(|set| {
                    self.index
                        .anti_dependencies_of_kind(set, NodeKindTag::AssociationSetMapping)
                        .into_iter()
                        .any(|mapping| {
                            matches!(
                                artifact.kind(mapping),
                                Some(NodeKind::AssociationSetMapping { query_view: Some(view), .. }) if !view.trim().is_empty()
                            )
                        })
                })
                .unwrap_or(false);
            if mapped_by_query_view {
                return;
            }

            let message = format!("The association '{}' is not mapped", artifact.name(association));
            self.add(
                severity,
                message,
                association,
                DesignerCode::EscherValidatorUnmappedAssociation,
                ErrorClass::ESCHER_MSL,
            );
            return;
        }

        for end in artifact.children_of_kind(association, NodeKindTag::AssociationEnd) {
            for set_end in self.index.anti_dependencies_of_kind(end, NodeKindTag::AssociationSetEnd) {
                if self.index.has_anti_dependency_of_kind(set_end, NodeKindTag::EndProperty) {
                    continue;
                }

                let location = self
                    .index
                    .first_anti_dependency_of_kind(end, NodeKindTag::NavigationProperty)
                    .unwrap_or(association);
                let message = format!(
                    "The association end '{}' of '{}' is not mapped",
                    artifact.name(end),
                    artifact.name(association)
                );
                self.add(
                    severity,
                    message,
                    location,
                    DesignerCode::EscherValidatorUnmappedAssociationEnd,
                    ErrorClass::ESCHER_MSL,
                );
            }
        }
    }

    pub fn check_association_for_unmapped_entity_type_keys(&mut self, association: ObjectId) {
        let artifact = self.artifact;

        for end in artifact.children_of_kind(association, NodeKindTag::AssociationEnd) {
            let Some(NodeKind::AssociationEnd { entity_type, .. }) = artifact.kind(end) else {
                continue;
            };
            let Some(entity_type) = entity_type.known_target() else {
                continue;
            };
            let keys = artifact.key_properties_of(entity_type);
            if keys.is_empty() {
                continue;
            }

            let end_property = self
                .index
                .first_anti_dependency_of_kind(end, NodeKindTag::AssociationSetEnd)
                .and_then(|set_end| {
                    self.index
                        .first_anti_dependency_of_kind(set_end, NodeKindTag::EndProperty)
                });
            let Some(end_property) = end_property else {
                continue;
            };

            let mapped: HashSet<ObjectId> = artifact
                .children_of_kind(end_property, NodeKindTag::ScalarProperty)
                .into_iter()
                .filter_map(|scalar| match artifact.kind(scalar) {
                    Some(NodeKind::ScalarProperty { property, .. }) => property.known_target(),
                    _ => None,
                })
                .collect();

            let severity = self.mapping_severity();
            for key in keys {
                if !mapped.contains(&key) {
                    let message = format!(
                        "The key property '{}' of the association end '{}' is not mapped",
                        artifact.name(key),
                        artifact.name(end)
                    );
                    self.add(
                        severity,
                        message,
                        association,
                        DesignerCode::EscherValidatorUnmappedAssociationEndKey,
                        ErrorClass::ESCHER_MSL,
                    );
                }
            }
        }
    }

    /// Enum-typed properties cannot be computed by the store
    pub fn check_for_enum_properties_with_store_generated_pattern(&mut self, owner: ObjectId) {
        let artifact = self.artifact;
        for property in artifact.children_of_kind(owner, NodeKindTag::Property) {
            let Some(NodeKind::Property {
                enum_type: Some(_),
                store_generated_pattern,
                ..
            }) = artifact.kind(property)
            else {
                continue;
            };

            let pattern = store_generated_pattern.as_deref().unwrap_or("None");
            if pattern != "None" {
                let message = format!(
                    "The enum property '{}' has StoreGeneratedPattern '{}'; enum properties cannot be store generated",
                    artifact.name(property),
                    pattern
                );
                self.add(
                    Severity::Warning,
                    message,
                    property,
                    DesignerCode::EscherValidatorEnumPropertyWithStoregeneratedpattern,
                    ErrorClass::ESCHER_CSDL,
                );
            }
        }
    }

    pub fn check_for_using(&mut self, conceptual_model: ObjectId) {
        if !self
            .artifact
            .children_of_kind(conceptual_model, NodeKindTag::Using)
            .is_empty()
        {
            self.add(
                Severity::Error,
                "Using directives are not supported in the conceptual model".to_string(),
                conceptual_model,
                DesignerCode::EscherValidatorIncludesUsing,
                ErrorClass::ESCHER_CSDL,
            );
        }
    }

    /// Schema type references must carry a namespace or alias
    pub fn check_for_non_qualified_references(&mut self, id: ObjectId) {
        let artifact = self.artifact;
        let Some(kind) = artifact.kind(id) else {
            return;
        };

        let unqualified: Vec<String> = kind
            .type_references()
            .into_iter()
            .map(|binding| binding.ref_name.trim())
            .filter(|name| !name.is_empty() && !name.contains('.'))
            .map(str::to_string)
            .collect();

        for name in unqualified {
            let message = format!(
                "The reference '{}' in '{}' is not qualified with a namespace or alias",
                name,
                artifact.path_of(id)
            );
            let class = self.schema_class(id);
            self.add(Severity::Error, message, id, DesignerCode::NonQualifiedElement, class);
        }
    }

    /// Conditions may not constrain key members of the mapped types
    pub fn check_for_condition_on_primary_key(&mut self, condition: ObjectId) {
        let artifact = self.artifact;
        let Some(NodeKind::Condition { property, column, .. }) = artifact.kind(condition) else {
            return;
        };
        let Some(fragment) = artifact.parent_of_kind(condition, NodeKindTag::MappingFragment) else {
            return;
        };

        let on_conceptual_key = property
            .as_ref()
            .and_then(|p| p.known_target())
            .is_some_and(|target| {
                artifact
                    .parent(fragment)
                    .and_then(|etm| match artifact.kind(etm) {
                        Some(NodeKind::EntityTypeMapping { types }) => Some(types),
                        _ => None,
                    })
                    .is_some_and(|types| {
                        types
                            .iter()
                            .filter_map(|t| t.binding.known_target())
                            .any(|mapped| artifact.key_properties_of(mapped).contains(&target))
                    })
            });

        let on_store_key = column
            .as_ref()
            .and_then(|c| c.known_target())
            .is_some_and(|target| {
                let store_type = match artifact.kind(fragment) {
                    Some(NodeKind::MappingFragment { store_entity_set }) => store_entity_set
                        .known_target()
                        .and_then(|set| artifact.element_type_of(set)),
                    _ => None,
                };
                store_type.is_some_and(|store_type| artifact.key_properties_of(store_type).contains(&target))
            });

        if on_conceptual_key || on_store_key {
            let member = property
                .iter()
                .chain(column.iter())
                .map(|binding| binding.ref_name.as_str())
                .next()
                .unwrap_or_default();
            let message = format!("The condition on '{}' constrains a key member", member);
            self.add(
                Severity::Error,
                message,
                condition,
                DesignerCode::EscherValidatorConditionOnPrimaryKey,
                ErrorClass::ESCHER_MSL,
            );
        }
    }
}
