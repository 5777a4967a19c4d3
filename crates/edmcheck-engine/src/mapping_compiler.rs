//! Binds the mapping layer against compiled conceptual and storage items

use std::collections::HashSet;
use std::sync::Arc;

use edmcheck_core::MappingErrorCode as M;
use edmcheck_core::{
    EdmProperty, EntityContainerDef, EntitySetDef, EntityTypeDef, ItemCollection, ObjectId, PrimitiveTypeKind,
    TypeUsage,
};
use edmcheck_model::{Binding, ModelArtifact, NodeKind, NodeKindTag, SchemaLayer};

use crate::compiler::{
    object_position, AssociationMapping, Compilation, FragmentMapping, MappingCollection, MemberMapping,
    RuntimeError, SetMapping,
};

/// Primitive kind a scalar is stored as; enums store their underlying type
pub(crate) fn scalar_kind(usage: &TypeUsage) -> Option<PrimitiveTypeKind> {
    usage
        .primitive_kind()
        .or_else(|| usage.as_enum().map(|e| e.underlying_type))
}

/// Members mapped so far in one fragment
#[derive(Default)]
struct FragmentMembers {
    members: Vec<MemberMapping>,
    condition_columns: Vec<String>,
}

pub(crate) struct MappingCompiler<'a> {
    artifact: &'a ModelArtifact,
    conceptual: &'a ItemCollection,
    storage: &'a ItemCollection,
    foreign_keys_in_model: bool,
    errors: Vec<RuntimeError>,
    collection: MappingCollection,
}

impl<'a> MappingCompiler<'a> {
    pub(crate) fn new(artifact: &'a ModelArtifact, conceptual: &'a ItemCollection, storage: &'a ItemCollection) -> Self {
        Self {
            artifact,
            conceptual,
            storage,
            foreign_keys_in_model: false,
            errors: Vec::new(),
            collection: MappingCollection::default(),
        }
    }

    /// Association sets over foreign-key associations need no mapping
    pub(crate) fn with_foreign_keys_in_model(mut self, enabled: bool) -> Self {
        self.foreign_keys_in_model = enabled;
        self
    }

    pub(crate) fn compile(mut self) -> Compilation<MappingCollection> {
        let artifact = self.artifact;
        let Some(root) = artifact.mapping_root() else {
            return Compilation::failed(vec![RuntimeError::error(
                M::RootMappingElementMissing.code(),
                "The artifact has no mapping",
            )]);
        };

        let version = artifact
            .layer_version(SchemaLayer::Mapping)
            .unwrap_or_else(|| artifact.version());
        self.collection.version = version;

        if self.conceptual.version() != self.storage.version() {
            let message = format!(
                "The conceptual model (version {}) and the storage model (version {}) have different versions",
                self.conceptual.version(),
                self.storage.version()
            );
            self.report(M::MappingDifferentEdmStoreVersion.code(), root, message);
        } else if version != self.conceptual.version() {
            let message = format!(
                "The mapping (version {}) and the models it maps (version {}) have different versions",
                version,
                self.conceptual.version()
            );
            self.report(M::MappingDifferentMappingEdmStoreVersion.code(), root, message);
        }

        let container_mappings = artifact.children_of_kind(root, NodeKindTag::EntityContainerMapping);
        if container_mappings.is_empty() {
            self.report(
                M::EmptyContainerMapping.code(),
                root,
                "The mapping does not map any entity container",
            );
        }

        let mut storage_containers = HashSet::new();
        for container_mapping in container_mappings {
            self.container_mapping(container_mapping, &mut storage_containers);
        }

        tracing::debug!(
            set_mappings = self.collection.set_mappings.len(),
            association_mappings = self.collection.association_mappings.len(),
            errors = self.errors.len(),
            "Compiled mapping layer"
        );

        Compilation::new(self.collection, self.errors)
    }

    fn report(&mut self, code: i32, id: ObjectId, message: impl Into<String>) {
        let position = object_position(self.artifact, id);
        self.errors.push(RuntimeError::error(code, message).at(position));
    }

    fn warn(&mut self, code: i32, id: ObjectId, message: impl Into<String>) {
        let position = object_position(self.artifact, id);
        self.errors.push(RuntimeError::warning(code, message).at(position));
    }

    /// Full name a binding refers to; the raw name when it did not bind
    fn referenced_name(&self, binding: &Binding) -> String {
        binding
            .known_target()
            .map(|target| self.artifact.full_name(target))
            .unwrap_or_else(|| binding.ref_name.clone())
    }

    fn container_mapping(&mut self, id: ObjectId, storage_containers: &mut HashSet<String>) {
        let artifact = self.artifact;
        let (conceptual_items, storage_items) = (self.conceptual, self.storage);
        let Some(NodeKind::EntityContainerMapping {
            storage_container,
            conceptual_container,
        }) = artifact.kind(id)
        else {
            return;
        };

        let Some(conceptual) = conceptual_items.container(&conceptual_container.ref_name) else {
            let message = format!(
                "The conceptual entity container '{}' is not defined",
                conceptual_container.ref_name
            );
            self.report(M::InvalidEntityContainer.code(), id, message);
            return;
        };
        let Some(storage) = storage_items.container(&storage_container.ref_name) else {
            let message = format!("The storage entity container '{}' is not defined", storage_container.ref_name);
            self.report(M::InvalidEntityContainer.code(), id, message);
            return;
        };
        if !storage_containers.insert(storage.name.clone()) {
            let message = format!("The storage entity container '{}' is already mapped", storage.name);
            self.report(M::AlreadyMappedStorageEntityContainer.code(), id, message);
            return;
        }

        let mut mapped_sets = HashSet::new();
        for set_mapping in artifact.children_of_kind(id, NodeKindTag::EntitySetMapping) {
            self.entity_set_mapping(set_mapping, conceptual, storage, &mut mapped_sets);
        }
        let mut mapped_association_sets = HashSet::new();
        for set_mapping in artifact.children_of_kind(id, NodeKindTag::AssociationSetMapping) {
            self.association_set_mapping(set_mapping, conceptual, storage, &mut mapped_association_sets);
        }

        for set in &conceptual.entity_sets {
            if !mapped_sets.contains(set.name.as_str()) {
                let message = format!("No mapping specified for instances of EntitySet '{}'", set.name);
                self.report(M::NotSpecifiedInstanceForEntitySetOrAssociationSet.code(), id, message);
            }
        }
        for set in &conceptual.association_sets {
            let foreign_key = set.association.constraint.is_some() && self.foreign_keys_in_model;
            if !foreign_key && !mapped_association_sets.contains(set.name.as_str()) {
                let message = format!("No mapping specified for instances of AssociationSet '{}'", set.name);
                self.report(M::NotSpecifiedInstanceForEntitySetOrAssociationSet.code(), id, message);
            }
        }
    }

    fn entity_set_mapping(
        &mut self,
        id: ObjectId,
        conceptual: &'a EntityContainerDef,
        storage: &'a EntityContainerDef,
        mapped_sets: &mut HashSet<&'a str>,
    ) {
        let artifact = self.artifact;
        let Some(NodeKind::EntitySetMapping { entity_set, query_view }) = artifact.kind(id) else {
            return;
        };
        let Some(set) = conceptual.entity_set(&entity_set.ref_name) else {
            let message = format!(
                "The EntitySet '{}' is not defined in container '{}'",
                entity_set.ref_name, conceptual.name
            );
            self.report(M::InvalidEntitySet.code(), id, message);
            return;
        };
        if !mapped_sets.insert(set.name.as_str()) {
            let message = format!("The EntitySet '{}' is mapped more than once", set.name);
            self.report(M::DuplicateSetMapping.code(), id, message);
            return;
        }

        let type_mappings = artifact.children_of_kind(id, NodeKindTag::EntityTypeMapping);
        if let Some(view) = query_view {
            let maps_properties = type_mappings
                .iter()
                .any(|etm| !artifact.children_of_kind(*etm, NodeKindTag::MappingFragment).is_empty());
            if view.trim().is_empty() {
                let message = format!("The query view of EntitySet '{}' is empty", set.name);
                self.report(M::EmptyQueryView.code(), id, message);
            } else if maps_properties {
                let message = format!(
                    "The EntitySet '{}' is mapped through a query view and cannot also map properties",
                    set.name
                );
                self.report(M::PropertyMapsWithQueryView.code(), id, message);
            }
            self.collection.set_mappings.push(SetMapping {
                container: conceptual.name.clone(),
                set: set.clone(),
                query_view: Some(view.clone()),
                fragments: Vec::new(),
                position: artifact.position(id),
            });
            return;
        }

        if type_mappings.is_empty() {
            let message = format!("The mapping of EntitySet '{}' does not map any type", set.name);
            self.report(M::EmptySetMapping.code(), id, message);
            return;
        }

        let mut fragments = Vec::new();
        let mut seen_types = HashSet::new();
        for type_mapping in type_mappings {
            self.entity_type_mapping(type_mapping, set, storage, &mut seen_types, &mut fragments);
        }
        self.collection.set_mappings.push(SetMapping {
            container: conceptual.name.clone(),
            set: set.clone(),
            query_view: None,
            fragments,
            position: artifact.position(id),
        });
    }

    fn entity_type_mapping(
        &mut self,
        id: ObjectId,
        set: &EntitySetDef,
        storage: &EntityContainerDef,
        seen_types: &mut HashSet<(String, bool)>,
        fragments: &mut Vec<FragmentMapping>,
    ) {
        let (artifact, conceptual) = (self.artifact, self.conceptual);
        let Some(NodeKind::EntityTypeMapping { types }) = artifact.kind(id) else {
            return;
        };

        let mut mapped: Vec<(Arc<EntityTypeDef>, bool)> = Vec::new();
        for mapped_type in types {
            let full_name = self.referenced_name(&mapped_type.binding);
            let Some(entity_type) = conceptual.entity_type(&full_name) else {
                let message = format!("The entity type '{}' is not defined", full_name);
                self.report(M::InvalidEntityType.code(), id, message);
                continue;
            };
            if !entity_type.is_sub_type_of(&set.element_type) {
                let message = format!(
                    "The entity type '{}' is neither the element type of EntitySet '{}' nor derived from it",
                    full_name, set.name
                );
                self.report(M::InvalidEntityType.code(), id, message);
                continue;
            }
            if entity_type.is_abstract && !mapped_type.is_type_of {
                let message = format!(
                    "The abstract type '{}' can only be mapped with IsTypeOf",
                    full_name
                );
                self.report(M::MappingOfAbstractType.code(), id, message);
                continue;
            }
            if !seen_types.insert((full_name.clone(), mapped_type.is_type_of)) {
                let message = format!("The entity type '{}' is mapped more than once", full_name);
                self.report(M::DuplicateTypeMapping.code(), id, message);
                continue;
            }
            mapped.push((entity_type.clone(), mapped_type.is_type_of));
        }
        if mapped.is_empty() {
            if types.is_empty() {
                self.report(M::InvalidEntityType.code(), id, "The entity type mapping names no type");
            }
            return;
        }

        for functions in artifact.children_of_kind(id, NodeKindTag::ModificationFunctionMapping) {
            self.modification_functions(functions);
        }

        for fragment in artifact.children_of_kind(id, NodeKindTag::MappingFragment) {
            if let Some(fragment) = self.fragment(fragment, &mapped, storage) {
                fragments.push(fragment);
            }
        }
    }

    fn modification_functions(&mut self, id: ObjectId) {
        let (artifact, storage) = (self.artifact, self.storage);
        let Some(NodeKind::ModificationFunctionMapping { functions }) = artifact.kind(id) else {
            return;
        };
        for function in functions {
            let full_name = self.referenced_name(function);
            let composable = storage.function_overloads(&full_name).first().map(|f| f.is_composable);
            let composable = match composable {
                Some(composable) => composable,
                None => {
                    let message = format!("The function '{}' is not defined in the storage model", full_name);
                    self.report(M::InvalidModificationFunctionMappingUnknownFunction.code(), id, message);
                    continue;
                }
            };
            if composable {
                let message = format!("The composable function '{}' cannot modify data", full_name);
                self.report(M::InvalidModificationFunctionMappingNotValidFunction.code(), id, message);
            }
        }
    }

    fn fragment(
        &mut self,
        id: ObjectId,
        types: &[(Arc<EntityTypeDef>, bool)],
        storage: &EntityContainerDef,
    ) -> Option<FragmentMapping> {
        let artifact = self.artifact;
        let Some(NodeKind::MappingFragment { store_entity_set }) = artifact.kind(id) else {
            return None;
        };
        let Some(store_set) = storage.entity_set(&store_entity_set.ref_name) else {
            let message = format!(
                "The store entity set '{}' is not defined in container '{}'",
                store_entity_set.ref_name, storage.name
            );
            self.report(M::InvalidTable.code(), id, message);
            return None;
        };

        let mut available: Vec<EdmProperty> = Vec::new();
        for (entity_type, _) in types {
            for property in entity_type.all_properties() {
                if !available.iter().any(|p| p.name == property.name) {
                    available.push(property.clone());
                }
            }
        }
        let keys: Vec<String> = types
            .first()
            .map(|(t, _)| t.key_properties().iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default();

        let mut members = FragmentMembers::default();
        self.map_members(id, &available, "", &keys, store_set, &mut members);

        Some(FragmentMapping {
            types: types.to_vec(),
            store_set: store_set.clone(),
            members: members.members,
            condition_columns: members.condition_columns,
            position: artifact.position(id),
        })
    }

    /// Maps the scalar, complex and condition children of `owner`;
    /// `prefix` is the dotted path of the enclosing complex property
    fn map_members(
        &mut self,
        owner: ObjectId,
        available: &[EdmProperty],
        prefix: &str,
        keys: &[String],
        store_set: &EntitySetDef,
        out: &mut FragmentMembers,
    ) {
        let artifact = self.artifact;
        for &child in artifact.children(owner) {
            match artifact.kind(child) {
                Some(NodeKind::ScalarProperty { property, column }) => {
                    let name = &property.ref_name;
                    let path = join_path(prefix, name);
                    let Some(edm) = available.iter().find(|p| p.name == *name) else {
                        let message = format!("The property '{}' is not defined on the mapped type", path);
                        self.report(M::InvalidEdmMember.code(), child, message);
                        continue;
                    };
                    if edm.type_usage.as_complex().is_some() {
                        let message = format!("The complex property '{}' must be mapped member by member", path);
                        self.report(M::InvalidEdmMember.code(), child, message);
                        continue;
                    }
                    if out.members.iter().any(|m| m.path == path) {
                        let message = format!("The property '{}' is mapped more than once", path);
                        self.report(M::DuplicateMemberMapping.code(), child, message);
                        continue;
                    }
                    let Some(store_column) = store_set.element_type.property(&column.ref_name) else {
                        let message = format!(
                            "The column '{}' is not defined in store entity set '{}'",
                            column.ref_name, store_set.name
                        );
                        self.report(M::InvalidStorageMember.code(), child, message);
                        continue;
                    };

                    if let (Some(from), Some(to)) = (scalar_kind(&edm.type_usage), scalar_kind(&store_column.type_usage)) {
                        if from != to && !from.promotes_to(to) && !to.promotes_to(from) {
                            let message = format!(
                                "The property '{}' of type '{}' cannot be mapped to column '{}' of type '{}'",
                                path, from, column.ref_name, to
                            );
                            self.report(M::IncompatibleMemberMapping.code(), child, message);
                            continue;
                        }
                    }

                    out.members.push(MemberMapping {
                        path,
                        property: edm.clone(),
                        column: column.ref_name.clone(),
                        is_key: prefix.is_empty() && keys.contains(name),
                        position: artifact.position(child),
                    });
                }
                Some(NodeKind::ComplexPropertyMapping { property, .. }) => {
                    let path = join_path(prefix, &property.ref_name);
                    let complex = available
                        .iter()
                        .find(|p| p.name == property.ref_name)
                        .and_then(|p| p.type_usage.as_complex());
                    let Some(complex) = complex else {
                        let message = format!("'{}' is not a complex property of the mapped type", path);
                        self.report(M::InvalidEdmMember.code(), child, message);
                        continue;
                    };
                    self.map_members(child, &complex.properties, &path, keys, store_set, out);
                }
                Some(NodeKind::Condition { .. }) => {
                    self.condition(child, available, Some(store_set), &mut out.condition_columns);
                }
                _ => {}
            }
        }
    }

    fn condition(
        &mut self,
        id: ObjectId,
        available: &[EdmProperty],
        store_set: Option<&EntitySetDef>,
        condition_columns: &mut Vec<String>,
    ) {
        let artifact = self.artifact;
        let Some(NodeKind::Condition {
            property,
            column,
            value,
            is_null,
        }) = artifact.kind(id)
        else {
            return;
        };

        if property.is_some() == column.is_some() {
            self.report(
                M::ConditionError.code(),
                id,
                "A condition must name either a property or a column",
            );
            return;
        }
        if value.is_some() == is_null.is_some() {
            self.report(
                M::ConditionError.code(),
                id,
                "A condition must specify either a value or IsNull",
            );
            return;
        }

        if let Some(column) = column {
            if let Some(store_set) = store_set {
                if store_set.element_type.property(&column.ref_name).is_none() {
                    let message = format!(
                        "The condition column '{}' is not defined in store entity set '{}'",
                        column.ref_name, store_set.name
                    );
                    self.report(M::InvalidStorageMember.code(), id, message);
                    return;
                }
            }
            if condition_columns.contains(&column.ref_name) {
                let message = format!("The column '{}' has more than one condition", column.ref_name);
                self.report(M::DuplicateCondition.code(), id, message);
                return;
            }
            condition_columns.push(column.ref_name.clone());
        }
        if let Some(property) = property {
            if !available.iter().any(|p| p.name == property.ref_name) {
                let message = format!("The condition property '{}' is not defined on the mapped type", property.ref_name);
                self.report(M::InvalidEdmMember.code(), id, message);
            }
        }
    }

    fn association_set_mapping(
        &mut self,
        id: ObjectId,
        conceptual: &'a EntityContainerDef,
        storage: &'a EntityContainerDef,
        mapped_sets: &mut HashSet<&'a str>,
    ) {
        let artifact = self.artifact;
        let Some(NodeKind::AssociationSetMapping {
            association_set,
            association,
            store_entity_set,
            query_view,
        }) = artifact.kind(id)
        else {
            return;
        };

        let Some(set) = conceptual
            .association_sets
            .iter()
            .find(|s| s.name == association_set.ref_name)
        else {
            let message = format!(
                "The AssociationSet '{}' is not defined in container '{}'",
                association_set.ref_name, conceptual.name
            );
            self.report(M::InvalidAssociationSet.code(), id, message);
            return;
        };
        if !mapped_sets.insert(set.name.as_str()) {
            let message = format!("The AssociationSet '{}' is mapped more than once", set.name);
            self.report(M::DuplicateSetMapping.code(), id, message);
            return;
        }

        let type_name = self.referenced_name(association);
        if type_name != set.association.full_name() {
            let message = format!(
                "'{}' is not the association of AssociationSet '{}'",
                type_name, set.name
            );
            self.report(M::InvalidAssociationType.code(), id, message);
            return;
        }

        if set.association.constraint.is_some() && self.foreign_keys_in_model {
            let message = format!(
                "The mapping of AssociationSet '{}' is ignored: its association is defined by foreign keys",
                set.name
            );
            self.warn(M::InvalidAssociationSet.code(), id, message);
            return;
        }

        if let Some(view) = query_view {
            if view.trim().is_empty() {
                let message = format!("The query view of AssociationSet '{}' is empty", set.name);
                self.report(M::EmptyQueryView.code(), id, message);
            } else if !artifact.children_of_kind(id, NodeKindTag::EndProperty).is_empty() {
                let message = format!(
                    "The AssociationSet '{}' is mapped through a query view and cannot also map ends",
                    set.name
                );
                self.report(M::PropertyMapsWithQueryView.code(), id, message);
            }
            self.collection.association_mappings.push(AssociationMapping {
                container: conceptual.name.clone(),
                association_set: set.name.clone(),
                store_set: None,
                query_view: Some(view.clone()),
                end_columns: Vec::new(),
                condition_columns: Vec::new(),
                position: artifact.position(id),
            });
            return;
        }

        let store_set = storage.entity_set(&store_entity_set.ref_name);
        if store_set.is_none() {
            let message = format!(
                "The store entity set '{}' is not defined in container '{}'",
                store_entity_set.ref_name, storage.name
            );
            self.report(M::InvalidTable.code(), id, message);
        }

        let mut end_columns = Vec::new();
        for end_property in artifact.children_of_kind(id, NodeKindTag::EndProperty) {
            let Some(NodeKind::EndProperty { end }) = artifact.kind(end_property) else {
                continue;
            };
            let Some(member) = set.association.end(&end.ref_name) else {
                let message = format!(
                    "'{}' is not an end of association '{}'",
                    end.ref_name,
                    set.association.full_name()
                );
                self.report(M::InvalidEdmMember.code(), end_property, message);
                continue;
            };
            let keys: Vec<String> = member
                .entity_type
                .key_properties()
                .iter()
                .map(|p| p.name.clone())
                .collect();

            for scalar in artifact.children_of_kind(end_property, NodeKindTag::ScalarProperty) {
                let Some(NodeKind::ScalarProperty { property, column }) = artifact.kind(scalar) else {
                    continue;
                };
                if !keys.contains(&property.ref_name) {
                    let message = format!(
                        "The property '{}' is not a key of end '{}'",
                        property.ref_name, member.name
                    );
                    self.report(M::InvalidEdmMember.code(), scalar, message);
                    continue;
                }
                if let Some(store_set) = store_set {
                    if store_set.element_type.property(&column.ref_name).is_none() {
                        let message = format!(
                            "The column '{}' is not defined in store entity set '{}'",
                            column.ref_name, store_set.name
                        );
                        self.report(M::InvalidStorageMember.code(), scalar, message);
                        continue;
                    }
                }
                end_columns.push((member.name.clone(), property.ref_name.clone(), column.ref_name.clone()));
            }
        }

        let mut condition_columns = Vec::new();
        for condition in artifact.children_of_kind(id, NodeKindTag::Condition) {
            self.condition(condition, &[], store_set.map(Arc::as_ref), &mut condition_columns);
        }

        self.collection.association_mappings.push(AssociationMapping {
            container: conceptual.name.clone(),
            association_set: set.name.clone(),
            store_set: store_set.cloned(),
            query_view: None,
            end_columns,
            condition_columns,
            position: artifact.position(id),
        });
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
