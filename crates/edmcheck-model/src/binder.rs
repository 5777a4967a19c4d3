//! Name binding
//!
//! Resolves every pending `Binding` of a freshly loaded artifact. Objects
//! are bound in arena order, so a parent's bindings are always resolved
//! before its children look through them (an end property reads its
//! association set mapping's set, a scalar property reads its fragment's
//! store set, and so on).
//!
//! A binding whose scope cannot be found stays `Unresolved` and is not
//! reported; only `Undefined` bindings become resolve errors.

use std::collections::HashMap;

use edmcheck_core::{DesignerCode, ErrorClass, ErrorInfo, ErrorItem, ObjectId, Severity};

use crate::artifact::{Binding, BindingStatus, ModelArtifact, NodeKind, NodeKindTag};
use crate::content_validator::SchemaLayer;

/// Top-level schema types by full name, per layer
struct TypeIndex {
    types: HashMap<(SchemaLayer, String), ObjectId>,
    namespaces: HashMap<SchemaLayer, (String, Option<String>)>,
}

impl TypeIndex {
    fn build(artifact: &ModelArtifact) -> Self {
        let mut types = HashMap::new();
        let mut namespaces = HashMap::new();

        let roots = [
            (SchemaLayer::Conceptual, artifact.conceptual_root()),
            (SchemaLayer::Storage, artifact.storage_root()),
        ];
        for (layer, root) in roots {
            let Some(root) = root else {
                continue;
            };
            let (namespace, alias) = match artifact.kind(root) {
                Some(NodeKind::ConceptualModel { namespace, alias, .. })
                | Some(NodeKind::StorageModel { namespace, alias, .. }) => (namespace.clone(), alias.clone()),
                _ => continue,
            };

            for child in artifact.children(root) {
                let name = format!("{}.{}", namespace, artifact.name(*child));
                // First declaration wins; duplicates surface at compile time
                types.entry((layer, name)).or_insert(*child);
            }
            namespaces.insert(layer, (namespace, alias));
        }

        Self { types, namespaces }
    }

    fn qualify(&self, layer: SchemaLayer, name: &str) -> String {
        let Some((namespace, alias)) = self.namespaces.get(&layer) else {
            return name.to_string();
        };
        match name.rsplit_once('.') {
            Some((prefix, local)) if alias.as_deref() == Some(prefix) => format!("{}.{}", namespace, local),
            Some(_) => name.to_string(),
            None => format!("{}.{}", namespace, name),
        }
    }

    fn lookup(&self, artifact: &ModelArtifact, layer: SchemaLayer, name: &str, tag: NodeKindTag) -> Option<ObjectId> {
        let id = *self.types.get(&(layer, self.qualify(layer, name)))?;
        (artifact.tag(id) == Some(tag)).then_some(id)
    }
}

/// Bind every object of the artifact; returns the resolve errors
pub(crate) fn bind(artifact: &mut ModelArtifact) -> Vec<ErrorInfo> {
    let index = TypeIndex::build(artifact);

    for position in 0..artifact.objects.len() {
        let id = ObjectId(position as u32);
        let mut kind = artifact.objects[position].kind.clone();
        bind_object(&index, artifact, id, &mut kind);
        artifact.objects[position].kind = kind;
    }

    let mut errors = Vec::new();
    for (id, object) in artifact.objects() {
        if skips_resolve_report(&object.kind) {
            continue;
        }
        for binding in object.kind.bindings() {
            if binding.status == BindingStatus::Undefined {
                errors.push(ErrorInfo::designer(
                    Severity::Error,
                    format!(
                        "The {} '{}' refers to '{}', which is not defined",
                        object.tag(),
                        artifact.path_of(id),
                        binding.ref_name
                    ),
                    ErrorItem::Object(id),
                    DesignerCode::UnresolvedReference,
                    ErrorClass::RESOLVE_ERROR,
                ));
            }
        }
    }

    tracing::debug!(unresolved = errors.len(), "Bound artifact references");
    errors
}

/// Undefined complex property types are reported by runtime compilation
fn skips_resolve_report(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::ComplexProperty { .. })
}

fn child_named(artifact: &ModelArtifact, parent: ObjectId, name: &str, tags: &[NodeKindTag]) -> Option<ObjectId> {
    artifact.children(parent).iter().copied().find(|child| {
        artifact.name(*child) == name && artifact.tag(*child).is_some_and(|tag| tags.contains(&tag))
    })
}

/// Member declared on the type or one of its base types
fn member_in_hierarchy(
    artifact: &ModelArtifact,
    entity_type: ObjectId,
    name: &str,
    tags: &[NodeKindTag],
) -> Option<ObjectId> {
    artifact
        .type_hierarchy(entity_type)
        .into_iter()
        .find_map(|t| child_named(artifact, t, name, tags))
}

/// Resolve `binding` only when its scope exists
fn resolve_in<F>(binding: &mut Binding, scope: Option<ObjectId>, find: F)
where
    F: FnOnce(ObjectId, &str) -> Option<ObjectId>,
{
    if let Some(scope) = scope {
        let target = find(scope, binding.ref_name.as_str());
        binding.resolve(target);
    }
}

fn known(binding: Option<&Binding>) -> Option<ObjectId> {
    binding.and_then(|b| b.known_target())
}

fn container_of_mapping(artifact: &ModelArtifact, id: ObjectId, conceptual: bool) -> Option<ObjectId> {
    let ecm = artifact.parent_of_kind(id, NodeKindTag::EntityContainerMapping)?;
    match artifact.kind(ecm)? {
        NodeKind::EntityContainerMapping {
            storage_container,
            conceptual_container,
        } => {
            if conceptual {
                conceptual_container.known_target()
            } else {
                storage_container.known_target()
            }
        }
        _ => None,
    }
}

/// Storage entity type behind the nearest fragment or association set mapping
fn store_element_type(artifact: &ModelArtifact, id: ObjectId) -> Option<ObjectId> {
    let mut current = artifact.parent(id);
    while let Some(node) = current {
        match artifact.kind(node)? {
            NodeKind::MappingFragment { store_entity_set }
            | NodeKind::AssociationSetMapping { store_entity_set, .. } => {
                return store_entity_set
                    .known_target()
                    .and_then(|set| artifact.element_type_of(set));
            }
            _ => current = artifact.parent(node),
        }
    }
    None
}

/// Complex type a complex property mapping (or its property) stands for
fn complex_type_of_mapping(artifact: &ModelArtifact, cpm: ObjectId) -> Option<ObjectId> {
    match artifact.kind(cpm)? {
        NodeKind::ComplexPropertyMapping {
            property,
            complex_type,
        } => known(complex_type.as_ref()).or_else(|| {
            let property = property.known_target()?;
            match artifact.kind(property)? {
                NodeKind::ComplexProperty { complex_type, .. } => complex_type.known_target(),
                _ => None,
            }
        }),
        _ => None,
    }
}

/// Types whose members a mapping element under `parent` may name
fn member_owners(artifact: &ModelArtifact, parent: ObjectId) -> Vec<ObjectId> {
    match artifact.kind(parent) {
        Some(NodeKind::MappingFragment { .. }) => {
            let Some(etm) = artifact.parent(parent) else {
                return Vec::new();
            };
            match artifact.kind(etm) {
                Some(NodeKind::EntityTypeMapping { types }) => {
                    types.iter().filter_map(|t| t.binding.known_target()).collect()
                }
                _ => Vec::new(),
            }
        }
        Some(NodeKind::ComplexPropertyMapping { .. }) => {
            complex_type_of_mapping(artifact, parent).into_iter().collect()
        }
        Some(NodeKind::EndProperty { end }) => end
            .known_target()
            .and_then(|set_end| match artifact.kind(set_end) {
                Some(NodeKind::AssociationSetEnd { role, .. }) => role.known_target(),
                _ => None,
            })
            .and_then(|association_end| match artifact.kind(association_end) {
                Some(NodeKind::AssociationEnd { entity_type, .. }) => entity_type.known_target(),
                _ => None,
            })
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

fn resolve_member(artifact: &ModelArtifact, binding: &mut Binding, parent: Option<ObjectId>, tags: &[NodeKindTag]) {
    let Some(parent) = parent else {
        return;
    };
    let owners = member_owners(artifact, parent);
    if owners.is_empty() {
        return;
    }
    let target = owners
        .into_iter()
        .find_map(|owner| member_in_hierarchy(artifact, owner, &binding.ref_name, tags));
    binding.resolve(target);
}

fn resolve_column(artifact: &ModelArtifact, binding: &mut Binding, id: ObjectId) {
    resolve_in(binding, store_element_type(artifact, id), |store_type, name| {
        child_named(artifact, store_type, name, &[NodeKindTag::Property])
    });
}

const SCALAR: &[NodeKindTag] = &[NodeKindTag::Property];
const COMPLEX: &[NodeKindTag] = &[NodeKindTag::ComplexProperty];
const ANY_PROPERTY: &[NodeKindTag] = &[NodeKindTag::Property, NodeKindTag::ComplexProperty];

fn bind_object(index: &TypeIndex, artifact: &ModelArtifact, id: ObjectId, kind: &mut NodeKind) {
    let parent = artifact.parent(id);
    let layer = artifact.layer_of(id).unwrap_or(SchemaLayer::Conceptual);

    match kind {
        NodeKind::EntityType {
            base_type: Some(base),
            ..
        } => {
            let target = index.lookup(artifact, layer, &base.ref_name, NodeKindTag::EntityType);
            base.resolve(target);
        }
        NodeKind::PropertyRef { property } => {
            resolve_in(property, parent, |owner, name| child_named(artifact, owner, name, ANY_PROPERTY));
        }
        NodeKind::Property {
            enum_type: Some(enum_type),
            ..
        } => {
            let target = index.lookup(artifact, layer, &enum_type.ref_name, NodeKindTag::EnumType);
            enum_type.resolve(target);
        }
        NodeKind::ComplexProperty { complex_type, .. } => {
            let target = index.lookup(artifact, layer, &complex_type.ref_name, NodeKindTag::ComplexType);
            complex_type.resolve(target);
        }
        NodeKind::NavigationProperty {
            relationship,
            from_role,
            to_role,
        } => {
            let association = relationship.as_mut().and_then(|relationship| {
                let target = index.lookup(artifact, layer, &relationship.ref_name, NodeKindTag::Association);
                relationship.resolve(target);
                target
            });
            for role in [from_role, to_role].into_iter().flatten() {
                resolve_in(role, association, |association, name| {
                    child_named(artifact, association, name, &[NodeKindTag::AssociationEnd])
                });
            }
        }
        NodeKind::AssociationEnd { entity_type, .. } => {
            let target = index.lookup(artifact, layer, &entity_type.ref_name, NodeKindTag::EntityType);
            entity_type.resolve(target);
        }
        NodeKind::ReferentialConstraintRole { role, properties, .. } => {
            let association = artifact.parent_of_kind(id, NodeKindTag::Association);
            resolve_in(role, association, |association, name| {
                child_named(artifact, association, name, &[NodeKindTag::AssociationEnd])
            });

            let end_type = role.known_target().and_then(|end| match artifact.kind(end) {
                Some(NodeKind::AssociationEnd { entity_type, .. }) => entity_type.known_target(),
                _ => None,
            });
            for property in properties.iter_mut() {
                resolve_in(property, end_type, |entity_type, name| {
                    member_in_hierarchy(artifact, entity_type, name, SCALAR)
                });
            }
        }
        NodeKind::EntitySet { entity_type } => {
            let target = index.lookup(artifact, layer, &entity_type.ref_name, NodeKindTag::EntityType);
            entity_type.resolve(target);
        }
        NodeKind::AssociationSet { association } => {
            let target = index.lookup(artifact, layer, &association.ref_name, NodeKindTag::Association);
            association.resolve(target);
        }
        NodeKind::AssociationSetEnd { role, entity_set } => {
            let association = parent.and_then(|set| match artifact.kind(set) {
                Some(NodeKind::AssociationSet { association }) => association.known_target(),
                _ => None,
            });
            resolve_in(role, association, |association, name| {
                child_named(artifact, association, name, &[NodeKindTag::AssociationEnd])
            });

            let container = artifact.parent_of_kind(id, NodeKindTag::EntityContainer);
            resolve_in(entity_set, container, |container, name| {
                child_named(artifact, container, name, &[NodeKindTag::EntitySet])
            });
        }
        NodeKind::EntityContainerMapping {
            storage_container,
            conceptual_container,
        } => {
            resolve_in(storage_container, artifact.storage_root(), |root, name| {
                child_named(artifact, root, name, &[NodeKindTag::EntityContainer])
            });
            resolve_in(conceptual_container, artifact.conceptual_root(), |root, name| {
                child_named(artifact, root, name, &[NodeKindTag::EntityContainer])
            });
        }
        NodeKind::EntitySetMapping { entity_set, .. } => {
            resolve_in(entity_set, container_of_mapping(artifact, id, true), |container, name| {
                child_named(artifact, container, name, &[NodeKindTag::EntitySet])
            });
        }
        NodeKind::EntityTypeMapping { types } => {
            for mapped in types.iter_mut() {
                let target = index.lookup(
                    artifact,
                    SchemaLayer::Conceptual,
                    &mapped.binding.ref_name,
                    NodeKindTag::EntityType,
                );
                mapped.binding.resolve(target);
            }
        }
        NodeKind::MappingFragment { store_entity_set } => {
            resolve_in(store_entity_set, container_of_mapping(artifact, id, false), |container, name| {
                child_named(artifact, container, name, &[NodeKindTag::EntitySet])
            });
        }
        NodeKind::ScalarProperty { property, column } => {
            resolve_member(artifact, property, parent, SCALAR);
            resolve_column(artifact, column, id);
        }
        NodeKind::ComplexPropertyMapping {
            property,
            complex_type,
        } => {
            resolve_member(artifact, property, parent, COMPLEX);
            if let Some(complex_type) = complex_type {
                let target = index.lookup(
                    artifact,
                    SchemaLayer::Conceptual,
                    &complex_type.ref_name,
                    NodeKindTag::ComplexType,
                );
                complex_type.resolve(target);
            }
        }
        NodeKind::Condition { property, column, .. } => {
            if let Some(property) = property {
                resolve_member(artifact, property, parent, SCALAR);
            }
            if let Some(column) = column {
                resolve_column(artifact, column, id);
            }
        }
        NodeKind::AssociationSetMapping {
            association_set,
            association,
            store_entity_set,
            ..
        } => {
            resolve_in(association_set, container_of_mapping(artifact, id, true), |container, name| {
                child_named(artifact, container, name, &[NodeKindTag::AssociationSet])
            });
            let target = index.lookup(
                artifact,
                SchemaLayer::Conceptual,
                &association.ref_name,
                NodeKindTag::Association,
            );
            association.resolve(target);
            resolve_in(store_entity_set, container_of_mapping(artifact, id, false), |container, name| {
                child_named(artifact, container, name, &[NodeKindTag::EntitySet])
            });
        }
        NodeKind::EndProperty { end } => {
            let association_set = parent.and_then(|asm| match artifact.kind(asm) {
                Some(NodeKind::AssociationSetMapping { association_set, .. }) => association_set.known_target(),
                _ => None,
            });
            resolve_in(end, association_set, |set, name| {
                child_named(artifact, set, name, &[NodeKindTag::AssociationSetEnd])
            });
        }
        NodeKind::ModificationFunctionMapping { functions } => {
            for function in functions.iter_mut() {
                let target = index.lookup(artifact, SchemaLayer::Storage, &function.ref_name, NodeKindTag::Function);
                function.resolve(target);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_validator::ContentValidatorRegistry;
    use pretty_assertions::assert_eq;

    fn load(json: &str) -> ModelArtifact {
        let mut registry = ContentValidatorRegistry::new();
        ModelArtifact::from_json(json, &mut registry).unwrap()
    }

    fn find(artifact: &ModelArtifact, path: &str, tag: NodeKindTag) -> ObjectId {
        artifact
            .objects()
            .map(|(id, _)| id)
            .find(|id| artifact.path_of(*id) == path && artifact.tag(*id) == Some(tag))
            .unwrap()
    }

    const MAPPED: &str = r#"{
        "conceptual": {
            "namespace": "Shop", "alias": "Self",
            "entity_types": [
                { "name": "Product", "key": ["Id"],
                  "properties": [
                    { "name": "Id", "type": "Int32" },
                    { "name": "Address", "type": "Self.Address" }
                  ] }
            ],
            "complex_types": [
                { "name": "Address", "properties": [ { "name": "Street", "type": "String" } ] }
            ],
            "entity_containers": [
                { "name": "ShopContainer",
                  "entity_sets": [ { "name": "Products", "entity_type": "Self.Product" } ] }
            ]
        },
        "storage": {
            "namespace": "Shop.Store",
            "entity_types": [
                { "name": "products", "key": ["id"],
                  "properties": [
                    { "name": "id", "type": "int", "nullable": false },
                    { "name": "street", "type": "nvarchar" }
                  ] }
            ],
            "entity_containers": [
                { "name": "Db", "entity_sets": [ { "name": "products", "entity_type": "Shop.Store.products" } ] }
            ]
        },
        "mapping": {
            "entity_container_mappings": [
                { "storage_entity_container": "Db", "cdm_entity_container": "ShopContainer",
                  "entity_set_mappings": [
                    { "name": "Products",
                      "entity_type_mappings": [
                        { "type_name": "IsTypeOf(Shop.Product)",
                          "fragments": [
                            { "store_entity_set": "products",
                              "scalar_properties": [ { "name": "Id", "column": "id" } ],
                              "complex_properties": [
                                { "name": "Address",
                                  "scalar_properties": [ { "name": "Street", "column": "street" } ] }
                              ] }
                          ] }
                      ] }
                  ] }
            ]
        }
    }"#;

    #[test]
    fn mapping_bindings_resolve_through_their_scopes() {
        let artifact = load(MAPPED);
        assert!(artifact.diagnostics().is_empty(), "{:?}", artifact.diagnostics());

        let id = find(&artifact, "Shop/Product/Id", NodeKindTag::Property);
        let street = find(&artifact, "Shop/Address/Street", NodeKindTag::Property);
        let store_street = find(&artifact, "Shop.Store/products/street", NodeKindTag::Property);

        let scalar = find(
            &artifact,
            "ShopContainer/Products/IsTypeOf(Shop.Product)/products/Id",
            NodeKindTag::ScalarProperty,
        );
        match artifact.kind(scalar) {
            Some(NodeKind::ScalarProperty { property, .. }) => assert_eq!(property.known_target(), Some(id)),
            other => panic!("unexpected {:?}", other),
        }

        let nested = find(
            &artifact,
            "ShopContainer/Products/IsTypeOf(Shop.Product)/products/Address/Street",
            NodeKindTag::ScalarProperty,
        );
        match artifact.kind(nested) {
            Some(NodeKind::ScalarProperty { property, column }) => {
                assert_eq!(property.known_target(), Some(street));
                assert_eq!(column.known_target(), Some(store_street));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn undefined_references_become_resolve_errors() {
        let artifact = load(
            r#"{ "conceptual": { "namespace": "Shop",
                 "entity_types": [ { "name": "Product", "base_type": "Shop.Missing" } ],
                 "entity_containers": [ { "name": "C",
                    "entity_sets": [ { "name": "Products", "entity_type": "Shop.Product" } ] } ] } }"#,
        );

        let errors: Vec<_> = artifact
            .diagnostics()
            .iter()
            .filter(|e| e.class() == ErrorClass::RESOLVE_ERROR)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].has_code(DesignerCode::UnresolvedReference));
        assert!(errors[0].message().contains("Shop.Missing"));
    }

    #[test]
    fn undefined_complex_type_is_left_to_runtime() {
        let artifact = load(
            r#"{ "conceptual": { "namespace": "Shop",
                 "entity_types": [ { "name": "Product",
                    "properties": [ { "name": "Address", "type": "Shop.Nowhere" } ] } ] } }"#,
        );

        assert!(artifact.diagnostics().is_empty());
        let address = find(&artifact, "Shop/Product/Address", NodeKindTag::ComplexProperty);
        match artifact.kind(address) {
            Some(NodeKind::ComplexProperty { complex_type, .. }) => {
                assert_eq!(complex_type.status, BindingStatus::Undefined)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn navigation_roles_wait_for_their_relationship() {
        let artifact = load(
            r#"{ "conceptual": { "namespace": "Shop",
                 "entity_types": [ { "name": "Product",
                    "navigation_properties": [ { "name": "Category", "to_role": "Category" } ] } ] } }"#,
        );

        assert!(artifact.diagnostics().is_empty());
        let nav = find(&artifact, "Shop/Product/Category", NodeKindTag::NavigationProperty);
        match artifact.kind(nav) {
            Some(NodeKind::NavigationProperty { relationship, to_role, .. }) => {
                assert!(relationship.is_none());
                assert_eq!(to_role.as_ref().map(|b| b.status), Some(BindingStatus::Unresolved));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
