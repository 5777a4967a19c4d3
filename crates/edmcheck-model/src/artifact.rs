//! Loaded schema graph
//!
//! A `ModelArtifact` is an arena of `ModelObject`s addressed by
//! `ObjectId`. Objects own their children; every other relationship is a
//! named `Binding` resolved at load time. Reverse lookups over bindings
//! live in `AntiDependencyIndex`, never on the objects themselves.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use edmcheck_core::{ErrorInfo, ObjectId, SourcePosition};

use crate::content_validator::{ContentValidatorRegistry, SchemaLayer};
use crate::document::{ArtifactDocument, DocumentError};
use crate::loader::Loader;

/// Resolution state of a named reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingStatus {
    /// Resolved to exactly one object
    Known,
    /// Well-formed, but nothing carries that name
    Undefined,
    /// Not resolved: empty, ambiguous, or not yet bound
    Unresolved,
}

/// Named reference from one object to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub ref_name: String,
    pub status: BindingStatus,
    pub target: Option<ObjectId>,
}

impl Binding {
    /// A reference that has not been bound yet
    pub fn pending(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            status: BindingStatus::Unresolved,
            target: None,
        }
    }

    pub fn known(ref_name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            ref_name: ref_name.into(),
            status: BindingStatus::Known,
            target: Some(target),
        }
    }

    pub fn is_known(&self) -> bool {
        self.status == BindingStatus::Known
    }

    /// Target of a known binding
    pub fn known_target(&self) -> Option<ObjectId> {
        if self.is_known() {
            self.target
        } else {
            None
        }
    }

    pub(crate) fn resolve(&mut self, target: Option<ObjectId>) {
        match target {
            Some(id) => {
                self.status = BindingStatus::Known;
                self.target = Some(id);
            }
            None if self.ref_name.trim().is_empty() => {
                self.status = BindingStatus::Unresolved;
                self.target = None;
            }
            None => {
                self.status = BindingStatus::Undefined;
                self.target = None;
            }
        }
    }
}

/// Conceptual or storage side of a schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSpace {
    Conceptual,
    Storage,
}

impl ModelSpace {
    pub fn layer(self) -> SchemaLayer {
        match self {
            Self::Conceptual => SchemaLayer::Conceptual,
            Self::Storage => SchemaLayer::Storage,
        }
    }
}

/// One entity type named by an entity type mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedType {
    pub binding: Binding,

    /// `IsTypeOf(...)`: the mapping also covers derived types
    pub is_type_of: bool,
}

/// Every kind of schema object, with its kind-specific data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    ConceptualModel {
        namespace: String,
        alias: Option<String>,
        version: u8,
    },
    StorageModel {
        namespace: String,
        alias: Option<String>,
        provider: Option<String>,
        version: u8,
    },
    MappingModel {
        version: u8,
    },
    Using {
        namespace: String,
        alias: Option<String>,
    },
    EntityType {
        space: ModelSpace,
        base_type: Option<Binding>,
        is_abstract: bool,
    },
    /// Key member of an entity type
    PropertyRef {
        property: Binding,
    },
    /// Scalar property; conceptual enum-typed properties bind their enum
    Property {
        space: ModelSpace,
        type_name: String,
        enum_type: Option<Binding>,
        nullable: bool,
        max_length: Option<String>,
        store_generated_pattern: Option<String>,
        concurrency_mode: Option<String>,
    },
    /// Conceptual property typed by a complex type
    ComplexProperty {
        complex_type: Binding,
        nullable: bool,
    },
    NavigationProperty {
        relationship: Option<Binding>,
        from_role: Option<Binding>,
        to_role: Option<Binding>,
    },
    ComplexType,
    EnumType {
        underlying_type: Option<String>,
        is_flags: bool,
    },
    EnumMember {
        value: Option<i64>,
    },
    Association {
        space: ModelSpace,
    },
    AssociationEnd {
        entity_type: Binding,
        multiplicity: String,
        on_delete: Option<String>,
    },
    ReferentialConstraint,
    ReferentialConstraintRole {
        principal: bool,
        role: Binding,
        properties: Vec<Binding>,
    },
    Function {
        space: ModelSpace,
        return_type: Option<String>,
        is_aggregate: bool,
        is_composable: bool,
        command_text: Option<String>,
    },
    FunctionParameter {
        type_name: String,
        mode: Option<String>,
    },
    EntityContainer {
        space: ModelSpace,
    },
    EntitySet {
        entity_type: Binding,
    },
    AssociationSet {
        association: Binding,
    },
    AssociationSetEnd {
        role: Binding,
        entity_set: Binding,
    },
    EntityContainerMapping {
        storage_container: Binding,
        conceptual_container: Binding,
    },
    EntitySetMapping {
        entity_set: Binding,
        query_view: Option<String>,
    },
    EntityTypeMapping {
        types: Vec<MappedType>,
    },
    MappingFragment {
        store_entity_set: Binding,
    },
    ScalarProperty {
        property: Binding,
        column: Binding,
    },
    ComplexPropertyMapping {
        property: Binding,
        complex_type: Option<Binding>,
    },
    Condition {
        property: Option<Binding>,
        column: Option<Binding>,
        value: Option<String>,
        is_null: Option<bool>,
    },
    AssociationSetMapping {
        association_set: Binding,
        association: Binding,
        store_entity_set: Binding,
        query_view: Option<String>,
    },
    EndProperty {
        end: Binding,
    },
    ModificationFunctionMapping {
        functions: Vec<Binding>,
    },
}

/// Data-free discriminant of `NodeKind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKindTag {
    ConceptualModel,
    StorageModel,
    MappingModel,
    Using,
    EntityType,
    PropertyRef,
    Property,
    ComplexProperty,
    NavigationProperty,
    ComplexType,
    EnumType,
    EnumMember,
    Association,
    AssociationEnd,
    ReferentialConstraint,
    ReferentialConstraintRole,
    Function,
    FunctionParameter,
    EntityContainer,
    EntitySet,
    AssociationSet,
    AssociationSetEnd,
    EntityContainerMapping,
    EntitySetMapping,
    EntityTypeMapping,
    MappingFragment,
    ScalarProperty,
    ComplexPropertyMapping,
    Condition,
    AssociationSetMapping,
    EndProperty,
    ModificationFunctionMapping,
}

impl NodeKindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConceptualModel => "ConceptualModel",
            Self::StorageModel => "StorageModel",
            Self::MappingModel => "MappingModel",
            Self::Using => "Using",
            Self::EntityType => "EntityType",
            Self::PropertyRef => "PropertyRef",
            Self::Property => "Property",
            Self::ComplexProperty => "ComplexProperty",
            Self::NavigationProperty => "NavigationProperty",
            Self::ComplexType => "ComplexType",
            Self::EnumType => "EnumType",
            Self::EnumMember => "EnumMember",
            Self::Association => "Association",
            Self::AssociationEnd => "AssociationEnd",
            Self::ReferentialConstraint => "ReferentialConstraint",
            Self::ReferentialConstraintRole => "ReferentialConstraintRole",
            Self::Function => "Function",
            Self::FunctionParameter => "FunctionParameter",
            Self::EntityContainer => "EntityContainer",
            Self::EntitySet => "EntitySet",
            Self::AssociationSet => "AssociationSet",
            Self::AssociationSetEnd => "AssociationSetEnd",
            Self::EntityContainerMapping => "EntityContainerMapping",
            Self::EntitySetMapping => "EntitySetMapping",
            Self::EntityTypeMapping => "EntityTypeMapping",
            Self::MappingFragment => "MappingFragment",
            Self::ScalarProperty => "ScalarProperty",
            Self::ComplexPropertyMapping => "ComplexPropertyMapping",
            Self::Condition => "Condition",
            Self::AssociationSetMapping => "AssociationSetMapping",
            Self::EndProperty => "EndProperty",
            Self::ModificationFunctionMapping => "ModificationFunctionMapping",
        }
    }
}

impl std::fmt::Display for NodeKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            Self::ConceptualModel { .. } => NodeKindTag::ConceptualModel,
            Self::StorageModel { .. } => NodeKindTag::StorageModel,
            Self::MappingModel { .. } => NodeKindTag::MappingModel,
            Self::Using { .. } => NodeKindTag::Using,
            Self::EntityType { .. } => NodeKindTag::EntityType,
            Self::PropertyRef { .. } => NodeKindTag::PropertyRef,
            Self::Property { .. } => NodeKindTag::Property,
            Self::ComplexProperty { .. } => NodeKindTag::ComplexProperty,
            Self::NavigationProperty { .. } => NodeKindTag::NavigationProperty,
            Self::ComplexType => NodeKindTag::ComplexType,
            Self::EnumType { .. } => NodeKindTag::EnumType,
            Self::EnumMember { .. } => NodeKindTag::EnumMember,
            Self::Association { .. } => NodeKindTag::Association,
            Self::AssociationEnd { .. } => NodeKindTag::AssociationEnd,
            Self::ReferentialConstraint => NodeKindTag::ReferentialConstraint,
            Self::ReferentialConstraintRole { .. } => NodeKindTag::ReferentialConstraintRole,
            Self::Function { .. } => NodeKindTag::Function,
            Self::FunctionParameter { .. } => NodeKindTag::FunctionParameter,
            Self::EntityContainer { .. } => NodeKindTag::EntityContainer,
            Self::EntitySet { .. } => NodeKindTag::EntitySet,
            Self::AssociationSet { .. } => NodeKindTag::AssociationSet,
            Self::AssociationSetEnd { .. } => NodeKindTag::AssociationSetEnd,
            Self::EntityContainerMapping { .. } => NodeKindTag::EntityContainerMapping,
            Self::EntitySetMapping { .. } => NodeKindTag::EntitySetMapping,
            Self::EntityTypeMapping { .. } => NodeKindTag::EntityTypeMapping,
            Self::MappingFragment { .. } => NodeKindTag::MappingFragment,
            Self::ScalarProperty { .. } => NodeKindTag::ScalarProperty,
            Self::ComplexPropertyMapping { .. } => NodeKindTag::ComplexPropertyMapping,
            Self::Condition { .. } => NodeKindTag::Condition,
            Self::AssociationSetMapping { .. } => NodeKindTag::AssociationSetMapping,
            Self::EndProperty { .. } => NodeKindTag::EndProperty,
            Self::ModificationFunctionMapping { .. } => NodeKindTag::ModificationFunctionMapping,
        }
    }

    /// Every binding held by this object
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut out = Vec::new();
        match self {
            Self::EntityType { base_type, .. } => out.extend(base_type.as_ref()),
            Self::PropertyRef { property } => out.push(property),
            Self::Property { enum_type, .. } => out.extend(enum_type.as_ref()),
            Self::ComplexProperty { complex_type, .. } => out.push(complex_type),
            Self::NavigationProperty {
                relationship,
                from_role,
                to_role,
            } => {
                out.extend(relationship.as_ref());
                out.extend(from_role.as_ref());
                out.extend(to_role.as_ref());
            }
            Self::AssociationEnd { entity_type, .. } => out.push(entity_type),
            Self::ReferentialConstraintRole { role, properties, .. } => {
                out.push(role);
                out.extend(properties.iter());
            }
            Self::EntitySet { entity_type } => out.push(entity_type),
            Self::AssociationSet { association } => out.push(association),
            Self::AssociationSetEnd { role, entity_set } => {
                out.push(role);
                out.push(entity_set);
            }
            Self::EntityContainerMapping {
                storage_container,
                conceptual_container,
            } => {
                out.push(storage_container);
                out.push(conceptual_container);
            }
            Self::EntitySetMapping { entity_set, .. } => out.push(entity_set),
            Self::EntityTypeMapping { types } => out.extend(types.iter().map(|t| &t.binding)),
            Self::MappingFragment { store_entity_set } => out.push(store_entity_set),
            Self::ScalarProperty { property, column } => {
                out.push(property);
                out.push(column);
            }
            Self::ComplexPropertyMapping {
                property,
                complex_type,
            } => {
                out.push(property);
                out.extend(complex_type.as_ref());
            }
            Self::Condition { property, column, .. } => {
                out.extend(property.as_ref());
                out.extend(column.as_ref());
            }
            Self::AssociationSetMapping {
                association_set,
                association,
                store_entity_set,
                ..
            } => {
                out.push(association_set);
                out.push(association);
                out.push(store_entity_set);
            }
            Self::EndProperty { end } => out.push(end),
            Self::ModificationFunctionMapping { functions } => out.extend(functions.iter()),
            Self::ConceptualModel { .. }
            | Self::StorageModel { .. }
            | Self::MappingModel { .. }
            | Self::Using { .. }
            | Self::ComplexType
            | Self::EnumType { .. }
            | Self::EnumMember { .. }
            | Self::Association { .. }
            | Self::ReferentialConstraint
            | Self::Function { .. }
            | Self::FunctionParameter { .. }
            | Self::EntityContainer { .. } => {}
        }
        out
    }

    /// Bindings that name a type (qualified names in the schema layers)
    pub fn type_references(&self) -> Vec<&Binding> {
        match self {
            Self::EntityType { base_type, .. } => base_type.iter().collect(),
            Self::Property { enum_type, .. } => enum_type.iter().collect(),
            Self::ComplexProperty { complex_type, .. } => vec![complex_type],
            Self::NavigationProperty { relationship, .. } => relationship.iter().collect(),
            Self::AssociationEnd { entity_type, .. } => vec![entity_type],
            Self::EntitySet { entity_type } => vec![entity_type],
            Self::AssociationSet { association } => vec![association],
            _ => Vec::new(),
        }
    }
}

/// One object of the schema graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelObject {
    pub parent: Option<ObjectId>,

    /// Local name; empty for unnamed objects
    pub name: String,

    pub position: Option<SourcePosition>,

    pub kind: NodeKind,

    pub children: Vec<ObjectId>,
}

impl ModelObject {
    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }
}

/// A loaded artifact: schema graph plus loader diagnostics
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub(crate) path: Option<PathBuf>,
    pub(crate) source: Option<String>,
    pub(crate) version: u8,
    pub(crate) objects: Vec<ModelObject>,
    pub(crate) conceptual_root: Option<ObjectId>,
    pub(crate) storage_root: Option<ObjectId>,
    pub(crate) mapping_root: Option<ObjectId>,
    pub(crate) diagnostics: Vec<ErrorInfo>,
}

impl ModelArtifact {
    /// Load and bind an artifact file
    pub fn load(path: &Path, registry: &mut ContentValidatorRegistry) -> Result<Self, DocumentError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DocumentError::IoError(path.display().to_string(), e.to_string()))?;

        let mut artifact = Self::from_json(&contents, registry)?;
        artifact.path = Some(path.to_path_buf());
        Ok(artifact)
    }

    /// Parse and bind an artifact from a JSON string
    pub fn from_json(json: &str, registry: &mut ContentValidatorRegistry) -> Result<Self, DocumentError> {
        let document = ArtifactDocument::from_str(json)?;
        let mut artifact = Self::from_document(&document, registry);
        artifact.source = Some(json.to_string());
        Ok(artifact)
    }

    pub fn from_document(document: &ArtifactDocument, registry: &mut ContentValidatorRegistry) -> Self {
        Loader::new(registry).load(document)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw JSON the artifact was loaded from
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Top-level schema version of the artifact
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Loader diagnostics (parse and resolve errors)
    pub fn diagnostics(&self) -> &[ErrorInfo] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, id: ObjectId) -> Option<&ModelObject> {
        self.objects.get(id.index())
    }

    pub fn kind(&self, id: ObjectId) -> Option<&NodeKind> {
        self.object(id).map(|o| &o.kind)
    }

    pub fn tag(&self, id: ObjectId) -> Option<NodeKindTag> {
        self.object(id).map(|o| o.tag())
    }

    pub fn name(&self, id: ObjectId) -> &str {
        self.object(id).map(|o| o.name.as_str()).unwrap_or("")
    }

    /// All objects in document order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &ModelObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(index, object)| (ObjectId(index as u32), object))
    }

    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.object(id).map(|o| o.children.as_slice()).unwrap_or(&[])
    }

    pub fn children_of_kind(&self, id: ObjectId, tag: NodeKindTag) -> Vec<ObjectId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.tag(*child) == Some(tag))
            .collect()
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.object(id).and_then(|o| o.parent)
    }

    /// Nearest ancestor (or the object itself) of the given kind
    pub fn parent_of_kind(&self, id: ObjectId, tag: NodeKindTag) -> Option<ObjectId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.tag(node) == Some(tag) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Layer root the object belongs to
    pub fn root_of(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        self.object(current).map(|_| current)
    }

    pub fn layer_of(&self, id: ObjectId) -> Option<SchemaLayer> {
        match self.tag(self.root_of(id)?)? {
            NodeKindTag::ConceptualModel => Some(SchemaLayer::Conceptual),
            NodeKindTag::StorageModel => Some(SchemaLayer::Storage),
            NodeKindTag::MappingModel => Some(SchemaLayer::Mapping),
            _ => None,
        }
    }

    /// Names from the root down, e.g. `Shop/Product/Id`
    pub fn path_of(&self, id: ObjectId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(object) = self.object(node) {
                if !object.name.is_empty() {
                    names.push(object.name.as_str());
                }
                current = object.parent;
            } else {
                break;
            }
        }
        names.reverse();
        names.join("/")
    }

    /// Namespace-qualified name of a top-level schema type
    pub fn full_name(&self, id: ObjectId) -> String {
        match self.root_of(id).and_then(|root| self.kind(root)) {
            Some(NodeKind::ConceptualModel { namespace, .. })
            | Some(NodeKind::StorageModel { namespace, .. }) => {
                format!("{}.{}", namespace, self.name(id))
            }
            _ => self.name(id).to_string(),
        }
    }

    pub fn position(&self, id: ObjectId) -> Option<SourcePosition> {
        self.object(id).and_then(|o| o.position)
    }

    /// Object closest to a source position
    ///
    /// Returns the object whose start position is the latest one at or
    /// before `(line, column)`; among equal starts the deepest object wins.
    pub fn find_object_for_line_and_column(&self, line: u32, column: u32) -> Option<ObjectId> {
        let target = SourcePosition::new(line, column);
        let mut best: Option<(SourcePosition, ObjectId)> = None;

        for (id, object) in self.objects() {
            let Some(position) = object.position else {
                continue;
            };
            if position > target {
                continue;
            }
            match best {
                Some((best_position, _)) if position < best_position => {}
                _ => best = Some((position, id)),
            }
        }

        best.map(|(_, id)| id)
    }

    pub fn conceptual_root(&self) -> Option<ObjectId> {
        self.conceptual_root
    }

    pub fn storage_root(&self) -> Option<ObjectId> {
        self.storage_root
    }

    pub fn mapping_root(&self) -> Option<ObjectId> {
        self.mapping_root
    }

    /// Schema version of a layer, if the layer exists
    pub fn layer_version(&self, layer: SchemaLayer) -> Option<u8> {
        let root = match layer {
            SchemaLayer::Conceptual => self.conceptual_root,
            SchemaLayer::Storage => self.storage_root,
            SchemaLayer::Mapping => self.mapping_root,
        }?;

        match self.kind(root)? {
            NodeKind::ConceptualModel { version, .. }
            | NodeKind::StorageModel { version, .. }
            | NodeKind::MappingModel { version } => Some(*version),
            _ => None,
        }
    }

    /// No storage layer, or a storage layer without entity containers
    pub fn is_storage_model_empty(&self) -> bool {
        match self.storage_root {
            Some(root) => self.children_of_kind(root, NodeKindTag::EntityContainer).is_empty(),
            None => true,
        }
    }

    /// Base type of an entity type, if bound
    pub fn base_type_of(&self, entity_type: ObjectId) -> Option<ObjectId> {
        match self.kind(entity_type)? {
            NodeKind::EntityType { base_type, .. } => base_type.as_ref()?.known_target(),
            _ => None,
        }
    }

    /// Topmost type of an inheritance chain; stops at a cycle
    pub fn root_type_of(&self, entity_type: ObjectId) -> ObjectId {
        let mut visited = HashSet::new();
        let mut current = entity_type;
        visited.insert(current);

        while let Some(base) = self.base_type_of(current) {
            if !visited.insert(base) {
                break;
            }
            current = base;
        }
        current
    }

    /// The type followed by its base types; stops at a cycle
    pub fn type_hierarchy(&self, entity_type: ObjectId) -> Vec<ObjectId> {
        let mut chain = vec![entity_type];
        let mut visited: HashSet<ObjectId> = chain.iter().copied().collect();
        let mut current = entity_type;

        while let Some(base) = self.base_type_of(current) {
            if !visited.insert(base) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Whether `entity_type` is `ancestor` or derives from it
    pub fn is_same_or_sub_type(&self, entity_type: ObjectId, ancestor: ObjectId) -> bool {
        self.type_hierarchy(entity_type).contains(&ancestor)
    }

    /// Key property objects of an entity type (taken from its root type)
    pub fn key_properties_of(&self, entity_type: ObjectId) -> Vec<ObjectId> {
        let root = self.root_type_of(entity_type);
        self.children_of_kind(root, NodeKindTag::PropertyRef)
            .into_iter()
            .filter_map(|key| match self.kind(key) {
                Some(NodeKind::PropertyRef { property }) => property.known_target(),
                _ => None,
            })
            .collect()
    }

    /// First conceptual entity type an entity type mapping binds to
    pub fn first_bound_conceptual_entity_type(&self, entity_type_mapping: ObjectId) -> Option<ObjectId> {
        match self.kind(entity_type_mapping)? {
            NodeKind::EntityTypeMapping { types } => {
                types.iter().find_map(|t| t.binding.known_target())
            }
            _ => None,
        }
    }

    /// Entity type a set is declared over
    pub fn element_type_of(&self, entity_set: ObjectId) -> Option<ObjectId> {
        match self.kind(entity_set)? {
            NodeKind::EntitySet { entity_type } => entity_type.known_target(),
            _ => None,
        }
    }

    /// Entity sets holding instances of an entity type
    ///
    /// Derived types live in the sets of their root type.
    pub fn entity_sets_of(&self, entity_type: ObjectId) -> Vec<ObjectId> {
        let root = self.root_type_of(entity_type);
        self.objects()
            .filter(|(_, object)| object.tag() == NodeKindTag::EntitySet)
            .map(|(id, _)| id)
            .filter(|set| self.element_type_of(*set) == Some(root))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn load(json: &str) -> ModelArtifact {
        let mut registry = ContentValidatorRegistry::new();
        ModelArtifact::from_json(json, &mut registry).unwrap()
    }

    /// Key references share their property's path, so they are skipped
    fn find(artifact: &ModelArtifact, path: &str) -> ObjectId {
        artifact
            .objects()
            .map(|(id, _)| id)
            .find(|id| artifact.path_of(*id) == path && artifact.tag(*id) != Some(NodeKindTag::PropertyRef))
            .unwrap()
    }

    const SHOP: &str = r#"{
        "conceptual": {
            "namespace": "Shop", "alias": "Self", "line": 2, "column": 5,
            "entity_types": [
                { "name": "Item", "key": ["Id"], "line": 3, "column": 9,
                  "properties": [ { "name": "Id", "type": "Int32", "line": 4, "column": 13 } ] },
                { "name": "Product", "base_type": "Self.Item", "line": 6, "column": 9,
                  "properties": [ { "name": "Title", "type": "String", "line": 7, "column": 13 } ] }
            ],
            "entity_containers": [
                { "name": "ShopContainer", "line": 10, "column": 9,
                  "entity_sets": [ { "name": "Items", "entity_type": "Shop.Item", "line": 11, "column": 13 } ] }
            ]
        }
    }"#;

    #[test]
    fn paths_and_hierarchy() {
        let artifact = load(SHOP);
        let item = find(&artifact, "Shop/Item");
        let product = find(&artifact, "Shop/Product");
        let id = find(&artifact, "Shop/Item/Id");

        assert_eq!(artifact.full_name(product), "Shop.Product");
        assert_eq!(artifact.base_type_of(product), Some(item));
        assert_eq!(artifact.root_type_of(product), item);
        assert_eq!(artifact.type_hierarchy(product), vec![product, item]);
        assert!(artifact.is_same_or_sub_type(product, item));
        assert!(!artifact.is_same_or_sub_type(item, product));
        assert_eq!(artifact.key_properties_of(product), vec![id]);
        assert_eq!(artifact.entity_sets_of(product), vec![find(&artifact, "Shop/ShopContainer/Items")]);
        assert_eq!(artifact.parent_of_kind(id, NodeKindTag::ConceptualModel), artifact.conceptual_root());
        assert_eq!(artifact.layer_of(id), Some(SchemaLayer::Conceptual));
    }

    #[test]
    fn line_and_column_lookup() {
        let artifact = load(SHOP);

        assert_eq!(artifact.find_object_for_line_and_column(4, 20), Some(find(&artifact, "Shop/Item/Id")));
        assert_eq!(artifact.find_object_for_line_and_column(6, 9), Some(find(&artifact, "Shop/Product")));
        assert_eq!(
            artifact.find_object_for_line_and_column(12, 1),
            Some(find(&artifact, "Shop/ShopContainer/Items"))
        );
        assert_eq!(artifact.find_object_for_line_and_column(1, 1), None);
    }

    #[test]
    fn storage_model_emptiness() {
        let artifact = load(SHOP);
        assert!(artifact.storage_root().is_none());
        assert!(artifact.is_storage_model_empty());

        let artifact = load(r#"{ "storage": { "namespace": "Shop.Store" } }"#);
        assert!(artifact.storage_root().is_some());
        assert!(artifact.is_storage_model_empty());

        let artifact = load(
            r#"{ "storage": { "namespace": "Shop.Store", "entity_containers": [ { "name": "Db" } ] } }"#,
        );
        assert!(!artifact.is_storage_model_empty());
    }

    #[test]
    fn binding_resolution_states() {
        let mut binding = Binding::pending("Shop.Missing");
        binding.resolve(None);
        assert_eq!(binding.status, BindingStatus::Undefined);

        let mut empty = Binding::pending("");
        empty.resolve(None);
        assert_eq!(empty.status, BindingStatus::Unresolved);

        let mut known = Binding::pending("Shop.Item");
        known.resolve(Some(ObjectId(3)));
        assert_eq!(known.known_target(), Some(ObjectId(3)));
    }
}
