//! Compiles a conceptual or storage layer into an item collection
//!
//! Nominal types are built on demand and memoized by object, so base types
//! and complex property types are always complete before their users. An
//! object that failed to compile is memoized as `None`; anything built on
//! top of it fails silently, since the root cause has been reported.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use edmcheck_core::SchemaErrorCode as S;
use edmcheck_core::{
    AssociationSetDef, AssociationType, ComplexTypeDef, DataSpace, EdmFunction, EdmProperty, EdmType,
    EntityContainerDef, EntitySetDef, EntityTypeDef, EnumTypeDef, Facets, FunctionParameter, ItemCollection,
    NavigationPropertyDef, ObjectId, ParameterMode, PrimitiveTypeKind, ReferentialConstraintDef,
    RelationshipEndMember, RelationshipMultiplicity, TypeUsage,
};
use edmcheck_model::{Binding, ModelArtifact, ModelSpace, NodeKind, NodeKindTag};

use crate::compiler::{object_position, Compilation, RuntimeError};

/// Primitive kind of a store type name, ignoring any `(size)` suffix
pub fn store_type_kind(name: &str) -> Option<PrimitiveTypeKind> {
    use PrimitiveTypeKind as P;

    let base = name.split('(').next().unwrap_or(name).trim().to_ascii_lowercase();
    let kind = match base.as_str() {
        "bit" => P::Boolean,
        "tinyint" => P::Byte,
        "smallint" => P::Int16,
        "int" => P::Int32,
        "bigint" => P::Int64,
        "real" => P::Single,
        "float" => P::Double,
        "decimal" | "numeric" | "money" | "smallmoney" => P::Decimal,
        "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" | "xml" => P::String,
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => P::Binary,
        "date" | "datetime" | "datetime2" | "smalldatetime" => P::DateTime,
        "time" => P::Time,
        "datetimeoffset" => P::DateTimeOffset,
        "uniqueidentifier" => P::Guid,
        _ => return None,
    };
    Some(kind)
}

fn enum_range(kind: PrimitiveTypeKind) -> Option<(i128, i128)> {
    match kind {
        PrimitiveTypeKind::Byte => Some((0, u8::MAX as i128)),
        PrimitiveTypeKind::SByte => Some((i8::MIN as i128, i8::MAX as i128)),
        PrimitiveTypeKind::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
        PrimitiveTypeKind::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
        PrimitiveTypeKind::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
        _ => None,
    }
}

fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        })
}

pub(crate) struct SchemaCompiler<'a> {
    artifact: &'a ModelArtifact,
    root: ObjectId,
    space: ModelSpace,
    data_space: DataSpace,
    namespace: String,
    alias: Option<String>,
    version: u8,
    errors: Vec<RuntimeError>,
    enum_types: HashMap<ObjectId, Option<Arc<EnumTypeDef>>>,
    complex_types: HashMap<ObjectId, Option<Arc<ComplexTypeDef>>>,
    entity_types: HashMap<ObjectId, Option<Arc<EntityTypeDef>>>,
    associations: HashMap<ObjectId, Option<Arc<AssociationType>>>,
    in_progress: HashSet<ObjectId>,
}

impl<'a> SchemaCompiler<'a> {
    pub(crate) fn compile(artifact: &'a ModelArtifact, space: ModelSpace) -> Compilation<ItemCollection> {
        let root = match space {
            ModelSpace::Conceptual => artifact.conceptual_root(),
            ModelSpace::Storage => artifact.storage_root(),
        };
        let Some(root) = root else {
            return Compilation::failed(vec![RuntimeError::error(
                S::MissingSchemaXml.code(),
                format!("The artifact has no {} schema", layer_name(space)),
            )]);
        };

        let (namespace, alias, version, data_space) = match artifact.kind(root) {
            Some(NodeKind::ConceptualModel { namespace, alias, version }) => {
                (namespace.clone(), alias.clone(), *version, DataSpace::CSpace)
            }
            Some(NodeKind::StorageModel { namespace, alias, version, .. }) => {
                (namespace.clone(), alias.clone(), *version, DataSpace::SSpace)
            }
            _ => {
                return Compilation::failed(vec![RuntimeError::error(
                    S::InternalError.code(),
                    format!("The {} schema root is malformed", layer_name(space)),
                )])
            }
        };

        let compiler = SchemaCompiler {
            artifact,
            root,
            space,
            data_space,
            namespace,
            alias,
            version,
            errors: Vec::new(),
            enum_types: HashMap::new(),
            complex_types: HashMap::new(),
            entity_types: HashMap::new(),
            associations: HashMap::new(),
            in_progress: HashSet::new(),
        };
        compiler.run()
    }

    fn run(mut self) -> Compilation<ItemCollection> {
        let artifact = self.artifact;
        self.check_namespace();
        self.check_duplicate_names();

        let root = self.root;
        let of_kind = |tag: NodeKindTag| artifact.children_of_kind(root, tag);

        for id in of_kind(NodeKindTag::EnumType) {
            self.enum_type(id);
        }
        for id in of_kind(NodeKindTag::ComplexType) {
            self.complex_type(id);
        }
        for id in of_kind(NodeKindTag::EntityType) {
            self.entity_type(id);
        }
        for id in of_kind(NodeKindTag::Association) {
            self.association(id);
        }
        for id in of_kind(NodeKindTag::EntityType) {
            self.check_navigation_properties(id);
        }

        let mut items = ItemCollection::new(self.data_space, self.version);
        for id in of_kind(NodeKindTag::EnumType) {
            if let Some(Some(enum_type)) = self.enum_types.get(&id) {
                items.add_enum_type(enum_type.clone());
            }
        }
        for id in of_kind(NodeKindTag::ComplexType) {
            if let Some(Some(complex_type)) = self.complex_types.get(&id) {
                items.add_complex_type(complex_type.clone());
            }
        }
        for id in of_kind(NodeKindTag::EntityType) {
            if let Some(Some(entity_type)) = self.entity_types.get(&id) {
                items.add_entity_type(entity_type.clone());
            }
        }
        for id in of_kind(NodeKindTag::Association) {
            if let Some(Some(association)) = self.associations.get(&id) {
                items.add_association(association.clone());
            }
        }
        for id in of_kind(NodeKindTag::Function) {
            if let Some(function) = self.function(id) {
                items.add_function(Arc::new(function));
            }
        }
        for id in of_kind(NodeKindTag::EntityContainer) {
            let container = self.container(id);
            items.add_container(container);
        }

        tracing::debug!(
            layer = layer_name(self.space),
            items = items.len(),
            errors = self.errors.len(),
            "Compiled schema layer"
        );

        Compilation::new(items, self.errors)
    }

    fn report(&mut self, code: i32, id: ObjectId, message: impl Into<String>) {
        let position = object_position(self.artifact, id);
        self.errors.push(RuntimeError::error(code, message).at(position));
    }

    /// Full name of a possibly alias-qualified or unqualified type name
    fn qualify(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((prefix, local)) if self.alias.as_deref() == Some(prefix) => {
                format!("{}.{}", self.namespace, local)
            }
            Some(_) => name.to_string(),
            None => format!("{}.{}", self.namespace, name),
        }
    }

    fn check_namespace(&mut self) {
        if !is_valid_namespace(&self.namespace) {
            let message = format!("The namespace '{}' is not a valid namespace name", self.namespace);
            self.report(S::InvalidNamespaceName.code(), self.root, message);
        } else if self.space == ModelSpace::Conceptual && matches!(self.namespace.as_str(), "Edm" | "System") {
            let message = format!("The namespace '{}' is reserved", self.namespace);
            self.report(S::SystemNamespace.code(), self.root, message);
        }
    }

    /// Types and containers share one name scope; functions may overload
    fn check_duplicate_names(&mut self) {
        let artifact = self.artifact;
        let mut seen = HashSet::new();
        for &id in artifact.children(self.root) {
            let scoped = matches!(
                artifact.tag(id),
                Some(NodeKindTag::EntityType)
                    | Some(NodeKindTag::ComplexType)
                    | Some(NodeKindTag::EnumType)
                    | Some(NodeKindTag::Association)
                    | Some(NodeKindTag::EntityContainer)
            );
            if scoped && !seen.insert(artifact.name(id)) {
                let message = format!(
                    "The name '{}' is already defined in namespace '{}'",
                    artifact.name(id),
                    self.namespace
                );
                self.report(S::AlreadyDefined.code(), id, message);
            }
        }
    }

    fn enum_type(&mut self, id: ObjectId) -> Option<Arc<EnumTypeDef>> {
        if let Some(done) = self.enum_types.get(&id) {
            return done.clone();
        }
        let artifact = self.artifact;
        let Some(NodeKind::EnumType { underlying_type, is_flags }) = artifact.kind(id) else {
            return None;
        };

        let underlying = match underlying_type {
            None => Some(PrimitiveTypeKind::Int32),
            Some(name) => PrimitiveTypeKind::from_name(name).filter(|kind| enum_range(*kind).is_some()),
        };
        let Some(underlying) = underlying else {
            let message = format!(
                "The underlying type '{}' of enum type '{}' must be Byte, SByte, Int16, Int32 or Int64",
                underlying_type.as_deref().unwrap_or_default(),
                artifact.name(id)
            );
            self.report(S::InvalidEnumUnderlyingType.code(), id, message);
            self.enum_types.insert(id, None);
            return None;
        };
        let (min, max) = enum_range(underlying).unwrap_or((i64::MIN as i128, i64::MAX as i128));

        let mut failed = false;
        let mut names = HashSet::new();
        let mut members = Vec::new();
        let mut next: i128 = 0;
        for member in artifact.children_of_kind(id, NodeKindTag::EnumMember) {
            let Some(NodeKind::EnumMember { value }) = artifact.kind(member) else {
                continue;
            };
            let name = artifact.name(member);
            if !names.insert(name) {
                let message = format!("The enum type '{}' already has a member '{}'", artifact.name(id), name);
                self.report(S::DuplicateEnumMember.code(), member, message);
                failed = true;
                continue;
            }

            let current = match value {
                Some(explicit) => {
                    let explicit = *explicit as i128;
                    if explicit < min || explicit > max {
                        let message = format!(
                            "The value of member '{}' is outside the range of the underlying type '{}'",
                            name, underlying
                        );
                        self.report(S::EnumMemberValueOutOfItsUnderylingTypeRange.code(), member, message);
                        failed = true;
                    }
                    explicit
                }
                None => {
                    if next > max {
                        let message = format!(
                            "The calculated value of member '{}' is outside the range of the underlying type '{}'",
                            name, underlying
                        );
                        self.report(S::CalculatedEnumValueOutOfRange.code(), member, message);
                        failed = true;
                    }
                    next
                }
            };
            members.push((name.to_string(), current as i64));
            next = current + 1;
        }

        let result = (!failed).then(|| {
            Arc::new(EnumTypeDef {
                name: artifact.name(id).to_string(),
                namespace: self.namespace.clone(),
                space: self.data_space,
                underlying_type: underlying,
                is_flags: *is_flags,
                members,
            })
        });
        self.enum_types.insert(id, result.clone());
        result
    }

    fn complex_type(&mut self, id: ObjectId) -> Option<Arc<ComplexTypeDef>> {
        if let Some(done) = self.complex_types.get(&id) {
            return done.clone();
        }
        let artifact = self.artifact;
        let full_name = artifact.full_name(id);
        if !self.in_progress.insert(id) {
            let message = format!("The complex type '{}' is defined in terms of itself", full_name);
            self.report(S::CircularlyDefinedType.code(), id, message);
            self.complex_types.insert(id, None);
            return None;
        }

        let mut definition = ComplexTypeDef::new(&self.namespace, artifact.name(id), self.data_space);
        let mut failed = false;
        let mut names = HashSet::new();
        for &member in artifact.children(id) {
            if !matches!(
                artifact.tag(member),
                Some(NodeKindTag::Property) | Some(NodeKindTag::ComplexProperty)
            ) {
                continue;
            }
            if !names.insert(artifact.name(member)) {
                let message = format!("The member '{}' is already defined in '{}'", artifact.name(member), full_name);
                self.report(S::AlreadyDefined.code(), member, message);
                failed = true;
                continue;
            }
            match self.property(member, &full_name) {
                Some(property) => definition.properties.push(property),
                None => failed = true,
            }
        }

        self.in_progress.remove(&id);
        let result = (!failed).then(|| Arc::new(definition));
        self.complex_types.entry(id).or_insert(result).clone()
    }

    fn entity_type(&mut self, id: ObjectId) -> Option<Arc<EntityTypeDef>> {
        if let Some(done) = self.entity_types.get(&id) {
            return done.clone();
        }
        let artifact = self.artifact;
        let Some(NodeKind::EntityType { base_type, is_abstract, .. }) = artifact.kind(id) else {
            return None;
        };
        let full_name = artifact.full_name(id);
        if !self.in_progress.insert(id) {
            let message = format!("The type hierarchy of entity type '{}' is circular", full_name);
            self.report(S::CycleInTypeHierarchy.code(), id, message);
            self.entity_types.insert(id, None);
            return None;
        }

        let mut failed = false;
        let base = match base_type {
            None => None,
            Some(binding) => match binding.known_target() {
                Some(target) if artifact.tag(target) == Some(NodeKindTag::EntityType) => {
                    let base = self.entity_type(target);
                    failed |= base.is_none();
                    base
                }
                _ => {
                    let message = format!(
                        "The base type '{}' of entity type '{}' is not defined",
                        binding.ref_name, full_name
                    );
                    self.report(S::InvalidBaseType.code(), id, message);
                    failed = true;
                    None
                }
            },
        };

        let mut definition = EntityTypeDef::new(&self.namespace, artifact.name(id), self.data_space);
        definition.base_type = base.clone();
        definition.is_abstract = *is_abstract;

        let mut names: HashSet<String> = base
            .as_ref()
            .map(|base| base.all_properties().iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default();
        for &member in artifact.children(id) {
            let tag = artifact.tag(member);
            if !matches!(
                tag,
                Some(NodeKindTag::Property) | Some(NodeKindTag::ComplexProperty) | Some(NodeKindTag::NavigationProperty)
            ) {
                continue;
            }
            if !names.insert(artifact.name(member).to_string()) {
                let message = format!("The member '{}' is already defined in '{}'", artifact.name(member), full_name);
                self.report(S::AlreadyDefined.code(), member, message);
                failed = true;
                continue;
            }

            if let Some(NodeKind::NavigationProperty {
                relationship,
                from_role,
                to_role,
            }) = artifact.kind(member)
            {
                definition.navigation_properties.push(NavigationPropertyDef {
                    name: artifact.name(member).to_string(),
                    relationship: ref_name(relationship),
                    from_end: ref_name(from_role),
                    to_end: ref_name(to_role),
                });
                continue;
            }

            match self.property(member, &full_name) {
                Some(property) => definition.properties.push(property),
                None => failed = true,
            }
        }

        failed |= !self.check_keys(id, &full_name, base_type.is_some(), &mut definition);

        self.in_progress.remove(&id);
        let result = (!failed).then(|| Arc::new(definition));
        self.entity_types.entry(id).or_insert(result).clone()
    }

    /// Keys live on root types only; every key part is a non-nullable scalar
    fn check_keys(&mut self, id: ObjectId, full_name: &str, derived: bool, definition: &mut EntityTypeDef) -> bool {
        let artifact = self.artifact;
        let keys: Vec<&str> = artifact
            .children_of_kind(id, NodeKindTag::PropertyRef)
            .into_iter()
            .map(|key| artifact.name(key))
            .collect();

        if derived {
            if !keys.is_empty() {
                let message = format!("The derived entity type '{}' cannot declare a key", full_name);
                self.report(S::InvalidKey.code(), id, message);
                return false;
            }
            return true;
        }

        if keys.is_empty() {
            let message = format!("The entity type '{}' has no key defined", full_name);
            self.report(S::KeyMissingOnEntityType.code(), id, message);
            return false;
        }

        let mut valid = true;
        let mut seen = HashSet::new();
        for key in keys {
            if !seen.insert(key) {
                let message = format!("The key of '{}' names property '{}' more than once", full_name, key);
                self.report(S::DuplicatePropertySpecifiedInEntityKey.code(), id, message);
                valid = false;
                continue;
            }

            let property = definition.properties.iter().find(|p| p.name == key);
            let problem = match property {
                None => Some((S::InvalidKey, format!("The key part '{}' is not a property of '{}'", key, full_name))),
                Some(p) if p.type_usage.as_complex().is_some() => Some((
                    S::EntityKeyMustBeScalar,
                    format!("The key part '{}' of '{}' must be a scalar property", key, full_name),
                )),
                Some(p) if p.type_usage.is_nullable() => Some((
                    S::InvalidKey,
                    format!("The key part '{}' of '{}' must be non-nullable", key, full_name),
                )),
                Some(_) => None,
            };
            match problem {
                Some((code, message)) => {
                    self.report(code.code(), id, message);
                    valid = false;
                }
                None => definition.key_members.push(key.to_string()),
            }
        }
        valid
    }

    fn property(&mut self, id: ObjectId, declaring_type: &str) -> Option<EdmProperty> {
        let artifact = self.artifact;
        let name = artifact.name(id);
        let usage = match artifact.kind(id)? {
            NodeKind::Property {
                type_name,
                enum_type,
                nullable,
                max_length,
                ..
            } => {
                let edm_type = match enum_type {
                    Some(binding) => match binding.known_target().map(|target| (target, self.enum_types.get(&target))) {
                        Some((_, Some(Some(enum_type)))) => EdmType::Enum(enum_type.clone()),
                        Some((_, Some(None))) => return None,
                        _ => {
                            self.report_undefined_type(id, type_name);
                            return None;
                        }
                    },
                    None => {
                        let kind = match self.space {
                            ModelSpace::Conceptual => PrimitiveTypeKind::from_name(type_name),
                            ModelSpace::Storage => store_type_kind(type_name),
                        };
                        match kind {
                            Some(kind) => EdmType::Primitive(kind),
                            None => {
                                self.report_undefined_type(id, type_name);
                                return None;
                            }
                        }
                    }
                };

                let max_length = match max_length.as_deref() {
                    None => None,
                    Some(raw) => {
                        let sized = matches!(
                            edm_type,
                            EdmType::Primitive(PrimitiveTypeKind::String) | EdmType::Primitive(PrimitiveTypeKind::Binary)
                        );
                        if !sized {
                            let message = format!("The facet 'MaxLength' is not allowed on property '{}'", name);
                            self.report(S::FacetNotAllowedByType.code(), id, message);
                            return None;
                        }
                        if raw.eq_ignore_ascii_case("max") {
                            None
                        } else {
                            match raw.parse::<u32>() {
                                Ok(size) => Some(size),
                                Err(_) => {
                                    let message = format!("'{}' is not a valid size for property '{}'", raw, name);
                                    self.report(S::InvalidSize.code(), id, message);
                                    return None;
                                }
                            }
                        }
                    }
                };

                let facets = Facets {
                    nullable: *nullable,
                    max_length,
                    ..Facets::default()
                };
                TypeUsage::with_facets(edm_type, facets)
            }
            NodeKind::ComplexProperty { complex_type, nullable } => {
                let target = complex_type
                    .known_target()
                    .filter(|target| artifact.tag(*target) == Some(NodeKindTag::ComplexType));
                match target {
                    Some(target) => {
                        let complex = self.complex_type(target)?;
                        TypeUsage::with_facets(
                            EdmType::Complex(complex),
                            Facets {
                                nullable: *nullable,
                                ..Facets::default()
                            },
                        )
                    }
                    None => {
                        self.report_undefined_type(id, &complex_type.ref_name);
                        return None;
                    }
                }
            }
            _ => return None,
        };

        Some(EdmProperty::new(name, usage).declared_by(declaring_type))
    }

    fn report_undefined_type(&mut self, id: ObjectId, type_name: &str) {
        let message = format!(
            "The type '{}' is not defined in namespace '{}' or is not a referenced primitive type",
            type_name, self.namespace
        );
        self.report(S::NotInNamespace.code(), id, message);
    }

    fn association(&mut self, id: ObjectId) -> Option<Arc<AssociationType>> {
        if let Some(done) = self.associations.get(&id) {
            return done.clone();
        }
        let artifact = self.artifact;
        let full_name = artifact.full_name(id);
        let mut association = AssociationType {
            name: artifact.name(id).to_string(),
            namespace: self.namespace.clone(),
            space: self.data_space,
            ends: Vec::new(),
            constraint: None,
        };
        let mut failed = false;

        let ends = artifact.children_of_kind(id, NodeKindTag::AssociationEnd);
        if ends.len() != 2 {
            let message = format!("The association '{}' must have exactly two ends", full_name);
            self.report(S::InvalidAssociation.code(), id, message);
            failed = true;
        }

        let mut roles = HashSet::new();
        for end in ends {
            let Some(NodeKind::AssociationEnd {
                entity_type,
                multiplicity,
                on_delete,
            }) = artifact.kind(end)
            else {
                continue;
            };
            let role = artifact.name(end);
            if !roles.insert(role) {
                let message = format!("The role '{}' is defined twice in association '{}'", role, full_name);
                self.report(S::AlreadyDefined.code(), end, message);
                failed = true;
                continue;
            }

            let end_type = match entity_type.known_target() {
                Some(target) if artifact.tag(target) == Some(NodeKindTag::EntityType) => {
                    self.entity_types.get(&target).cloned().flatten()
                }
                _ => {
                    let message = format!(
                        "The type '{}' of end '{}' in association '{}' is not an entity type",
                        entity_type.ref_name, role, full_name
                    );
                    self.report(S::InvalidRelationshipEndType.code(), end, message);
                    None
                }
            };

            let Some(multiplicity) = RelationshipMultiplicity::from_notation(multiplicity) else {
                let message = format!("The multiplicity '{}' of end '{}' is not valid", multiplicity, role);
                self.report(S::InvalidMultiplicity.code(), end, message);
                failed = true;
                continue;
            };
            if multiplicity == RelationshipMultiplicity::Many
                && on_delete.as_deref().is_some_and(|action| action != "None")
            {
                let message = format!("The end '{}' has multiplicity '*' and cannot specify an OnDelete action", role);
                self.report(S::EndWithManyMultiplicityCannotHaveOperationsSpecified.code(), end, message);
                failed = true;
            }

            match end_type {
                Some(end_type) => association.ends.push(RelationshipEndMember {
                    name: role.to_string(),
                    entity_type: end_type,
                    multiplicity,
                    declaring_relationship: full_name.clone(),
                }),
                None => failed = true,
            }
        }

        if !failed {
            if let Some(constraint) = artifact.children_of_kind(id, NodeKindTag::ReferentialConstraint).first() {
                match self.referential_constraint(*constraint, &association) {
                    Some(constraint) => association.constraint = Some(constraint),
                    None => failed = true,
                }
            }
        }

        let result = (!failed).then(|| Arc::new(association));
        self.associations.insert(id, result.clone());
        result
    }

    /// Errors go on the constraint element itself
    fn referential_constraint(&mut self, id: ObjectId, association: &AssociationType) -> Option<ReferentialConstraintDef> {
        let artifact = self.artifact;
        let mut principal = None;
        let mut dependent = None;
        for role in artifact.children_of_kind(id, NodeKindTag::ReferentialConstraintRole) {
            if let Some(NodeKind::ReferentialConstraintRole {
                principal: is_principal,
                role,
                properties,
            }) = artifact.kind(role)
            {
                let names: Vec<String> = properties.iter().map(|p| p.ref_name.clone()).collect();
                if *is_principal {
                    principal = Some((role.ref_name.clone(), names));
                } else {
                    dependent = Some((role.ref_name.clone(), names));
                }
            }
        }

        let (Some((principal_role, principal_properties)), Some((dependent_role, dependent_properties))) =
            (principal, dependent)
        else {
            let message = format!(
                "The referential constraint of '{}' needs a principal and a dependent role",
                association.full_name()
            );
            self.report(S::MissingConstraintOnRelationshipType.code(), id, message);
            return None;
        };

        let mut ends = Vec::new();
        for role in [&principal_role, &dependent_role] {
            match association.end(role) {
                Some(end) => ends.push(end.clone()),
                None => {
                    let message = format!(
                        "The role '{}' of the referential constraint is not an end of '{}'",
                        role,
                        association.full_name()
                    );
                    self.report(S::InvalidRoleInRelationshipConstraint.code(), id, message);
                }
            }
        }
        let [principal_end, dependent_end] = ends.as_slice() else {
            return None;
        };

        if principal_role == dependent_role {
            let message = format!("The role '{}' is both principal and dependent", principal_role);
            self.report(S::SameRoleReferredInReferentialConstraint.code(), id, message);
            return None;
        }
        if principal_end.multiplicity == RelationshipMultiplicity::Many {
            let message = format!("The principal role '{}' cannot have multiplicity '*'", principal_role);
            self.report(S::InvalidMultiplicityInRoleInRelationshipConstraint.code(), id, message);
            return None;
        }
        if principal_properties.len() != dependent_properties.len() {
            let message = "The principal and dependent roles must name the same number of properties";
            self.report(S::MismatchNumberOfPropertiesInRelationshipConstraint.code(), id, message);
            return None;
        }

        let principal_keys: Vec<String> = principal_end
            .entity_type
            .key_properties()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let covers_key = principal_keys.len() == principal_properties.len()
            && principal_properties.iter().all(|p| principal_keys.contains(p));
        if !covers_key {
            let message = format!(
                "The principal properties of the referential constraint must be the key of '{}'",
                principal_end.entity_type.full_name()
            );
            self.report(S::InvalidPropertyInRelationshipConstraint.code(), id, message);
            return None;
        }

        let mut valid = true;
        for (principal_name, dependent_name) in principal_properties.iter().zip(&dependent_properties) {
            let Some(dependent) = dependent_end.entity_type.property(dependent_name) else {
                let message = format!(
                    "The property '{}' is not defined on dependent type '{}'",
                    dependent_name,
                    dependent_end.entity_type.full_name()
                );
                self.report(S::InvalidPropertyInRelationshipConstraint.code(), id, message);
                valid = false;
                continue;
            };
            let principal_kind = principal_end
                .entity_type
                .property(principal_name)
                .and_then(|p| p.type_usage.primitive_kind());
            if principal_kind != dependent.type_usage.primitive_kind() {
                let message = format!(
                    "The types of '{}' and '{}' in the referential constraint do not match",
                    principal_name, dependent_name
                );
                self.report(S::TypeMismatchRelationshipConstraint.code(), id, message);
                valid = false;
            }
        }

        valid.then(|| ReferentialConstraintDef {
            principal_role,
            principal_properties,
            dependent_role,
            dependent_properties,
        })
    }

    fn check_navigation_properties(&mut self, entity_type: ObjectId) {
        let artifact = self.artifact;
        let owner = self.entity_types.get(&entity_type).cloned().flatten();

        for navigation in artifact.children_of_kind(entity_type, NodeKindTag::NavigationProperty) {
            let Some(NodeKind::NavigationProperty {
                relationship,
                from_role,
                to_role,
            }) = artifact.kind(navigation)
            else {
                continue;
            };
            let name = artifact.name(navigation);

            let Some(relationship) = relationship else {
                let message = format!("The navigation property '{}' does not name a relationship", name);
                self.report(S::BadNavigationProperty.code(), navigation, message);
                continue;
            };
            let association = match relationship.known_target().map(|target| self.associations.get(&target)) {
                Some(Some(Some(association))) => association.clone(),
                Some(Some(None)) => continue,
                _ => {
                    let message = format!(
                        "The relationship '{}' of navigation property '{}' is not defined",
                        relationship.ref_name, name
                    );
                    self.report(S::BadNavigationProperty.code(), navigation, message);
                    continue;
                }
            };

            let from = from_role.as_ref().map(|b| b.ref_name.as_str()).unwrap_or_default();
            let to = to_role.as_ref().map(|b| b.ref_name.as_str()).unwrap_or_default();
            let problem = match (association.end(from), association.end(to)) {
                (None, _) | (_, None) => Some(format!(
                    "The roles '{}' and '{}' of navigation property '{}' must both be ends of '{}'",
                    from,
                    to,
                    name,
                    association.full_name()
                )),
                _ if from == to => Some(format!(
                    "The navigation property '{}' must navigate between two different roles",
                    name
                )),
                (Some(from_end), _) => owner
                    .as_ref()
                    .filter(|owner| !owner.is_sub_type_of(&from_end.entity_type))
                    .map(|owner| {
                        format!(
                            "The role '{}' of navigation property '{}' does not hold instances of '{}'",
                            from,
                            name,
                            owner.full_name()
                        )
                    }),
            };
            if let Some(message) = problem {
                self.report(S::BadNavigationProperty.code(), navigation, message);
            }
        }
    }

    fn resolve_type_name(&mut self, name: &str) -> Option<TypeUsage> {
        if let Some(inner) = name.strip_prefix("Collection(").and_then(|rest| rest.strip_suffix(')')) {
            return self.resolve_type_name(inner.trim()).map(TypeUsage::collection_of);
        }

        match self.space {
            ModelSpace::Storage => store_type_kind(name).map(TypeUsage::primitive),
            ModelSpace::Conceptual => {
                if let Some(kind) = PrimitiveTypeKind::from_name(name) {
                    return Some(TypeUsage::primitive(kind));
                }
                let full_name = self.qualify(name);
                if let Some(entity) = self.entity_types.values().flatten().find(|t| t.full_name() == full_name) {
                    return Some(TypeUsage::entity(entity.clone()));
                }
                if let Some(complex) = self.complex_types.values().flatten().find(|t| t.full_name() == full_name) {
                    return Some(TypeUsage::complex(complex.clone()));
                }
                self.enum_types
                    .values()
                    .flatten()
                    .find(|t| t.full_name() == full_name)
                    .map(|t| TypeUsage::enumeration(t.clone()))
            }
        }
    }

    fn function(&mut self, id: ObjectId) -> Option<EdmFunction> {
        let artifact = self.artifact;
        let Some(NodeKind::Function {
            return_type,
            is_aggregate,
            is_composable,
            command_text,
            ..
        }) = artifact.kind(id)
        else {
            return None;
        };
        let full_name = artifact.full_name(id);

        let mut function = EdmFunction::new(&self.namespace, artifact.name(id), self.data_space);
        function.is_aggregate = *is_aggregate;
        function.is_composable = *is_composable;
        function.command_text = command_text.clone();
        let mut failed = false;

        if let Some(return_type) = return_type {
            match self.resolve_type_name(return_type) {
                Some(usage) => function.return_type = Some(usage),
                None => {
                    self.report_undefined_type(id, return_type);
                    failed = true;
                }
            }
        }

        for parameter in artifact.children_of_kind(id, NodeKindTag::FunctionParameter) {
            let Some(NodeKind::FunctionParameter { type_name, mode }) = artifact.kind(parameter) else {
                continue;
            };
            let Some(mode) = mode.as_deref().map_or(Some(ParameterMode::In), ParameterMode::from_name) else {
                let message = format!(
                    "The mode '{}' of parameter '{}' is not valid",
                    mode.as_deref().unwrap_or_default(),
                    artifact.name(parameter)
                );
                self.report(S::BadParameterDirection.code(), parameter, message);
                failed = true;
                continue;
            };
            let Some(type_usage) = self.resolve_type_name(type_name) else {
                self.report_undefined_type(parameter, type_name);
                failed = true;
                continue;
            };
            function.parameters.push(FunctionParameter {
                name: artifact.name(parameter).to_string(),
                type_usage,
                mode,
            });
        }

        let storage = self.space == ModelSpace::Storage;
        let mut rule = |code: S, message: String| {
            self.report(code.code(), id, message);
            failed = true;
        };
        if storage {
            if function.is_composable && function.return_type.is_none() {
                rule(
                    S::ComposableFunctionWithoutReturnType,
                    format!("The composable function '{}' must declare a return type", full_name),
                );
            }
            if !function.is_composable && function.return_type.is_some() {
                rule(
                    S::NonComposableFunctionWithReturnType,
                    format!("The non-composable function '{}' cannot declare a return type", full_name),
                );
            }
            if function.is_composable && function.command_text.is_some() {
                rule(
                    S::ComposableFunctionWithCommandText,
                    format!("The composable function '{}' cannot declare command text", full_name),
                );
            }
        }
        if function.command_text.as_deref().is_some_and(|text| text.trim().is_empty()) {
            rule(
                S::EmptyCommandText,
                format!("The command text of function '{}' is empty", full_name),
            );
        }
        if function.is_aggregate && function.parameters.len() != 1 {
            rule(
                S::InvalidNumberOfParametersForAggregateFunction,
                format!("The aggregate function '{}' must take exactly one parameter", full_name),
            );
        }

        (!failed).then_some(function)
    }

    fn container(&mut self, id: ObjectId) -> EntityContainerDef {
        let artifact = self.artifact;
        let name = artifact.name(id).to_string();
        let mut container = EntityContainerDef {
            name: name.clone(),
            space: self.data_space,
            entity_sets: Vec::new(),
            association_sets: Vec::new(),
        };
        let mut names = HashSet::new();

        for set in artifact.children_of_kind(id, NodeKindTag::EntitySet) {
            let Some(NodeKind::EntitySet { entity_type }) = artifact.kind(set) else {
                continue;
            };
            if !names.insert(artifact.name(set)) {
                let message = format!("The set '{}' is already defined in container '{}'", artifact.name(set), name);
                self.report(S::AlreadyDefined.code(), set, message);
                continue;
            }
            let element_type = match entity_type.known_target().map(|target| self.entity_types.get(&target)) {
                Some(Some(Some(element_type))) => element_type.clone(),
                Some(Some(None)) => continue,
                _ => {
                    let message = format!(
                        "The entity type '{}' of entity set '{}' is not defined",
                        entity_type.ref_name,
                        artifact.name(set)
                    );
                    self.report(S::BadType.code(), set, message);
                    continue;
                }
            };
            container.entity_sets.push(Arc::new(EntitySetDef {
                name: artifact.name(set).to_string(),
                container: name.clone(),
                space: self.data_space,
                element_type,
            }));
        }

        for set in artifact.children_of_kind(id, NodeKindTag::AssociationSet) {
            let Some(NodeKind::AssociationSet { association }) = artifact.kind(set) else {
                continue;
            };
            let set_name = artifact.name(set);
            if !names.insert(set_name) {
                let message = format!("The set '{}' is already defined in container '{}'", set_name, name);
                self.report(S::AlreadyDefined.code(), set, message);
                continue;
            }
            let association = match association.known_target().map(|target| self.associations.get(&target)) {
                Some(Some(Some(association))) => association.clone(),
                Some(Some(None)) => continue,
                _ => {
                    let message = format!(
                        "The association '{}' of association set '{}' is not defined",
                        association.ref_name, set_name
                    );
                    self.report(S::BadType.code(), set, message);
                    continue;
                }
            };
            if let Some(ends) = self.association_set_ends(set, &association, &container) {
                container.association_sets.push(Arc::new(AssociationSetDef {
                    name: set_name.to_string(),
                    container: name.clone(),
                    space: self.data_space,
                    association,
                    ends,
                }));
            }
        }

        container
    }

    /// Declared ends are checked; undeclared ends are inferred from the
    /// only set able to hold the end type
    fn association_set_ends(
        &mut self,
        set: ObjectId,
        association: &AssociationType,
        container: &EntityContainerDef,
    ) -> Option<Vec<(String, String)>> {
        let artifact = self.artifact;
        let declared: Vec<(ObjectId, String, String)> = artifact
            .children_of_kind(set, NodeKindTag::AssociationSetEnd)
            .into_iter()
            .filter_map(|end| match artifact.kind(end) {
                Some(NodeKind::AssociationSetEnd { role, entity_set }) => {
                    Some((end, role.ref_name.clone(), entity_set.ref_name.clone()))
                }
                _ => None,
            })
            .collect();

        let mut valid = true;
        for (end, role, _) in &declared {
            if association.end(role).is_none() {
                let message = format!("The role '{}' is not an end of '{}'", role, association.full_name());
                self.report(S::InvalidEndEntitySet.code(), *end, message);
                valid = false;
            }
        }

        let mut ends = Vec::new();
        for end in &association.ends {
            match declared.iter().find(|(_, role, _)| *role == end.name) {
                Some((end_id, _, set_name)) => match container.entity_set(set_name) {
                    Some(entity_set) if end.entity_type.is_sub_type_of(&entity_set.element_type) => {
                        ends.push((end.name.clone(), set_name.clone()));
                    }
                    Some(_) => {
                        let message = format!(
                            "The entity set '{}' cannot hold instances of end '{}'",
                            set_name, end.name
                        );
                        self.report(S::InvalidEndEntitySet.code(), *end_id, message);
                        valid = false;
                    }
                    None => {
                        let message = format!(
                            "The entity set '{}' of end '{}' is not defined in container '{}'",
                            set_name, end.name, container.name
                        );
                        self.report(S::InvalidEndEntitySet.code(), *end_id, message);
                        valid = false;
                    }
                },
                None => {
                    let candidates: Vec<&Arc<EntitySetDef>> = container
                        .entity_sets
                        .iter()
                        .filter(|candidate| end.entity_type.is_sub_type_of(&candidate.element_type))
                        .collect();
                    match candidates.as_slice() {
                        [only] => ends.push((end.name.clone(), only.name.clone())),
                        [] => {
                            let message = format!(
                                "No entity set in container '{}' can hold end '{}' of association set '{}'",
                                container.name,
                                end.name,
                                artifact.name(set)
                            );
                            self.report(S::MissingExtentEntityContainerEnd.code(), set, message);
                            valid = false;
                        }
                        _ => {
                            let message = format!(
                                "More than one entity set can hold end '{}' of association set '{}'",
                                end.name,
                                artifact.name(set)
                            );
                            self.report(S::AmbiguousEntityContainerEnd.code(), set, message);
                            valid = false;
                        }
                    }
                }
            }
        }

        valid.then_some(ends)
    }
}

fn ref_name(binding: &Option<Binding>) -> String {
    binding.as_ref().map(|b| b.ref_name.clone()).unwrap_or_default()
}

fn layer_name(space: ModelSpace) -> &'static str {
    match space {
        ModelSpace::Conceptual => "conceptual",
        ModelSpace::Storage => "storage",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcheck_model::ContentValidatorRegistry;
    use pretty_assertions::assert_eq;

    fn compile(json: &str, space: ModelSpace) -> Compilation<ItemCollection> {
        let mut registry = ContentValidatorRegistry::new();
        let artifact = ModelArtifact::from_json(json, &mut registry).unwrap();
        SchemaCompiler::compile(&artifact, space)
    }

    fn codes(compilation: &Compilation<ItemCollection>) -> Vec<i32> {
        compilation.errors.iter().map(|e| e.code).collect()
    }

    const BASE: &str = r#"{
        "version": 3,
        "conceptual": {
            "namespace": "Shop",
            "entity_types": [
                {"name": "Item", "key": ["Id"],
                 "properties": [{"name": "Id", "type": "Int32", "nullable": false},
                                {"name": "Title", "type": "String", "max_length": 40}]},
                {"name": "Book", "base_type": "Shop.Item",
                 "properties": [{"name": "Isbn", "type": "String"}]}
            ],
            "entity_containers": [{"name": "ShopContainer", "entity_sets": [{"name": "Items", "entity_type": "Shop.Item"}]}]
        }
    }"#;

    #[test]
    fn builds_hierarchy_and_sets() {
        let compilation = compile(BASE, ModelSpace::Conceptual);
        assert_eq!(codes(&compilation), Vec::<i32>::new());
        let items = compilation.output.unwrap();

        let book = items.entity_type("Shop.Book").unwrap();
        let item = items.entity_type("Shop.Item").unwrap();
        assert!(book.is_sub_type_of(item));
        assert_eq!(book.key_properties().len(), 1);
        assert_eq!(item.property("Title").unwrap().type_usage.facets().max_length, Some(40));
        assert_eq!(items.entity_set("ShopContainer", "Items").unwrap().element_type.name, "Item");
        assert_eq!(items.version(), 3);
    }

    #[test]
    fn missing_and_nullable_keys() {
        let json = r#"{
            "version": 3,
            "conceptual": {
                "namespace": "Shop",
                "entity_types": [
                    {"name": "NoKey", "properties": [{"name": "Id", "type": "Int32"}]},
                    {"name": "Loose", "key": ["Id"], "properties": [{"name": "Id", "type": "Int32"}]}
                ]
            }
        }"#;
        let compilation = compile(json, ModelSpace::Conceptual);
        assert!(!compilation.is_success());
        assert_eq!(
            codes(&compilation),
            vec![S::KeyMissingOnEntityType.code(), S::InvalidKey.code()]
        );
    }

    #[test]
    fn inheritance_cycle_is_reported() {
        let json = r#"{
            "version": 3,
            "conceptual": {
                "namespace": "Shop",
                "entity_types": [
                    {"name": "A", "base_type": "Shop.B"},
                    {"name": "B", "base_type": "Shop.A"}
                ]
            }
        }"#;
        let compilation = compile(json, ModelSpace::Conceptual);
        assert_eq!(codes(&compilation), vec![S::CycleInTypeHierarchy.code()]);
    }

    #[test]
    fn circular_complex_types() {
        let json = r#"{
            "version": 3,
            "conceptual": {
                "namespace": "Shop",
                "complex_types": [
                    {"name": "Outer", "properties": [{"name": "Inner", "type": "Shop.Inner"}]},
                    {"name": "Inner", "properties": [{"name": "Outer", "type": "Shop.Outer"}]}
                ]
            }
        }"#;
        let compilation = compile(json, ModelSpace::Conceptual);
        assert_eq!(codes(&compilation), vec![S::CircularlyDefinedType.code()]);
    }

    #[test]
    fn enum_members_are_numbered_and_checked() {
        let json = r#"{
            "version": 3,
            "conceptual": {
                "namespace": "Shop",
                "enum_types": [
                    {"name": "Color", "underlying_type": "Byte",
                     "members": [{"name": "Red"}, {"name": "Green", "value": 10}, {"name": "Blue"}]}
                ]
            }
        }"#;
        let items = compile(json, ModelSpace::Conceptual).output.unwrap();
        let color = items.enum_type("Shop.Color").unwrap();
        assert_eq!(
            color.members,
            vec![("Red".to_string(), 0), ("Green".to_string(), 10), ("Blue".to_string(), 11)]
        );

        let json = r#"{
            "version": 3,
            "conceptual": {
                "namespace": "Shop",
                "enum_types": [
                    {"name": "Broken", "underlying_type": "String"},
                    {"name": "Tiny", "underlying_type": "Byte",
                     "members": [{"name": "Big", "value": 255}, {"name": "Bigger"}, {"name": "Big"}]}
                ]
            }
        }"#;
        let compilation = compile(json, ModelSpace::Conceptual);
        assert_eq!(
            codes(&compilation),
            vec![
                S::InvalidEnumUnderlyingType.code(),
                S::CalculatedEnumValueOutOfRange.code(),
                S::DuplicateEnumMember.code(),
            ]
        );
    }

    #[test]
    fn store_types_map_to_primitives() {
        assert_eq!(store_type_kind("nvarchar(50)"), Some(PrimitiveTypeKind::String));
        assert_eq!(store_type_kind("INT"), Some(PrimitiveTypeKind::Int32));
        assert_eq!(store_type_kind("geography"), None);

        let json = r#"{
            "version": 3,
            "storage": {
                "namespace": "Shop.Store",
                "provider": "System.Data.SqlClient",
                "entity_types": [
                    {"name": "items", "key": ["id"],
                     "properties": [{"name": "id", "type": "int", "nullable": false},
                                    {"name": "shape", "type": "geography"}]}
                ]
            }
        }"#;
        let compilation = compile(json, ModelSpace::Storage);
        assert_eq!(codes(&compilation), vec![S::NotInNamespace.code()]);
    }

    #[test]
    fn store_function_rules() {
        let json = r#"{
            "version": 3,
            "storage": {
                "namespace": "Shop.Store",
                "functions": [
                    {"name": "Total", "parameters": [{"name": "x", "type": "int"}]},
                    {"name": "Purge", "is_composable": false, "command_text": "DELETE FROM items"}
                ]
            }
        }"#;
        let compilation = compile(json, ModelSpace::Storage);
        assert_eq!(codes(&compilation), vec![S::ComposableFunctionWithoutReturnType.code()]);
    }

    #[test]
    fn missing_layer_fails() {
        let compilation = compile(BASE, ModelSpace::Storage);
        assert_eq!(codes(&compilation), vec![S::MissingSchemaXml.code()]);
    }
}
