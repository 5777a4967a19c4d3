//! EDM metadata model
//!
//! Read-only metadata consumed by command-tree validation and produced by
//! runtime compilation of the schema layers. Nominal types (entity,
//! complex, enum, association) are shared through `Arc` and compared by
//! identity: full name plus data space.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata workspace an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSpace {
    /// Object (CLR) space
    OSpace,

    /// Conceptual space
    CSpace,

    /// Storage space
    SSpace,

    /// Object-conceptual mapping space
    OCSpace,

    /// Conceptual-storage mapping space
    CSSpace,
}

impl std::fmt::Display for DataSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OSpace => write!(f, "OSpace"),
            Self::CSpace => write!(f, "CSpace"),
            Self::SSpace => write!(f, "SSpace"),
            Self::OCSpace => write!(f, "OCSpace"),
            Self::CSSpace => write!(f, "CSSpace"),
        }
    }
}

/// Primitive type kinds of the EDM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveTypeKind {
    Binary,
    Boolean,
    Byte,
    DateTime,
    Decimal,
    Double,
    Guid,
    Single,
    SByte,
    Int16,
    Int32,
    Int64,
    String,
    Time,
    DateTimeOffset,
}

impl PrimitiveTypeKind {
    pub const ALL: [PrimitiveTypeKind; 15] = [
        Self::Binary,
        Self::Boolean,
        Self::Byte,
        Self::DateTime,
        Self::Decimal,
        Self::Double,
        Self::Guid,
        Self::Single,
        Self::SByte,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::String,
        Self::Time,
        Self::DateTimeOffset,
    ];

    /// Unqualified EDM name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::DateTime => "DateTime",
            Self::Decimal => "Decimal",
            Self::Double => "Double",
            Self::Guid => "Guid",
            Self::Single => "Single",
            Self::SByte => "SByte",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::String => "String",
            Self::Time => "Time",
            Self::DateTimeOffset => "DateTimeOffset",
        }
    }

    /// Parse a primitive name, with or without the `Edm.` prefix
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix("Edm.").unwrap_or(name);
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Decimal
                | Self::Single
                | Self::Double
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Self::Byte)
    }

    /// Types this kind implicitly promotes to, itself first, narrowest to widest
    pub fn promotions(&self) -> &'static [PrimitiveTypeKind] {
        use PrimitiveTypeKind::*;

        match self {
            Byte => &[Byte, Int16, Int32, Int64, Decimal, Single, Double],
            SByte => &[SByte, Int16, Int32, Int64, Decimal, Single, Double],
            Int16 => &[Int16, Int32, Int64, Decimal, Single, Double],
            Int32 => &[Int32, Int64, Decimal, Single, Double],
            Int64 => &[Int64, Decimal, Single, Double],
            Single => &[Single, Double],
            Binary => &[Binary],
            Boolean => &[Boolean],
            DateTime => &[DateTime],
            Decimal => &[Decimal],
            Double => &[Double],
            Guid => &[Guid],
            String => &[String],
            Time => &[Time],
            DateTimeOffset => &[DateTimeOffset],
        }
    }

    pub fn promotes_to(&self, other: PrimitiveTypeKind) -> bool {
        self.promotions().contains(&other)
    }
}

impl std::fmt::Display for PrimitiveTypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Edm.{}", self.name())
    }
}

/// Facets carried by a type usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_length: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
}

impl Default for Facets {
    fn default() -> Self {
        Self {
            nullable: true,
            max_length: None,
            unicode: None,
            fixed_length: None,
            precision: None,
            scale: None,
        }
    }
}

impl Facets {
    pub fn non_nullable() -> Self {
        Self {
            nullable: false,
            ..Self::default()
        }
    }
}

/// A member of a structural type
#[derive(Debug, Clone, PartialEq)]
pub struct EdmProperty {
    pub name: String,

    pub type_usage: TypeUsage,

    /// Full name of the declaring type; empty for row members
    pub declaring_type: String,
}

impl EdmProperty {
    pub fn new(name: impl Into<String>, type_usage: TypeUsage) -> Self {
        Self {
            name: name.into(),
            type_usage,
            declaring_type: String::new(),
        }
    }

    pub fn declared_by(mut self, declaring_type: impl Into<String>) -> Self {
        self.declaring_type = declaring_type.into();
        self
    }
}

/// Navigation property of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPropertyDef {
    pub name: String,

    /// Full name of the relationship type
    pub relationship: String,

    pub from_end: String,

    pub to_end: String,
}

/// Entity type
#[derive(Debug, Clone)]
pub struct EntityTypeDef {
    pub name: String,
    pub namespace: String,
    pub space: DataSpace,
    pub base_type: Option<Arc<EntityTypeDef>>,
    pub is_abstract: bool,

    /// Names of the declared key members; inherited from the root type when empty
    pub key_members: Vec<String>,

    /// Properties declared on this type, excluding inherited ones
    pub properties: Vec<EdmProperty>,

    pub navigation_properties: Vec<NavigationPropertyDef>,
}

impl EntityTypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, space: DataSpace) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            space,
            base_type: None,
            is_abstract: false,
            key_members: Vec::new(),
            properties: Vec::new(),
            navigation_properties: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Add a declared property
    pub fn with_property(mut self, name: impl Into<String>, type_usage: TypeUsage) -> Self {
        let declaring = self.full_name();
        self.properties.push(EdmProperty::new(name, type_usage).declared_by(declaring));
        self
    }

    /// Declare the key members
    pub fn with_key(mut self, members: &[&str]) -> Self {
        self.key_members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_base(mut self, base: Arc<EntityTypeDef>) -> Self {
        self.base_type = Some(base);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// All properties, inherited ones first
    pub fn all_properties(&self) -> Vec<&EdmProperty> {
        let mut chain: Vec<&EntityTypeDef> = vec![self];
        let mut current = self.base_type.as_deref();
        while let Some(base) = current {
            if chain.iter().any(|seen| seen.same_identity(base)) {
                break;
            }
            chain.push(base);
            current = base.base_type.as_deref();
        }

        chain
            .into_iter()
            .rev()
            .flat_map(|t| t.properties.iter())
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<&EdmProperty> {
        self.all_properties().into_iter().find(|p| p.name == name)
    }

    /// Key members, resolved through the root of the hierarchy
    pub fn key_properties(&self) -> Vec<&EdmProperty> {
        let mut root = self;
        let mut guard = 0;
        while root.key_members.is_empty() {
            match root.base_type.as_deref() {
                Some(base) if guard < 64 => {
                    root = base;
                    guard += 1;
                }
                _ => break,
            }
        }

        root.key_members
            .iter()
            .filter_map(|name| self.property(name))
            .collect()
    }

    pub fn same_identity(&self, other: &EntityTypeDef) -> bool {
        self.space == other.space && self.namespace == other.namespace && self.name == other.name
    }

    /// True when `other` is this type or one of its ancestors
    pub fn is_sub_type_of(&self, other: &EntityTypeDef) -> bool {
        if self.same_identity(other) {
            return true;
        }

        let mut current = self.base_type.as_deref();
        let mut guard = 0;
        while let Some(base) = current {
            if base.same_identity(other) {
                return true;
            }
            guard += 1;
            if guard > 64 {
                break;
            }
            current = base.base_type.as_deref();
        }
        false
    }

    /// Full names of this type and its ancestors, nearest first
    pub fn hierarchy(&self) -> Vec<String> {
        let mut names = vec![self.full_name()];
        let mut current = self.base_type.as_deref();
        while let Some(base) = current {
            let name = base.full_name();
            if names.contains(&name) {
                break;
            }
            names.push(name);
            current = base.base_type.as_deref();
        }
        names
    }
}

impl PartialEq for EntityTypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

/// Complex type
#[derive(Debug, Clone)]
pub struct ComplexTypeDef {
    pub name: String,
    pub namespace: String,
    pub space: DataSpace,
    pub properties: Vec<EdmProperty>,
}

impl ComplexTypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, space: DataSpace) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            space,
            properties: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn with_property(mut self, name: impl Into<String>, type_usage: TypeUsage) -> Self {
        let declaring = self.full_name();
        self.properties.push(EdmProperty::new(name, type_usage).declared_by(declaring));
        self
    }
}

impl PartialEq for ComplexTypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space && self.namespace == other.namespace && self.name == other.name
    }
}

/// Enumeration type
#[derive(Debug, Clone)]
pub struct EnumTypeDef {
    pub name: String,
    pub namespace: String,
    pub space: DataSpace,
    pub underlying_type: PrimitiveTypeKind,
    pub is_flags: bool,
    pub members: Vec<(String, i64)>,
}

impl EnumTypeDef {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl PartialEq for EnumTypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space && self.namespace == other.namespace && self.name == other.name
    }
}

/// Anonymous row type
#[derive(Debug, Clone, PartialEq)]
pub struct RowTypeDef {
    pub properties: Vec<EdmProperty>,
}

impl RowTypeDef {
    pub fn property(&self, name: &str) -> Option<&EdmProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Multiplicity of a relationship end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipMultiplicity {
    ZeroOrOne,
    One,
    Many,
}

impl RelationshipMultiplicity {
    /// Parse the schema notation: `0..1`, `1`, `*`
    pub fn from_notation(text: &str) -> Option<Self> {
        match text.trim() {
            "0..1" => Some(Self::ZeroOrOne),
            "1" => Some(Self::One),
            "*" => Some(Self::Many),
            _ => None,
        }
    }

    pub fn notation(&self) -> &'static str {
        match self {
            Self::ZeroOrOne => "0..1",
            Self::One => "1",
            Self::Many => "*",
        }
    }
}

/// End of a relationship type
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipEndMember {
    pub name: String,

    pub entity_type: Arc<EntityTypeDef>,

    pub multiplicity: RelationshipMultiplicity,

    /// Full name of the declaring relationship
    pub declaring_relationship: String,
}

impl RelationshipEndMember {
    /// The end's type: a reference to its entity type
    pub fn type_usage(&self) -> TypeUsage {
        TypeUsage::ref_to(self.entity_type.clone())
    }
}

/// Referential constraint between two association ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialConstraintDef {
    pub principal_role: String,
    pub principal_properties: Vec<String>,
    pub dependent_role: String,
    pub dependent_properties: Vec<String>,
}

/// Association (relationship) type
#[derive(Debug, Clone)]
pub struct AssociationType {
    pub name: String,
    pub namespace: String,
    pub space: DataSpace,
    pub ends: Vec<RelationshipEndMember>,
    pub constraint: Option<ReferentialConstraintDef>,
}

impl AssociationType {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Case-sensitive end lookup
    pub fn end(&self, name: &str) -> Option<&RelationshipEndMember> {
        self.ends.iter().find(|e| e.name == name)
    }

    pub fn declares(&self, end: &RelationshipEndMember) -> bool {
        end.declaring_relationship == self.full_name() && self.end(&end.name).is_some()
    }
}

impl PartialEq for AssociationType {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space && self.namespace == other.namespace && self.name == other.name
    }
}

/// Parameter passing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
    ReturnValue,
}

impl ParameterMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "In" => Some(Self::In),
            "Out" => Some(Self::Out),
            "InOut" => Some(Self::InOut),
            "ReturnValue" => Some(Self::ReturnValue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub type_usage: TypeUsage,
    pub mode: ParameterMode,
}

/// Function metadata (model-defined, store, or built-in)
#[derive(Debug, Clone, PartialEq)]
pub struct EdmFunction {
    pub name: String,
    pub namespace: String,
    pub space: DataSpace,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Option<TypeUsage>,
    pub is_aggregate: bool,
    pub is_composable: bool,
    pub command_text: Option<String>,
    pub has_user_defined_body: bool,
}

impl EdmFunction {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, space: DataSpace) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            space,
            parameters: Vec::new(),
            return_type: None,
            is_aggregate: false,
            is_composable: true,
            command_text: None,
            has_user_defined_body: false,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        type_usage: TypeUsage,
        mode: ParameterMode,
    ) -> Self {
        self.parameters.push(FunctionParameter {
            name: name.into(),
            type_usage,
            mode,
        });
        self
    }

    pub fn returns(mut self, type_usage: TypeUsage) -> Self {
        self.return_type = Some(type_usage);
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self
    }

    /// Parameters that participate in argument arity (In and InOut)
    pub fn expected_parameters(&self) -> Vec<&FunctionParameter> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.mode, ParameterMode::In | ParameterMode::InOut))
            .collect()
    }
}

/// Entity set
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySetDef {
    pub name: String,
    pub container: String,
    pub space: DataSpace,
    pub element_type: Arc<EntityTypeDef>,
}

/// Association set
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationSetDef {
    pub name: String,
    pub container: String,
    pub space: DataSpace,
    pub association: Arc<AssociationType>,

    /// (role, entity set name) pairs
    pub ends: Vec<(String, String)>,
}

/// Entity container
#[derive(Debug, Clone, PartialEq)]
pub struct EntityContainerDef {
    pub name: String,
    pub space: DataSpace,
    pub entity_sets: Vec<Arc<EntitySetDef>>,
    pub association_sets: Vec<Arc<AssociationSetDef>>,
}

impl EntityContainerDef {
    pub fn entity_set(&self, name: &str) -> Option<&Arc<EntitySetDef>> {
        self.entity_sets.iter().find(|s| s.name == name)
    }
}

/// An EDM type
#[derive(Debug, Clone)]
pub enum EdmType {
    Primitive(PrimitiveTypeKind),
    Enum(Arc<EnumTypeDef>),
    Entity(Arc<EntityTypeDef>),
    Complex(Arc<ComplexTypeDef>),
    Row(Arc<RowTypeDef>),
    Collection(Box<TypeUsage>),
    Ref(Arc<EntityTypeDef>),
    Association(Arc<AssociationType>),
}

impl EdmType {
    /// Data space of the type; `None` for primitive and transient types
    pub fn data_space(&self) -> Option<DataSpace> {
        match self {
            Self::Primitive(_) | Self::Row(_) | Self::Collection(_) | Self::Ref(_) => None,
            Self::Enum(e) => Some(e.space),
            Self::Entity(e) => Some(e.space),
            Self::Complex(c) => Some(c.space),
            Self::Association(a) => Some(a.space),
        }
    }

    /// Stable display identity
    pub fn identity(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.to_string(),
            Self::Enum(e) => e.full_name(),
            Self::Entity(e) => e.full_name(),
            Self::Complex(c) => c.full_name(),
            Self::Row(row) => {
                let members: Vec<String> = row
                    .properties
                    .iter()
                    .map(|p| format!("{} {}", p.name, p.type_usage))
                    .collect();
                format!("Row({})", members.join(", "))
            }
            Self::Collection(element) => format!("Collection({})", element),
            Self::Ref(e) => format!("Ref({})", e.full_name()),
            Self::Association(a) => a.full_name(),
        }
    }
}

impl PartialEq for EdmType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) => a == b,
            (Self::Complex(a), Self::Complex(b)) => a == b,
            (Self::Row(a), Self::Row(b)) => a == b,
            (Self::Collection(a), Self::Collection(b)) => a.edm_type() == b.edm_type(),
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Association(a), Self::Association(b)) => a == b,
            _ => false,
        }
    }
}

/// An immutable handle over an EDM type plus its facets
#[derive(Debug, Clone, PartialEq)]
pub struct TypeUsage {
    edm_type: EdmType,
    facets: Facets,
}

impl TypeUsage {
    pub fn new(edm_type: EdmType) -> Self {
        Self {
            edm_type,
            facets: Facets::default(),
        }
    }

    pub fn with_facets(edm_type: EdmType, facets: Facets) -> Self {
        Self { edm_type, facets }
    }

    pub fn primitive(kind: PrimitiveTypeKind) -> Self {
        Self::new(EdmType::Primitive(kind))
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveTypeKind::Boolean)
    }

    pub fn entity(entity: Arc<EntityTypeDef>) -> Self {
        Self::new(EdmType::Entity(entity))
    }

    pub fn complex(complex: Arc<ComplexTypeDef>) -> Self {
        Self::new(EdmType::Complex(complex))
    }

    pub fn enumeration(enum_type: Arc<EnumTypeDef>) -> Self {
        Self::new(EdmType::Enum(enum_type))
    }

    pub fn collection_of(element: TypeUsage) -> Self {
        Self::new(EdmType::Collection(Box::new(element)))
    }

    pub fn ref_to(entity: Arc<EntityTypeDef>) -> Self {
        Self::new(EdmType::Ref(entity))
    }

    /// Row type over the given columns, in order
    pub fn row<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeUsage)>,
        S: Into<String>,
    {
        let properties = columns
            .into_iter()
            .map(|(name, type_usage)| EdmProperty::new(name, type_usage))
            .collect();
        Self::new(EdmType::Row(Arc::new(RowTypeDef { properties })))
    }

    /// Same type with different nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.facets.nullable = nullable;
        self
    }

    pub fn edm_type(&self) -> &EdmType {
        &self.edm_type
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn is_nullable(&self) -> bool {
        self.facets.nullable
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveTypeKind> {
        match &self.edm_type {
            EdmType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.edm_type, EdmType::Primitive(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.edm_type, EdmType::Enum(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.edm_type, EdmType::Collection(_))
    }

    pub fn is_row(&self) -> bool {
        matches!(self.edm_type, EdmType::Row(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.edm_type, EdmType::Ref(_))
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.edm_type, EdmType::Entity(_))
    }

    /// Element type of a collection
    pub fn element_type(&self) -> Option<&TypeUsage> {
        match &self.edm_type {
            EdmType::Collection(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Arc<EntityTypeDef>> {
        match &self.edm_type {
            EdmType::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<&Arc<ComplexTypeDef>> {
        match &self.edm_type {
            EdmType::Complex(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Arc<RowTypeDef>> {
        match &self.edm_type {
            EdmType::Row(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumTypeDef>> {
        match &self.edm_type {
            EdmType::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Entity type referenced by a ref type
    pub fn ref_entity(&self) -> Option<&Arc<EntityTypeDef>> {
        match &self.edm_type {
            EdmType::Ref(e) => Some(e),
            _ => None,
        }
    }

    /// Members of a structural type (entity, complex, or row), in order
    pub fn structural_members(&self) -> Option<Vec<&EdmProperty>> {
        match &self.edm_type {
            EdmType::Entity(e) => Some(e.all_properties()),
            EdmType::Complex(c) => Some(c.properties.iter().collect()),
            EdmType::Row(r) => Some(r.properties.iter().collect()),
            _ => None,
        }
    }

    pub fn identity(&self) -> String {
        self.edm_type.identity()
    }
}

impl std::fmt::Display for TypeUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.edm_type.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Arc<EntityTypeDef> {
        Arc::new(
            EntityTypeDef::new("Shop", "Product", DataSpace::CSpace)
                .with_property("Id", TypeUsage::primitive(PrimitiveTypeKind::Int32))
                .with_property("Name", TypeUsage::primitive(PrimitiveTypeKind::String))
                .with_key(&["Id"]),
        )
    }

    #[test]
    fn primitive_names_round_trip() {
        for kind in PrimitiveTypeKind::ALL {
            assert_eq!(PrimitiveTypeKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveTypeKind::from_name("Edm.Int64"), Some(PrimitiveTypeKind::Int64));
        assert_eq!(PrimitiveTypeKind::from_name("Shop.Address"), None);
    }

    #[test]
    fn promotion_lists_start_with_self() {
        for kind in PrimitiveTypeKind::ALL {
            assert_eq!(kind.promotions()[0], kind);
        }
        assert!(PrimitiveTypeKind::Byte.promotes_to(PrimitiveTypeKind::Int16));
        assert!(!PrimitiveTypeKind::Int64.promotes_to(PrimitiveTypeKind::Int32));
        assert!(!PrimitiveTypeKind::String.promotes_to(PrimitiveTypeKind::Int32));
    }

    #[test]
    fn inherited_properties_and_key() {
        let base = product();
        let derived = EntityTypeDef::new("Shop", "Book", DataSpace::CSpace)
            .with_base(base.clone())
            .with_property("Isbn", TypeUsage::primitive(PrimitiveTypeKind::String));

        let names: Vec<&str> = derived.all_properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Name", "Isbn"]);
        assert_eq!(derived.key_properties().len(), 1);
        assert!(derived.is_sub_type_of(&base));
        assert!(!base.is_sub_type_of(&derived));
        assert_eq!(derived.hierarchy(), vec!["Shop.Book", "Shop.Product"]);
    }

    #[test]
    fn nominal_identity_ignores_members() {
        let a = product();
        let b = Arc::new(EntityTypeDef::new("Shop", "Product", DataSpace::CSpace));
        let c = Arc::new(EntityTypeDef::new("Shop", "Product", DataSpace::SSpace));
        assert_eq!(TypeUsage::entity(a.clone()), TypeUsage::entity(b));
        assert_ne!(TypeUsage::entity(a), TypeUsage::entity(c));
    }

    #[test]
    fn display_identities() {
        let row = TypeUsage::row(vec![
            ("a", TypeUsage::primitive(PrimitiveTypeKind::Int32)),
            ("b", TypeUsage::collection_of(TypeUsage::ref_to(product()))),
        ]);
        assert_eq!(
            row.to_string(),
            "Row(a Edm.Int32, b Collection(Ref(Shop.Product)))"
        );
    }
}
