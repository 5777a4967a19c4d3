//! Command-tree expression nodes
//!
//! Every node carries its result type, computed once when the node is
//! built through [`crate::CommandTreeBuilder`]. A parent exclusively owns
//! its children; variable references name a binding instead of pointing at it.

use std::sync::Arc;

use edmcheck_core::{
    EdmFunction, EntitySetDef, PrimitiveTypeKind, RelationshipEndMember, TypeUsage,
};

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    /// Unscaled value and scale: `Decimal { value: 1250, scale: 2 }` is 12.50
    Decimal { value: i128, scale: u32 },
    String(String),
    Binary(Vec<u8>),
    Guid(u128),
    DateTime(chrono::NaiveDateTime),
    DateTimeOffset(chrono::DateTime<chrono::FixedOffset>),
    Time(chrono::Duration),
}

impl ConstantValue {
    /// Primitive kind of the literal
    pub fn primitive_kind(&self) -> PrimitiveTypeKind {
        match self {
            Self::Boolean(_) => PrimitiveTypeKind::Boolean,
            Self::Byte(_) => PrimitiveTypeKind::Byte,
            Self::SByte(_) => PrimitiveTypeKind::SByte,
            Self::Int16(_) => PrimitiveTypeKind::Int16,
            Self::Int32(_) => PrimitiveTypeKind::Int32,
            Self::Int64(_) => PrimitiveTypeKind::Int64,
            Self::Single(_) => PrimitiveTypeKind::Single,
            Self::Double(_) => PrimitiveTypeKind::Double,
            Self::Decimal { .. } => PrimitiveTypeKind::Decimal,
            Self::String(_) => PrimitiveTypeKind::String,
            Self::Binary(_) => PrimitiveTypeKind::Binary,
            Self::Guid(_) => PrimitiveTypeKind::Guid,
            Self::DateTime(_) => PrimitiveTypeKind::DateTime,
            Self::DateTimeOffset(_) => PrimitiveTypeKind::DateTimeOffset,
            Self::Time(_) => PrimitiveTypeKind::Time,
        }
    }

    /// Integer value, for integer literals only
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Single(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Decimal { value, scale } => write!(f, "{}e-{}", value, scale),
            Self::String(v) => write!(f, "'{}'", v),
            Self::Binary(v) => write!(f, "0x{}", hex::encode(v)),
            Self::Guid(v) => write!(f, "{:032x}", v),
            Self::DateTime(v) => write!(f, "{}", v),
            Self::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Time(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    UnaryMinus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
}

impl ComparisonOperator {
    /// Requires equality comparable operands
    pub fn needs_equality(&self) -> bool {
        matches!(
            self,
            Self::Equals | Self::NotEquals | Self::GreaterThanOrEquals | Self::LessThanOrEquals
        )
    }

    /// Requires order comparable operands
    pub fn needs_order(&self) -> bool {
        !matches!(self, Self::Equals | Self::NotEquals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyKind {
    Cross,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    UnionAll,
    Except,
    Intersect,
}

/// Payload of an expression node
#[derive(Debug, Clone, PartialEq)]
pub enum DbExpressionKind {
    Constant(ConstantValue),
    Null,
    ParameterReference(String),
    VariableReference(String),
    Property {
        instance: Box<DbExpression>,
        property: String,
    },
    Function {
        function: Arc<EdmFunction>,
        arguments: Vec<DbExpression>,
    },
    Lambda {
        lambda: Arc<DbLambda>,
        arguments: Vec<DbExpression>,
    },
    Case {
        whens: Vec<DbExpression>,
        thens: Vec<DbExpression>,
        otherwise: Box<DbExpression>,
    },
    NewInstance {
        arguments: Vec<DbExpression>,
        related: Vec<DbRelatedEntityRef>,
    },
    Scan(Arc<EntitySetDef>),
    Filter {
        input: Box<DbExpressionBinding>,
        predicate: Box<DbExpression>,
    },
    Project {
        input: Box<DbExpressionBinding>,
        projection: Box<DbExpression>,
    },
    GroupBy {
        input: Box<DbGroupExpressionBinding>,
        keys: Vec<(String, DbExpression)>,
        aggregates: Vec<(String, DbAggregate)>,
    },
    CrossJoin(Vec<DbExpressionBinding>),
    Join {
        kind: JoinKind,
        left: Box<DbExpressionBinding>,
        right: Box<DbExpressionBinding>,
        condition: Box<DbExpression>,
    },
    Apply {
        kind: ApplyKind,
        input: Box<DbExpressionBinding>,
        apply: Box<DbExpressionBinding>,
    },
    Quantifier {
        kind: QuantifierKind,
        input: Box<DbExpressionBinding>,
        predicate: Box<DbExpression>,
    },
    Sort {
        input: Box<DbExpressionBinding>,
        order: Vec<DbSortClause>,
    },
    Skip {
        input: Box<DbExpressionBinding>,
        order: Vec<DbSortClause>,
        count: Box<DbExpression>,
    },
    Limit {
        argument: Box<DbExpression>,
        limit: Box<DbExpression>,
        with_ties: bool,
    },
    Distinct(Box<DbExpression>),
    Element(Box<DbExpression>),
    IsEmpty(Box<DbExpression>),
    SetOperation {
        operator: SetOperator,
        left: Box<DbExpression>,
        right: Box<DbExpression>,
    },
    And(Box<DbExpression>, Box<DbExpression>),
    Or(Box<DbExpression>, Box<DbExpression>),
    Not(Box<DbExpression>),
    Arithmetic {
        operator: ArithmeticOperator,
        arguments: Vec<DbExpression>,
    },
    Comparison {
        operator: ComparisonOperator,
        left: Box<DbExpression>,
        right: Box<DbExpression>,
    },
    IsNull(Box<DbExpression>),
    Like {
        argument: Box<DbExpression>,
        pattern: Box<DbExpression>,
        escape: Option<Box<DbExpression>>,
    },
    Cast(Box<DbExpression>),
    Treat(Box<DbExpression>),
    OfType {
        argument: Box<DbExpression>,
        of_type: TypeUsage,
        only: bool,
    },
    IsOf {
        argument: Box<DbExpression>,
        of_type: TypeUsage,
        only: bool,
    },
    Deref(Box<DbExpression>),
    EntityRef(Box<DbExpression>),
    RefKey(Box<DbExpression>),
    Ref {
        entity_set: Arc<EntitySetDef>,
        key: Box<DbExpression>,
    },
    RelationshipNavigation {
        /// Full name of the relationship
        relationship: String,
        from_end: String,
        to_end: String,
        source: Box<DbExpression>,
    },
}

impl DbExpressionKind {
    /// Node kind name, for messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "Constant",
            Self::Null => "Null",
            Self::ParameterReference(_) => "ParameterReference",
            Self::VariableReference(_) => "VariableReference",
            Self::Property { .. } => "Property",
            Self::Function { .. } => "Function",
            Self::Lambda { .. } => "Lambda",
            Self::Case { .. } => "Case",
            Self::NewInstance { .. } => "NewInstance",
            Self::Scan(_) => "Scan",
            Self::Filter { .. } => "Filter",
            Self::Project { .. } => "Project",
            Self::GroupBy { .. } => "GroupBy",
            Self::CrossJoin(_) => "CrossJoin",
            Self::Join { .. } => "Join",
            Self::Apply { .. } => "Apply",
            Self::Quantifier { .. } => "Quantifier",
            Self::Sort { .. } => "Sort",
            Self::Skip { .. } => "Skip",
            Self::Limit { .. } => "Limit",
            Self::Distinct(_) => "Distinct",
            Self::Element(_) => "Element",
            Self::IsEmpty(_) => "IsEmpty",
            Self::SetOperation { .. } => "SetOperation",
            Self::And(..) => "And",
            Self::Or(..) => "Or",
            Self::Not(_) => "Not",
            Self::Arithmetic { .. } => "Arithmetic",
            Self::Comparison { .. } => "Comparison",
            Self::IsNull(_) => "IsNull",
            Self::Like { .. } => "Like",
            Self::Cast(_) => "Cast",
            Self::Treat(_) => "Treat",
            Self::OfType { .. } => "OfType",
            Self::IsOf { .. } => "IsOf",
            Self::Deref(_) => "Deref",
            Self::EntityRef(_) => "EntityRef",
            Self::RefKey(_) => "RefKey",
            Self::Ref { .. } => "Ref",
            Self::RelationshipNavigation { .. } => "RelationshipNavigation",
        }
    }
}

/// A typed expression node
#[derive(Debug, Clone, PartialEq)]
pub struct DbExpression {
    kind: DbExpressionKind,
    result_type: TypeUsage,
}

impl DbExpression {
    pub(crate) fn new(kind: DbExpressionKind, result_type: TypeUsage) -> Self {
        Self { kind, result_type }
    }

    pub fn kind(&self) -> &DbExpressionKind {
        &self.kind
    }

    pub fn result_type(&self) -> &TypeUsage {
        &self.result_type
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, DbExpressionKind::Constant(_))
    }

    pub fn is_parameter_reference(&self) -> bool {
        matches!(self.kind, DbExpressionKind::ParameterReference(_))
    }

    /// Literal value, for constant nodes
    pub fn constant_value(&self) -> Option<&ConstantValue> {
        match &self.kind {
            DbExpressionKind::Constant(value) => Some(value),
            _ => None,
        }
    }
}

/// An input expression bound to a variable name
#[derive(Debug, Clone, PartialEq)]
pub struct DbExpressionBinding {
    expression: DbExpression,
    variable_name: String,
    variable_type: TypeUsage,
}

impl DbExpressionBinding {
    pub(crate) fn new(expression: DbExpression, variable_name: String, variable_type: TypeUsage) -> Self {
        Self {
            expression,
            variable_name,
            variable_type,
        }
    }

    pub fn expression(&self) -> &DbExpression {
        &self.expression
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// Element type of the bound collection
    pub fn variable_type(&self) -> &TypeUsage {
        &self.variable_type
    }

    /// Reference to the bound variable
    pub fn variable(&self) -> DbExpression {
        DbExpression::new(
            DbExpressionKind::VariableReference(self.variable_name.clone()),
            self.variable_type.clone(),
        )
    }
}

/// Input binding of a GroupBy, with a second variable naming the group
#[derive(Debug, Clone, PartialEq)]
pub struct DbGroupExpressionBinding {
    expression: DbExpression,
    variable_name: String,
    group_variable_name: String,
    variable_type: TypeUsage,
}

impl DbGroupExpressionBinding {
    pub(crate) fn new(
        expression: DbExpression,
        variable_name: String,
        group_variable_name: String,
        variable_type: TypeUsage,
    ) -> Self {
        Self {
            expression,
            variable_name,
            group_variable_name,
            variable_type,
        }
    }

    pub fn expression(&self) -> &DbExpression {
        &self.expression
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn group_variable_name(&self) -> &str {
        &self.group_variable_name
    }

    pub fn variable_type(&self) -> &TypeUsage {
        &self.variable_type
    }

    pub fn variable(&self) -> DbExpression {
        DbExpression::new(
            DbExpressionKind::VariableReference(self.variable_name.clone()),
            self.variable_type.clone(),
        )
    }

    /// Reference to the current group, a collection of the element type
    pub fn group_variable(&self) -> DbExpression {
        DbExpression::new(
            DbExpressionKind::VariableReference(self.group_variable_name.clone()),
            TypeUsage::collection_of(self.variable_type.clone()),
        )
    }
}

/// An aggregate computed by GroupBy
#[derive(Debug, Clone, PartialEq)]
pub enum DbAggregate {
    Function {
        function: Arc<EdmFunction>,
        distinct: bool,
        arguments: Vec<DbExpression>,
        result_type: TypeUsage,
    },
    /// Captures the whole group as a collection
    Group {
        argument: Box<DbExpression>,
        result_type: TypeUsage,
    },
}

impl DbAggregate {
    pub fn result_type(&self) -> &TypeUsage {
        match self {
            Self::Function { result_type, .. } | Self::Group { result_type, .. } => result_type,
        }
    }

    pub fn is_group_aggregate(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbSortClause {
    pub expression: DbExpression,
    pub ascending: bool,
    pub collation: Option<String>,
}

/// A lambda: named, typed variables over a body
#[derive(Debug, Clone, PartialEq)]
pub struct DbLambda {
    variables: Vec<(String, TypeUsage)>,
    body: DbExpression,
}

impl DbLambda {
    pub(crate) fn new(variables: Vec<(String, TypeUsage)>, body: DbExpression) -> Self {
        Self { variables, body }
    }

    pub fn variables(&self) -> &[(String, TypeUsage)] {
        &self.variables
    }

    pub fn body(&self) -> &DbExpression {
        &self.body
    }
}

/// A related entity supplied when constructing an entity
#[derive(Debug, Clone, PartialEq)]
pub struct DbRelatedEntityRef {
    pub source_end: RelationshipEndMember,
    pub target_end: RelationshipEndMember,
    pub target_entity_ref: DbExpression,
}
