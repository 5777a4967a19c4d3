//! Argument validation for command-tree construction
//!
//! Each `validate_*` checks the preconditions of one node kind and
//! computes its result type. Validation is fail-fast: the first violated
//! precondition is returned as a [`ValidationError`] naming the offending
//! argument, and no node is built.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use edmcheck_core::{
    AssociationType, DataSpace, EdmFunction, EdmProperty, EdmType, EntitySetDef, EntityTypeDef,
    FunctionParameter, PrimitiveTypeKind, RelationshipEndMember, RelationshipMultiplicity,
    TypeUsage,
};
use regex::Regex;

use crate::expression::{
    ComparisonOperator, ConstantValue, DbAggregate, DbExpression, DbExpressionBinding,
    DbLambda, DbRelatedEntityRef, DbSortClause,
};
use crate::semantics::TypeSemantics;

/// Argument validation failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Type mismatch for '{argument}': {actual} is not compatible with {expected}")]
    TypeMismatch {
        argument: String,
        actual: String,
        expected: String,
    },

    #[error("'{argument}' of {operation} must have a collection type")]
    CollectionRequired { operation: String, argument: String },

    #[error("'{argument}' is not a valid variable name")]
    InvalidVariableName { argument: String },

    #[error("'{argument}' is not a valid parameter name: '{name}'")]
    InvalidParameterName { argument: String, name: String },

    #[error("Duplicate name '{name}' in '{argument}'")]
    DuplicateName { argument: String, name: String },

    #[error("'{argument}' must not be empty")]
    EmptyArgument { argument: String },

    #[error("'{argument}' expects {expected} element(s), got {actual}")]
    ArgumentCount {
        argument: String,
        expected: usize,
        actual: usize,
    },

    #[error("No common type for '{argument}' of {operation}")]
    NoCommonType { operation: String, argument: String },

    #[error("Metadata for '{argument}' does not belong to data space {expected}")]
    IncorrectDataSpace { argument: String, expected: DataSpace },

    #[error("'{member}' is not a member of {type_name}")]
    NoSuchMember {
        argument: String,
        member: String,
        type_name: String,
    },

    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("Variable '{name}' in '{argument}' is not bound by an enclosing expression")]
    UnboundVariable { argument: String, name: String },
}

impl ValidationError {
    /// Name of the offending argument
    pub fn argument(&self) -> &str {
        match self {
            Self::TypeMismatch { argument, .. }
            | Self::CollectionRequired { argument, .. }
            | Self::InvalidVariableName { argument }
            | Self::InvalidParameterName { argument, .. }
            | Self::DuplicateName { argument, .. }
            | Self::EmptyArgument { argument }
            | Self::ArgumentCount { argument, .. }
            | Self::NoCommonType { argument, .. }
            | Self::IncorrectDataSpace { argument, .. }
            | Self::NoSuchMember { argument, .. }
            | Self::InvalidArgument { argument, .. }
            | Self::UnboundVariable { argument, .. } => argument,
        }
    }

    fn invalid(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// `arguments[2]`
fn indexed(argument: &str, index: usize) -> String {
    format!("{}[{}]", argument, index)
}

/// Validates command-tree arguments against one data space
#[derive(Debug, Clone)]
pub struct ArgumentValidation {
    space: DataSpace,
    parameter_name: Regex,
}

impl ArgumentValidation {
    pub fn new(space: DataSpace) -> Self {
        Self {
            space,
            parameter_name: Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$")
                .unwrap_or_else(|_| unreachable!("parameter name pattern is valid")),
        }
    }

    pub fn space(&self) -> DataSpace {
        self.space
    }

    // ----- metadata checks -----

    /// Whether a type only references metadata of this tree's data space
    ///
    /// Primitive types are shared by every space. Transient types (row,
    /// collection, ref) are checked through their component types.
    pub fn check_data_space(&self, type_usage: &TypeUsage) -> bool {
        match type_usage.edm_type() {
            EdmType::Primitive(_) => true,
            EdmType::Row(row) => row
                .properties
                .iter()
                .all(|p| self.check_data_space(&p.type_usage)),
            EdmType::Collection(element) => self.check_data_space(element),
            EdmType::Ref(entity) => entity.space == self.space,
            other => other.data_space() == Some(self.space),
        }
    }

    /// Conceptual functions are shared across spaces
    fn check_function_space(&self, function: &EdmFunction) -> bool {
        function.space == DataSpace::CSpace || function.space == self.space
    }

    fn check_type(&self, type_usage: &TypeUsage, argument: &str) -> Result<()> {
        if !self.check_data_space(type_usage) {
            return Err(ValidationError::IncorrectDataSpace {
                argument: argument.to_string(),
                expected: self.space,
            });
        }
        Ok(())
    }

    fn check_entity_type(&self, entity: &EntityTypeDef, argument: &str) -> Result<()> {
        if entity.space != self.space {
            return Err(ValidationError::IncorrectDataSpace {
                argument: argument.to_string(),
                expected: self.space,
            });
        }
        Ok(())
    }

    fn check_entity_set(&self, entity_set: &EntitySetDef, argument: &str) -> Result<()> {
        if entity_set.container.is_empty() {
            return Err(ValidationError::invalid(argument, "entity set has no container"));
        }
        if entity_set.space != self.space || entity_set.element_type.space != self.space {
            return Err(ValidationError::IncorrectDataSpace {
                argument: argument.to_string(),
                expected: self.space,
            });
        }
        Ok(())
    }

    fn check_function(&self, function: &EdmFunction) -> Result<()> {
        if !self.check_function_space(function) {
            return Err(ValidationError::IncorrectDataSpace {
                argument: "function".to_string(),
                expected: self.space,
            });
        }

        if function.is_composable && function.return_type.is_none() {
            return Err(ValidationError::invalid(
                "function",
                "composable function has no return type",
            ));
        }

        if let Some(return_type) = &function.return_type {
            if function.space != DataSpace::CSpace || self.space == DataSpace::CSpace {
                self.check_type(return_type, "function.ReturnParameter")?;
            }
        }

        for (index, parameter) in function.parameters.iter().enumerate() {
            if function.space != DataSpace::CSpace || self.space == DataSpace::CSpace {
                self.check_type(&parameter.type_usage, &indexed("function.Parameters", index))?;
            }
        }
        Ok(())
    }

    fn check_member(&self, member: &RelationshipEndMember, argument: &str) -> Result<()> {
        self.check_entity_type(&member.entity_type, argument)
    }

    // ----- type requirements -----

    fn require_compatible_type(
        expression: &DbExpression,
        required: &TypeUsage,
        argument: &str,
    ) -> Result<()> {
        if !TypeSemantics::is_structurally_equal_or_promotable_to(expression.result_type(), required) {
            return Err(ValidationError::TypeMismatch {
                argument: argument.to_string(),
                actual: expression.result_type().to_string(),
                expected: required.to_string(),
            });
        }
        Ok(())
    }

    /// Exact primitive kind; no promotion
    fn require_primitive(
        expression: &DbExpression,
        required: PrimitiveTypeKind,
        argument: &str,
    ) -> Result<()> {
        match expression.result_type().primitive_kind() {
            Some(kind) if kind == required => Ok(()),
            actual => Err(ValidationError::TypeMismatch {
                argument: argument.to_string(),
                actual: actual
                    .map(|k| k.name().to_string())
                    .unwrap_or_else(|| expression.result_type().to_string()),
                expected: required.name().to_string(),
            }),
        }
    }

    fn require_polymorphic_type(type_usage: &TypeUsage) -> Result<()> {
        if !TypeSemantics::is_polymorphic_type(type_usage) {
            return Err(ValidationError::invalid(
                "type",
                format!("polymorphic type required, got {}", type_usage),
            ));
        }
        Ok(())
    }

    fn require_collection(argument: &DbExpression, operation: &str) -> Result<TypeUsage> {
        argument
            .result_type()
            .element_type()
            .cloned()
            .ok_or_else(|| ValidationError::CollectionRequired {
                operation: operation.to_string(),
                argument: "argument".to_string(),
            })
    }

    fn require_collection_arguments(
        left: &DbExpression,
        right: &DbExpression,
        operation: &str,
    ) -> Result<TypeUsage> {
        if !left.result_type().is_collection() || !right.result_type().is_collection() {
            return Err(ValidationError::CollectionRequired {
                operation: operation.to_string(),
                argument: if left.result_type().is_collection() { "right" } else { "left" }
                    .to_string(),
            });
        }

        TypeSemantics::common_type(left.result_type(), right.result_type()).ok_or_else(|| {
            ValidationError::NoCommonType {
                operation: operation.to_string(),
                argument: "right".to_string(),
            }
        })
    }

    fn require_comparable_collection_arguments(
        left: &DbExpression,
        right: &DbExpression,
        operation: &str,
    ) -> Result<TypeUsage> {
        let result = Self::require_collection_arguments(left, right, operation)?;

        for (argument, side) in [("left", left), ("right", right)] {
            if let Some(element) = side.result_type().element_type() {
                if !TypeSemantics::is_set_comparable(element) {
                    return Err(ValidationError::invalid(
                        argument,
                        format!("{} is not valid for {}", element.identity(), operation),
                    ));
                }
            }
        }
        Ok(result)
    }

    /// Navigation source must match the end's entity type
    fn require_compatible_end(
        from: &DbExpression,
        end: &RelationshipEndMember,
        allow_all_relationships_in_same_type_hierarchy: bool,
    ) -> Result<()> {
        let end_type = end.type_usage();
        let compatible = if allow_all_relationships_in_same_type_hierarchy {
            TypeSemantics::has_common_type(&end_type, from.result_type())
        } else {
            TypeSemantics::is_structurally_equal_or_promotable_to(from.result_type(), &end_type)
        };

        if !compatible {
            return Err(ValidationError::TypeMismatch {
                argument: "from".to_string(),
                actual: from.result_type().to_string(),
                expected: end_type.to_string(),
            });
        }
        Ok(())
    }

    /// Exact count of elements
    fn require_count(argument: &str, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(ValidationError::ArgumentCount {
                argument: argument.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn require_non_empty(argument: &str, len: usize) -> Result<()> {
        if len == 0 {
            return Err(ValidationError::EmptyArgument {
                argument: argument.to_string(),
            });
        }
        Ok(())
    }

    /// Names non-empty and unique
    fn check_names<'a, I>(names: I, argument: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        for (index, name) in names.into_iter().enumerate() {
            if name.is_empty() {
                return Err(ValidationError::EmptyArgument {
                    argument: format!("{}.Key", indexed(argument, index)),
                });
            }
            if !seen.insert(name) {
                return Err(ValidationError::DuplicateName {
                    argument: argument.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_constant_negative_integer(expression: &DbExpression) -> bool {
        expression
            .constant_value()
            .and_then(ConstantValue::as_i64)
            .is_some_and(|value| value < 0)
    }

    // ----- bindings -----

    pub fn validate_bind_as(&self, input: &DbExpression, var_name: &str) -> Result<TypeUsage> {
        if var_name.is_empty() {
            return Err(ValidationError::InvalidVariableName {
                argument: "varName".to_string(),
            });
        }

        input
            .result_type()
            .element_type()
            .cloned()
            .ok_or_else(|| ValidationError::CollectionRequired {
                operation: "binding".to_string(),
                argument: "input".to_string(),
            })
    }

    pub fn validate_group_bind_as(
        &self,
        input: &DbExpression,
        var_name: &str,
        group_var_name: &str,
    ) -> Result<TypeUsage> {
        if var_name.is_empty() {
            return Err(ValidationError::InvalidVariableName {
                argument: "varName".to_string(),
            });
        }
        if group_var_name.is_empty() {
            return Err(ValidationError::InvalidVariableName {
                argument: "groupVarName".to_string(),
            });
        }

        input
            .result_type()
            .element_type()
            .cloned()
            .ok_or_else(|| ValidationError::CollectionRequired {
                operation: "group binding".to_string(),
                argument: "input".to_string(),
            })
    }

    // ----- aggregates and sort keys -----

    /// Returns the aggregate's result type
    pub fn validate_function_aggregate(
        &self,
        function: &EdmFunction,
        arguments: &[DbExpression],
    ) -> Result<TypeUsage> {
        self.check_function(function)?;

        let return_type = match (&function.return_type, function.is_aggregate) {
            (Some(return_type), true) => return_type.clone(),
            _ => {
                return Err(ValidationError::invalid(
                    "function",
                    format!("{} is not an aggregate function", function.full_name()),
                ))
            }
        };

        let expected = function.expected_parameters();
        Self::require_non_empty("argument", arguments.len())?;
        Self::require_count("argument", expected.len(), arguments.len())?;

        for (argument, parameter) in arguments.iter().zip(&expected) {
            // Aggregate parameters are collections of the per-row argument type
            let parameter_type = parameter
                .type_usage
                .element_type()
                .unwrap_or(&parameter.type_usage);
            Self::require_compatible_type(argument, parameter_type, "argument")?;
        }

        Ok(return_type)
    }

    /// A group aggregate yields a collection of its argument's type
    pub fn validate_group_aggregate(&self, argument: &DbExpression) -> TypeUsage {
        TypeUsage::collection_of(argument.result_type().clone())
    }

    pub fn validate_sort_clause(&self, key: &DbExpression, collation: Option<&str>) -> Result<()> {
        if !TypeSemantics::is_valid_sort_key(key.result_type()) {
            return Err(ValidationError::invalid("key", "sort key must be order comparable"));
        }

        if let Some(collation) = collation {
            if collation.trim().is_empty() {
                return Err(ValidationError::invalid("collation", "collation must not be empty"));
            }
            if !TypeSemantics::is_primitive_kind(key.result_type(), PrimitiveTypeKind::String) {
                return Err(ValidationError::invalid(
                    "collation",
                    "collation is only valid for string sort keys",
                ));
            }
        }
        Ok(())
    }

    // ----- lambda -----

    pub fn validate_lambda(&self, variables: &[(String, TypeUsage)]) -> Result<()> {
        Self::check_names(variables.iter().map(|(name, _)| name.as_str()), "variables")?;
        for (index, (_, type_usage)) in variables.iter().enumerate() {
            self.check_type(type_usage, &indexed("variables", index))?;
        }
        Ok(())
    }

    // ----- binding-based operators -----

    pub fn validate_quantifier(&self, predicate: &DbExpression) -> Result<TypeUsage> {
        Self::require_primitive(predicate, PrimitiveTypeKind::Boolean, "predicate")?;
        Ok(predicate.result_type().clone())
    }

    pub fn validate_apply(
        &self,
        input: &DbExpressionBinding,
        apply: &DbExpressionBinding,
    ) -> Result<TypeUsage> {
        if input.variable_name() == apply.variable_name() {
            return Err(ValidationError::DuplicateName {
                argument: "apply".to_string(),
                name: apply.variable_name().to_string(),
            });
        }

        Ok(TypeUsage::collection_of(TypeUsage::row(vec![
            (input.variable_name(), input.variable_type().clone()),
            (apply.variable_name(), apply.variable_type().clone()),
        ])))
    }

    pub fn validate_cross_join(&self, inputs: &[DbExpressionBinding]) -> Result<TypeUsage> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (index, input) in inputs.iter().enumerate() {
            if let Some(first) = positions.insert(input.variable_name(), index) {
                return Err(ValidationError::DuplicateName {
                    argument: format!("inputs[{}], inputs[{}]", first, index),
                    name: input.variable_name().to_string(),
                });
            }
        }

        if inputs.len() < 2 {
            return Err(ValidationError::invalid("inputs", "at least two inputs are required"));
        }

        Ok(TypeUsage::collection_of(TypeUsage::row(
            inputs
                .iter()
                .map(|input| (input.variable_name(), input.variable_type().clone())),
        )))
    }

    pub fn validate_join(
        &self,
        left: &DbExpressionBinding,
        right: &DbExpressionBinding,
        condition: &DbExpression,
    ) -> Result<TypeUsage> {
        if left.variable_name() == right.variable_name() {
            return Err(ValidationError::DuplicateName {
                argument: "right".to_string(),
                name: right.variable_name().to_string(),
            });
        }

        Self::require_primitive(condition, PrimitiveTypeKind::Boolean, "joinCondition")?;

        Ok(TypeUsage::collection_of(TypeUsage::row(vec![
            (left.variable_name(), left.variable_type().clone()),
            (right.variable_name(), right.variable_type().clone()),
        ])))
    }

    pub fn validate_filter(
        &self,
        input: &DbExpressionBinding,
        predicate: &DbExpression,
    ) -> Result<TypeUsage> {
        Self::require_primitive(predicate, PrimitiveTypeKind::Boolean, "predicate")?;
        Ok(input.expression().result_type().clone())
    }

    /// Result is a collection of rows: keys first, then aggregates, each in input order
    pub fn validate_group_by(
        &self,
        keys: &[(String, DbExpression)],
        aggregates: &[(String, DbAggregate)],
    ) -> Result<TypeUsage> {
        let mut columns: Vec<(String, TypeUsage)> = Vec::with_capacity(keys.len() + aggregates.len());

        Self::check_names(keys.iter().map(|(name, _)| name.as_str()), "keys")?;
        for (name, key) in keys {
            if !TypeSemantics::is_set_comparable(key.result_type()) {
                return Err(ValidationError::invalid(
                    "keys",
                    format!("grouping key '{}' is not equality comparable", name),
                ));
            }
            columns.push((name.clone(), key.result_type().clone()));
        }

        Self::check_names(aggregates.iter().map(|(name, _)| name.as_str()), "aggregates")?;
        let key_names: HashSet<&str> = keys.iter().map(|(name, _)| name.as_str()).collect();
        let mut has_group_aggregate = false;
        for (name, aggregate) in aggregates {
            if key_names.contains(name.as_str()) {
                return Err(ValidationError::DuplicateName {
                    argument: "aggregates".to_string(),
                    name: name.clone(),
                });
            }

            if aggregate.is_group_aggregate() {
                if has_group_aggregate {
                    return Err(ValidationError::invalid(
                        "aggregates",
                        "at most one group aggregate can be specified",
                    ));
                }
                has_group_aggregate = true;
            }

            columns.push((name.clone(), aggregate.result_type().clone()));
        }

        if keys.is_empty() && aggregates.is_empty() {
            return Err(ValidationError::invalid(
                "keys",
                "at least one key or aggregate is required",
            ));
        }

        Ok(TypeUsage::collection_of(TypeUsage::row(columns)))
    }

    pub fn validate_project(&self, projection: &DbExpression) -> TypeUsage {
        TypeUsage::collection_of(projection.result_type().clone())
    }

    pub fn validate_sort(&self, sort_order: &[DbSortClause]) -> Result<()> {
        Self::require_non_empty("sortOrder", sort_order.len())
    }

    /// Count must be an integer constant or parameter reference
    pub fn validate_skip(&self, sort_order: &[DbSortClause], count: &DbExpression) -> Result<()> {
        self.validate_sort(sort_order)?;
        Self::validate_count(count, "count", "Skip")
    }

    pub fn validate_limit(&self, argument: &DbExpression, limit: &DbExpression) -> Result<TypeUsage> {
        Self::require_collection(argument, "Limit")?;
        Self::validate_count(limit, "limit", "Limit")?;
        Ok(argument.result_type().clone())
    }

    fn validate_count(count: &DbExpression, argument: &str, operation: &str) -> Result<()> {
        if !TypeSemantics::is_integer(count.result_type()) {
            return Err(ValidationError::invalid(
                argument,
                format!("{} requires an integer count", operation),
            ));
        }

        if !count.is_constant() && !count.is_parameter_reference() {
            return Err(ValidationError::invalid(
                argument,
                format!("{} count must be a constant or a parameter reference", operation),
            ));
        }

        if Self::is_constant_negative_integer(count) {
            return Err(ValidationError::invalid(
                argument,
                format!("{} count must not be negative", operation),
            ));
        }
        Ok(())
    }

    // ----- leaves -----

    pub fn validate_null(&self, null_type: &TypeUsage) -> Result<()> {
        self.check_type(null_type, "nullType")
    }

    /// Literal type of an untyped constant
    pub fn validate_constant(&self, value: &ConstantValue) -> TypeUsage {
        TypeUsage::primitive(value.primitive_kind())
    }

    /// Constant of an explicit primitive or enum type
    pub fn validate_typed_constant(&self, constant_type: &TypeUsage, value: &ConstantValue) -> Result<()> {
        self.check_type(constant_type, "constantType")?;

        let value_kind = value.primitive_kind();
        match constant_type.edm_type() {
            EdmType::Enum(enum_type) => {
                if enum_type.underlying_type != value_kind {
                    return Err(ValidationError::invalid(
                        "value",
                        format!(
                            "value of type {} does not match the underlying type of {}",
                            value_kind,
                            enum_type.full_name()
                        ),
                    ));
                }
            }
            EdmType::Primitive(kind) => {
                if *kind != value_kind {
                    return Err(ValidationError::invalid(
                        "value",
                        format!("value is not valid for type {}", constant_type),
                    ));
                }
            }
            _ => {
                return Err(ValidationError::invalid(
                    "constantType",
                    "constant type must be a primitive or enum type",
                ))
            }
        }
        Ok(())
    }

    pub fn validate_parameter(&self, type_usage: &TypeUsage, name: &str) -> Result<()> {
        self.check_type(type_usage, "type")?;

        if !self.is_valid_parameter_name(name) {
            return Err(ValidationError::InvalidParameterName {
                argument: "name".to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_valid_parameter_name(&self, name: &str) -> bool {
        self.parameter_name.is_match(name)
    }

    pub fn validate_scan(&self, entity_set: &EntitySetDef) -> Result<TypeUsage> {
        self.check_entity_set(entity_set, "targetSet")?;
        Ok(TypeUsage::collection_of(TypeUsage::entity(entity_set.element_type.clone())))
    }

    pub fn validate_variable(&self, type_usage: &TypeUsage, name: &str) -> Result<()> {
        self.check_type(type_usage, "type")?;

        if name.is_empty() {
            return Err(ValidationError::InvalidVariableName {
                argument: "name".to_string(),
            });
        }
        Ok(())
    }

    // ----- boolean operators -----

    pub fn validate_and(&self, left: &DbExpression, right: &DbExpression) -> Result<TypeUsage> {
        Self::validate_boolean_binary(left, right, "And")
    }

    pub fn validate_or(&self, left: &DbExpression, right: &DbExpression) -> Result<TypeUsage> {
        Self::validate_boolean_binary(left, right, "Or")
    }

    fn validate_boolean_binary(left: &DbExpression, right: &DbExpression, operation: &str) -> Result<TypeUsage> {
        match TypeSemantics::common_type(left.result_type(), right.result_type()) {
            Some(common) if TypeSemantics::is_boolean(&common) => Ok(common),
            _ => Err(ValidationError::invalid(
                "right",
                format!("{} requires boolean arguments", operation),
            )),
        }
    }

    pub fn validate_not(&self, argument: &DbExpression) -> Result<TypeUsage> {
        if !TypeSemantics::is_boolean(argument.result_type()) {
            return Err(ValidationError::invalid("argument", "Not requires a boolean argument"));
        }
        Ok(argument.result_type().clone())
    }

    // ----- arithmetic -----

    /// Unary minus; an unsigned argument promotes to the next wider type
    pub fn validate_unary_arithmetic(&self, argument: &DbExpression) -> Result<TypeUsage> {
        let result_type = argument.result_type();
        if !TypeSemantics::is_numeric(result_type) {
            return Err(ValidationError::invalid(
                "argument",
                "arithmetic requires a numeric argument",
            ));
        }

        if TypeSemantics::is_unsigned(result_type) {
            return TypeSemantics::closest_promotable_type(result_type).ok_or_else(|| {
                ValidationError::invalid(
                    "argument",
                    format!("unsigned type {} cannot be negated", result_type),
                )
            });
        }

        Ok(result_type.clone())
    }

    pub fn validate_binary_arithmetic(&self, left: &DbExpression, right: &DbExpression) -> Result<TypeUsage> {
        match TypeSemantics::common_type(left.result_type(), right.result_type()) {
            Some(common) if TypeSemantics::is_numeric(&common) => Ok(common),
            _ => Err(ValidationError::invalid(
                "right",
                "arithmetic requires arguments with a common numeric type",
            )),
        }
    }

    // ----- comparison -----

    pub fn validate_comparison(
        &self,
        operator: ComparisonOperator,
        left: &DbExpression,
        right: &DbExpression,
    ) -> Result<TypeUsage> {
        let equality = !operator.needs_equality()
            || TypeSemantics::is_equal_comparable_to(left.result_type(), right.result_type());
        let order = !operator.needs_order()
            || TypeSemantics::is_order_comparable_to(left.result_type(), right.result_type());

        if !equality || !order {
            return Err(ValidationError::invalid(
                "right",
                format!(
                    "{} and {} are not comparable",
                    left.result_type(),
                    right.result_type()
                ),
            ));
        }

        Ok(TypeUsage::boolean())
    }

    pub fn validate_is_null(&self, argument: &DbExpression) -> Result<TypeUsage> {
        if argument.result_type().is_collection() {
            return Err(ValidationError::invalid(
                "argument",
                "IsNull is not valid for collections",
            ));
        }

        if !TypeSemantics::is_valid_is_null_operand(argument.result_type()) {
            return Err(ValidationError::invalid(
                "argument",
                format!("IsNull is not valid for {}", argument.result_type()),
            ));
        }

        Ok(TypeUsage::boolean())
    }

    pub fn validate_like(
        &self,
        argument: &DbExpression,
        pattern: &DbExpression,
        escape: Option<&DbExpression>,
    ) -> Result<TypeUsage> {
        Self::require_primitive(argument, PrimitiveTypeKind::String, "argument")?;
        Self::require_primitive(pattern, PrimitiveTypeKind::String, "pattern")?;
        if let Some(escape) = escape {
            Self::require_primitive(escape, PrimitiveTypeKind::String, "escape")?;
        }
        Ok(TypeUsage::boolean())
    }

    // ----- type operators -----

    pub fn validate_cast(&self, argument: &DbExpression, to_type: &TypeUsage) -> Result<()> {
        self.check_type(to_type, "toType")?;

        if !TypeSemantics::is_cast_allowed(argument.result_type(), to_type) {
            return Err(ValidationError::invalid(
                "toType",
                format!("cannot cast {} to {}", argument.result_type(), to_type),
            ));
        }
        Ok(())
    }

    pub fn validate_treat(&self, argument: &DbExpression, as_type: &TypeUsage) -> Result<()> {
        self.check_type(as_type, "asType")?;
        Self::require_polymorphic_type(as_type)?;

        if !TypeSemantics::is_valid_polymorphic_cast(argument.result_type(), as_type) {
            return Err(ValidationError::invalid(
                "argument",
                "Treat requires a polymorphic argument in the same hierarchy",
            ));
        }
        Ok(())
    }

    pub fn validate_of_type(&self, argument: &DbExpression, of_type: &TypeUsage) -> Result<TypeUsage> {
        self.check_type(of_type, "type")?;
        Self::require_polymorphic_type(of_type)?;
        let element = Self::require_collection(argument, "OfType")?;

        if !TypeSemantics::is_valid_polymorphic_cast(&element, of_type) {
            return Err(ValidationError::invalid(
                "argument",
                "OfType requires a polymorphic argument in the same hierarchy",
            ));
        }

        Ok(TypeUsage::collection_of(of_type.clone()))
    }

    pub fn validate_is_of(&self, argument: &DbExpression, of_type: &TypeUsage) -> Result<TypeUsage> {
        self.check_type(of_type, "type")?;
        Self::require_polymorphic_type(of_type)?;

        if !TypeSemantics::is_valid_polymorphic_cast(argument.result_type(), of_type) {
            return Err(ValidationError::invalid(
                "argument",
                "IsOf requires a polymorphic argument in the same hierarchy",
            ));
        }
        Ok(TypeUsage::boolean())
    }

    // ----- ref operators -----

    pub fn validate_deref(&self, argument: &DbExpression) -> Result<TypeUsage> {
        argument
            .result_type()
            .ref_entity()
            .map(|entity| TypeUsage::entity(entity.clone()))
            .ok_or_else(|| ValidationError::invalid("argument", "Deref requires a reference"))
    }

    pub fn validate_entity_ref(&self, argument: &DbExpression) -> Result<TypeUsage> {
        argument
            .result_type()
            .as_entity()
            .map(|entity| TypeUsage::ref_to(entity.clone()))
            .ok_or_else(|| ValidationError::invalid("argument", "EntityRef requires an entity"))
    }

    /// Key values are matched positionally against the entity type's key members
    pub fn validate_create_ref(
        &self,
        entity_set: &EntitySetDef,
        entity_type: &Arc<EntityTypeDef>,
        key_values: &[DbExpression],
    ) -> Result<TypeUsage> {
        self.check_entity_set(entity_set, "entitySet")?;
        self.check_entity_type(entity_type, "entityType")?;

        if !TypeSemantics::is_valid_polymorphic_cast(
            &TypeUsage::entity(entity_set.element_type.clone()),
            &TypeUsage::entity(entity_type.clone()),
        ) {
            return Err(ValidationError::invalid(
                "entityType",
                "entity type is not in the hierarchy of the entity set",
            ));
        }

        let key_members = entity_type.key_properties();
        Self::require_non_empty("keyValues", key_values.len())?;
        Self::require_count("keyValues", key_members.len(), key_values.len())?;
        for (index, (value, member)) in key_values.iter().zip(&key_members).enumerate() {
            Self::require_compatible_type(value, &member.type_usage, &indexed("keyValues", index))?;
        }

        Ok(TypeUsage::ref_to(entity_type.clone()))
    }

    /// `key_values` must be a row promotable to the key row of the set's element type
    pub fn validate_ref_from_key(
        &self,
        entity_set: &EntitySetDef,
        key_values: &DbExpression,
        entity_type: &Arc<EntityTypeDef>,
    ) -> Result<TypeUsage> {
        self.check_entity_set(entity_set, "entitySet")?;
        self.check_entity_type(entity_type, "type")?;

        if !TypeSemantics::is_valid_polymorphic_cast(
            &TypeUsage::entity(entity_set.element_type.clone()),
            &TypeUsage::entity(entity_type.clone()),
        ) {
            return Err(ValidationError::invalid(
                "entityType",
                "entity type is not in the hierarchy of the entity set",
            ));
        }

        let key_type = Self::key_row_type(&entity_set.element_type);
        Self::require_compatible_type(key_values, &key_type, "keyValues")?;

        Ok(TypeUsage::ref_to(entity_type.clone()))
    }

    pub fn validate_ref_key(&self, argument: &DbExpression) -> Result<TypeUsage> {
        argument
            .result_type()
            .ref_entity()
            .map(|entity| Self::key_row_type(entity))
            .ok_or_else(|| ValidationError::invalid("argument", "RefKey requires a reference"))
    }

    fn key_row_type(entity: &EntityTypeDef) -> TypeUsage {
        TypeUsage::row(
            entity
                .key_properties()
                .into_iter()
                .map(|p| (p.name.clone(), p.type_usage.clone())),
        )
    }

    /// End names are matched case-sensitively
    pub fn validate_navigate(
        &self,
        from: &DbExpression,
        relationship: &AssociationType,
        from_end_name: &str,
        to_end_name: &str,
    ) -> Result<TypeUsage> {
        if relationship.space != self.space {
            return Err(ValidationError::IncorrectDataSpace {
                argument: "type".to_string(),
                expected: self.space,
            });
        }

        let from_end = relationship.end(from_end_name).ok_or_else(|| ValidationError::NoSuchMember {
            argument: "fromEndName".to_string(),
            member: from_end_name.to_string(),
            type_name: relationship.full_name(),
        })?;
        let to_end = relationship.end(to_end_name).ok_or_else(|| ValidationError::NoSuchMember {
            argument: "toEndName".to_string(),
            member: to_end_name.to_string(),
            type_name: relationship.full_name(),
        })?;

        Self::require_compatible_end(from, from_end, false)?;
        Ok(Self::end_result_type(to_end))
    }

    /// Both ends must be declared by the same relationship
    pub fn validate_navigate_by_ends(
        &self,
        from: &DbExpression,
        from_end: &RelationshipEndMember,
        to_end: &RelationshipEndMember,
        allow_all_relationships_in_same_type_hierarchy: bool,
    ) -> Result<TypeUsage> {
        self.check_member(from_end, "fromEnd")?;
        self.check_member(to_end, "toEnd")?;

        if from_end.declaring_relationship != to_end.declaring_relationship {
            return Err(ValidationError::invalid(
                "toEnd",
                "relationship ends are declared by different relationships",
            ));
        }

        Self::require_compatible_end(from, from_end, allow_all_relationships_in_same_type_hierarchy)?;
        Ok(Self::end_result_type(to_end))
    }

    /// Ref to the end's entity, or a collection of refs for a Many end
    fn end_result_type(end: &RelationshipEndMember) -> TypeUsage {
        let reference = end.type_usage();
        if end.multiplicity == RelationshipMultiplicity::Many {
            TypeUsage::collection_of(reference)
        } else {
            reference
        }
    }

    // ----- collection operators -----

    pub fn validate_distinct(&self, argument: &DbExpression) -> Result<TypeUsage> {
        let element = Self::require_collection(argument, "Distinct")?;
        if !TypeSemantics::is_set_comparable(&element) {
            return Err(ValidationError::invalid(
                "argument",
                "Distinct requires an equality comparable element type",
            ));
        }
        Ok(argument.result_type().clone())
    }

    pub fn validate_element(&self, argument: &DbExpression) -> Result<TypeUsage> {
        Self::require_collection(argument, "Element")
    }

    pub fn validate_is_empty(&self, argument: &DbExpression) -> Result<TypeUsage> {
        Self::require_collection(argument, "IsEmpty")?;
        Ok(TypeUsage::boolean())
    }

    pub fn validate_except(&self, left: &DbExpression, right: &DbExpression) -> Result<TypeUsage> {
        Self::require_comparable_collection_arguments(left, right, "Except")?;
        Ok(left.result_type().clone())
    }

    pub fn validate_intersect(&self, left: &DbExpression, right: &DbExpression) -> Result<TypeUsage> {
        Self::require_comparable_collection_arguments(left, right, "Intersect")
    }

    pub fn validate_union_all(&self, left: &DbExpression, right: &DbExpression) -> Result<TypeUsage> {
        Self::require_collection_arguments(left, right, "UnionAll")
    }

    // ----- general operators -----

    /// Result is the left-to-right common type of every then plus the else
    pub fn validate_case(
        &self,
        whens: &[DbExpression],
        thens: &[DbExpression],
        otherwise: &DbExpression,
    ) -> Result<TypeUsage> {
        Self::require_non_empty("whenExpressions", whens.len())?;
        for (index, when) in whens.iter().enumerate() {
            Self::require_primitive(when, PrimitiveTypeKind::Boolean, &indexed("whenExpressions", index))?;
        }

        Self::require_non_empty("thenExpressions", thens.len())?;
        let mut common = thens[0].result_type().clone();
        for then in &thens[1..] {
            common = TypeSemantics::common_type(then.result_type(), &common).ok_or_else(|| {
                ValidationError::NoCommonType {
                    operation: "Case".to_string(),
                    argument: "thenExpressions".to_string(),
                }
            })?;
        }

        let common = TypeSemantics::common_type(otherwise.result_type(), &common).ok_or_else(|| {
            ValidationError::NoCommonType {
                operation: "Case".to_string(),
                argument: "elseExpression".to_string(),
            }
        })?;

        if whens.len() != thens.len() {
            return Err(ValidationError::ArgumentCount {
                argument: "thenExpressions".to_string(),
                expected: whens.len(),
                actual: thens.len(),
            });
        }

        Ok(common)
    }

    /// Arguments are matched against In and InOut parameters only
    pub fn validate_function(&self, function: &EdmFunction, arguments: &[DbExpression]) -> Result<TypeUsage> {
        self.check_function(function)?;

        if !function.is_composable {
            return Err(ValidationError::invalid(
                "function",
                "non-composable functions cannot be used in expressions",
            ));
        }

        if function.command_text.as_deref().is_some_and(|text| !text.is_empty())
            && !function.has_user_defined_body
        {
            return Err(ValidationError::invalid(
                "function",
                "functions with command text cannot be used in expressions",
            ));
        }

        let return_type = function
            .return_type
            .clone()
            .ok_or_else(|| ValidationError::invalid("function", "function returns no value"))?;

        let expected: Vec<&FunctionParameter> = function.expected_parameters();
        if !expected.is_empty() {
            Self::require_non_empty("arguments", arguments.len())?;
        }
        Self::require_count("arguments", expected.len(), arguments.len())?;
        for (index, (argument, parameter)) in arguments.iter().zip(&expected).enumerate() {
            Self::require_compatible_type(argument, &parameter.type_usage, &indexed("arguments", index))?;
        }

        Ok(return_type)
    }

    pub fn validate_invoke(&self, lambda: &DbLambda, arguments: &[DbExpression]) -> Result<TypeUsage> {
        Self::require_count("arguments", lambda.variables().len(), arguments.len())?;
        for (index, (argument, (_, variable_type))) in arguments.iter().zip(lambda.variables()).enumerate() {
            Self::require_compatible_type(argument, variable_type, &indexed("arguments", index))?;
        }
        Ok(lambda.body().result_type().clone())
    }

    pub fn validate_new_collection(&self, elements: &[DbExpression]) -> Result<TypeUsage> {
        Self::require_non_empty("elements", elements.len())?;

        TypeSemantics::common_type_of(elements.iter().map(DbExpression::result_type))
            .map(TypeUsage::collection_of)
            .ok_or_else(|| ValidationError::NoCommonType {
                operation: "NewCollection".to_string(),
                argument: "collectionElements".to_string(),
            })
    }

    pub fn validate_new_empty_collection(&self, collection_type: &TypeUsage) -> Result<TypeUsage> {
        self.check_type(collection_type, "collectionType")?;
        if !collection_type.is_collection() {
            return Err(ValidationError::CollectionRequired {
                operation: "NewEmptyCollection".to_string(),
                argument: "collectionType".to_string(),
            });
        }
        Ok(collection_type.clone())
    }

    pub fn validate_new_row(&self, columns: &[(String, DbExpression)]) -> Result<TypeUsage> {
        Self::require_non_empty("columnValues", columns.len())?;
        Self::check_names(columns.iter().map(|(name, _)| name.as_str()), "columnValues")?;

        Ok(TypeUsage::row(
            columns
                .iter()
                .map(|(name, value)| (name.clone(), value.result_type().clone())),
        ))
    }

    /// Collections take any number of compatible elements; structural
    /// types take exactly one argument per member, in member order
    pub fn validate_new(&self, instance_type: &TypeUsage, arguments: &[DbExpression]) -> Result<TypeUsage> {
        self.check_type(instance_type, "instanceType")?;

        if let Some(element) = instance_type.element_type() {
            for (index, argument) in arguments.iter().enumerate() {
                Self::require_compatible_type(argument, element, &indexed("arguments", index))?;
            }
            return Ok(instance_type.clone());
        }

        let member_types = Self::structural_member_types(instance_type)?;
        Self::require_non_empty("arguments", arguments.len())?;
        Self::require_count("arguments", member_types.len(), arguments.len())?;
        for (index, (argument, member_type)) in arguments.iter().zip(&member_types).enumerate() {
            Self::require_compatible_type(argument, member_type, &indexed("arguments", index))?;
        }

        Ok(instance_type.clone())
    }

    fn structural_member_types(instance_type: &TypeUsage) -> Result<Vec<TypeUsage>> {
        if instance_type.as_entity().is_some_and(|e| e.is_abstract) {
            return Err(ValidationError::invalid(
                "instanceType",
                format!("cannot instantiate abstract type {}", instance_type),
            ));
        }

        let members = instance_type.structural_members().ok_or_else(|| {
            ValidationError::invalid("instanceType", "structural type required")
        })?;

        if members.is_empty() {
            return Err(ValidationError::invalid(
                "instanceType",
                format!("cannot instantiate memberless type {}", instance_type),
            ));
        }

        Ok(members.into_iter().map(|m| m.type_usage.clone()).collect())
    }

    /// Each related ref's source end must be the entity type or one of its ancestors
    pub fn validate_new_entity_with_relationships(
        &self,
        entity_type: &Arc<EntityTypeDef>,
        attribute_values: &[DbExpression],
        relationships: &[DbRelatedEntityRef],
    ) -> Result<TypeUsage> {
        let result_type = self.validate_new(&TypeUsage::entity(entity_type.clone()), attribute_values)?;

        for (index, related) in relationships.iter().enumerate() {
            if !entity_type.is_sub_type_of(&related.source_end.entity_type) {
                return Err(ValidationError::invalid(
                    indexed("relationships", index),
                    "source end type is not valid for the entity",
                ));
            }
        }

        Ok(result_type)
    }

    /// Validate a related entity reference
    pub fn validate_related_entity_ref(
        &self,
        source_end: &RelationshipEndMember,
        target_end: &RelationshipEndMember,
        target_entity_ref: &DbExpression,
    ) -> Result<()> {
        self.check_member(source_end, "sourceEnd")?;
        self.check_member(target_end, "targetEnd")?;

        if source_end.declaring_relationship != target_end.declaring_relationship {
            return Err(ValidationError::invalid(
                "targetEnd",
                "relationship ends are declared by different relationships",
            ));
        }

        if target_end.multiplicity == RelationshipMultiplicity::Many {
            return Err(ValidationError::invalid(
                "targetEnd",
                "target end must have a multiplicity of at most one",
            ));
        }

        Self::require_compatible_type(target_entity_ref, &target_end.type_usage(), "targetEntity")
    }

    /// Instance must be (a subtype of) the property's declaring type
    pub fn validate_property(&self, instance: &DbExpression, property: &EdmProperty) -> Result<TypeUsage> {
        self.check_type(&property.type_usage, "property")?;

        let declared = match instance.result_type().edm_type() {
            EdmType::Entity(entity) => {
                self.check_entity_type(entity, "property")?;
                entity.hierarchy().contains(&property.declaring_type)
            }
            EdmType::Complex(complex) => complex.full_name() == property.declaring_type,
            EdmType::Row(row) => row.property(&property.name).is_some(),
            _ => false,
        };

        if !declared {
            return Err(ValidationError::TypeMismatch {
                argument: "instance".to_string(),
                actual: instance.result_type().to_string(),
                expected: property.declaring_type.clone(),
            });
        }

        Ok(property.type_usage.clone())
    }

    /// Look a member up by name; returns the member's name as declared and its type
    pub fn validate_property_by_name(
        &self,
        instance: &DbExpression,
        name: &str,
        ignore_case: bool,
    ) -> Result<(String, TypeUsage)> {
        let no_such = || ValidationError::NoSuchMember {
            argument: "propertyName".to_string(),
            member: name.to_string(),
            type_name: instance.result_type().to_string(),
        };

        let members = instance.result_type().structural_members().ok_or_else(no_such)?;
        members
            .into_iter()
            .find(|m| {
                if ignore_case {
                    m.name.eq_ignore_ascii_case(name)
                } else {
                    m.name == name
                }
            })
            .map(|m| (m.name.clone(), m.type_usage.clone()))
            .ok_or_else(no_such)
    }
}
