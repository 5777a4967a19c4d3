//! Command-tree construction
//!
//! [`CommandTreeBuilder`] is the only way to create expression nodes.
//! Every factory method runs the matching [`ArgumentValidation`] check
//! first, so an ill-typed node is never constructed.

use std::collections::BTreeMap;
use std::sync::Arc;

use edmcheck_core::{
    AssociationType, DataSpace, EdmFunction, EdmProperty, EntitySetDef, EntityTypeDef,
    RelationshipEndMember, TypeUsage,
};

use crate::expression::{
    ApplyKind, ArithmeticOperator, ComparisonOperator, ConstantValue, DbAggregate, DbExpression,
    DbExpressionBinding, DbExpressionKind, DbGroupExpressionBinding, DbLambda, DbRelatedEntityRef,
    DbSortClause, JoinKind, QuantifierKind, SetOperator,
};
use crate::validation::{ArgumentValidation, Result, ValidationError};

/// Builds validated expressions for one data space
#[derive(Debug, Clone)]
pub struct CommandTreeBuilder {
    validation: ArgumentValidation,

    /// Declared query parameters
    parameters: BTreeMap<String, TypeUsage>,
}

impl CommandTreeBuilder {
    pub fn new(space: DataSpace) -> Self {
        Self {
            validation: ArgumentValidation::new(space),
            parameters: BTreeMap::new(),
        }
    }

    pub fn space(&self) -> DataSpace {
        self.validation.space()
    }

    pub fn validation(&self) -> &ArgumentValidation {
        &self.validation
    }

    pub fn parameters(&self) -> &BTreeMap<String, TypeUsage> {
        &self.parameters
    }

    /// Declare a query parameter; names are unique per tree
    pub fn declare_parameter(&mut self, name: &str, type_usage: TypeUsage) -> Result<()> {
        self.validation.validate_parameter(&type_usage, name)?;

        if self.parameters.contains_key(name) {
            return Err(ValidationError::DuplicateName {
                argument: "name".to_string(),
                name: name.to_string(),
            });
        }

        self.parameters.insert(name.to_string(), type_usage);
        Ok(())
    }

    // ----- leaves -----

    pub fn parameter(&self, name: &str) -> Result<DbExpression> {
        let type_usage = self.parameters.get(name).ok_or_else(|| ValidationError::InvalidArgument {
            argument: "name".to_string(),
            reason: format!("parameter '{}' is not declared", name),
        })?;

        Ok(DbExpression::new(
            DbExpressionKind::ParameterReference(name.to_string()),
            type_usage.clone(),
        ))
    }

    pub fn constant(&self, value: ConstantValue) -> DbExpression {
        let result_type = self.validation.validate_constant(&value);
        DbExpression::new(DbExpressionKind::Constant(value), result_type)
    }

    /// Constant of an explicit primitive or enum type
    pub fn typed_constant(&self, constant_type: TypeUsage, value: ConstantValue) -> Result<DbExpression> {
        self.validation.validate_typed_constant(&constant_type, &value)?;
        Ok(DbExpression::new(DbExpressionKind::Constant(value), constant_type))
    }

    pub fn null(&self, null_type: TypeUsage) -> Result<DbExpression> {
        self.validation.validate_null(&null_type)?;
        Ok(DbExpression::new(DbExpressionKind::Null, null_type))
    }

    pub fn variable(&self, type_usage: TypeUsage, name: &str) -> Result<DbExpression> {
        self.validation.validate_variable(&type_usage, name)?;
        Ok(DbExpression::new(
            DbExpressionKind::VariableReference(name.to_string()),
            type_usage,
        ))
    }

    pub fn scan(&self, entity_set: Arc<EntitySetDef>) -> Result<DbExpression> {
        let result_type = self.validation.validate_scan(&entity_set)?;
        Ok(DbExpression::new(DbExpressionKind::Scan(entity_set), result_type))
    }

    // ----- members and functions -----

    pub fn property(&self, instance: DbExpression, property: &EdmProperty) -> Result<DbExpression> {
        let result_type = self.validation.validate_property(&instance, property)?;
        Ok(DbExpression::new(
            DbExpressionKind::Property {
                instance: Box::new(instance),
                property: property.name.clone(),
            },
            result_type,
        ))
    }

    /// Case-sensitive member lookup
    pub fn property_by_name(&self, instance: DbExpression, name: &str) -> Result<DbExpression> {
        let (property, result_type) = self.validation.validate_property_by_name(&instance, name, false)?;
        Ok(DbExpression::new(
            DbExpressionKind::Property {
                instance: Box::new(instance),
                property,
            },
            result_type,
        ))
    }

    pub fn function(&self, function: Arc<EdmFunction>, arguments: Vec<DbExpression>) -> Result<DbExpression> {
        let result_type = self.validation.validate_function(&function, &arguments)?;
        Ok(DbExpression::new(
            DbExpressionKind::Function { function, arguments },
            result_type,
        ))
    }

    pub fn lambda(&self, variables: Vec<(String, TypeUsage)>, body: DbExpression) -> Result<Arc<DbLambda>> {
        self.validation.validate_lambda(&variables)?;
        Ok(Arc::new(DbLambda::new(variables, body)))
    }

    pub fn invoke(&self, lambda: Arc<DbLambda>, arguments: Vec<DbExpression>) -> Result<DbExpression> {
        let result_type = self.validation.validate_invoke(&lambda, &arguments)?;
        Ok(DbExpression::new(
            DbExpressionKind::Lambda { lambda, arguments },
            result_type,
        ))
    }

    pub fn case(
        &self,
        whens: Vec<DbExpression>,
        thens: Vec<DbExpression>,
        otherwise: DbExpression,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_case(&whens, &thens, &otherwise)?;
        Ok(DbExpression::new(
            DbExpressionKind::Case {
                whens,
                thens,
                otherwise: Box::new(otherwise),
            },
            result_type,
        ))
    }

    // ----- constructors -----

    pub fn new_instance(&self, instance_type: TypeUsage, arguments: Vec<DbExpression>) -> Result<DbExpression> {
        let result_type = self.validation.validate_new(&instance_type, &arguments)?;
        Ok(DbExpression::new(
            DbExpressionKind::NewInstance {
                arguments,
                related: Vec::new(),
            },
            result_type,
        ))
    }

    pub fn new_row(&self, columns: Vec<(String, DbExpression)>) -> Result<DbExpression> {
        let result_type = self.validation.validate_new_row(&columns)?;
        let arguments = columns.into_iter().map(|(_, value)| value).collect();
        Ok(DbExpression::new(
            DbExpressionKind::NewInstance {
                arguments,
                related: Vec::new(),
            },
            result_type,
        ))
    }

    pub fn new_collection(&self, elements: Vec<DbExpression>) -> Result<DbExpression> {
        let result_type = self.validation.validate_new_collection(&elements)?;
        Ok(DbExpression::new(
            DbExpressionKind::NewInstance {
                arguments: elements,
                related: Vec::new(),
            },
            result_type,
        ))
    }

    pub fn new_empty_collection(&self, collection_type: TypeUsage) -> Result<DbExpression> {
        let result_type = self.validation.validate_new_empty_collection(&collection_type)?;
        Ok(DbExpression::new(
            DbExpressionKind::NewInstance {
                arguments: Vec::new(),
                related: Vec::new(),
            },
            result_type,
        ))
    }

    pub fn related_entity_ref(
        &self,
        source_end: RelationshipEndMember,
        target_end: RelationshipEndMember,
        target_entity_ref: DbExpression,
    ) -> Result<DbRelatedEntityRef> {
        self.validation
            .validate_related_entity_ref(&source_end, &target_end, &target_entity_ref)?;
        Ok(DbRelatedEntityRef {
            source_end,
            target_end,
            target_entity_ref,
        })
    }

    pub fn new_entity_with_relationships(
        &self,
        entity_type: Arc<EntityTypeDef>,
        attribute_values: Vec<DbExpression>,
        relationships: Vec<DbRelatedEntityRef>,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_new_entity_with_relationships(
            &entity_type,
            &attribute_values,
            &relationships,
        )?;
        Ok(DbExpression::new(
            DbExpressionKind::NewInstance {
                arguments: attribute_values,
                related: relationships,
            },
            result_type,
        ))
    }

    // ----- bindings -----

    pub fn bind_as(&self, input: DbExpression, var_name: &str) -> Result<DbExpressionBinding> {
        let variable_type = self.validation.validate_bind_as(&input, var_name)?;
        Ok(DbExpressionBinding::new(input, var_name.to_string(), variable_type))
    }

    pub fn group_bind_as(
        &self,
        input: DbExpression,
        var_name: &str,
        group_var_name: &str,
    ) -> Result<DbGroupExpressionBinding> {
        let variable_type = self
            .validation
            .validate_group_bind_as(&input, var_name, group_var_name)?;
        Ok(DbGroupExpressionBinding::new(
            input,
            var_name.to_string(),
            group_var_name.to_string(),
            variable_type,
        ))
    }

    // ----- relational operators -----

    pub fn filter(&self, input: DbExpressionBinding, predicate: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_filter(&input, &predicate)?;
        Ok(DbExpression::new(
            DbExpressionKind::Filter {
                input: Box::new(input),
                predicate: Box::new(predicate),
            },
            result_type,
        ))
    }

    pub fn project(&self, input: DbExpressionBinding, projection: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_project(&projection);
        Ok(DbExpression::new(
            DbExpressionKind::Project {
                input: Box::new(input),
                projection: Box::new(projection),
            },
            result_type,
        ))
    }

    pub fn function_aggregate(
        &self,
        function: Arc<EdmFunction>,
        arguments: Vec<DbExpression>,
        distinct: bool,
    ) -> Result<DbAggregate> {
        let result_type = self.validation.validate_function_aggregate(&function, &arguments)?;
        Ok(DbAggregate::Function {
            function,
            distinct,
            arguments,
            result_type,
        })
    }

    pub fn group_aggregate(&self, argument: DbExpression) -> DbAggregate {
        let result_type = self.validation.validate_group_aggregate(&argument);
        DbAggregate::Group {
            argument: Box::new(argument),
            result_type,
        }
    }

    pub fn group_by(
        &self,
        input: DbGroupExpressionBinding,
        keys: Vec<(String, DbExpression)>,
        aggregates: Vec<(String, DbAggregate)>,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_group_by(&keys, &aggregates)?;
        Ok(DbExpression::new(
            DbExpressionKind::GroupBy {
                input: Box::new(input),
                keys,
                aggregates,
            },
            result_type,
        ))
    }

    pub fn cross_join(&self, inputs: Vec<DbExpressionBinding>) -> Result<DbExpression> {
        let result_type = self.validation.validate_cross_join(&inputs)?;
        Ok(DbExpression::new(DbExpressionKind::CrossJoin(inputs), result_type))
    }

    pub fn join(
        &self,
        kind: JoinKind,
        left: DbExpressionBinding,
        right: DbExpressionBinding,
        condition: DbExpression,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_join(&left, &right, &condition)?;
        Ok(DbExpression::new(
            DbExpressionKind::Join {
                kind,
                left: Box::new(left),
                right: Box::new(right),
                condition: Box::new(condition),
            },
            result_type,
        ))
    }

    pub fn apply(
        &self,
        kind: ApplyKind,
        input: DbExpressionBinding,
        apply: DbExpressionBinding,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_apply(&input, &apply)?;
        Ok(DbExpression::new(
            DbExpressionKind::Apply {
                kind,
                input: Box::new(input),
                apply: Box::new(apply),
            },
            result_type,
        ))
    }

    pub fn quantifier(
        &self,
        kind: QuantifierKind,
        input: DbExpressionBinding,
        predicate: DbExpression,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_quantifier(&predicate)?;
        Ok(DbExpression::new(
            DbExpressionKind::Quantifier {
                kind,
                input: Box::new(input),
                predicate: Box::new(predicate),
            },
            result_type,
        ))
    }

    pub fn sort_clause(
        &self,
        key: DbExpression,
        ascending: bool,
        collation: Option<String>,
    ) -> Result<DbSortClause> {
        self.validation.validate_sort_clause(&key, collation.as_deref())?;
        Ok(DbSortClause {
            expression: key,
            ascending,
            collation,
        })
    }

    pub fn sort(&self, input: DbExpressionBinding, order: Vec<DbSortClause>) -> Result<DbExpression> {
        self.validation.validate_sort(&order)?;
        let result_type = input.expression().result_type().clone();
        Ok(DbExpression::new(
            DbExpressionKind::Sort {
                input: Box::new(input),
                order,
            },
            result_type,
        ))
    }

    pub fn skip(
        &self,
        input: DbExpressionBinding,
        order: Vec<DbSortClause>,
        count: DbExpression,
    ) -> Result<DbExpression> {
        self.validation.validate_skip(&order, &count)?;
        let result_type = input.expression().result_type().clone();
        Ok(DbExpression::new(
            DbExpressionKind::Skip {
                input: Box::new(input),
                order,
                count: Box::new(count),
            },
            result_type,
        ))
    }

    pub fn limit(&self, argument: DbExpression, limit: DbExpression, with_ties: bool) -> Result<DbExpression> {
        let result_type = self.validation.validate_limit(&argument, &limit)?;
        Ok(DbExpression::new(
            DbExpressionKind::Limit {
                argument: Box::new(argument),
                limit: Box::new(limit),
                with_ties,
            },
            result_type,
        ))
    }

    // ----- collection operators -----

    pub fn distinct(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_distinct(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::Distinct(Box::new(argument)), result_type))
    }

    pub fn element(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_element(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::Element(Box::new(argument)), result_type))
    }

    pub fn is_empty(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_is_empty(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::IsEmpty(Box::new(argument)), result_type))
    }

    pub fn union_all(&self, left: DbExpression, right: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_union_all(&left, &right)?;
        Ok(Self::set_operation(SetOperator::UnionAll, left, right, result_type))
    }

    pub fn except(&self, left: DbExpression, right: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_except(&left, &right)?;
        Ok(Self::set_operation(SetOperator::Except, left, right, result_type))
    }

    pub fn intersect(&self, left: DbExpression, right: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_intersect(&left, &right)?;
        Ok(Self::set_operation(SetOperator::Intersect, left, right, result_type))
    }

    fn set_operation(
        operator: SetOperator,
        left: DbExpression,
        right: DbExpression,
        result_type: TypeUsage,
    ) -> DbExpression {
        DbExpression::new(
            DbExpressionKind::SetOperation {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            result_type,
        )
    }

    // ----- scalar operators -----

    pub fn and(&self, left: DbExpression, right: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_and(&left, &right)?;
        Ok(DbExpression::new(
            DbExpressionKind::And(Box::new(left), Box::new(right)),
            result_type,
        ))
    }

    pub fn or(&self, left: DbExpression, right: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_or(&left, &right)?;
        Ok(DbExpression::new(
            DbExpressionKind::Or(Box::new(left), Box::new(right)),
            result_type,
        ))
    }

    pub fn not(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_not(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::Not(Box::new(argument)), result_type))
    }

    /// Unary minus takes one argument, every other operator two
    pub fn arithmetic(&self, operator: ArithmeticOperator, arguments: Vec<DbExpression>) -> Result<DbExpression> {
        let result_type = match (operator, arguments.as_slice()) {
            (ArithmeticOperator::UnaryMinus, [argument]) => {
                self.validation.validate_unary_arithmetic(argument)?
            }
            (ArithmeticOperator::UnaryMinus, _) => {
                return Err(ValidationError::ArgumentCount {
                    argument: "arguments".to_string(),
                    expected: 1,
                    actual: arguments.len(),
                })
            }
            (_, [left, right]) => self.validation.validate_binary_arithmetic(left, right)?,
            _ => {
                return Err(ValidationError::ArgumentCount {
                    argument: "arguments".to_string(),
                    expected: 2,
                    actual: arguments.len(),
                })
            }
        };

        Ok(DbExpression::new(
            DbExpressionKind::Arithmetic { operator, arguments },
            result_type,
        ))
    }

    pub fn comparison(
        &self,
        operator: ComparisonOperator,
        left: DbExpression,
        right: DbExpression,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_comparison(operator, &left, &right)?;
        Ok(DbExpression::new(
            DbExpressionKind::Comparison {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            result_type,
        ))
    }

    pub fn is_null(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_is_null(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::IsNull(Box::new(argument)), result_type))
    }

    pub fn like(
        &self,
        argument: DbExpression,
        pattern: DbExpression,
        escape: Option<DbExpression>,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_like(&argument, &pattern, escape.as_ref())?;
        Ok(DbExpression::new(
            DbExpressionKind::Like {
                argument: Box::new(argument),
                pattern: Box::new(pattern),
                escape: escape.map(Box::new),
            },
            result_type,
        ))
    }

    // ----- type operators -----

    pub fn cast(&self, argument: DbExpression, to_type: TypeUsage) -> Result<DbExpression> {
        self.validation.validate_cast(&argument, &to_type)?;
        Ok(DbExpression::new(DbExpressionKind::Cast(Box::new(argument)), to_type))
    }

    pub fn treat(&self, argument: DbExpression, as_type: TypeUsage) -> Result<DbExpression> {
        self.validation.validate_treat(&argument, &as_type)?;
        Ok(DbExpression::new(DbExpressionKind::Treat(Box::new(argument)), as_type))
    }

    pub fn of_type(&self, argument: DbExpression, of_type: TypeUsage, only: bool) -> Result<DbExpression> {
        let result_type = self.validation.validate_of_type(&argument, &of_type)?;
        Ok(DbExpression::new(
            DbExpressionKind::OfType {
                argument: Box::new(argument),
                of_type,
                only,
            },
            result_type,
        ))
    }

    pub fn is_of(&self, argument: DbExpression, of_type: TypeUsage, only: bool) -> Result<DbExpression> {
        let result_type = self.validation.validate_is_of(&argument, &of_type)?;
        Ok(DbExpression::new(
            DbExpressionKind::IsOf {
                argument: Box::new(argument),
                of_type,
                only,
            },
            result_type,
        ))
    }

    // ----- references and navigation -----

    pub fn deref(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_deref(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::Deref(Box::new(argument)), result_type))
    }

    pub fn entity_ref(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_entity_ref(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::EntityRef(Box::new(argument)), result_type))
    }

    pub fn ref_key(&self, argument: DbExpression) -> Result<DbExpression> {
        let result_type = self.validation.validate_ref_key(&argument)?;
        Ok(DbExpression::new(DbExpressionKind::RefKey(Box::new(argument)), result_type))
    }

    /// Reference built from individual key values, one per key member
    pub fn create_ref(
        &self,
        entity_set: Arc<EntitySetDef>,
        entity_type: Arc<EntityTypeDef>,
        key_values: Vec<DbExpression>,
    ) -> Result<DbExpression> {
        let result_type = self
            .validation
            .validate_create_ref(&entity_set, &entity_type, &key_values)?;

        let key_type = TypeUsage::row(
            entity_type
                .key_properties()
                .into_iter()
                .zip(&key_values)
                .map(|(member, value)| (member.name.clone(), value.result_type().clone())),
        );
        let key = DbExpression::new(
            DbExpressionKind::NewInstance {
                arguments: key_values,
                related: Vec::new(),
            },
            key_type,
        );

        Ok(DbExpression::new(
            DbExpressionKind::Ref {
                entity_set,
                key: Box::new(key),
            },
            result_type,
        ))
    }

    /// Reference built from a key row
    pub fn ref_from_key(
        &self,
        entity_set: Arc<EntitySetDef>,
        key_values: DbExpression,
        entity_type: Arc<EntityTypeDef>,
    ) -> Result<DbExpression> {
        let result_type = self
            .validation
            .validate_ref_from_key(&entity_set, &key_values, &entity_type)?;
        Ok(DbExpression::new(
            DbExpressionKind::Ref {
                entity_set,
                key: Box::new(key_values),
            },
            result_type,
        ))
    }

    pub fn navigate(
        &self,
        from: DbExpression,
        relationship: &AssociationType,
        from_end_name: &str,
        to_end_name: &str,
    ) -> Result<DbExpression> {
        let result_type = self
            .validation
            .validate_navigate(&from, relationship, from_end_name, to_end_name)?;
        Ok(DbExpression::new(
            DbExpressionKind::RelationshipNavigation {
                relationship: relationship.full_name(),
                from_end: from_end_name.to_string(),
                to_end: to_end_name.to_string(),
                source: Box::new(from),
            },
            result_type,
        ))
    }

    pub fn navigate_by_ends(
        &self,
        from: DbExpression,
        from_end: &RelationshipEndMember,
        to_end: &RelationshipEndMember,
        allow_all_relationships_in_same_type_hierarchy: bool,
    ) -> Result<DbExpression> {
        let result_type = self.validation.validate_navigate_by_ends(
            &from,
            from_end,
            to_end,
            allow_all_relationships_in_same_type_hierarchy,
        )?;
        Ok(DbExpression::new(
            DbExpressionKind::RelationshipNavigation {
                relationship: from_end.declaring_relationship.clone(),
                from_end: from_end.name.clone(),
                to_end: to_end.name.clone(),
                source: Box::new(from),
            },
            result_type,
        ))
    }
}

/// A finished query: the root expression plus the parameters it was built with
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCommandTree {
    space: DataSpace,
    parameters: BTreeMap<String, TypeUsage>,
    query: DbExpression,
}

impl QueryCommandTree {
    pub fn new(builder: CommandTreeBuilder, query: DbExpression) -> Result<Self> {
        if !builder.validation.check_data_space(query.result_type()) {
            return Err(ValidationError::IncorrectDataSpace {
                argument: "query".to_string(),
                expected: builder.space(),
            });
        }
        check_variable_scopes(&query, &mut Vec::new())?;

        tracing::debug!(
            space = %builder.space(),
            root = query.kind().name(),
            result_type = %query.result_type(),
            parameters = builder.parameters.len(),
            "Built query command tree"
        );

        Ok(Self {
            space: builder.space(),
            parameters: builder.parameters,
            query,
        })
    }

    pub fn space(&self) -> DataSpace {
        self.space
    }

    pub fn parameters(&self) -> &BTreeMap<String, TypeUsage> {
        &self.parameters
    }

    pub fn query(&self) -> &DbExpression {
        &self.query
    }

    pub fn result_type(&self) -> &TypeUsage {
        self.query.result_type()
    }
}

/// Every variable reference must name a variable bound by an enclosing
/// binding or lambda. Binding inputs are evaluated outside their own scope.
fn check_variable_scopes<'a>(expression: &'a DbExpression, scope: &mut Vec<&'a str>) -> Result<()> {
    use DbExpressionKind as K;

    fn with<'a>(
        scope: &mut Vec<&'a str>,
        names: &[&'a str],
        body: impl FnOnce(&mut Vec<&'a str>) -> Result<()>,
    ) -> Result<()> {
        let depth = scope.len();
        scope.extend_from_slice(names);
        let result = body(scope);
        scope.truncate(depth);
        result
    }
    fn all<'a>(expressions: &'a [DbExpression], scope: &mut Vec<&'a str>) -> Result<()> {
        expressions.iter().try_for_each(|e| check_variable_scopes(e, scope))
    }
    fn order<'a>(clauses: &'a [DbSortClause], scope: &mut Vec<&'a str>) -> Result<()> {
        clauses.iter().try_for_each(|c| check_variable_scopes(&c.expression, scope))
    }

    match expression.kind() {
        K::VariableReference(name) => {
            if !scope.iter().any(|bound| *bound == name.as_str()) {
                return Err(ValidationError::UnboundVariable {
                    argument: "query".to_string(),
                    name: name.clone(),
                });
            }
            Ok(())
        }
        K::Constant(_) | K::Null | K::ParameterReference(_) | K::Scan(_) => Ok(()),
        K::Property { instance, .. } => check_variable_scopes(instance, scope),
        K::Function { arguments, .. } | K::Arithmetic { arguments, .. } => all(arguments, scope),
        K::Lambda { lambda, arguments } => {
            all(arguments, scope)?;
            // Lambda bodies are closed over their own variables
            let mut inner: Vec<&'a str> = lambda.variables().iter().map(|(name, _)| name.as_str()).collect();
            check_variable_scopes(lambda.body(), &mut inner)
        }
        K::Case { whens, thens, otherwise } => {
            all(whens, scope)?;
            all(thens, scope)?;
            check_variable_scopes(otherwise, scope)
        }
        K::NewInstance { arguments, related } => {
            all(arguments, scope)?;
            related
                .iter()
                .try_for_each(|r| check_variable_scopes(&r.target_entity_ref, scope))
        }
        K::Filter { input, predicate: body }
        | K::Project { input, projection: body }
        | K::Quantifier { input, predicate: body, .. } => {
            check_variable_scopes(input.expression(), scope)?;
            with(scope, &[input.variable_name()], |s| check_variable_scopes(body, s))
        }
        K::GroupBy { input, keys, aggregates } => {
            check_variable_scopes(input.expression(), scope)?;
            with(scope, &[input.variable_name()], |s| {
                keys.iter().try_for_each(|(_, key)| check_variable_scopes(key, s))
            })?;
            with(scope, &[input.variable_name(), input.group_variable_name()], |s| {
                aggregates.iter().try_for_each(|(_, aggregate)| match aggregate {
                    DbAggregate::Function { arguments, .. } => all(arguments, s),
                    DbAggregate::Group { argument, .. } => check_variable_scopes(argument, s),
                })
            })
        }
        K::CrossJoin(inputs) => inputs
            .iter()
            .try_for_each(|input| check_variable_scopes(input.expression(), scope)),
        K::Join { left, right, condition, .. } => {
            check_variable_scopes(left.expression(), scope)?;
            check_variable_scopes(right.expression(), scope)?;
            with(scope, &[left.variable_name(), right.variable_name()], |s| {
                check_variable_scopes(condition, s)
            })
        }
        K::Apply { input, apply, .. } => {
            check_variable_scopes(input.expression(), scope)?;
            with(scope, &[input.variable_name()], |s| {
                check_variable_scopes(apply.expression(), s)
            })
        }
        K::Sort { input, order: clauses } => {
            check_variable_scopes(input.expression(), scope)?;
            with(scope, &[input.variable_name()], |s| order(clauses, s))
        }
        K::Skip { input, order: clauses, count } => {
            check_variable_scopes(input.expression(), scope)?;
            check_variable_scopes(count, scope)?;
            with(scope, &[input.variable_name()], |s| order(clauses, s))
        }
        K::Limit { argument, limit, .. } => {
            check_variable_scopes(argument, scope)?;
            check_variable_scopes(limit, scope)
        }
        K::SetOperation { left, right, .. }
        | K::And(left, right)
        | K::Or(left, right)
        | K::Comparison { left, right, .. } => {
            check_variable_scopes(left, scope)?;
            check_variable_scopes(right, scope)
        }
        K::Like { argument, pattern, escape } => {
            check_variable_scopes(argument, scope)?;
            check_variable_scopes(pattern, scope)?;
            match escape {
                Some(escape) => check_variable_scopes(escape, scope),
                None => Ok(()),
            }
        }
        K::Distinct(argument)
        | K::Element(argument)
        | K::IsEmpty(argument)
        | K::Not(argument)
        | K::IsNull(argument)
        | K::Cast(argument)
        | K::Treat(argument)
        | K::Deref(argument)
        | K::EntityRef(argument)
        | K::RefKey(argument)
        | K::OfType { argument, .. }
        | K::IsOf { argument, .. } => check_variable_scopes(argument, scope),
        K::Ref { key, .. } => check_variable_scopes(key, scope),
        K::RelationshipNavigation { source, .. } => check_variable_scopes(source, scope),
    }
}
