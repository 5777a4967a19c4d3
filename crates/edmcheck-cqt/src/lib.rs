//! Command-tree typing
//!
//! This crate handles:
//! - Type semantics over EDM type usages (equality, promotion, common types)
//! - The typed expression tree
//! - Argument validation for every node kind
//! - Building validated trees for a single data space

pub mod builder;
pub mod expression;
pub mod semantics;
pub mod validation;

pub use builder::{CommandTreeBuilder, QueryCommandTree};
pub use expression::{
    ApplyKind, ArithmeticOperator, ComparisonOperator, ConstantValue, DbAggregate, DbExpression,
    DbExpressionBinding, DbExpressionKind, DbGroupExpressionBinding, DbLambda, DbRelatedEntityRef,
    DbSortClause, JoinKind, QuantifierKind, SetOperator,
};
pub use semantics::TypeSemantics;
pub use validation::{ArgumentValidation, ValidationError};
