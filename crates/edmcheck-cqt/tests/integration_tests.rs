//! Integration tests for command-tree construction

use std::sync::Arc;

use edmcheck_core::{
    AssociationType, DataSpace, EdmFunction, EntitySetDef, EntityTypeDef, ParameterMode,
    PrimitiveTypeKind, RelationshipEndMember, RelationshipMultiplicity, TypeUsage,
};
use edmcheck_cqt::{
    ArithmeticOperator, CommandTreeBuilder, ComparisonOperator, ConstantValue, DbExpression,
    JoinKind, QuantifierKind, QueryCommandTree, ValidationError,
};
use pretty_assertions::assert_eq;

struct Shop {
    product: Arc<EntityTypeDef>,
    category: Arc<EntityTypeDef>,
    products: Arc<EntitySetDef>,
    categories: Arc<EntitySetDef>,
    product_category: AssociationType,
}

fn shop() -> Shop {
    let product = Arc::new(
        EntityTypeDef::new("Shop", "Product", DataSpace::CSpace)
            .with_property("Id", TypeUsage::primitive(PrimitiveTypeKind::Int32))
            .with_property("Name", TypeUsage::primitive(PrimitiveTypeKind::String))
            .with_property("Price", TypeUsage::primitive(PrimitiveTypeKind::Decimal))
            .with_property("CategoryId", TypeUsage::primitive(PrimitiveTypeKind::Int32))
            .with_key(&["Id"]),
    );
    let category = Arc::new(
        EntityTypeDef::new("Shop", "Category", DataSpace::CSpace)
            .with_property("Id", TypeUsage::primitive(PrimitiveTypeKind::Int32))
            .with_property("Title", TypeUsage::primitive(PrimitiveTypeKind::String))
            .with_key(&["Id"]),
    );

    let products = Arc::new(EntitySetDef {
        name: "Products".to_string(),
        container: "ShopContainer".to_string(),
        space: DataSpace::CSpace,
        element_type: product.clone(),
    });
    let categories = Arc::new(EntitySetDef {
        name: "Categories".to_string(),
        container: "ShopContainer".to_string(),
        space: DataSpace::CSpace,
        element_type: category.clone(),
    });

    let product_category = AssociationType {
        name: "ProductCategory".to_string(),
        namespace: "Shop".to_string(),
        space: DataSpace::CSpace,
        ends: vec![
            RelationshipEndMember {
                name: "Product".to_string(),
                entity_type: product.clone(),
                multiplicity: RelationshipMultiplicity::Many,
                declaring_relationship: "Shop.ProductCategory".to_string(),
            },
            RelationshipEndMember {
                name: "Category".to_string(),
                entity_type: category.clone(),
                multiplicity: RelationshipMultiplicity::ZeroOrOne,
                declaring_relationship: "Shop.ProductCategory".to_string(),
            },
        ],
        constraint: None,
    };

    Shop {
        product,
        category,
        products,
        categories,
        product_category,
    }
}

fn int32(builder: &CommandTreeBuilder, value: i32) -> DbExpression {
    builder.constant(ConstantValue::Int32(value))
}

#[test]
fn filter_over_scan_keeps_input_type() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let scan = builder.scan(shop.products.clone()).unwrap();
    let input = builder.bind_as(scan.clone(), "p").unwrap();

    let price = builder.property_by_name(input.variable(), "Price").unwrap();
    let predicate = builder
        .comparison(ComparisonOperator::GreaterThan, price, int32(&builder, 10))
        .unwrap();
    let filter = builder.filter(input, predicate).unwrap();

    assert_eq!(filter.result_type(), scan.result_type());
    assert_eq!(filter.kind().name(), "Filter");
}

#[test]
fn filter_rejects_non_boolean_predicate() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let input = builder
        .bind_as(builder.scan(shop.products.clone()).unwrap(), "p")
        .unwrap();
    let err = builder.filter(input, int32(&builder, 1)).unwrap_err();

    assert_eq!(err.argument(), "predicate");
    assert!(matches!(err, ValidationError::TypeMismatch { .. }));
}

#[test]
fn join_produces_two_column_rows() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let left = builder
        .bind_as(builder.scan(shop.products.clone()).unwrap(), "p")
        .unwrap();
    let right = builder
        .bind_as(builder.scan(shop.categories.clone()).unwrap(), "c")
        .unwrap();

    let condition = builder
        .comparison(
            ComparisonOperator::Equals,
            builder.property_by_name(left.variable(), "CategoryId").unwrap(),
            builder.property_by_name(right.variable(), "Id").unwrap(),
        )
        .unwrap();
    let join = builder.join(JoinKind::Inner, left, right, condition).unwrap();

    let expected = TypeUsage::collection_of(TypeUsage::row(vec![
        ("p", TypeUsage::entity(shop.product.clone())),
        ("c", TypeUsage::entity(shop.category.clone())),
    ]));
    assert_eq!(join.result_type(), &expected);
}

#[test]
fn join_rejects_duplicate_variable_names() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let left = builder
        .bind_as(builder.scan(shop.products.clone()).unwrap(), "x")
        .unwrap();
    let right = builder
        .bind_as(builder.scan(shop.categories.clone()).unwrap(), "x")
        .unwrap();
    let condition = builder.constant(ConstantValue::Boolean(true));

    let err = builder.join(JoinKind::Inner, left, right, condition).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateName { ref name, .. } if name == "x"));
}

#[test]
fn binary_arithmetic_uses_common_promotable_type() {
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let sum = builder
        .arithmetic(
            ArithmeticOperator::Plus,
            vec![
                builder.constant(ConstantValue::Int16(1)),
                builder.constant(ConstantValue::Int64(2)),
            ],
        )
        .unwrap();
    assert_eq!(sum.result_type(), &TypeUsage::primitive(PrimitiveTypeKind::Int64));

    let err = builder
        .arithmetic(
            ArithmeticOperator::Plus,
            vec![
                int32(&builder, 1),
                builder.constant(ConstantValue::String("a".to_string())),
            ],
        )
        .unwrap_err();
    assert_eq!(err.argument(), "right");
}

#[test]
fn unary_minus_promotes_unsigned_argument() {
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let negated = builder
        .arithmetic(
            ArithmeticOperator::UnaryMinus,
            vec![builder.constant(ConstantValue::Byte(7))],
        )
        .unwrap();
    assert_eq!(negated.result_type(), &TypeUsage::primitive(PrimitiveTypeKind::Int16));

    let negated = builder
        .arithmetic(ArithmeticOperator::UnaryMinus, vec![int32(&builder, 7)])
        .unwrap();
    assert_eq!(negated.result_type(), &TypeUsage::primitive(PrimitiveTypeKind::Int32));
}

#[test]
fn group_by_orders_keys_before_aggregates() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let count = Arc::new(
        EdmFunction::new("Edm", "Count", DataSpace::CSpace)
            .with_parameter(
                "arg",
                TypeUsage::collection_of(TypeUsage::primitive(PrimitiveTypeKind::Int32)),
                ParameterMode::In,
            )
            .returns(TypeUsage::primitive(PrimitiveTypeKind::Int32))
            .aggregate(),
    );

    let input = builder
        .group_bind_as(builder.scan(shop.products.clone()).unwrap(), "p", "g")
        .unwrap();
    let key = builder.property_by_name(input.variable(), "CategoryId").unwrap();
    let counted = builder.property_by_name(input.variable(), "Id").unwrap();
    let aggregate = builder.function_aggregate(count, vec![counted], false).unwrap();
    let group = builder.group_aggregate(input.variable());

    let grouped = builder
        .group_by(
            input,
            vec![("CategoryId".to_string(), key)],
            vec![("Total".to_string(), aggregate), ("Items".to_string(), group)],
        )
        .unwrap();

    let row = grouped.result_type().element_type().unwrap().as_row().unwrap().clone();
    let names: Vec<&str> = row.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["CategoryId", "Total", "Items"]);
    assert!(row.properties[2].type_usage.is_collection());
}

#[test]
fn group_by_requires_a_key_or_aggregate() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let input = builder
        .group_bind_as(builder.scan(shop.products.clone()).unwrap(), "p", "g")
        .unwrap();
    let err = builder.group_by(input, Vec::new(), Vec::new()).unwrap_err();
    assert_eq!(err.argument(), "keys");
}

#[test]
fn group_by_rejects_aggregate_named_like_key() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let input = builder
        .group_bind_as(builder.scan(shop.products.clone()).unwrap(), "p", "g")
        .unwrap();
    let key = builder.property_by_name(input.variable(), "CategoryId").unwrap();
    let group = builder.group_aggregate(input.variable());

    let err = builder
        .group_by(
            input,
            vec![("CategoryId".to_string(), key)],
            vec![("CategoryId".to_string(), group)],
        )
        .unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateName { .. }));
}

#[test]
fn skip_and_limit_require_constant_or_parameter_count() {
    let shop = shop();
    let mut builder = CommandTreeBuilder::new(DataSpace::CSpace);
    builder
        .declare_parameter("pageSize", TypeUsage::primitive(PrimitiveTypeKind::Int64))
        .unwrap();

    let scan = builder.scan(shop.products.clone()).unwrap();

    let limit = builder
        .limit(scan.clone(), builder.parameter("pageSize").unwrap(), false)
        .unwrap();
    assert_eq!(limit.result_type(), scan.result_type());

    let computed = builder
        .arithmetic(ArithmeticOperator::Plus, vec![int32(&builder, 1), int32(&builder, 2)])
        .unwrap();
    let err = builder.limit(scan.clone(), computed.clone(), false).unwrap_err();
    assert_eq!(err.argument(), "limit");

    let input = builder.bind_as(scan.clone(), "p").unwrap();
    let key = builder.property_by_name(input.variable(), "Name").unwrap();
    let order = vec![builder.sort_clause(key, true, None).unwrap()];
    let err = builder.skip(input, order, computed).unwrap_err();
    assert_eq!(err.argument(), "count");
}

#[test]
fn negative_constant_count_is_rejected() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);
    let scan = builder.scan(shop.products.clone()).unwrap();

    let err = builder.limit(scan, int32(&builder, -1), false).unwrap_err();
    assert!(err.to_string().contains("must not be negative"));
}

#[test]
fn case_folds_common_type_over_thens_and_else() {
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let case = builder
        .case(
            vec![builder.constant(ConstantValue::Boolean(true))],
            vec![builder.constant(ConstantValue::Int16(1))],
            builder.constant(ConstantValue::Double(2.5)),
        )
        .unwrap();
    assert_eq!(case.result_type(), &TypeUsage::primitive(PrimitiveTypeKind::Double));

    let err = builder
        .case(
            vec![builder.constant(ConstantValue::Boolean(true))],
            vec![int32(&builder, 1)],
            builder.constant(ConstantValue::String("none".to_string())),
        )
        .unwrap_err();
    assert!(matches!(err, ValidationError::NoCommonType { .. }));
}

#[test]
fn function_arguments_skip_out_parameters() {
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let function = Arc::new(
        EdmFunction::new("Shop", "Discount", DataSpace::CSpace)
            .with_parameter("price", TypeUsage::primitive(PrimitiveTypeKind::Decimal), ParameterMode::In)
            .with_parameter("rate", TypeUsage::primitive(PrimitiveTypeKind::Double), ParameterMode::Out)
            .returns(TypeUsage::primitive(PrimitiveTypeKind::Decimal)),
    );

    let call = builder.function(function.clone(), vec![int32(&builder, 100)]).unwrap();
    assert_eq!(call.result_type(), &TypeUsage::primitive(PrimitiveTypeKind::Decimal));

    let err = builder
        .function(function, vec![int32(&builder, 100), int32(&builder, 5)])
        .unwrap_err();
    assert!(matches!(err, ValidationError::ArgumentCount { expected: 1, actual: 2, .. }));
}

#[test]
fn navigation_to_many_end_yields_collection_of_refs() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let category = builder
        .bind_as(builder.scan(shop.categories.clone()).unwrap(), "c")
        .unwrap();
    let category_ref = builder.entity_ref(category.variable()).unwrap();

    let products = builder
        .navigate(category_ref.clone(), &shop.product_category, "Category", "Product")
        .unwrap();
    assert_eq!(
        products.result_type(),
        &TypeUsage::collection_of(TypeUsage::ref_to(shop.product.clone()))
    );

    let err = builder
        .navigate(category_ref, &shop.product_category, "category", "Product")
        .unwrap_err();
    assert!(matches!(err, ValidationError::NoSuchMember { .. }));
}

#[test]
fn create_ref_checks_key_values_positionally() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let reference = builder
        .create_ref(shop.products.clone(), shop.product.clone(), vec![int32(&builder, 1)])
        .unwrap();
    assert_eq!(reference.result_type(), &TypeUsage::ref_to(shop.product.clone()));

    let deref = builder.deref(reference).unwrap();
    assert_eq!(deref.result_type(), &TypeUsage::entity(shop.product.clone()));

    let err = builder
        .create_ref(
            shop.products.clone(),
            shop.product.clone(),
            vec![builder.constant(ConstantValue::String("1".to_string()))],
        )
        .unwrap_err();
    assert_eq!(err.argument(), "keyValues[0]");
}

#[test]
fn cross_space_metadata_is_rejected() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::SSpace);

    let err = builder.scan(shop.products.clone()).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::IncorrectDataSpace { expected: DataSpace::SSpace, .. }
    ));
}

#[test]
fn parameter_names_are_validated_and_unique() {
    let mut builder = CommandTreeBuilder::new(DataSpace::CSpace);
    let int = TypeUsage::primitive(PrimitiveTypeKind::Int32);

    builder.declare_parameter("minPrice", int.clone()).unwrap();
    assert!(builder.declare_parameter("minPrice", int.clone()).is_err());
    assert!(builder.declare_parameter("1st", int.clone()).is_err());
    assert!(builder.declare_parameter("has space", int).is_err());
    assert!(builder.parameter("missing").is_err());
}

#[test]
fn query_tree_keeps_parameters() {
    let shop = shop();
    let mut builder = CommandTreeBuilder::new(DataSpace::CSpace);
    builder
        .declare_parameter("name", TypeUsage::primitive(PrimitiveTypeKind::String))
        .unwrap();

    let input = builder
        .bind_as(builder.scan(shop.products.clone()).unwrap(), "p")
        .unwrap();
    let predicate = builder
        .like(
            builder.property_by_name(input.variable(), "Name").unwrap(),
            builder.parameter("name").unwrap(),
            None,
        )
        .unwrap();
    let query = builder.filter(input, predicate).unwrap();

    let tree = QueryCommandTree::new(builder, query).unwrap();
    assert_eq!(tree.space(), DataSpace::CSpace);
    assert_eq!(tree.parameters().len(), 1);
    assert!(tree.result_type().is_collection());
}

#[test]
fn query_tree_rejects_unbound_variables() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let input = builder
        .bind_as(builder.scan(shop.products.clone()).unwrap(), "p")
        .unwrap();
    let stray = builder
        .variable(TypeUsage::entity(shop.product.clone()), "q")
        .unwrap();
    let predicate = builder
        .comparison(
            ComparisonOperator::Equals,
            builder.property_by_name(stray, "Id").unwrap(),
            int32(&builder, 1),
        )
        .unwrap();
    let query = builder.filter(input, predicate).unwrap();

    let err = QueryCommandTree::new(builder, query).unwrap_err();
    assert!(matches!(err, ValidationError::UnboundVariable { ref name, .. } if name == "q"));
    assert_eq!(err.argument(), "query");
}

#[test]
fn nested_bindings_see_enclosing_variables() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);

    let products = builder
        .bind_as(builder.scan(shop.products.clone()).unwrap(), "p")
        .unwrap();
    let categories = builder
        .bind_as(builder.scan(shop.categories.clone()).unwrap(), "c")
        .unwrap();
    let matches_category = builder
        .comparison(
            ComparisonOperator::Equals,
            builder.property_by_name(categories.variable(), "Id").unwrap(),
            builder.property_by_name(products.variable(), "CategoryId").unwrap(),
        )
        .unwrap();
    let has_category = builder
        .quantifier(QuantifierKind::Any, categories, matches_category)
        .unwrap();
    let query = builder.filter(products, has_category).unwrap();

    let tree = QueryCommandTree::new(builder, query).unwrap();
    assert!(tree.result_type().is_collection());
}

#[test]
fn binding_variable_is_not_visible_in_its_own_input() {
    let shop = shop();
    let builder = CommandTreeBuilder::new(DataSpace::CSpace);
    let product = TypeUsage::entity(shop.product.clone());

    // p is referenced inside the input that p is bound to
    let categories = builder
        .bind_as(builder.scan(shop.categories.clone()).unwrap(), "c")
        .unwrap();
    let self_reference = builder
        .comparison(
            ComparisonOperator::Equals,
            builder.property_by_name(categories.variable(), "Id").unwrap(),
            builder
                .property_by_name(builder.variable(product, "p").unwrap(), "CategoryId")
                .unwrap(),
        )
        .unwrap();
    let inner = builder.filter(categories, self_reference).unwrap();
    let outer = builder.bind_as(inner, "p").unwrap();
    let query = builder.filter(outer, builder.constant(ConstantValue::Boolean(true))).unwrap();

    let err = QueryCommandTree::new(builder, query).unwrap_err();
    assert!(matches!(err, ValidationError::UnboundVariable { ref name, .. } if name == "p"));
}
