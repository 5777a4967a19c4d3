//! Artifact fixtures for engine integration tests
//!
//! The shop model is complete and valid: two entity types joined by a
//! foreign-key association, both mapped onto their own tables. Tests
//! break it in one place and check what gets reported.

use serde_json::{json, Value};

fn customer_mapping() -> Value {
    json!({
        "name": "Customers",
        "line": 40, "column": 13,
        "entity_type_mappings": [{
            "type_name": "Shop.Customer",
            "fragments": [{
                "store_entity_set": "customers",
                "scalar_properties": [
                    {"name": "Id", "column": "id"},
                    {"name": "Name", "column": "name"}
                ]
            }]
        }]
    })
}

fn order_mapping() -> Value {
    json!({
        "name": "Orders",
        "line": 50, "column": 13,
        "entity_type_mappings": [{
            "type_name": "Shop.Order",
            "fragments": [{
                "store_entity_set": "orders",
                "scalar_properties": [
                    {"name": "Id", "column": "id"},
                    {"name": "CustomerId", "column": "customer_id"},
                    {"name": "Total", "column": "total"}
                ]
            }]
        }]
    })
}

/// The valid shop artifact as a JSON value
pub fn shop() -> Value {
    json!({
        "version": 3,
        "conceptual": {
            "namespace": "Shop",
            "line": 2, "column": 5,
            "entity_types": [
                {
                    "name": "Customer",
                    "line": 3, "column": 9,
                    "key": ["Id"],
                    "properties": [
                        {"name": "Id", "type": "Int32", "nullable": false, "line": 4, "column": 13},
                        {"name": "Name", "type": "String", "max_length": 100, "line": 5, "column": 13}
                    ]
                },
                {
                    "name": "Order",
                    "line": 7, "column": 9,
                    "key": ["Id"],
                    "properties": [
                        {"name": "Id", "type": "Int32", "nullable": false, "line": 8, "column": 13},
                        {"name": "CustomerId", "type": "Int32", "nullable": false, "line": 9, "column": 13},
                        {"name": "Total", "type": "Decimal", "nullable": false, "precision": 10, "scale": 2,
                         "line": 10, "column": 13}
                    ]
                }
            ],
            "associations": [{
                "name": "CustomerOrder",
                "line": 12, "column": 9,
                "ends": [
                    {"role": "Customer", "type": "Shop.Customer", "multiplicity": "1"},
                    {"role": "Order", "type": "Shop.Order", "multiplicity": "*"}
                ],
                "referential_constraint": {
                    "principal": {"role": "Customer", "property_refs": ["Id"]},
                    "dependent": {"role": "Order", "property_refs": ["CustomerId"]}
                }
            }],
            "entity_containers": [{
                "name": "ShopContainer",
                "line": 16, "column": 9,
                "entity_sets": [
                    {"name": "Customers", "entity_type": "Shop.Customer"},
                    {"name": "Orders", "entity_type": "Shop.Order"}
                ],
                "association_sets": [
                    {"name": "CustomerOrders", "association": "Shop.CustomerOrder"}
                ]
            }]
        },
        "storage": {
            "namespace": "Shop.Store",
            "provider": "System.Data.SqlClient",
            "line": 20, "column": 5,
            "entity_types": [
                {
                    "name": "customers",
                    "line": 21, "column": 9,
                    "key": ["id"],
                    "properties": [
                        {"name": "id", "type": "int", "nullable": false},
                        {"name": "name", "type": "nvarchar", "max_length": 100}
                    ]
                },
                {
                    "name": "orders",
                    "line": 25, "column": 9,
                    "key": ["id"],
                    "properties": [
                        {"name": "id", "type": "int", "nullable": false},
                        {"name": "customer_id", "type": "int", "nullable": false},
                        {"name": "total", "type": "decimal", "nullable": false, "precision": 10, "scale": 2}
                    ]
                }
            ],
            "entity_containers": [{
                "name": "ShopStore",
                "line": 30, "column": 9,
                "entity_sets": [
                    {"name": "customers", "entity_type": "Shop.Store.customers"},
                    {"name": "orders", "entity_type": "Shop.Store.orders"}
                ]
            }]
        },
        "mapping": {
            "line": 38, "column": 5,
            "entity_container_mappings": [{
                "storage_entity_container": "ShopStore",
                "cdm_entity_container": "ShopContainer",
                "line": 39, "column": 9,
                "entity_set_mappings": [customer_mapping(), order_mapping()]
            }]
        }
    })
}

pub fn to_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap()
}

/// Shop artifact whose customer mapping leaves `Name` unmapped
pub fn shop_with_unmapped_name() -> Value {
    let mut artifact = shop();
    artifact["mapping"]["entity_container_mappings"][0]["entity_set_mappings"][0]["entity_type_mappings"][0]
        ["fragments"][0]["scalar_properties"] = json!([{"name": "Id", "column": "id"}]);
    artifact
}

/// Shop artifact that also maps its foreign-key association explicitly
pub fn shop_with_association_mapping() -> Value {
    let mut artifact = shop();
    artifact["mapping"]["entity_container_mappings"][0]["association_set_mappings"] = json!([{
        "name": "CustomerOrders",
        "type_name": "Shop.CustomerOrder",
        "store_entity_set": "orders",
        "line": 60, "column": 13,
        "end_properties": [
            {"name": "Customer", "scalar_properties": [{"name": "Id", "column": "customer_id"}]},
            {"name": "Order", "scalar_properties": [{"name": "Id", "column": "id"}]}
        ]
    }]);
    artifact
}
