//! Loading artifacts from disk and querying the bound graph

use edmcheck_core::{DesignerCode, ErrorClass};
use edmcheck_model::{AntiDependencyIndex, ContentValidatorRegistry, DocumentError, ModelArtifact, NodeKindTag};
use pretty_assertions::assert_eq;

const SHOP: &str = r#"{
    "version": 3,
    "conceptual": {
        "namespace": "Shop",
        "line": 2, "column": 3,
        "entity_types": [
            {"name": "Product", "key": ["Id"], "line": 3, "column": 5,
             "properties": [{"name": "Id", "type": "Int32", "nullable": false, "line": 4, "column": 7}]},
            {"name": "Book", "base_type": "Shop.Product", "line": 6, "column": 5,
             "properties": [{"name": "Isbn", "type": "String", "line": 7, "column": 7}]}
        ],
        "entity_containers": [{"name": "ShopContainer", "line": 9, "column": 5,
            "entity_sets": [{"name": "Products", "entity_type": "Shop.Product", "line": 10, "column": 7}]}]
    },
    "storage": {
        "namespace": "Shop.Store",
        "provider": "System.Data.SqlClient",
        "entity_types": [{"name": "products", "key": ["id"],
            "properties": [{"name": "id", "type": "int", "nullable": false}]}],
        "entity_containers": [{"name": "ShopStore",
            "entity_sets": [{"name": "products", "entity_type": "Shop.Store.products"}]}]
    },
    "mapping": {
        "entity_container_mappings": [{"storage_entity_container": "ShopStore", "cdm_entity_container": "ShopContainer",
            "entity_set_mappings": [{"name": "Products", "entity_type_mappings": [
                {"type_name": "IsTypeOf(Shop.Product)",
                 "fragments": [{"store_entity_set": "products",
                    "scalar_properties": [{"name": "Id", "column": "id"}]}]}]}]}]
    }
}"#;

fn load_from_disk(contents: &str) -> Result<ModelArtifact, DocumentError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.edm.json");
    std::fs::write(&path, contents).unwrap();

    let mut registry = ContentValidatorRegistry::new();
    ModelArtifact::load(&path, &mut registry)
}

fn entity_type(artifact: &ModelArtifact, name: &str) -> edmcheck_core::ObjectId {
    artifact
        .objects()
        .find(|(id, object)| object.tag() == NodeKindTag::EntityType && artifact.full_name(*id) == name)
        .map(|(id, _)| id)
        .unwrap()
}

#[test]
fn loads_layers_from_disk() {
    let artifact = load_from_disk(SHOP).unwrap();

    assert!(artifact.path().unwrap().ends_with("shop.edm.json"));
    assert_eq!(artifact.version(), 3);
    assert!(artifact.conceptual_root().is_some());
    assert!(artifact.storage_root().is_some());
    assert!(artifact.mapping_root().is_some());
    assert!(!artifact.is_storage_model_empty());
    assert!(artifact.diagnostics().is_empty());
}

#[test]
fn hierarchy_and_keys() {
    let artifact = load_from_disk(SHOP).unwrap();
    let product = entity_type(&artifact, "Shop.Product");
    let book = entity_type(&artifact, "Shop.Book");

    assert_eq!(artifact.base_type_of(book), Some(product));
    assert_eq!(artifact.root_type_of(book), product);
    assert!(artifact.is_same_or_sub_type(book, product));
    assert!(!artifact.is_same_or_sub_type(product, book));

    let keys: Vec<&str> = artifact
        .key_properties_of(book)
        .into_iter()
        .map(|id| artifact.name(id))
        .collect();
    assert_eq!(keys, vec!["Id"]);
}

#[test]
fn anti_dependencies_follow_bindings() {
    let artifact = load_from_disk(SHOP).unwrap();
    let index = AntiDependencyIndex::build(&artifact);
    let product = entity_type(&artifact, "Shop.Product");

    assert!(index.has_anti_dependency_of_kind(product, NodeKindTag::EntitySet));
    assert!(index.has_anti_dependency_of_kind(product, NodeKindTag::EntityTypeMapping));

    let book = entity_type(&artifact, "Shop.Book");
    let sub_types = index.anti_dependencies_of_kind(product, NodeKindTag::EntityType);
    assert_eq!(sub_types, vec![book]);
}

#[test]
fn positions_resolve_to_objects() {
    let artifact = load_from_disk(SHOP).unwrap();

    let id = artifact.find_object_for_line_and_column(4, 7).unwrap();
    assert_eq!(artifact.path_of(id), "Shop/Product/Id");

    // Between two objects the earlier one wins
    let id = artifact.find_object_for_line_and_column(5, 1).unwrap();
    assert_eq!(artifact.path_of(id), "Shop/Product/Id");

    assert_eq!(artifact.find_object_for_line_and_column(1, 1), None);
}

#[test]
fn undefined_references_are_diagnosed() {
    let broken = SHOP.replace(r#""base_type": "Shop.Product""#, r#""base_type": "Shop.Missing""#);
    let artifact = load_from_disk(&broken).unwrap();

    let diagnostics: Vec<_> = artifact
        .diagnostics()
        .iter()
        .filter(|d| d.class() == ErrorClass::RESOLVE_ERROR)
        .collect();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].has_code(DesignerCode::UnresolvedReference));
}

#[test]
fn unreadable_and_malformed_files() {
    let mut registry = ContentValidatorRegistry::new();
    let missing = ModelArtifact::load(std::path::Path::new("/nonexistent/shop.edm.json"), &mut registry);
    assert!(matches!(missing, Err(DocumentError::IoError(_, _))));

    assert!(matches!(load_from_disk("{ not json"), Err(DocumentError::ParseError(_))));
}
