//! Benchmarks for whole-artifact validation
//!
//! Measures loading plus the Escher and runtime passes over generated
//! models with N mapped entity types.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edmcheck_core::ValidationConfig;
use edmcheck_engine::{ArtifactErrorSet, EscherModelValidator, ValidationSession};
use edmcheck_model::{AntiDependencyIndex, ContentValidatorRegistry, ModelArtifact};
use serde_json::json;

/// Generate an artifact with N entity types, each mapped onto its own table
fn generate_artifact(num_types: usize) -> String {
    let mut entity_types = Vec::new();
    let mut entity_sets = Vec::new();
    let mut tables = Vec::new();
    let mut table_sets = Vec::new();
    let mut set_mappings = Vec::new();

    for i in 0..num_types {
        entity_types.push(json!({
            "name": format!("Entity{}", i),
            "key": ["Id"],
            "properties": [
                {"name": "Id", "type": "Int32", "nullable": false},
                {"name": "Name", "type": "String"},
                {"name": "Amount", "type": "Decimal"}
            ]
        }));
        entity_sets.push(json!({"name": format!("Entities{}", i), "entity_type": format!("Bench.Entity{}", i)}));
        tables.push(json!({
            "name": format!("entity_{}", i),
            "key": ["id"],
            "properties": [
                {"name": "id", "type": "int", "nullable": false},
                {"name": "name", "type": "nvarchar"},
                {"name": "amount", "type": "decimal"}
            ]
        }));
        table_sets.push(json!({"name": format!("entity_{}", i), "entity_type": format!("Bench.Store.entity_{}", i)}));
        set_mappings.push(json!({
            "name": format!("Entities{}", i),
            "entity_type_mappings": [{
                "type_name": format!("Bench.Entity{}", i),
                "fragments": [{
                    "store_entity_set": format!("entity_{}", i),
                    "scalar_properties": [
                        {"name": "Id", "column": "id"},
                        {"name": "Name", "column": "name"},
                        {"name": "Amount", "column": "amount"}
                    ]
                }]
            }]
        }));
    }

    json!({
        "version": 3,
        "conceptual": {
            "namespace": "Bench",
            "entity_types": entity_types,
            "entity_containers": [{"name": "BenchContainer", "entity_sets": entity_sets}]
        },
        "storage": {
            "namespace": "Bench.Store",
            "provider": "System.Data.SqlClient",
            "entity_types": tables,
            "entity_containers": [{"name": "BenchStore", "entity_sets": table_sets}]
        },
        "mapping": {
            "entity_container_mappings": [{
                "storage_entity_container": "BenchStore",
                "cdm_entity_container": "BenchContainer",
                "entity_set_mappings": set_mappings
            }]
        }
    })
    .to_string()
}

fn bench_full_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_validation");

    for size in [10, 100, 500].iter() {
        let json = generate_artifact(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &json, |b, json| {
            let mut session = ValidationSession::new(ValidationConfig::default());
            b.iter(|| {
                let validation = session.validate_str(black_box(json)).unwrap();
                black_box(validation.errors.len())
            });
        });
    }

    group.finish();
}

fn bench_escher_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("escher_pass");

    for size in [10, 100, 500].iter() {
        let mut registry = ContentValidatorRegistry::new();
        let artifact = ModelArtifact::from_json(&generate_artifact(*size), &mut registry).unwrap();
        let index = AntiDependencyIndex::build(&artifact);
        let validator = EscherModelValidator::new();

        group.bench_with_input(BenchmarkId::from_parameter(size), &artifact, |b, artifact| {
            b.iter(|| {
                let mut set = ArtifactErrorSet::new();
                validator.validate_escher_model(&mut set, black_box(artifact), &index, true);
                black_box(set.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_validation, bench_escher_pass);
criterion_main!(benches);
