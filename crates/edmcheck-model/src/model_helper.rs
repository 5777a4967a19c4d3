//! Graph helpers over complex types

use std::collections::HashSet;

use edmcheck_core::ObjectId;

use crate::artifact::{ModelArtifact, NodeKind, NodeKindTag};

/// Complex types a complex type refers to through its complex properties
pub fn complex_property_types(artifact: &ModelArtifact, complex_type: ObjectId) -> Vec<ObjectId> {
    artifact
        .children_of_kind(complex_type, NodeKindTag::ComplexProperty)
        .into_iter()
        .filter_map(|property| match artifact.kind(property) {
            Some(NodeKind::ComplexProperty { complex_type, .. }) => complex_type.known_target(),
            _ => None,
        })
        .collect()
}

/// Whether `complex_type` contains itself, directly or through nesting
pub fn contains_circular_complex_type_definition(artifact: &ModelArtifact, complex_type: ObjectId) -> bool {
    complex_property_types(artifact, complex_type)
        .into_iter()
        .any(|target| reaches(artifact, target, complex_type, &mut HashSet::new()))
}

/// Whether adding a property of type `new_property_type` to `complex_type`
/// would make the definition circular
pub fn would_create_circular_complex_type(
    artifact: &ModelArtifact,
    complex_type: ObjectId,
    new_property_type: ObjectId,
) -> bool {
    reaches(artifact, new_property_type, complex_type, &mut HashSet::new())
}

/// Depth-first search from `from` for `goal` over complex property types
fn reaches(artifact: &ModelArtifact, from: ObjectId, goal: ObjectId, visited: &mut HashSet<ObjectId>) -> bool {
    if from == goal {
        return true;
    }
    if !visited.insert(from) {
        return false;
    }

    complex_property_types(artifact, from)
        .into_iter()
        .any(|next| reaches(artifact, next, goal, visited))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_validator::ContentValidatorRegistry;

    fn complex(artifact: &ModelArtifact, name: &str) -> ObjectId {
        artifact
            .objects()
            .find(|(_, o)| o.name == name && o.tag() == NodeKindTag::ComplexType)
            .map(|(id, _)| id)
            .unwrap()
    }

    fn load(json: &str) -> ModelArtifact {
        let mut registry = ContentValidatorRegistry::new();
        ModelArtifact::from_json(json, &mut registry).unwrap()
    }

    #[test]
    fn detects_indirect_cycle() {
        let artifact = load(
            r#"{ "conceptual": { "namespace": "Shop", "complex_types": [
                { "name": "A", "properties": [ { "name": "b", "type": "Shop.B" } ] },
                { "name": "B", "properties": [ { "name": "a", "type": "Shop.A" } ] },
                { "name": "C", "properties": [ { "name": "a", "type": "Shop.A" } ] }
            ] } }"#,
        );

        assert!(contains_circular_complex_type_definition(&artifact, complex(&artifact, "A")));
        assert!(contains_circular_complex_type_definition(&artifact, complex(&artifact, "B")));
        // C reaches the A/B cycle but is not part of it
        assert!(!contains_circular_complex_type_definition(&artifact, complex(&artifact, "C")));
    }

    #[test]
    fn acyclic_nesting_and_proposed_properties() {
        let artifact = load(
            r#"{ "conceptual": { "namespace": "Shop", "complex_types": [
                { "name": "Address", "properties": [ { "name": "geo", "type": "Shop.Geo" } ] },
                { "name": "Geo", "properties": [ { "name": "lat", "type": "Double" } ] }
            ] } }"#,
        );
        let address = complex(&artifact, "Address");
        let geo = complex(&artifact, "Geo");

        assert!(!contains_circular_complex_type_definition(&artifact, address));
        assert!(would_create_circular_complex_type(&artifact, geo, address));
        assert!(would_create_circular_complex_type(&artifact, geo, geo));
        assert!(!would_create_circular_complex_type(&artifact, address, geo));
    }
}
