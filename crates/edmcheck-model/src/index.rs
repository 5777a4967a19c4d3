//! Anti-dependency index
//!
//! Reverse edges over known bindings: for every object, which objects
//! refer to it. Built once per load and never stored on the objects.

use std::collections::HashMap;

use edmcheck_core::ObjectId;

use crate::artifact::{ModelArtifact, NodeKindTag};

/// Reverse multimap `target -> [(referrer, referrer kind)]`
#[derive(Debug, Clone, Default)]
pub struct AntiDependencyIndex {
    referrers: HashMap<ObjectId, Vec<(ObjectId, NodeKindTag)>>,
}

impl AntiDependencyIndex {
    /// Build the index from every known binding of the artifact
    pub fn build(artifact: &ModelArtifact) -> Self {
        let mut referrers: HashMap<ObjectId, Vec<(ObjectId, NodeKindTag)>> = HashMap::new();

        for (id, object) in artifact.objects() {
            let tag = object.tag();
            for binding in object.kind.bindings() {
                let Some(target) = binding.known_target() else {
                    continue;
                };
                let entry = referrers.entry(target).or_default();
                // An object may bind the same target twice (both roles of a
                // self-association); it is still one anti-dependency
                if !entry.iter().any(|(referrer, _)| *referrer == id) {
                    entry.push((id, tag));
                }
            }
        }

        tracing::debug!(targets = referrers.len(), "Built anti-dependency index");
        Self { referrers }
    }

    /// All objects referring to `target`, in document order
    pub fn anti_dependencies(&self, target: ObjectId) -> Vec<ObjectId> {
        self.referrers
            .get(&target)
            .map(|refs| refs.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }

    /// Objects of one kind referring to `target`
    pub fn anti_dependencies_of_kind(&self, target: ObjectId, tag: NodeKindTag) -> Vec<ObjectId> {
        self.referrers
            .get(&target)
            .map(|refs| {
                refs.iter()
                    .filter(|(_, kind)| *kind == tag)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn first_anti_dependency_of_kind(&self, target: ObjectId, tag: NodeKindTag) -> Option<ObjectId> {
        self.referrers
            .get(&target)?
            .iter()
            .find(|(_, kind)| *kind == tag)
            .map(|(id, _)| *id)
    }

    pub fn has_anti_dependency_of_kind(&self, target: ObjectId, tag: NodeKindTag) -> bool {
        self.first_anti_dependency_of_kind(target, tag).is_some()
    }

    /// Number of objects referred to at least once
    pub fn len(&self) -> usize {
        self.referrers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referrers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_validator::ContentValidatorRegistry;
    use pretty_assertions::assert_eq;

    fn find(artifact: &ModelArtifact, path: &str, tag: NodeKindTag) -> ObjectId {
        artifact
            .objects()
            .map(|(id, _)| id)
            .find(|id| artifact.path_of(*id) == path && artifact.tag(*id) == Some(tag))
            .unwrap()
    }

    #[test]
    fn sets_and_navigations_point_back_at_their_targets() {
        let json = r#"{ "conceptual": { "namespace": "Shop",
            "entity_types": [
                { "name": "Person", "key": ["Id"],
                  "properties": [ { "name": "Id", "type": "Int32" } ],
                  "navigation_properties": [
                    { "name": "Manager", "relationship": "Shop.Manages", "from_role": "Report", "to_role": "Manager" }
                  ] }
            ],
            "associations": [
                { "name": "Manages", "ends": [
                    { "role": "Manager", "type": "Shop.Person", "multiplicity": "0..1" },
                    { "role": "Report", "type": "Shop.Person", "multiplicity": "*" }
                ] }
            ],
            "entity_containers": [
                { "name": "C", "entity_sets": [
                    { "name": "People", "entity_type": "Shop.Person" },
                    { "name": "Staff", "entity_type": "Shop.Person" }
                ] }
            ]
        } }"#;

        let mut registry = ContentValidatorRegistry::new();
        let artifact = ModelArtifact::from_json(json, &mut registry).unwrap();
        let index = AntiDependencyIndex::build(&artifact);

        let person = find(&artifact, "Shop/Person", NodeKindTag::EntityType);
        let people = find(&artifact, "Shop/C/People", NodeKindTag::EntitySet);
        let staff = find(&artifact, "Shop/C/Staff", NodeKindTag::EntitySet);
        assert_eq!(index.anti_dependencies_of_kind(person, NodeKindTag::EntitySet), vec![people, staff]);
        assert_eq!(index.anti_dependencies_of_kind(person, NodeKindTag::AssociationEnd).len(), 2);

        let manager_end = find(&artifact, "Shop/Manages/Manager", NodeKindTag::AssociationEnd);
        let navigation = find(&artifact, "Shop/Person/Manager", NodeKindTag::NavigationProperty);
        assert_eq!(
            index.first_anti_dependency_of_kind(manager_end, NodeKindTag::NavigationProperty),
            Some(navigation)
        );

        let id = find(&artifact, "Shop/Person/Id", NodeKindTag::Property);
        assert_eq!(index.anti_dependencies(id).len(), 1);
        assert!(!index.has_anti_dependency_of_kind(id, NodeKindTag::ScalarProperty));
    }
}
