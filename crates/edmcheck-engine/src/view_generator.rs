//! Query view generation over a bound mapping
//!
//! Every mapped extent gets a query view that rebuilds its instances from
//! the store. Before a view is emitted the fragments of the extent are
//! checked for the problems that would make the view lossy: keys that are
//! not projected, types that no fragment covers and nullability clashes
//! between properties and the columns they land in.

use std::collections::{BTreeMap, HashSet};

use edmcheck_core::ViewGenErrorCode as V;
use edmcheck_core::{EntityTypeDef, ItemCollection, SourcePosition};

use crate::compiler::{
    Compilation, FragmentMapping, GeneratedView, GeneratedViews, MappingCollection, RuntimeError, SetMapping,
};

pub(crate) struct ViewGenerator<'a> {
    mapping: &'a MappingCollection,
    conceptual: &'a ItemCollection,
    errors: Vec<RuntimeError>,
}

impl<'a> ViewGenerator<'a> {
    pub(crate) fn new(mapping: &'a MappingCollection, conceptual: &'a ItemCollection) -> Self {
        Self {
            mapping,
            conceptual,
            errors: Vec::new(),
        }
    }

    pub(crate) fn generate(mut self) -> Compilation<GeneratedViews> {
        let mapping = self.mapping;
        let mut views = GeneratedViews::default();

        for set_mapping in &mapping.set_mappings {
            let extent = format!("{}.{}", set_mapping.container, set_mapping.set.name);
            if let Some(query) = &set_mapping.query_view {
                views.views.push(GeneratedView {
                    extent,
                    query: query.clone(),
                });
                continue;
            }

            for fragment in &set_mapping.fragments {
                self.check_fragment(fragment);
            }
            self.check_type_coverage(set_mapping);

            if !set_mapping.fragments.is_empty() {
                views.views.push(GeneratedView {
                    query: entity_query(set_mapping),
                    extent,
                });
            }
        }

        for association in &mapping.association_mappings {
            let extent = format!("{}.{}", association.container, association.association_set);
            let query = match (&association.query_view, &association.store_set) {
                (Some(query), _) => query.clone(),
                (None, Some(store_set)) => {
                    let columns: Vec<String> = association
                        .end_columns
                        .iter()
                        .map(|(_, _, column)| format!("T.{}", column))
                        .collect();
                    format!(
                        "SELECT VALUE {}({}) FROM [{}].[{}] AS T",
                        extent,
                        columns.join(", "),
                        store_set.container,
                        store_set.name
                    )
                }
                (None, None) => continue,
            };
            views.views.push(GeneratedView { extent, query });
        }

        self.check_store_columns();

        tracing::debug!(views = views.len(), errors = self.errors.len(), "Generated query views");
        Compilation::new(views, self.errors)
    }

    fn report(&mut self, code: i32, position: Option<SourcePosition>, message: String) {
        self.errors.push(RuntimeError::error(code, message).at(position));
    }

    fn check_fragment(&mut self, fragment: &FragmentMapping) {
        let mut columns: BTreeMap<&str, &str> = BTreeMap::new();
        for member in &fragment.members {
            if let Some(previous) = columns.insert(member.column.as_str(), member.path.as_str()) {
                let message = format!(
                    "Column '{}' of table '{}' is mapped by both '{}' and '{}'",
                    member.column, fragment.store_set.name, previous, member.path
                );
                self.report(V::DuplicateCPropertiesMapped.code(), member.position, message);
            }
        }

        if let Some((mapped_type, _)) = fragment.types.first() {
            for key in mapped_type.key_properties() {
                if !fragment.members.iter().any(|m| m.is_key && m.path == key.name) {
                    let message = format!(
                        "Key property '{}' of type '{}' is not mapped in the fragment for table '{}'",
                        key.name,
                        mapped_type.full_name(),
                        fragment.store_set.name
                    );
                    self.report(V::KeyNotMappedForCSideExtent.code(), fragment.position, message);
                }
            }
        }

        for key in fragment.store_set.element_type.key_properties() {
            let mapped = fragment.members.iter().any(|m| m.column == key.name)
                || fragment.condition_columns.contains(&key.name);
            if !mapped {
                let message = format!(
                    "Key column '{}' of table '{}' is not mapped",
                    key.name, fragment.store_set.name
                );
                self.report(V::KeyNotMappedForTable.code(), fragment.position, message);
            }
        }

        for member in &fragment.members {
            if member.is_key || !member.property.type_usage.is_nullable() {
                continue;
            }
            let column_nullable = fragment
                .store_set
                .element_type
                .property(&member.column)
                .map(|column| column.type_usage.is_nullable())
                .unwrap_or(true);
            if !column_nullable {
                let message = format!(
                    "Nullable property '{}' is mapped to non-nullable column '{}' of table '{}'",
                    member.path, member.column, fragment.store_set.name
                );
                self.report(V::NullableMappingForNonNullableColumn.code(), member.position, message);
            }
        }
    }

    /// Every concrete type of the set hierarchy needs a fragment
    fn check_type_coverage(&mut self, set_mapping: &SetMapping) {
        let conceptual = self.conceptual;
        let concrete = conceptual
            .entity_types()
            .iter()
            .filter(|t| !t.is_abstract && t.is_sub_type_of(&set_mapping.set.element_type));

        for entity_type in concrete {
            let covered = set_mapping.fragments.iter().any(|fragment| {
                fragment
                    .types
                    .iter()
                    .any(|(mapped, is_type_of)| covers(mapped, *is_type_of, entity_type))
            });
            if !covered {
                let message = format!(
                    "No mapping specified for instances of type '{}' in EntitySet '{}'",
                    entity_type.full_name(),
                    set_mapping.set.name
                );
                self.report(V::MissingExtentMapping.code(), set_mapping.position, message);
            }
        }
    }

    /// Non-nullable store columns with no default must receive a value
    fn check_store_columns(&mut self) {
        let mut mapped: BTreeMap<(String, String), HashSet<&str>> = BTreeMap::new();
        let mut positions: BTreeMap<(String, String), Option<SourcePosition>> = BTreeMap::new();
        let mut tables = Vec::new();

        let mapping = self.mapping;
        for set_mapping in &mapping.set_mappings {
            for fragment in &set_mapping.fragments {
                let table = (fragment.store_set.container.clone(), fragment.store_set.name.clone());
                if !mapped.contains_key(&table) {
                    tables.push(fragment.store_set.clone());
                    positions.insert(table.clone(), fragment.position);
                }
                let columns = mapped.entry(table).or_default();
                columns.extend(fragment.members.iter().map(|m| m.column.as_str()));
                columns.extend(fragment.condition_columns.iter().map(String::as_str));
            }
        }
        for association in &mapping.association_mappings {
            let Some(store_set) = &association.store_set else {
                continue;
            };
            let table = (store_set.container.clone(), store_set.name.clone());
            if let Some(columns) = mapped.get_mut(&table) {
                columns.extend(association.end_columns.iter().map(|(_, _, column)| column.as_str()));
                columns.extend(association.condition_columns.iter().map(String::as_str));
            }
        }

        for table in tables {
            let key = (table.container.clone(), table.name.clone());
            let position = positions.get(&key).copied().flatten();
            let keys: Vec<String> = table
                .element_type
                .key_properties()
                .iter()
                .map(|p| p.name.clone())
                .collect();
            let unmapped: Vec<String> = table
                .element_type
                .all_properties()
                .into_iter()
                .filter(|column| !column.type_usage.is_nullable() && !keys.contains(&column.name))
                .filter(|column| !mapped.get(&key).is_some_and(|columns| columns.contains(column.name.as_str())))
                .map(|column| column.name.clone())
                .collect();

            for column in unmapped {
                let message = format!(
                    "Non-nullable column '{}' of table '{}' is not mapped and has no default value",
                    column, table.name
                );
                self.report(V::NoDefaultValue.code(), position, message);
            }
        }
    }
}

fn covers(mapped: &EntityTypeDef, is_type_of: bool, entity_type: &EntityTypeDef) -> bool {
    if is_type_of {
        entity_type.is_sub_type_of(mapped)
    } else {
        entity_type.same_identity(mapped)
    }
}

fn entity_query(set_mapping: &SetMapping) -> String {
    let branches: Vec<String> = set_mapping
        .fragments
        .iter()
        .map(|fragment| {
            let type_name = fragment
                .types
                .first()
                .map(|(t, _)| t.full_name())
                .unwrap_or_else(|| set_mapping.set.element_type.full_name());
            let columns: Vec<String> = fragment.members.iter().map(|m| format!("T.{}", m.column)).collect();
            format!(
                "SELECT VALUE {}({}) FROM [{}].[{}] AS T",
                type_name,
                columns.join(", "),
                fragment.store_set.container,
                fragment.store_set.name
            )
        })
        .collect();
    branches.join(" UNION ALL ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::MemberMapping;
    use edmcheck_core::{DataSpace, EdmProperty, EdmType, EntitySetDef, Facets, PrimitiveTypeKind, TypeUsage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn int(nullable: bool) -> TypeUsage {
        TypeUsage::primitive(PrimitiveTypeKind::Int32).with_nullable(nullable)
    }

    fn customer() -> Arc<EntityTypeDef> {
        Arc::new(
            EntityTypeDef::new("Shop", "Customer", DataSpace::CSpace)
                .with_property("Id", int(false))
                .with_property("Age", int(true))
                .with_key(&["Id"]),
        )
    }

    fn table(nullable_age: bool) -> Arc<EntitySetDef> {
        let element_type = EntityTypeDef::new("Shop.Store", "customers", DataSpace::SSpace)
            .with_property("id", int(false))
            .with_property("age", int(nullable_age))
            .with_property(
                "created",
                TypeUsage::with_facets(EdmType::Primitive(PrimitiveTypeKind::DateTime), Facets::non_nullable()),
            )
            .with_key(&["id"]);
        Arc::new(EntitySetDef {
            name: "customers".to_string(),
            container: "ShopStore".to_string(),
            space: DataSpace::SSpace,
            element_type: Arc::new(element_type),
        })
    }

    fn member(entity: &EntityTypeDef, path: &str, column: &str) -> MemberMapping {
        MemberMapping {
            path: path.to_string(),
            property: entity.property(path).cloned().unwrap_or_else(|| EdmProperty::new(path, int(true))),
            column: column.to_string(),
            is_key: entity.key_members.iter().any(|k| k == path),
            position: None,
        }
    }

    fn mapping(members: &[(&str, &str)], condition_columns: &[&str], nullable_age: bool) -> (MappingCollection, ItemCollection) {
        let customer = customer();
        let mut conceptual = ItemCollection::new(DataSpace::CSpace, 3);
        conceptual.add_entity_type(customer.clone());

        let set = Arc::new(EntitySetDef {
            name: "Customers".to_string(),
            container: "ShopContainer".to_string(),
            space: DataSpace::CSpace,
            element_type: customer.clone(),
        });
        let fragment = FragmentMapping {
            types: vec![(customer.clone(), false)],
            store_set: table(nullable_age),
            members: members.iter().map(|(p, c)| member(&customer, p, c)).collect(),
            condition_columns: condition_columns.iter().map(|c| c.to_string()).collect(),
            position: None,
        };
        let collection = MappingCollection {
            version: 3,
            set_mappings: vec![SetMapping {
                container: "ShopContainer".to_string(),
                set,
                query_view: None,
                fragments: vec![fragment],
                position: None,
            }],
            association_mappings: Vec::new(),
        };
        (collection, conceptual)
    }

    fn run(collection: &MappingCollection, conceptual: &ItemCollection) -> Compilation<GeneratedViews> {
        ViewGenerator::new(collection, conceptual).generate()
    }

    fn codes(compilation: &Compilation<GeneratedViews>) -> Vec<i32> {
        compilation.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn generates_a_view_per_set() {
        let (collection, conceptual) = mapping(&[("Id", "id"), ("Age", "age")], &["created"], true);
        let compilation = run(&collection, &conceptual);
        assert_eq!(codes(&compilation), Vec::<i32>::new());

        let views = compilation.output.unwrap();
        assert_eq!(
            views.view("ShopContainer.Customers").unwrap().query,
            "SELECT VALUE Shop.Customer(T.id, T.age) FROM [ShopStore].[customers] AS T"
        );
    }

    #[test]
    fn unmapped_keys_and_columns() {
        let (collection, conceptual) = mapping(&[("Age", "age")], &[], true);
        let compilation = run(&collection, &conceptual);
        assert_eq!(
            codes(&compilation),
            vec![
                V::KeyNotMappedForCSideExtent.code(),
                V::KeyNotMappedForTable.code(),
                V::NoDefaultValue.code(),
            ]
        );
    }

    #[test]
    fn duplicate_columns_and_nullability() {
        let (collection, conceptual) = mapping(&[("Id", "id"), ("Age", "age"), ("Extra", "age")], &["created"], false);
        let compilation = run(&collection, &conceptual);
        assert_eq!(
            codes(&compilation),
            vec![
                V::DuplicateCPropertiesMapped.code(),
                V::NullableMappingForNonNullableColumn.code(),
                V::NullableMappingForNonNullableColumn.code(),
            ]
        );
    }

    #[test]
    fn derived_types_need_coverage() {
        let (mut collection, mut conceptual) = mapping(&[("Id", "id"), ("Age", "age")], &["created"], true);
        let base = collection.set_mappings[0].set.element_type.clone();
        let derived = Arc::new(EntityTypeDef::new("Shop", "VipCustomer", DataSpace::CSpace).with_base(base.clone()));
        conceptual.add_entity_type(derived);

        let compilation = run(&collection, &conceptual);
        assert_eq!(codes(&compilation), vec![V::MissingExtentMapping.code()]);

        collection.set_mappings[0].fragments[0].types = vec![(base, true)];
        let compilation = run(&collection, &conceptual);
        assert!(compilation.is_success());
    }
}
