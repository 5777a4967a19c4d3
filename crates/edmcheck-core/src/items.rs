//! Compiled metadata item collections
//!
//! An `ItemCollection` holds every global item of one data space, as
//! produced by runtime compilation of a conceptual or storage schema.

use std::sync::Arc;

use crate::schema::{
    AssociationType, ComplexTypeDef, DataSpace, EdmFunction, EntityContainerDef, EntitySetDef,
    EntityTypeDef, EnumTypeDef,
};

/// All items of one data space
#[derive(Debug, Clone)]
pub struct ItemCollection {
    space: DataSpace,

    /// Schema version the items were compiled from
    version: u8,

    entity_types: Vec<Arc<EntityTypeDef>>,
    complex_types: Vec<Arc<ComplexTypeDef>>,
    enum_types: Vec<Arc<EnumTypeDef>>,
    associations: Vec<Arc<AssociationType>>,
    functions: Vec<Arc<EdmFunction>>,
    containers: Vec<EntityContainerDef>,
}

impl ItemCollection {
    pub fn new(space: DataSpace, version: u8) -> Self {
        Self {
            space,
            version,
            entity_types: Vec::new(),
            complex_types: Vec::new(),
            enum_types: Vec::new(),
            associations: Vec::new(),
            functions: Vec::new(),
            containers: Vec::new(),
        }
    }

    pub fn space(&self) -> DataSpace {
        self.space
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn add_entity_type(&mut self, entity: Arc<EntityTypeDef>) {
        self.entity_types.push(entity);
    }

    pub fn add_complex_type(&mut self, complex: Arc<ComplexTypeDef>) {
        self.complex_types.push(complex);
    }

    pub fn add_enum_type(&mut self, enum_type: Arc<EnumTypeDef>) {
        self.enum_types.push(enum_type);
    }

    pub fn add_association(&mut self, association: Arc<AssociationType>) {
        self.associations.push(association);
    }

    pub fn add_function(&mut self, function: Arc<EdmFunction>) {
        self.functions.push(function);
    }

    pub fn add_container(&mut self, container: EntityContainerDef) {
        self.containers.push(container);
    }

    pub fn entity_types(&self) -> &[Arc<EntityTypeDef>] {
        &self.entity_types
    }

    pub fn complex_types(&self) -> &[Arc<ComplexTypeDef>] {
        &self.complex_types
    }

    pub fn enum_types(&self) -> &[Arc<EnumTypeDef>] {
        &self.enum_types
    }

    pub fn associations(&self) -> &[Arc<AssociationType>] {
        &self.associations
    }

    pub fn functions(&self) -> &[Arc<EdmFunction>] {
        &self.functions
    }

    pub fn containers(&self) -> &[EntityContainerDef] {
        &self.containers
    }

    /// Look up an entity type by full name
    pub fn entity_type(&self, full_name: &str) -> Option<&Arc<EntityTypeDef>> {
        self.entity_types.iter().find(|t| t.full_name() == full_name)
    }

    pub fn complex_type(&self, full_name: &str) -> Option<&Arc<ComplexTypeDef>> {
        self.complex_types.iter().find(|t| t.full_name() == full_name)
    }

    pub fn enum_type(&self, full_name: &str) -> Option<&Arc<EnumTypeDef>> {
        self.enum_types.iter().find(|t| t.full_name() == full_name)
    }

    pub fn association(&self, full_name: &str) -> Option<&Arc<AssociationType>> {
        self.associations.iter().find(|a| a.full_name() == full_name)
    }

    /// All overloads with the given full name
    pub fn function_overloads(&self, full_name: &str) -> Vec<&Arc<EdmFunction>> {
        self.functions
            .iter()
            .filter(|f| f.full_name() == full_name)
            .collect()
    }

    pub fn container(&self, name: &str) -> Option<&EntityContainerDef> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Look up an entity set by container and set name
    pub fn entity_set(&self, container: &str, name: &str) -> Option<&Arc<EntitySetDef>> {
        self.container(container).and_then(|c| c.entity_set(name))
    }

    /// Total number of global items
    pub fn len(&self) -> usize {
        self.entity_types.len()
            + self.complex_types.len()
            + self.enum_types.len()
            + self.associations.len()
            + self.functions.len()
            + self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PrimitiveTypeKind, TypeUsage};

    #[test]
    fn lookups_by_full_name() {
        let mut items = ItemCollection::new(DataSpace::CSpace, 3);
        let product = Arc::new(
            EntityTypeDef::new("Shop", "Product", DataSpace::CSpace)
                .with_property("Id", TypeUsage::primitive(PrimitiveTypeKind::Int32))
                .with_key(&["Id"]),
        );
        items.add_entity_type(product.clone());
        items.add_container(EntityContainerDef {
            name: "ShopContainer".to_string(),
            space: DataSpace::CSpace,
            entity_sets: vec![Arc::new(EntitySetDef {
                name: "Products".to_string(),
                container: "ShopContainer".to_string(),
                space: DataSpace::CSpace,
                element_type: product,
            })],
            association_sets: Vec::new(),
        });

        assert!(items.entity_type("Shop.Product").is_some());
        assert!(items.entity_type("Product").is_none());
        assert!(items.entity_set("ShopContainer", "Products").is_some());
        assert_eq!(items.len(), 2);
        assert!(!items.is_empty());
    }
}
