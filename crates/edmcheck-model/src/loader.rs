//! Document loader
//!
//! Walks an `ArtifactDocument` depth-first and appends one `ModelObject`
//! per element, so parents always precede their children in the arena.
//! Every reference is recorded as a pending `Binding`; the binder resolves
//! them once the whole arena exists.

use std::collections::HashSet;

use edmcheck_core::{DesignerCode, ErrorClass, ErrorInfo, ErrorItem, ObjectId, PrimitiveTypeKind, Severity};

use crate::artifact::{Binding, MappedType, ModelArtifact, ModelObject, ModelSpace, NodeKind};
use crate::binder;
use crate::content_validator::{ContentValidatorRegistry, SchemaLayer};
use crate::document::*;

pub(crate) struct Loader<'r> {
    registry: &'r mut ContentValidatorRegistry,
    objects: Vec<ModelObject>,
    diagnostics: Vec<ErrorInfo>,
}

/// Namespace context of the schema being loaded
struct SchemaScope {
    layer: SchemaLayer,
    space: ModelSpace,
    version: u8,
    namespace: String,
    alias: Option<String>,
    enum_types: HashSet<String>,
}

impl SchemaScope {
    /// Full name of a possibly alias-qualified or unqualified type name
    fn qualify(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((prefix, local)) if self.alias.as_deref() == Some(prefix) => {
                format!("{}.{}", self.namespace, local)
            }
            Some(_) => name.to_string(),
            None => format!("{}.{}", self.namespace, name),
        }
    }
}

/// Primitive kind of a conceptual type name (`Int32` or `Edm.Int32`)
pub(crate) fn conceptual_primitive(type_name: &str) -> Option<PrimitiveTypeKind> {
    PrimitiveTypeKind::from_name(type_name.strip_prefix("Edm.").unwrap_or(type_name))
}

/// Split `IsTypeOf(Shop.Product);Shop.Order` into its entries
pub(crate) fn parse_type_mapping_names(type_name: &str) -> Vec<(String, bool)> {
    type_name
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            match entry
                .strip_prefix("IsTypeOf(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(inner) => (inner.trim().to_string(), true),
                None => (entry.to_string(), false),
            }
        })
        .collect()
}

impl<'r> Loader<'r> {
    pub(crate) fn new(registry: &'r mut ContentValidatorRegistry) -> Self {
        Self {
            registry,
            objects: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn load(mut self, document: &ArtifactDocument) -> ModelArtifact {
        for key in document.extra.keys() {
            self.diagnostics.push(ErrorInfo::designer(
                Severity::Warning,
                format!("The artifact key '{}' is not supported by the designer", key),
                ErrorItem::Artifact,
                DesignerCode::ModelParseGhostNodeNotSupportedByDesigner,
                ErrorClass::PARSE_ERROR,
            ));
        }

        let conceptual_root = document.conceptual.as_ref().map(|schema| {
            let version = schema.version.unwrap_or(document.version);
            self.load_schema(schema, ModelSpace::Conceptual, version)
        });
        let storage_root = document.storage.as_ref().map(|schema| {
            let version = schema.version.unwrap_or(document.version);
            self.load_schema(schema, ModelSpace::Storage, version)
        });
        let mapping_root = document.mapping.as_ref().map(|mapping| {
            let version = mapping.version.unwrap_or(document.version);
            self.load_mapping(mapping, version)
        });

        let mut artifact = ModelArtifact {
            path: None,
            source: None,
            version: document.version,
            objects: self.objects,
            conceptual_root,
            storage_root,
            mapping_root,
            diagnostics: self.diagnostics,
        };

        let resolve_errors = binder::bind(&mut artifact);
        artifact.diagnostics.extend(resolve_errors);

        tracing::debug!(
            objects = artifact.objects.len(),
            diagnostics = artifact.diagnostics.len(),
            "Loaded artifact"
        );

        artifact
    }

    fn add(
        &mut self,
        parent: Option<ObjectId>,
        name: &str,
        span: &Span,
        extra: &ExtraKeys,
        kind: NodeKind,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        let tag = kind.tag();

        self.objects.push(ModelObject {
            parent,
            name: name.to_string(),
            position: span.position(),
            kind,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.objects[parent.index()].children.push(id);
        }

        for key in extra.keys() {
            tracing::warn!(key = %key, element = %tag, "Unsupported element content");
            self.diagnostics.push(ErrorInfo::designer(
                Severity::Warning,
                format!("The key '{}' of {} '{}' is not supported by the designer", key, tag, name),
                ErrorItem::Object(id),
                DesignerCode::ModelParseGhostNodeNotSupportedByDesigner,
                ErrorClass::PARSE_ERROR,
            ));
        }

        id
    }

    /// Check an attribute value against its declared simple type
    fn check(&mut self, id: ObjectId, layer: SchemaLayer, version: u8, path: &str, value: &str) {
        let Ok(validator) = self.registry.validator_for(version) else {
            return;
        };

        let attribute_path = validator.path(layer, path);
        if validator.is_valid_attribute_value(value, &attribute_path) {
            return;
        }

        let message = match validator.type_for_path(&attribute_path) {
            Some(simple_type) => format!(
                "The value '{}' is not valid for attribute {} ({})",
                value,
                attribute_path,
                simple_type.name()
            ),
            None => format!(
                "The attribute {} is not supported by schema version {}",
                attribute_path, version
            ),
        };

        self.diagnostics.push(ErrorInfo::designer(
            Severity::Error,
            message,
            ErrorItem::Object(id),
            DesignerCode::ModelParseInvalidAttributeValue,
            ErrorClass::PARSE_ERROR,
        ));
    }

    fn load_schema(&mut self, schema: &SchemaDocument, space: ModelSpace, version: u8) -> ObjectId {
        let mut scope = SchemaScope {
            layer: space.layer(),
            space,
            version,
            namespace: schema.namespace.clone(),
            alias: schema.alias.clone(),
            enum_types: HashSet::new(),
        };
        scope.enum_types = schema
            .enum_types
            .iter()
            .map(|e| scope.qualify(&e.name))
            .collect();

        let kind = match space {
            ModelSpace::Conceptual => NodeKind::ConceptualModel {
                namespace: schema.namespace.clone(),
                alias: schema.alias.clone(),
                version,
            },
            ModelSpace::Storage => NodeKind::StorageModel {
                namespace: schema.namespace.clone(),
                alias: schema.alias.clone(),
                provider: schema.provider.clone(),
                version,
            },
        };
        let root = self.add(None, &schema.namespace, &schema.span, &schema.extra, kind);
        self.check(root, scope.layer, version, "Schema/Namespace", &schema.namespace);
        if let Some(alias) = &schema.alias {
            self.check(root, scope.layer, version, "Schema/Alias", alias);
        }

        for using in &schema.usings {
            let id = self.add(
                Some(root),
                "",
                &using.span,
                &using.extra,
                NodeKind::Using {
                    namespace: using.namespace.clone(),
                    alias: using.alias.clone(),
                },
            );
            self.check(id, scope.layer, version, "Schema/Using/Namespace", &using.namespace);
        }

        for entity_type in &schema.entity_types {
            self.load_entity_type(root, entity_type, &scope);
        }
        for complex_type in &schema.complex_types {
            let id = self.add(
                Some(root),
                &complex_type.name,
                &complex_type.span,
                &complex_type.extra,
                NodeKind::ComplexType,
            );
            self.check(id, scope.layer, version, "Schema/ComplexType/Name", &complex_type.name);
            for property in &complex_type.properties {
                self.load_property(id, "Schema/ComplexType/Property", property, &scope);
            }
        }
        for enum_type in &schema.enum_types {
            self.load_enum_type(root, enum_type, &scope);
        }
        for association in &schema.associations {
            self.load_association(root, association, &scope);
        }
        for function in &schema.functions {
            self.load_function(root, function, &scope);
        }
        for container in &schema.entity_containers {
            self.load_container(root, container, &scope);
        }

        root
    }

    fn load_entity_type(&mut self, root: ObjectId, entity_type: &EntityTypeDocument, scope: &SchemaScope) {
        let id = self.add(
            Some(root),
            &entity_type.name,
            &entity_type.span,
            &entity_type.extra,
            NodeKind::EntityType {
                space: scope.space,
                base_type: entity_type.base_type.as_deref().map(Binding::pending),
                is_abstract: entity_type.is_abstract,
            },
        );
        self.check(id, scope.layer, scope.version, "Schema/EntityType/Name", &entity_type.name);
        if let Some(base_type) = &entity_type.base_type {
            self.check(id, scope.layer, scope.version, "Schema/EntityType/BaseType", base_type);
        }

        for key in &entity_type.key {
            let key_id = self.add(
                Some(id),
                key,
                &Span::default(),
                &ExtraKeys::new(),
                NodeKind::PropertyRef {
                    property: Binding::pending(key),
                },
            );
            self.check(key_id, scope.layer, scope.version, "Schema/EntityType/Key/PropertyRef/Name", key);
        }

        for property in &entity_type.properties {
            self.load_property(id, "Schema/EntityType/Property", property, scope);
        }

        for navigation in &entity_type.navigation_properties {
            let nav_id = self.add(
                Some(id),
                &navigation.name,
                &navigation.span,
                &navigation.extra,
                NodeKind::NavigationProperty {
                    relationship: navigation.relationship.as_deref().map(Binding::pending),
                    from_role: navigation.from_role.as_deref().map(Binding::pending),
                    to_role: navigation.to_role.as_deref().map(Binding::pending),
                },
            );
            let base = "Schema/EntityType/NavigationProperty";
            self.check(nav_id, scope.layer, scope.version, &format!("{}/Name", base), &navigation.name);
            for (attribute, value) in [
                ("Relationship", &navigation.relationship),
                ("FromRole", &navigation.from_role),
                ("ToRole", &navigation.to_role),
            ] {
                if let Some(value) = value {
                    self.check(nav_id, scope.layer, scope.version, &format!("{}/{}", base, attribute), value);
                }
            }
        }
    }

    fn load_property(&mut self, owner: ObjectId, path: &str, property: &PropertyDocument, scope: &SchemaScope) {
        let nullable = property.nullable.unwrap_or(true);
        let is_conceptual_structured =
            scope.space == ModelSpace::Conceptual && conceptual_primitive(&property.type_name).is_none();

        let kind = if is_conceptual_structured && !scope.enum_types.contains(&scope.qualify(&property.type_name)) {
            NodeKind::ComplexProperty {
                complex_type: Binding::pending(&property.type_name),
                nullable,
            }
        } else {
            NodeKind::Property {
                space: scope.space,
                type_name: property.type_name.clone(),
                enum_type: is_conceptual_structured.then(|| Binding::pending(&property.type_name)),
                nullable,
                max_length: property.max_length.as_ref().map(|v| v.to_string()),
                store_generated_pattern: property.store_generated_pattern.clone(),
                concurrency_mode: property.concurrency_mode.clone(),
            }
        };

        let id = self.add(Some(owner), &property.name, &property.span, &property.extra, kind);
        self.check(id, scope.layer, scope.version, &format!("{}/Name", path), &property.name);
        self.check(id, scope.layer, scope.version, &format!("{}/Type", path), &property.type_name);

        let facets = [
            ("MaxLength", property.max_length.as_ref().map(|v| v.to_string())),
            ("StoreGeneratedPattern", property.store_generated_pattern.clone()),
            ("ConcurrencyMode", property.concurrency_mode.clone()),
        ];
        for (attribute, value) in facets {
            if let Some(value) = value {
                self.check(id, scope.layer, scope.version, &format!("{}/{}", path, attribute), &value);
            }
        }
    }

    fn load_enum_type(&mut self, root: ObjectId, enum_type: &EnumTypeDocument, scope: &SchemaScope) {
        let id = self.add(
            Some(root),
            &enum_type.name,
            &enum_type.span,
            &enum_type.extra,
            NodeKind::EnumType {
                underlying_type: enum_type.underlying_type.clone(),
                is_flags: enum_type.is_flags,
            },
        );
        self.check(id, scope.layer, scope.version, "Schema/EnumType/Name", &enum_type.name);
        if let Some(underlying) = &enum_type.underlying_type {
            self.check(id, scope.layer, scope.version, "Schema/EnumType/UnderlyingType", underlying);
        }

        for member in &enum_type.members {
            let member_id = self.add(
                Some(id),
                &member.name,
                &member.span,
                &member.extra,
                NodeKind::EnumMember { value: member.value },
            );
            self.check(member_id, scope.layer, scope.version, "Schema/EnumType/Member/Name", &member.name);
        }
    }

    fn load_association(&mut self, root: ObjectId, association: &AssociationDocument, scope: &SchemaScope) {
        let id = self.add(
            Some(root),
            &association.name,
            &association.span,
            &association.extra,
            NodeKind::Association { space: scope.space },
        );
        self.check(id, scope.layer, scope.version, "Schema/Association/Name", &association.name);

        for end in &association.ends {
            let end_id = self.add(
                Some(id),
                &end.role,
                &end.span,
                &end.extra,
                NodeKind::AssociationEnd {
                    entity_type: Binding::pending(&end.type_name),
                    multiplicity: end.multiplicity.clone(),
                    on_delete: end.on_delete.clone(),
                },
            );
            let base = "Schema/Association/End";
            self.check(end_id, scope.layer, scope.version, &format!("{}/Role", base), &end.role);
            self.check(end_id, scope.layer, scope.version, &format!("{}/Type", base), &end.type_name);
            self.check(end_id, scope.layer, scope.version, &format!("{}/Multiplicity", base), &end.multiplicity);
            if let Some(action) = &end.on_delete {
                self.check(end_id, scope.layer, scope.version, &format!("{}/OnDelete/Action", base), action);
            }
        }

        if let Some(constraint) = &association.referential_constraint {
            let constraint_id = self.add(
                Some(id),
                "",
                &constraint.span,
                &constraint.extra,
                NodeKind::ReferentialConstraint,
            );
            for (principal, role) in [(true, &constraint.principal), (false, &constraint.dependent)] {
                let role_id = self.add(
                    Some(constraint_id),
                    &role.role,
                    &role.span,
                    &role.extra,
                    NodeKind::ReferentialConstraintRole {
                        principal,
                        role: Binding::pending(&role.role),
                        properties: role.property_refs.iter().map(Binding::pending).collect(),
                    },
                );
                let base = if principal {
                    "Schema/Association/ReferentialConstraint/Principal"
                } else {
                    "Schema/Association/ReferentialConstraint/Dependent"
                };
                self.check(role_id, scope.layer, scope.version, &format!("{}/Role", base), &role.role);
                for property in &role.property_refs {
                    self.check(
                        role_id,
                        scope.layer,
                        scope.version,
                        &format!("{}/PropertyRef/Name", base),
                        property,
                    );
                }
            }
        }
    }

    fn load_function(&mut self, root: ObjectId, function: &FunctionDocument, scope: &SchemaScope) {
        let id = self.add(
            Some(root),
            &function.name,
            &function.span,
            &function.extra,
            NodeKind::Function {
                space: scope.space,
                return_type: function.return_type.clone(),
                is_aggregate: function.aggregate,
                is_composable: function.is_composable.unwrap_or(true),
                command_text: function.command_text.clone(),
            },
        );
        self.check(id, scope.layer, scope.version, "Schema/Function/Name", &function.name);

        for parameter in &function.parameters {
            let parameter_id = self.add(
                Some(id),
                &parameter.name,
                &parameter.span,
                &parameter.extra,
                NodeKind::FunctionParameter {
                    type_name: parameter.type_name.clone(),
                    mode: parameter.mode.clone(),
                },
            );
            self.check(parameter_id, scope.layer, scope.version, "Schema/Function/Parameter/Name", &parameter.name);
        }
    }

    fn load_container(&mut self, root: ObjectId, container: &EntityContainerDocument, scope: &SchemaScope) {
        let id = self.add(
            Some(root),
            &container.name,
            &container.span,
            &container.extra,
            NodeKind::EntityContainer { space: scope.space },
        );
        self.check(id, scope.layer, scope.version, "Schema/EntityContainer/Name", &container.name);

        for set in &container.entity_sets {
            let set_id = self.add(
                Some(id),
                &set.name,
                &set.span,
                &set.extra,
                NodeKind::EntitySet {
                    entity_type: Binding::pending(&set.entity_type),
                },
            );
            let base = "Schema/EntityContainer/EntitySet";
            self.check(set_id, scope.layer, scope.version, &format!("{}/Name", base), &set.name);
            self.check(set_id, scope.layer, scope.version, &format!("{}/EntityType", base), &set.entity_type);
        }

        for set in &container.association_sets {
            let set_id = self.add(
                Some(id),
                &set.name,
                &set.span,
                &set.extra,
                NodeKind::AssociationSet {
                    association: Binding::pending(&set.association),
                },
            );
            let base = "Schema/EntityContainer/AssociationSet";
            self.check(set_id, scope.layer, scope.version, &format!("{}/Name", base), &set.name);
            self.check(set_id, scope.layer, scope.version, &format!("{}/Association", base), &set.association);

            for end in &set.ends {
                let end_id = self.add(
                    Some(set_id),
                    &end.role,
                    &end.span,
                    &end.extra,
                    NodeKind::AssociationSetEnd {
                        role: Binding::pending(&end.role),
                        entity_set: Binding::pending(&end.entity_set),
                    },
                );
                self.check(end_id, scope.layer, scope.version, &format!("{}/End/Role", base), &end.role);
                self.check(end_id, scope.layer, scope.version, &format!("{}/End/EntitySet", base), &end.entity_set);
            }
        }
    }

    fn load_mapping(&mut self, mapping: &MappingDocument, version: u8) -> ObjectId {
        let root = self.add(
            None,
            "",
            &mapping.span,
            &mapping.extra,
            NodeKind::MappingModel { version },
        );
        let layer = SchemaLayer::Mapping;
        let base = "Mapping/EntityContainerMapping";

        for container_mapping in &mapping.entity_container_mappings {
            let ecm = self.add(
                Some(root),
                &container_mapping.cdm_entity_container,
                &container_mapping.span,
                &container_mapping.extra,
                NodeKind::EntityContainerMapping {
                    storage_container: Binding::pending(&container_mapping.storage_entity_container),
                    conceptual_container: Binding::pending(&container_mapping.cdm_entity_container),
                },
            );
            self.check(
                ecm,
                layer,
                version,
                &format!("{}/StorageEntityContainer", base),
                &container_mapping.storage_entity_container,
            );
            self.check(
                ecm,
                layer,
                version,
                &format!("{}/CdmEntityContainer", base),
                &container_mapping.cdm_entity_container,
            );

            for set_mapping in &container_mapping.entity_set_mappings {
                self.load_entity_set_mapping(ecm, set_mapping, version);
            }
            for set_mapping in &container_mapping.association_set_mappings {
                self.load_association_set_mapping(ecm, set_mapping, version);
            }
        }

        root
    }

    fn load_entity_set_mapping(&mut self, ecm: ObjectId, set_mapping: &EntitySetMappingDocument, version: u8) {
        let layer = SchemaLayer::Mapping;
        let base = "Mapping/EntityContainerMapping/EntitySetMapping";

        let esm = self.add(
            Some(ecm),
            &set_mapping.name,
            &set_mapping.span,
            &set_mapping.extra,
            NodeKind::EntitySetMapping {
                entity_set: Binding::pending(&set_mapping.name),
                query_view: set_mapping.query_view.clone(),
            },
        );
        self.check(esm, layer, version, &format!("{}/Name", base), &set_mapping.name);

        for type_mapping in &set_mapping.entity_type_mappings {
            let types = parse_type_mapping_names(&type_mapping.type_name)
                .into_iter()
                .map(|(name, is_type_of)| MappedType {
                    binding: Binding::pending(name),
                    is_type_of,
                })
                .collect();
            let etm = self.add(
                Some(esm),
                &type_mapping.type_name,
                &type_mapping.span,
                &type_mapping.extra,
                NodeKind::EntityTypeMapping { types },
            );

            for fragment in &type_mapping.fragments {
                let fragment_id = self.add(
                    Some(etm),
                    &fragment.store_entity_set,
                    &fragment.span,
                    &fragment.extra,
                    NodeKind::MappingFragment {
                        store_entity_set: Binding::pending(&fragment.store_entity_set),
                    },
                );
                let fragment_path = format!("{}/EntityTypeMapping/MappingFragment", base);
                self.check(
                    fragment_id,
                    layer,
                    version,
                    &format!("{}/StoreEntitySet", fragment_path),
                    &fragment.store_entity_set,
                );

                for scalar in &fragment.scalar_properties {
                    self.load_scalar_property(fragment_id, scalar, Some(&fragment_path), version);
                }
                for complex in &fragment.complex_properties {
                    self.load_complex_property_mapping(fragment_id, complex);
                }
                for condition in &fragment.conditions {
                    self.load_condition(fragment_id, condition);
                }
            }

            if let Some(functions) = &type_mapping.modification_function_mapping {
                let bindings = [
                    &functions.insert_function,
                    &functions.update_function,
                    &functions.delete_function,
                ]
                .into_iter()
                .flatten()
                .map(Binding::pending)
                .collect();
                self.add(
                    Some(etm),
                    "",
                    &functions.span,
                    &functions.extra,
                    NodeKind::ModificationFunctionMapping { functions: bindings },
                );
            }
        }
    }

    /// `path` is the element chain of the owner when its scalar properties
    /// carry checkable attributes
    fn load_scalar_property(
        &mut self,
        owner: ObjectId,
        scalar: &ScalarPropertyDocument,
        path: Option<&str>,
        version: u8,
    ) {
        let id = self.add(
            Some(owner),
            &scalar.name,
            &scalar.span,
            &scalar.extra,
            NodeKind::ScalarProperty {
                property: Binding::pending(&scalar.name),
                column: Binding::pending(&scalar.column),
            },
        );
        if let Some(path) = path {
            self.check(id, SchemaLayer::Mapping, version, &format!("{}/ScalarProperty/Name", path), &scalar.name);
            self.check(
                id,
                SchemaLayer::Mapping,
                version,
                &format!("{}/ScalarProperty/ColumnName", path),
                &scalar.column,
            );
        }
    }

    fn load_complex_property_mapping(&mut self, owner: ObjectId, complex: &ComplexPropertyMappingDocument) {
        let id = self.add(
            Some(owner),
            &complex.name,
            &complex.span,
            &complex.extra,
            NodeKind::ComplexPropertyMapping {
                property: Binding::pending(&complex.name),
                complex_type: complex.type_name.as_deref().map(Binding::pending),
            },
        );

        for scalar in &complex.scalar_properties {
            self.load_scalar_property(id, scalar, None, 0);
        }
        for nested in &complex.complex_properties {
            self.load_complex_property_mapping(id, nested);
        }
    }

    fn load_condition(&mut self, owner: ObjectId, condition: &ConditionDocument) {
        let name = condition
            .name
            .as_deref()
            .or(condition.column.as_deref())
            .unwrap_or("");
        self.add(
            Some(owner),
            name,
            &condition.span,
            &condition.extra,
            NodeKind::Condition {
                property: condition.name.as_deref().map(Binding::pending),
                column: condition.column.as_deref().map(Binding::pending),
                value: condition.value.clone(),
                is_null: condition.is_null,
            },
        );
    }

    fn load_association_set_mapping(
        &mut self,
        ecm: ObjectId,
        set_mapping: &AssociationSetMappingDocument,
        version: u8,
    ) {
        let layer = SchemaLayer::Mapping;
        let base = "Mapping/EntityContainerMapping/AssociationSetMapping";

        let asm = self.add(
            Some(ecm),
            &set_mapping.name,
            &set_mapping.span,
            &set_mapping.extra,
            NodeKind::AssociationSetMapping {
                association_set: Binding::pending(&set_mapping.name),
                association: Binding::pending(&set_mapping.type_name),
                store_entity_set: Binding::pending(&set_mapping.store_entity_set),
                query_view: set_mapping.query_view.clone(),
            },
        );
        self.check(asm, layer, version, &format!("{}/Name", base), &set_mapping.name);
        self.check(asm, layer, version, &format!("{}/TypeName", base), &set_mapping.type_name);
        self.check(asm, layer, version, &format!("{}/StoreEntitySet", base), &set_mapping.store_entity_set);

        for end_property in &set_mapping.end_properties {
            let end_id = self.add(
                Some(asm),
                &end_property.name,
                &end_property.span,
                &end_property.extra,
                NodeKind::EndProperty {
                    end: Binding::pending(&end_property.name),
                },
            );
            let end_path = format!("{}/EndProperty", base);
            self.check(end_id, layer, version, &format!("{}/Name", end_path), &end_property.name);

            for scalar in &end_property.scalar_properties {
                self.load_scalar_property(end_id, scalar, Some(&end_path), version);
            }
        }

        for condition in &set_mapping.conditions {
            self.load_condition(asm, condition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn type_mapping_names() {
        assert_eq!(
            parse_type_mapping_names("IsTypeOf(Shop.Product); Shop.Order"),
            vec![("Shop.Product".to_string(), true), ("Shop.Order".to_string(), false)]
        );
        assert!(parse_type_mapping_names("").is_empty());
    }

    #[test]
    fn conceptual_primitives_accept_edm_prefix() {
        assert_eq!(conceptual_primitive("Edm.Int32"), Some(PrimitiveTypeKind::Int32));
        assert_eq!(conceptual_primitive("String"), Some(PrimitiveTypeKind::String));
        assert_eq!(conceptual_primitive("Shop.Address"), None);
    }

    #[test]
    fn alias_qualification() {
        let scope = SchemaScope {
            layer: SchemaLayer::Conceptual,
            space: ModelSpace::Conceptual,
            version: 3,
            namespace: "Shop".to_string(),
            alias: Some("Self".to_string()),
            enum_types: HashSet::new(),
        };
        assert_eq!(scope.qualify("Self.Color"), "Shop.Color");
        assert_eq!(scope.qualify("Other.Color"), "Other.Color");
        assert_eq!(scope.qualify("Color"), "Shop.Color");
    }
}
