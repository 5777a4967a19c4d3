//! Attribute content validation
//!
//! Checks a proposed attribute value against the simple type the schema
//! declares for that attribute, without revalidating the whole document.
//! One validator exists per schema version; the simple type of an
//! attribute is determined by its element chain alone.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use regex::Regex;

use crate::attribute_path::{make_attribute_path_from_string, AttributePath};

/// Schema namespaces of one schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaNamespaces {
    pub csdl: &'static str,
    pub ssdl: &'static str,
    pub msl: &'static str,
}

impl SchemaNamespaces {
    pub fn for_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(Self {
                csdl: "http://schemas.microsoft.com/ado/2006/04/edm",
                ssdl: "http://schemas.microsoft.com/ado/2006/04/edm/ssdl",
                msl: "urn:schemas-microsoft-com:windows:storage:mapping:CS",
            }),
            2 => Some(Self {
                csdl: "http://schemas.microsoft.com/ado/2008/09/edm",
                ssdl: "http://schemas.microsoft.com/ado/2009/02/edm/ssdl",
                msl: "http://schemas.microsoft.com/ado/2008/09/mapping/cs",
            }),
            3 => Some(Self {
                csdl: "http://schemas.microsoft.com/ado/2009/11/edm",
                ssdl: "http://schemas.microsoft.com/ado/2009/11/edm/ssdl",
                msl: "http://schemas.microsoft.com/ado/2009/11/mapping/cs",
            }),
            _ => None,
        }
    }
}

/// Schema layer an attribute path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaLayer {
    Conceptual,
    Storage,
    Mapping,
}

/// Declared simple type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    /// Undotted identifier
    Identifier,
    /// Dotted identifier (`Shop.Product`); a single identifier also qualifies
    QualifiedName,
    Boolean,
    /// `0..1`, `1` or `*`
    Multiplicity,
    /// Non-negative integer or `Max`
    MaxLength,
    UnsignedInt,
    Integer,
    /// `None`, `Identity` or `Computed`
    StoreGeneratedPattern,
    /// `None` or `Fixed`
    ConcurrencyMode,
    /// `None`, `Cascade` or `Restrict`
    Action,
}

impl SimpleType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identifier => "TSimpleIdentifier",
            Self::QualifiedName => "TQualifiedName",
            Self::Boolean => "boolean",
            Self::Multiplicity => "TMultiplicity",
            Self::MaxLength => "TMaxLengthFacet",
            Self::UnsignedInt => "unsignedInt",
            Self::Integer => "long",
            Self::StoreGeneratedPattern => "TStoreGeneratedPattern",
            Self::ConcurrencyMode => "TConcurrencyMode",
            Self::Action => "TAction",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentValidatorError {
    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid content pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// `chain/@attribute` -> simple type, per layer
type AttributeTable = HashMap<SchemaLayer, HashMap<String, SimpleType>>;

fn table_key(chain: &str, attribute: &str) -> String {
    format!("{}/@{}", chain, attribute)
}

const PROPERTY_FACETS: &[(&str, SimpleType)] = &[
    ("Name", SimpleType::Identifier),
    ("Type", SimpleType::QualifiedName),
    ("Nullable", SimpleType::Boolean),
    ("MaxLength", SimpleType::MaxLength),
    ("FixedLength", SimpleType::Boolean),
    ("Unicode", SimpleType::Boolean),
    ("Precision", SimpleType::UnsignedInt),
    ("Scale", SimpleType::UnsignedInt),
    ("ConcurrencyMode", SimpleType::ConcurrencyMode),
];

const CONCEPTUAL_V1: &[(&str, &str, SimpleType)] = &[
    ("Schema", "Namespace", SimpleType::QualifiedName),
    ("Schema", "Alias", SimpleType::Identifier),
    ("Schema/Using", "Namespace", SimpleType::QualifiedName),
    ("Schema/Using", "Alias", SimpleType::Identifier),
    ("Schema/EntityType", "Name", SimpleType::Identifier),
    ("Schema/EntityType", "BaseType", SimpleType::QualifiedName),
    ("Schema/EntityType", "Abstract", SimpleType::Boolean),
    ("Schema/EntityType/Key/PropertyRef", "Name", SimpleType::Identifier),
    ("Schema/EntityType/NavigationProperty", "Name", SimpleType::Identifier),
    ("Schema/EntityType/NavigationProperty", "Relationship", SimpleType::QualifiedName),
    ("Schema/EntityType/NavigationProperty", "FromRole", SimpleType::Identifier),
    ("Schema/EntityType/NavigationProperty", "ToRole", SimpleType::Identifier),
    ("Schema/ComplexType", "Name", SimpleType::Identifier),
    ("Schema/Association", "Name", SimpleType::Identifier),
    ("Schema/Association/End", "Role", SimpleType::Identifier),
    ("Schema/Association/End", "Type", SimpleType::QualifiedName),
    ("Schema/Association/End", "Multiplicity", SimpleType::Multiplicity),
    ("Schema/Association/End/OnDelete", "Action", SimpleType::Action),
    ("Schema/Association/ReferentialConstraint/Principal", "Role", SimpleType::Identifier),
    ("Schema/Association/ReferentialConstraint/Principal/PropertyRef", "Name", SimpleType::Identifier),
    ("Schema/Association/ReferentialConstraint/Dependent", "Role", SimpleType::Identifier),
    ("Schema/Association/ReferentialConstraint/Dependent/PropertyRef", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer/EntitySet", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer/EntitySet", "EntityType", SimpleType::QualifiedName),
    ("Schema/EntityContainer/AssociationSet", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer/AssociationSet", "Association", SimpleType::QualifiedName),
    ("Schema/EntityContainer/AssociationSet/End", "Role", SimpleType::Identifier),
    ("Schema/EntityContainer/AssociationSet/End", "EntitySet", SimpleType::Identifier),
    ("Schema/Function", "Name", SimpleType::Identifier),
    ("Schema/Function/Parameter", "Name", SimpleType::Identifier),
];

/// Store generated pattern annotations arrive with version 2
const CONCEPTUAL_V2: &[(&str, &str, SimpleType)] = &[
    ("Schema/EntityType/Property", "StoreGeneratedPattern", SimpleType::StoreGeneratedPattern),
    ("Schema/ComplexType/Property", "StoreGeneratedPattern", SimpleType::StoreGeneratedPattern),
];

/// Enum types arrive with version 3
const CONCEPTUAL_V3: &[(&str, &str, SimpleType)] = &[
    ("Schema/EnumType", "Name", SimpleType::Identifier),
    ("Schema/EnumType", "UnderlyingType", SimpleType::QualifiedName),
    ("Schema/EnumType", "IsFlags", SimpleType::Boolean),
    ("Schema/EnumType/Member", "Name", SimpleType::Identifier),
    ("Schema/EnumType/Member", "Value", SimpleType::Integer),
];

const STORAGE: &[(&str, &str, SimpleType)] = &[
    ("Schema", "Namespace", SimpleType::QualifiedName),
    ("Schema", "Alias", SimpleType::Identifier),
    ("Schema/EntityType", "Name", SimpleType::Identifier),
    ("Schema/EntityType/Key/PropertyRef", "Name", SimpleType::Identifier),
    ("Schema/EntityType/Property", "StoreGeneratedPattern", SimpleType::StoreGeneratedPattern),
    ("Schema/Association", "Name", SimpleType::Identifier),
    ("Schema/Association/End", "Role", SimpleType::Identifier),
    ("Schema/Association/End", "Type", SimpleType::QualifiedName),
    ("Schema/Association/End", "Multiplicity", SimpleType::Multiplicity),
    ("Schema/Association/End/OnDelete", "Action", SimpleType::Action),
    ("Schema/Association/ReferentialConstraint/Principal", "Role", SimpleType::Identifier),
    ("Schema/Association/ReferentialConstraint/Principal/PropertyRef", "Name", SimpleType::Identifier),
    ("Schema/Association/ReferentialConstraint/Dependent", "Role", SimpleType::Identifier),
    ("Schema/Association/ReferentialConstraint/Dependent/PropertyRef", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer/EntitySet", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer/EntitySet", "EntityType", SimpleType::QualifiedName),
    ("Schema/EntityContainer/AssociationSet", "Name", SimpleType::Identifier),
    ("Schema/EntityContainer/AssociationSet", "Association", SimpleType::QualifiedName),
    ("Schema/EntityContainer/AssociationSet/End", "Role", SimpleType::Identifier),
    ("Schema/EntityContainer/AssociationSet/End", "EntitySet", SimpleType::Identifier),
    ("Schema/Function", "Name", SimpleType::Identifier),
    ("Schema/Function/Parameter", "Name", SimpleType::Identifier),
];

const MAPPING: &[(&str, &str, SimpleType)] = &[
    ("Mapping/EntityContainerMapping", "StorageEntityContainer", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping", "CdmEntityContainer", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/EntitySetMapping", "Name", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/EntitySetMapping/EntityTypeMapping/MappingFragment", "StoreEntitySet", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/EntitySetMapping/EntityTypeMapping/MappingFragment/ScalarProperty", "Name", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/EntitySetMapping/EntityTypeMapping/MappingFragment/ScalarProperty", "ColumnName", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/EntitySetMapping/EntityTypeMapping/MappingFragment/Condition", "IsNull", SimpleType::Boolean),
    ("Mapping/EntityContainerMapping/AssociationSetMapping", "Name", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/AssociationSetMapping", "TypeName", SimpleType::QualifiedName),
    ("Mapping/EntityContainerMapping/AssociationSetMapping", "StoreEntitySet", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/AssociationSetMapping/EndProperty", "Name", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/AssociationSetMapping/EndProperty/ScalarProperty", "Name", SimpleType::Identifier),
    ("Mapping/EntityContainerMapping/AssociationSetMapping/EndProperty/ScalarProperty", "ColumnName", SimpleType::Identifier),
];

fn build_table(version: u8) -> AttributeTable {
    let mut table = AttributeTable::new();

    let mut insert = |layer: SchemaLayer, rows: &[(&'static str, &'static str, SimpleType)]| {
        for (chain, attribute, simple_type) in rows {
            table
                .entry(layer)
                .or_default()
                .insert(table_key(chain, attribute), *simple_type);
        }
    };

    insert(SchemaLayer::Conceptual, CONCEPTUAL_V1);
    if version >= 2 {
        insert(SchemaLayer::Conceptual, CONCEPTUAL_V2);
    }
    if version >= 3 {
        insert(SchemaLayer::Conceptual, CONCEPTUAL_V3);
    }
    insert(SchemaLayer::Storage, STORAGE);
    insert(SchemaLayer::Mapping, MAPPING);

    let facets = [
        (SchemaLayer::Conceptual, "Schema/EntityType/Property"),
        (SchemaLayer::Conceptual, "Schema/ComplexType/Property"),
        (SchemaLayer::Storage, "Schema/EntityType/Property"),
    ];
    for (layer, chain) in facets {
        let rows = table.entry(layer).or_default();
        for (attribute, simple_type) in PROPERTY_FACETS {
            rows.insert(table_key(chain, attribute), *simple_type);
        }
    }

    table
}

/// Validates attribute values for one schema version
#[derive(Debug, Clone)]
pub struct AttributeContentValidator {
    version: u8,
    namespaces: SchemaNamespaces,
    table: AttributeTable,
    identifier: Regex,
    qualified_name: Regex,
}

impl AttributeContentValidator {
    pub fn new(version: u8) -> Result<Self, ContentValidatorError> {
        let namespaces =
            SchemaNamespaces::for_version(version).ok_or(ContentValidatorError::UnsupportedVersion(version))?;

        let identifier = r"[\p{L}\p{Nl}][\p{L}\p{Nl}\p{Nd}\p{Mn}\p{Mc}\p{Pc}\p{Cf}]*";
        Ok(Self {
            version,
            namespaces,
            table: build_table(version),
            identifier: Regex::new(&format!("^{}$", identifier))?,
            qualified_name: Regex::new(&format!(r"^{0}(\.{0})*$", identifier))?,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn namespaces(&self) -> SchemaNamespaces {
        self.namespaces
    }

    /// Path of an attribute in `layer`, e.g. `Schema/EntityType/Name`
    pub fn path(&self, layer: SchemaLayer, path: &str) -> AttributePath {
        make_attribute_path_from_string(self.namespace_of(layer), path)
    }

    fn namespace_of(&self, layer: SchemaLayer) -> &'static str {
        match layer {
            SchemaLayer::Conceptual => self.namespaces.csdl,
            SchemaLayer::Storage => self.namespaces.ssdl,
            SchemaLayer::Mapping => self.namespaces.msl,
        }
    }

    /// Simple type declared for the attribute at `path`
    pub fn type_for_path(&self, path: &AttributePath) -> Option<SimpleType> {
        let mut nodes = path.iter();
        let root = nodes.next()?;
        if !root.is_element() {
            return None;
        }

        let layer = [SchemaLayer::Conceptual, SchemaLayer::Storage, SchemaLayer::Mapping]
            .into_iter()
            .find(|layer| self.namespace_of(*layer) == root.qname.namespace)?;

        let attribute = path.attribute()?;
        let chain = path.element_chain();
        self.table
            .get(&layer)?
            .get(&table_key(&chain, &attribute.qname.name))
            .copied()
    }

    /// Whether `proposed` is valid for the attribute at `path`
    ///
    /// Attributes the schema version does not declare are never valid.
    pub fn is_valid_attribute_value(&self, proposed: &str, path: &AttributePath) -> bool {
        match self.type_for_path(path) {
            Some(simple_type) => self.is_valid_for_type(proposed, simple_type),
            None => false,
        }
    }

    pub fn is_valid_for_type(&self, proposed: &str, simple_type: SimpleType) -> bool {
        match simple_type {
            SimpleType::Identifier => self.identifier.is_match(proposed),
            SimpleType::QualifiedName => self.qualified_name.is_match(proposed),
            SimpleType::Boolean => matches!(proposed, "true" | "false" | "1" | "0"),
            SimpleType::Multiplicity => matches!(proposed, "0..1" | "1" | "*"),
            SimpleType::MaxLength => proposed == "Max" || proposed.parse::<u32>().is_ok(),
            SimpleType::UnsignedInt => proposed.parse::<u32>().is_ok(),
            SimpleType::Integer => proposed.parse::<i64>().is_ok(),
            SimpleType::StoreGeneratedPattern => matches!(proposed, "None" | "Identity" | "Computed"),
            SimpleType::ConcurrencyMode => matches!(proposed, "None" | "Fixed"),
            SimpleType::Action => matches!(proposed, "None" | "Cascade" | "Restrict"),
        }
    }
}

/// Content validators keyed by schema version, built on first use
///
/// Owned by whoever drives validation; nothing here is process-wide.
#[derive(Debug, Default)]
pub struct ContentValidatorRegistry {
    validators: HashMap<u8, AttributeContentValidator>,
}

impl ContentValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator_for(&mut self, version: u8) -> Result<&AttributeContentValidator, ContentValidatorError> {
        match self.validators.entry(version) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                tracing::debug!(version, "Building attribute content validator");
                Ok(entry.insert(AttributeContentValidator::new(version)?))
            }
        }
    }

    /// Number of validators built so far
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
