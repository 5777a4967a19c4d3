//! Error code registries
//!
//! IMPORTANT: Codes are versioned and stable.
//! NEVER renumber or remove codes - stored reports and suppression
//! lists refer to them. Add new codes with new numbers only.
//!
//! Two families share the numeric space:
//! - designer codes (10000+) raised by the loader and the model validator
//! - runtime codes raised while compiling the schema layers
//!   (schema object model 0-999, mapping 2000-2999, view generation 3000-3999)

use serde::{Deserialize, Serialize};

/// Defines a numeric code enum with a stable name table
macro_rules! numeric_codes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),*
        }

        impl $name {
            /// Every code of this registry, in numeric order
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),* ];

            /// Numeric value of the code
            pub fn code(self) -> i32 {
                self as i32
            }

            /// Symbolic name of the code
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => stringify!($variant) ),*
                }
            }

            /// Look a code up by its numeric value
            pub fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $( $value => Some($name::$variant), )*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} ({})", self.name(), self.code())
            }
        }
    };
}

/// Designer code registry (v1)
///
/// These codes are STABLE and VERSIONED.
///
/// The numbers (10001-10006 for artifact checks, 10101-10104 for parse and
/// resolve and 11001-11014 for the model validator) are edmcheck's own
/// assignments. They do not reproduce the Entity Framework designer's error
/// values, so reports that need to match designer output should compare by
/// name rather than number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DesignerCode {
    // Artifact validation (100xx)
    /// The conceptual model is missing from the artifact
    ErrorValidatingArtifactConceptualModelMissing,

    /// The storage model is missing from the artifact
    ErrorValidatingArtifactStorageModelMissing,

    /// The mapping is missing from the artifact
    ErrorValidatingArtifactMappingModelMissing,

    /// Conceptual model version is newer than the target runtime supports
    ErrorValidatingArtifactInvalidCsdlNamespaceForTargetFrameworkVersion,

    /// Storage model version is newer than the target runtime supports
    ErrorValidatingArtifactInvalidSsdlNamespaceForTargetFrameworkVersion,

    /// Mapping version is newer than the target runtime supports
    ErrorValidatingArtifactInvalidMslNamespaceForTargetFrameworkVersion,

    // Parse and resolve (101xx)
    /// Document content the designer cannot represent
    ModelParseGhostNodeNotSupportedByDesigner,

    /// Attribute value does not satisfy its declared simple type
    ModelParseInvalidAttributeValue,

    /// A named reference does not resolve to any object
    UnresolvedReference,

    /// A type reference is not namespace-qualified
    NonQualifiedElement,

    // Escher validator (110xx)
    /// Entity type inheritance chain contains a cycle
    EscherValidatorCircularInheritance,

    /// Complex type contains itself through its properties
    EscherValidatorCircularComplexTypeDefinition,

    /// Entity type is not referenced by any entity set
    EscherValidatorEntityTypeWithoutEntitySet,

    /// Entity type is referenced by more than one entity set
    EscherValidatorMultipeEntitySetsPerType,

    /// Association is not referenced by any association set
    EscherValidatorAssociationWithoutAssociationSet,

    /// Conceptual model declares a Using directive
    EscherValidatorIncludesUsing,

    /// Concrete entity type has no entity type mapping
    EscherValidatorUnmappedEntityType,

    /// Property of a mapped entity type is not mapped
    EscherValidatorUnmappedProperty,

    /// Association has no association set mapping
    EscherValidatorUnmappedAssociation,

    /// Association set end has no end property mapping
    EscherValidatorUnmappedAssociationEnd,

    /// Key property of an association end is not mapped
    EscherValidatorUnmappedAssociationEndKey,

    /// Mapping condition placed on a key column or property
    EscherValidatorConditionOnPrimaryKey,

    /// Enum property with a store generated pattern
    EscherValidatorEnumPropertyWithStoregeneratedpattern,

    /// Complex property whose type is not defined
    EscherValidatorUndefinedComplexPropertyType,
}

impl DesignerCode {
    /// Every designer code, in numeric order
    pub const ALL: [DesignerCode; 24] = [
        Self::ErrorValidatingArtifactConceptualModelMissing,
        Self::ErrorValidatingArtifactStorageModelMissing,
        Self::ErrorValidatingArtifactMappingModelMissing,
        Self::ErrorValidatingArtifactInvalidCsdlNamespaceForTargetFrameworkVersion,
        Self::ErrorValidatingArtifactInvalidSsdlNamespaceForTargetFrameworkVersion,
        Self::ErrorValidatingArtifactInvalidMslNamespaceForTargetFrameworkVersion,
        Self::ModelParseGhostNodeNotSupportedByDesigner,
        Self::ModelParseInvalidAttributeValue,
        Self::UnresolvedReference,
        Self::NonQualifiedElement,
        Self::EscherValidatorCircularInheritance,
        Self::EscherValidatorCircularComplexTypeDefinition,
        Self::EscherValidatorEntityTypeWithoutEntitySet,
        Self::EscherValidatorMultipeEntitySetsPerType,
        Self::EscherValidatorAssociationWithoutAssociationSet,
        Self::EscherValidatorIncludesUsing,
        Self::EscherValidatorUnmappedEntityType,
        Self::EscherValidatorUnmappedProperty,
        Self::EscherValidatorUnmappedAssociation,
        Self::EscherValidatorUnmappedAssociationEnd,
        Self::EscherValidatorUnmappedAssociationEndKey,
        Self::EscherValidatorConditionOnPrimaryKey,
        Self::EscherValidatorEnumPropertyWithStoregeneratedpattern,
        Self::EscherValidatorUndefinedComplexPropertyType,
    ];

    /// Get the code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorValidatingArtifactConceptualModelMissing => {
                "ERROR_VALIDATING_ARTIFACT_CONCEPTUAL_MODEL_MISSING"
            }
            Self::ErrorValidatingArtifactStorageModelMissing => {
                "ERROR_VALIDATING_ARTIFACT_STORAGE_MODEL_MISSING"
            }
            Self::ErrorValidatingArtifactMappingModelMissing => {
                "ERROR_VALIDATING_ARTIFACT_MAPPING_MODEL_MISSING"
            }
            Self::ErrorValidatingArtifactInvalidCsdlNamespaceForTargetFrameworkVersion => {
                "ERROR_VALIDATING_ARTIFACT_INVALID_CSDL_NAMESPACE_FOR_TARGET_FRAMEWORK_VERSION"
            }
            Self::ErrorValidatingArtifactInvalidSsdlNamespaceForTargetFrameworkVersion => {
                "ERROR_VALIDATING_ARTIFACT_INVALID_SSDL_NAMESPACE_FOR_TARGET_FRAMEWORK_VERSION"
            }
            Self::ErrorValidatingArtifactInvalidMslNamespaceForTargetFrameworkVersion => {
                "ERROR_VALIDATING_ARTIFACT_INVALID_MSL_NAMESPACE_FOR_TARGET_FRAMEWORK_VERSION"
            }
            Self::ModelParseGhostNodeNotSupportedByDesigner => {
                "MODEL_PARSE_GHOST_NODE_NOT_SUPPORTED_BY_DESIGNER"
            }
            Self::ModelParseInvalidAttributeValue => "MODEL_PARSE_INVALID_ATTRIBUTE_VALUE",
            Self::UnresolvedReference => "UNRESOLVED_REFERENCE",
            Self::NonQualifiedElement => "NON_QUALIFIED_ELEMENT",
            Self::EscherValidatorCircularInheritance => "ESCHER_VALIDATOR_CIRCULAR_INHERITANCE",
            Self::EscherValidatorCircularComplexTypeDefinition => {
                "ESCHER_VALIDATOR_CIRCULAR_COMPLEX_TYPE_DEFINITION"
            }
            Self::EscherValidatorEntityTypeWithoutEntitySet => {
                "ESCHER_VALIDATOR_ENTITY_TYPE_WITHOUT_ENTITY_SET"
            }
            Self::EscherValidatorMultipeEntitySetsPerType => {
                "ESCHER_VALIDATOR_MULTIPE_ENTITY_SETS_PER_TYPE"
            }
            Self::EscherValidatorAssociationWithoutAssociationSet => {
                "ESCHER_VALIDATOR_ASSOCIATION_WITHOUT_ASSOCIATION_SET"
            }
            Self::EscherValidatorIncludesUsing => "ESCHER_VALIDATOR_INCLUDES_USING",
            Self::EscherValidatorUnmappedEntityType => "ESCHER_VALIDATOR_UNMAPPED_ENTITY_TYPE",
            Self::EscherValidatorUnmappedProperty => "ESCHER_VALIDATOR_UNMAPPED_PROPERTY",
            Self::EscherValidatorUnmappedAssociation => "ESCHER_VALIDATOR_UNMAPPED_ASSOCIATION",
            Self::EscherValidatorUnmappedAssociationEnd => {
                "ESCHER_VALIDATOR_UNMAPPED_ASSOCIATION_END"
            }
            Self::EscherValidatorUnmappedAssociationEndKey => {
                "ESCHER_VALIDATOR_UNMAPPED_ASSOCIATION_END_KEY"
            }
            Self::EscherValidatorConditionOnPrimaryKey => "ESCHER_VALIDATOR_CONDITION_ON_PRIMARY_KEY",
            Self::EscherValidatorEnumPropertyWithStoregeneratedpattern => {
                "ESCHER_VALIDATOR_ENUM_PROPERTY_WITH_STOREGENERATEDPATTERN"
            }
            Self::EscherValidatorUndefinedComplexPropertyType => {
                "ESCHER_VALIDATOR_UNDEFINED_COMPLEX_PROPERTY_TYPE"
            }
        }
    }

    /// Numeric value of the code
    pub fn code(&self) -> i32 {
        match self {
            Self::ErrorValidatingArtifactConceptualModelMissing => 10001,
            Self::ErrorValidatingArtifactStorageModelMissing => 10002,
            Self::ErrorValidatingArtifactMappingModelMissing => 10003,
            Self::ErrorValidatingArtifactInvalidCsdlNamespaceForTargetFrameworkVersion => 10004,
            Self::ErrorValidatingArtifactInvalidSsdlNamespaceForTargetFrameworkVersion => 10005,
            Self::ErrorValidatingArtifactInvalidMslNamespaceForTargetFrameworkVersion => 10006,
            Self::ModelParseGhostNodeNotSupportedByDesigner => 10101,
            Self::ModelParseInvalidAttributeValue => 10102,
            Self::UnresolvedReference => 10103,
            Self::NonQualifiedElement => 10104,
            Self::EscherValidatorCircularInheritance => 11001,
            Self::EscherValidatorCircularComplexTypeDefinition => 11002,
            Self::EscherValidatorEntityTypeWithoutEntitySet => 11003,
            Self::EscherValidatorMultipeEntitySetsPerType => 11004,
            Self::EscherValidatorAssociationWithoutAssociationSet => 11005,
            Self::EscherValidatorIncludesUsing => 11006,
            Self::EscherValidatorUnmappedEntityType => 11007,
            Self::EscherValidatorUnmappedProperty => 11008,
            Self::EscherValidatorUnmappedAssociation => 11009,
            Self::EscherValidatorUnmappedAssociationEnd => 11010,
            Self::EscherValidatorUnmappedAssociationEndKey => 11011,
            Self::EscherValidatorConditionOnPrimaryKey => 11012,
            Self::EscherValidatorEnumPropertyWithStoregeneratedpattern => 11013,
            Self::EscherValidatorUndefinedComplexPropertyType => 11014,
        }
    }

    /// Look a designer code up by its numeric value
    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.code() == value)
    }

    /// Look a designer code up by its stable string identifier
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_str() == name)
    }
}

impl std::fmt::Display for DesignerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

numeric_codes! {
    /// Codes raised while compiling a conceptual or storage schema
    pub enum SchemaErrorCode {
        InvalidErrorCodeValue = 0,
        SecurityError = 2,
        IOException = 4,
        XmlError = 5,
        TooManyErrors = 6,
        MalformedXml = 7,
        UnexpectedXmlNodeType = 8,
        UnexpectedXmlAttribute = 9,
        UnexpectedXmlElement = 10,
        TextNotAllowed = 11,
        EmptyFile = 12,
        XsdError = 13,
        InvalidAlias = 14,
        IntegerExpected = 16,
        InvalidName = 17,
        AlreadyDefined = 18,
        ElementNotInSchema = 19,
        InvalidBaseType = 21,
        InvalidVersionNumber = 22,
        InvalidSize = 23,
        InvalidBoolean = 24,
        BadType = 26,
        InvalidVersioningClass = 29,
        InvalidVersionIntroduced = 30,
        BadNamespace = 31,
        UnresolvedReferenceSchema = 35,
        NotUnnestedType = 38,
        BadProperty = 39,
        /// A type name is not defined in any namespace in scope
        NotInNamespace = 40,
        UndefinedProperty = 41,
        InvalidPropertyType = 42,
        InvalidAsNestedType = 43,
        InvalidChangeUnit = 44,
        UnauthorizedAccessException = 45,
        PrecisionOutOfRange = 48,
        ScaleOutOfRange = 49,
        DefaultNotAllowed = 50,
        InvalidDefault = 51,
        RequiredFacetMissing = 52,
        BadImageFormatException = 53,
        MissingSchemaXml = 54,
        BadPrecisionAndScale = 55,
        InvalidChangeUnitUsage = 56,
        NameTooLong = 57,
        CircularlyDefinedType = 58,
        InvalidAssociation = 59,
        FacetNotAllowedByType = 60,
        ConstantFacetSpecifiedInSchema = 61,
        CycleInTypeHierarchy = 62,
        BadNavigationProperty = 74,
        InvalidKey = 75,
        InvalidMultiplicity = 92,
        InvalidAction = 96,
        InvalidOperation = 97,
        InvalidContainerTypeForEnd = 99,
        InvalidEndEntitySet = 100,
        AmbiguousEntityContainerEnd = 101,
        MissingExtentEntityContainerEnd = 102,
        BadParameterDirection = 106,
        FailedInference = 107,
        InvalidFacetInProviderManifest = 109,
        InvalidRoleInRelationshipConstraint = 110,
        InvalidPropertyInRelationshipConstraint = 111,
        TypeMismatchRelationshipConstraint = 112,
        InvalidMultiplicityInRoleInRelationshipConstraint = 113,
        MismatchNumberOfPropertiesInRelationshipConstraint = 114,
        MissingPropertyInRelationshipConstraint = 115,
        MissingConstraintOnRelationshipType = 116,
        SameRoleReferredInReferentialConstraint = 119,
        InvalidValueForParameterTypeSemantics = 120,
        InvalidRelationshipEndType = 121,
        InvalidPrimitiveTypeKind = 122,
        InvalidDateTimeKind = 124,
        InvalidTypeConversionDestinationType = 125,
        ByteValueExpected = 126,
        FunctionWithNonScalarTypeNotSupported = 127,
        PrecisionMoreThanAllowedMax = 128,
        EntityKeyMustBeScalar = 129,
        BinaryEntityKeyCurrentlyNotSupported = 130,
        NoPreferredMappingForPrimitiveTypeKind = 131,
        TooManyPreferredMappingsForPrimitiveTypeKind = 132,
        EndWithManyMultiplicityCannotHaveOperationsSpecified = 133,
        EntitySetTypeHasNoKeys = 134,
        InvalidNumberOfParametersForAggregateFunction = 135,
        InvalidParameterTypeForAggregateFunction = 136,
        ComposableFunctionWithoutReturnType = 137,
        NonComposableFunctionWithReturnType = 138,
        NonComposableFunctionAttributesNotValid = 139,
        ComposableFunctionWithCommandText = 140,
        FunctionDeclaresCommandTextAndStoreFunctionName = 141,
        SystemNamespace = 142,
        EmptyDefiningQuery = 143,
        TableAndSchemaAreMutuallyExclusiveWithDefiningQuery = 144,
        ConcurrencyRedefinedOnSubTypeOfEntitySetType = 145,
        FunctionImportUnsupportedReturnType = 146,
        FunctionImportUnknownEntitySet = 147,
        FunctionImportReturnsEntitiesButDoesNotSpecifyEntitySet = 148,
        FunctionImportEntityTypeDoesNotMatchEntitySet = 149,
        FunctionImportSpecifiesEntitySetButDoesNotReturnEntityType = 150,
        ProviderManifestExplicitPromotionToSelf = 151,
        InternalError = 152,
        SimilarRelationshipEnd = 153,
        DuplicatePropertySpecifiedInEntityKey = 154,
        AmbiguousFunctionReturnType = 156,
        NullableComplexType = 157,
        NonComplexCollections = 158,
        KeyMissingOnEntityType = 159,
        InvalidNamespaceInUsing = 160,
        NeedNotUseSystemNamespaceInUsing = 161,
        CannotUseSystemNamespaceAsAlias = 162,
        InvalidNamespaceName = 163,
        InvalidEntityContainerNameInExtends = 164,
        InvalidNamespaceOrAliasSpecified = 166,
        EntityContainerCannotExtendItself = 167,
        FailedToRetrieveProviderManifest = 168,
        ProviderManifestTokenMismatch = 169,
        ProviderManifestTokenNotFound = 170,
        EmptyCommandText = 171,
        InconsistentProviderManifestToken = 172,
        DuplicatedFunctionoverloads = 173,
        InvalidProvider = 174,
        FunctionWithNonEdmTypeNotSupported = 175,
        ComplexTypeAsReturnTypeAndDefinedEntitySet = 176,
        ComplexTypeAsReturnTypeAndNestedComplexProperty = 177,
        FacetOnNonScalarType = 179,
        IncorrectlyPlacedFacet = 180,
        ReturnTypeNotDeclared = 181,
        TypeNotDeclared = 182,
        RowTypeWithoutProperty = 183,
        ReturnTypeDeclaredAsAttributeAndElement = 184,
        TypeDeclaredAsAttributeAndElement = 185,
        ReferenceToNonEntityType = 186,
        IncompatibleSchemaVersion = 189,
        NoCodeGenNamespaceInStructuralAnnotation = 190,
        AmbiguousFunctionAndType = 191,
        CannotLoadDifferentVersionOfSchemaInTheSameItemCollection = 192,
        BoolValueExpected = 193,
        EndWithoutMultiplicity = 194,
        TVFReturnTypeRowHasNonScalarProperty = 195,
        FunctionWithDefiningExpressionAndEntitySetNotAllowed = 197,
        FunctionEntityTypeScopeDoesNotMatchReturnType = 198,
        InvalidEnumUnderlyingType = 199,
        DuplicateEnumMember = 200,
        CalculatedEnumValueOutOfRange = 201,
        EnumMemberValueOutOfItsUnderylingTypeRange = 202,
    }
}

numeric_codes! {
    /// Codes raised while compiling the mapping
    pub enum MappingErrorCode {
        InvalidContent = 2001,
        InvalidEntityContainer = 2002,
        InvalidEntitySet = 2003,
        InvalidEntityType = 2004,
        /// Association set mapping is not valid; also raised for mapped FK associations
        InvalidAssociationSet = 2005,
        InvalidAssociationType = 2006,
        InvalidTable = 2007,
        InvalidComplexType = 2008,
        InvalidEdmMember = 2009,
        InvalidStorageMember = 2010,
        TableMappingFragmentExpected = 2011,
        SetMappingExpected = 2012,
        DuplicateCondition = 2013,
        DuplicateSetMapping = 2014,
        DuplicateTypeMapping = 2015,
        ConditionError = 2016,
        RootMappingElementMissing = 2018,
        IncompatibleMemberMapping = 2019,
        InvalidEnumValue = 2023,
        XmlSchemaParsingError = 2024,
        XmlSchemaValidationError = 2025,
        AmbiguousModificationFunctionMappingForAssociationSet = 2026,
        MissingSetClosureInModificationFunctionMapping = 2027,
        MissingModificationFunctionMappingForEntityType = 2028,
        InvalidTableNameAttributeWithModificationFunctionMapping = 2029,
        InvalidModificationFunctionMappingForMultipleTypes = 2030,
        AmbiguousResultBindingInModificationFunctionMapping = 2031,
        InvalidAssociationSetRoleInModificationFunctionMapping = 2032,
        InvalidAssociationSetCardinalityInModificationFunctionMapping = 2033,
        RedundantEntityTypeMappingInModificationFunctionMapping = 2034,
        MissingVersionInModificationFunctionMapping = 2035,
        InvalidVersionInModificationFunctionMapping = 2036,
        InvalidParameterInModificationFunctionMapping = 2037,
        ParameterBoundTwiceInModificationFunctionMapping = 2038,
        CSpaceMemberMappedToMultipleSSpaceMemberWithDifferentTypes = 2039,
        NoEquivalentStorePrimitiveTypeFound = 2040,
        NoEquivalentStorePrimitiveTypeWithFacetsFound = 2041,
        InvalidModificationFunctionMappingPropertyParameterTypeMismatch = 2042,
        InvalidModificationFunctionMappingMultipleEndsOfAssociationMapped = 2043,
        InvalidModificationFunctionMappingUnknownFunction = 2044,
        InvalidModificationFunctionMappingAmbiguousFunction = 2045,
        InvalidModificationFunctionMappingNotValidFunction = 2046,
        InvalidModificationFunctionMappingNotValidFunctionParameter = 2047,
        InvalidModificationFunctionMappingAssociationSetNotMappedForOperation = 2048,
        InvalidModificationFunctionMappingAssociationEndMappingInvalidForEntityType = 2049,
        MappingFunctionImportStoreFunctionDoesNotExist = 2050,
        MappingFunctionImportStoreFunctionAmbiguous = 2051,
        MappingFunctionImportFunctionImportDoesNotExist = 2052,
        MappingFunctionImportFunctionImportMappedMultipleTimes = 2053,
        MappingFunctionImportTargetFunctionMustBeNonComposable = 2054,
        MappingFunctionImportTargetParameterHasNoCorrespondingImportParameter = 2055,
        MappingFunctionImportImportParameterHasNoCorrespondingTargetParameter = 2056,
        MappingFunctionImportIncompatibleParameterMode = 2057,
        MappingFunctionImportIncompatibleParameterType = 2058,
        MappingFunctionImportRowsAffectedParameterDoesNotExist = 2059,
        MappingFunctionImportRowsAffectedParameterHasWrongType = 2060,
        MappingFunctionImportRowsAffectedParameterHasWrongMode = 2061,
        /// No mapping specified for the instances of an entity set or association set
        NotSpecifiedInstanceForEntitySetOrAssociationSet = 2062,
        EmptyContainerMapping = 2063,
        TableNameAttributeWithQueryView = 2064,
        EmptyQueryView = 2065,
        PropertyMapsWithQueryView = 2066,
        MissingSetClosureInQueryViews = 2067,
        InvalidQueryView = 2068,
        InvalidQueryViewResultType = 2069,
        ItemWithSameNameExistsBothInCSpaceAndSSpace = 2070,
        MappingUnsupportedExpressionKindQueryView = 2071,
        MappingUnsupportedScanTargetQueryView = 2072,
        MappingUnsupportedPropertyKindQueryView = 2073,
        MappingUnsupportedInitializationQueryView = 2074,
        MappingFunctionImportEntityTypeMappingForFunctionNotReturningEntitySet = 2075,
        MappingFunctionImportAmbiguousTypeConditions = 2076,
        MappingOfAbstractType = 2078,
        StorageEntityContainerNameMismatchWhileSpecifyingPartialMapping = 2079,
        TypeNameForFirstQueryView = 2080,
        NoTypeNameForTypeSpecificQueryView = 2081,
        QueryViewExistsForEntitySetAndType = 2082,
        TypeNameContainsMultipleTypesForQueryView = 2083,
        IsTypeOfQueryViewForBaseType = 2084,
        InvalidTypeInScalarProperty = 2085,
        AlreadyMappedStorageEntityContainer = 2086,
        UnsupportedQueryViewInEntityContainerMapping = 2087,
        MappingAllQueryViewAtCompileTime = 2088,
        MappingNoViewsCanBeGenerated = 2089,
        MappingStoreProviderReturnsNullEdmType = 2090,
        EmptySetMapping = 2091,
        DuplicateMemberMapping = 2092,
        MappingFunctionImportUnexpectedEntityTypeMapping = 2093,
        MappingFunctionImportUnexpectedComplexTypeMapping = 2094,
        DistinctFragmentInReadWriteContainer = 2096,
        EntitySetMismatchOnAssociationSetEnd = 2097,
        InvalidModificationFunctionMappingAssociationEndForeignKey = 2098,
        CannotLoadDifferentVersionOfSchemaInTheSameItemCollection = 2100,
        MappingDifferentMappingEdmStoreVersion = 2101,
        MappingDifferentEdmStoreVersion = 2102,
        UnmappedFunctionImport = 2103,
        MappingFunctionImportReturnTypePropertyNotMapped = 2104,
        InvalidType = 2106,
        MappingFunctionImportTVFExpected = 2108,
        MappingFunctionImportScalarMappingTypeMismatch = 2109,
        MappingFunctionImportScalarMappingToMulticolumnTVF = 2110,
        MappingFunctionImportTargetFunctionMustBeComposable = 2111,
        UnsupportedFunctionCallInQueryView = 2112,
        FunctionResultMappingCountMismatch = 2113,
    }
}

numeric_codes! {
    /// Codes raised while generating query and update views
    pub enum ViewGenErrorCode {
        InvalidCondition = 3001,
        KeyConstraintViolation = 3002,
        KeyConstraintUpdateViolation = 3003,
        AttributesUnrecoverable = 3004,
        AmbiguousMultiConstants = 3005,
        NonKeyProjectedWithOverlappingPartitions = 3007,
        ConcurrencyDerivedClass = 3008,
        ConcurrencyTokenHasCondition = 3009,
        DomainConstraintViolation = 3012,
        ForeignKeyMissingTableMapping = 3013,
        ForeignKeyNotGuaranteedInCSpace = 3014,
        ForeignKeyMissingRelationshipMapping = 3015,
        DisjointConstraintViolation = 3020,
        DuplicateCPropertiesMapped = 3021,
        NotNullNoProjectedSlot = 3022,
        NoDefaultValue = 3023,
        KeyNotMappedForCSideExtent = 3024,
        KeyNotMappedForTable = 3025,
        PartitionConstraintViolation = 3026,
        MissingExtentMapping = 3027,
        ImpossibleCondition = 3031,
        NullableMappingForNonNullableColumn = 3032,
    }
}

/// Symbolic name of any known code, designer or runtime
pub fn code_name(code: i32) -> Option<&'static str> {
    if let Some(designer) = DesignerCode::from_i32(code) {
        return Some(designer.as_str());
    }

    SchemaErrorCode::from_i32(code)
        .map(SchemaErrorCode::name)
        .or_else(|| MappingErrorCode::from_i32(code).map(MappingErrorCode::name))
        .or_else(|| ViewGenErrorCode::from_i32(code).map(ViewGenErrorCode::name))
}

/// Resolve a code given either as a number or as a symbolic name
pub fn parse_code(text: &str) -> Option<i32> {
    if let Ok(number) = text.trim().parse::<i32>() {
        return Some(number);
    }

    let text = text.trim();
    DesignerCode::from_name(text)
        .map(|code| code.code())
        .or_else(|| {
            SchemaErrorCode::ALL
                .iter()
                .find(|code| code.name() == text)
                .map(|code| code.code())
        })
        .or_else(|| {
            MappingErrorCode::ALL
                .iter()
                .find(|code| code.name() == text)
                .map(|code| code.code())
        })
        .or_else(|| {
            ViewGenErrorCode::ALL
                .iter()
                .find(|code| code.name() == text)
                .map(|code| code.code())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn designer_code_stability() {
        assert_eq!(
            DesignerCode::EscherValidatorEntityTypeWithoutEntitySet.as_str(),
            "ESCHER_VALIDATOR_ENTITY_TYPE_WITHOUT_ENTITY_SET"
        );
        assert_eq!(DesignerCode::EscherValidatorCircularInheritance.code(), 11001);
        assert_eq!(DesignerCode::NonQualifiedElement.to_string(), "NON_QUALIFIED_ELEMENT");
    }

    #[test]
    fn designer_codes_are_unique() {
        let numbers: HashSet<i32> = DesignerCode::ALL.iter().map(|c| c.code()).collect();
        let names: HashSet<&str> = DesignerCode::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(numbers.len(), DesignerCode::ALL.len());
        assert_eq!(names.len(), DesignerCode::ALL.len());
    }

    #[test]
    fn designer_codes_stay_in_their_own_ranges() {
        let ranges = [10001..=10006, 10101..=10104, 11001..=11014];
        for code in DesignerCode::ALL {
            assert!(ranges.iter().any(|r| r.contains(&code.code())), "{code} is outside the designer ranges");
            assert!(SchemaErrorCode::from_i32(code.code()).is_none());
            assert!(MappingErrorCode::from_i32(code.code()).is_none());
            assert!(ViewGenErrorCode::from_i32(code.code()).is_none());
        }
        assert_eq!(DesignerCode::ALL.len(), 24);
    }

    #[test]
    fn serde_uses_stable_names() {
        let json = serde_json::to_string(&DesignerCode::EscherValidatorIncludesUsing).unwrap();
        assert_eq!(json, "\"ESCHER_VALIDATOR_INCLUDES_USING\"");
    }

    #[test]
    fn pinned_runtime_codes() {
        assert_eq!(SchemaErrorCode::NotInNamespace.code(), 40);
        assert_eq!(MappingErrorCode::InvalidAssociationSet.code(), 2005);
        assert_eq!(MappingErrorCode::NotSpecifiedInstanceForEntitySetOrAssociationSet.code(), 2062);
        assert_eq!(SchemaErrorCode::from_i32(40), Some(SchemaErrorCode::NotInNamespace));
        assert_eq!(MappingErrorCode::from_i32(1), None);
    }

    #[test]
    fn code_name_spans_registries() {
        assert_eq!(code_name(5), Some("XmlError"));
        assert_eq!(code_name(2016), Some("ConditionError"));
        assert_eq!(code_name(3027), Some("MissingExtentMapping"));
        assert_eq!(code_name(11003), Some("ESCHER_VALIDATOR_ENTITY_TYPE_WITHOUT_ENTITY_SET"));
        assert_eq!(code_name(-1), None);
    }

    #[test]
    fn parse_code_accepts_numbers_and_names() {
        assert_eq!(parse_code("2005"), Some(2005));
        assert_eq!(parse_code("NotInNamespace"), Some(40));
        assert_eq!(parse_code("ESCHER_VALIDATOR_UNMAPPED_PROPERTY"), Some(11008));
        assert_eq!(parse_code("nope"), None);
    }
}
