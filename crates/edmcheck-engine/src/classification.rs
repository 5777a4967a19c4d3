//! Runtime error code policy tables
//!
//! Runtime codes in the unrecoverable tables mean the artifact cannot be
//! edited through the designer surfaces and must be opened as raw text.
//! The designer-exempt tables list codes that were deliberately left out
//! because they can be fixed in the designer. Their membership is a
//! product decision; keep both tables as data.
//!
//! Some exempt entries were recorded under older code names. Those carry
//! the recorded name in a comment next to the current variant.

use edmcheck_core::MappingErrorCode as M;
use edmcheck_core::SchemaErrorCode as S;
use edmcheck_core::{MappingErrorCode, SchemaErrorCode};

/// Schema codes that make an artifact unusable in the designer
pub const UNRECOVERABLE_SCHEMA_ERRORS: &[SchemaErrorCode] = &[
    S::SecurityError,
    S::IOException,
    S::XmlError,
    S::MalformedXml,
    S::UnexpectedXmlNodeType,
    S::UnexpectedXmlAttribute,
    S::UnexpectedXmlElement,
    S::TextNotAllowed,
    S::EmptyFile,
    S::XsdError,
    S::InvalidAlias,
    S::IntegerExpected,
    S::InvalidName,
    S::ElementNotInSchema,
    S::InvalidBaseType,
    S::InvalidVersionNumber,
    S::InvalidSize,
    S::InvalidBoolean,
    S::BadType,
    S::InvalidVersioningClass,
    S::InvalidVersionIntroduced,
    S::BadNamespace,
    S::UnresolvedReferenceSchema,
    S::NotInNamespace,
    S::NotUnnestedType,
    S::UndefinedProperty,
    S::InvalidPropertyType,
    S::InvalidAsNestedType,
    S::InvalidChangeUnit,
    S::UnauthorizedAccessException,
    S::DefaultNotAllowed,
    S::BadImageFormatException,
    S::MissingSchemaXml,
    S::NameTooLong,
    S::InvalidAssociation,
    S::FacetNotAllowedByType,
    S::ConstantFacetSpecifiedInSchema,
    S::BadNavigationProperty,
    S::InvalidMultiplicity,
    S::InvalidAction,
    S::InvalidContainerTypeForEnd,
    S::InvalidEndEntitySet,
    S::AmbiguousEntityContainerEnd,
    S::MissingExtentEntityContainerEnd,
    S::BadParameterDirection,
    S::FailedInference,
    S::InvalidRoleInRelationshipConstraint,
    S::MissingConstraintOnRelationshipType,
    S::SameRoleReferredInReferentialConstraint,
    S::InvalidRelationshipEndType,
    S::ComposableFunctionWithCommandText,
    S::FunctionDeclaresCommandTextAndStoreFunctionName,
    S::EmptyDefiningQuery,
    S::TableAndSchemaAreMutuallyExclusiveWithDefiningQuery,
    S::SimilarRelationshipEnd,
    S::DuplicatePropertySpecifiedInEntityKey,
    S::AmbiguousFunctionReturnType,
    S::NullableComplexType,
    S::NonComplexCollections,
    S::InvalidNamespaceInUsing,
    S::NeedNotUseSystemNamespaceInUsing,
    S::InvalidNamespaceName,
    S::InvalidEntityContainerNameInExtends,
    S::EntityContainerCannotExtendItself,
    S::EmptyCommandText,
    S::InconsistentProviderManifestToken,
    S::DuplicatedFunctionoverloads,
    S::InvalidProvider,
    S::FunctionWithNonEdmTypeNotSupported,
    S::ComplexTypeAsReturnTypeAndDefinedEntitySet,
    S::ComplexTypeAsReturnTypeAndNestedComplexProperty,
    S::FacetOnNonScalarType,
    S::IncorrectlyPlacedFacet,
    S::ReturnTypeNotDeclared,
    S::TypeNotDeclared,
    S::RowTypeWithoutProperty,
    S::ReturnTypeDeclaredAsAttributeAndElement,
    S::TypeDeclaredAsAttributeAndElement,
    S::ReferenceToNonEntityType,
    S::IncompatibleSchemaVersion,
    S::NoCodeGenNamespaceInStructuralAnnotation,
    S::AmbiguousFunctionAndType,
    S::CannotLoadDifferentVersionOfSchemaInTheSameItemCollection,
    S::BoolValueExpected,
    S::EndWithoutMultiplicity,
    S::TVFReturnTypeRowHasNonScalarProperty,
    S::FunctionWithDefiningExpressionAndEntitySetNotAllowed,
    S::FunctionEntityTypeScopeDoesNotMatchReturnType,
    S::InvalidEnumUnderlyingType,
    S::DuplicateEnumMember,
    S::CalculatedEnumValueOutOfRange,
    S::EnumMemberValueOutOfItsUnderylingTypeRange,
];

/// Schema codes the designer can recover from
pub const DESIGNER_EXEMPT_SCHEMA_ERRORS: &[SchemaErrorCode] = &[
    S::InvalidErrorCodeValue,
    S::TooManyErrors,
    S::BadProperty,
    S::PrecisionOutOfRange,
    S::ScaleOutOfRange,
    S::InvalidDefault,
    S::RequiredFacetMissing,
    S::BadPrecisionAndScale,
    S::InvalidChangeUnitUsage,
    S::CircularlyDefinedType,
    S::InvalidKey,
    S::InvalidOperation,
    S::InvalidFacetInProviderManifest,
    S::InvalidValueForParameterTypeSemantics,
    S::InvalidPrimitiveTypeKind,
    S::InvalidDateTimeKind,
    S::InvalidTypeConversionDestinationType,
    S::ByteValueExpected,
    S::FunctionWithNonScalarTypeNotSupported,
    // PrecisionMoreThan29
    S::PrecisionMoreThanAllowedMax,
    S::EntityKeyMustBeScalar,
    S::BinaryEntityKeyCurrentlyNotSupported,
    S::NoPreferredMappingForPrimitiveTypeKind,
    S::TooManyPreferredMappingsForPrimitiveTypeKind,
    S::EndWithManyMultiplicityCannotHaveOperationsSpecified,
    S::EntitySetTypeHasNoKeys,
    S::InvalidNumberOfParametersForAggregateFunction,
    S::InvalidParameterTypeForAggregateFunction,
    S::ComposableFunctionWithoutReturnType,
    S::NonComposableFunctionWithReturnType,
    S::NonComposableFunctionAttributesNotValid,
    S::SystemNamespace,
    S::ProviderManifestExplicitPromotionToSelf,
    S::ConcurrencyRedefinedOnSubTypeOfEntitySetType,
    S::FunctionImportUnsupportedReturnType,
    S::FunctionImportUnknownEntitySet,
    S::FunctionImportReturnsEntitiesButDoesNotSpecifyEntitySet,
    S::FunctionImportEntityTypeDoesNotMatchEntitySet,
    S::FunctionImportSpecifiesEntitySetButDoesNotReturnEntityType,
    S::InternalError,
    S::KeyMissingOnEntityType,
    S::CannotUseSystemNamespaceAsAlias,
    S::InvalidNamespaceOrAliasSpecified,
    S::FailedToRetrieveProviderManifest,
    S::ProviderManifestTokenMismatch,
    S::ProviderManifestTokenNotFound,
];

/// Mapping codes that make an artifact unusable in the designer
pub const UNRECOVERABLE_MAPPING_ERRORS: &[MappingErrorCode] = &[
    M::TableMappingFragmentExpected,
    M::SetMappingExpected,
    M::DuplicateSetMapping,
    M::DuplicateTypeMapping,
    M::ConditionError,
    M::RootMappingElementMissing,
    M::InvalidEnumValue,
    M::XmlSchemaValidationError,
    M::InvalidTableNameAttributeWithModificationFunctionMapping,
    M::InvalidModificationFunctionMappingForMultipleTypes,
    M::RedundantEntityTypeMappingInModificationFunctionMapping,
    M::MissingVersionInModificationFunctionMapping,
    M::InvalidVersionInModificationFunctionMapping,
    M::ParameterBoundTwiceInModificationFunctionMapping,
    M::InvalidModificationFunctionMappingMultipleEndsOfAssociationMapped,
    M::InvalidModificationFunctionMappingUnknownFunction,
    M::InvalidModificationFunctionMappingAmbiguousFunction,
    M::InvalidModificationFunctionMappingAssociationEndMappingInvalidForEntityType,
    M::MappingFunctionImportStoreFunctionDoesNotExist,
    M::MappingFunctionImportStoreFunctionAmbiguous,
    M::MappingFunctionImportFunctionImportDoesNotExist,
    M::MappingFunctionImportFunctionImportMappedMultipleTimes,
    M::MappingFunctionImportRowsAffectedParameterDoesNotExist,
    M::MappingFunctionImportRowsAffectedParameterHasWrongType,
    M::MappingFunctionImportRowsAffectedParameterHasWrongMode,
    M::TableNameAttributeWithQueryView,
    M::EmptyQueryView,
    M::PropertyMapsWithQueryView,
    M::MissingSetClosureInQueryViews,
    M::InvalidQueryView,
    M::InvalidQueryViewResultType,
    M::MappingUnsupportedExpressionKindQueryView,
    M::MappingUnsupportedScanTargetQueryView,
    M::MappingUnsupportedPropertyKindQueryView,
    M::MappingUnsupportedInitializationQueryView,
    M::MappingFunctionImportAmbiguousTypeConditions,
    M::StorageEntityContainerNameMismatchWhileSpecifyingPartialMapping,
    M::TypeNameForFirstQueryView,
    M::InvalidTypeInScalarProperty,
    M::AlreadyMappedStorageEntityContainer,
    M::UnsupportedQueryViewInEntityContainerMapping,
    M::MappingAllQueryViewAtCompileTime,
    M::MappingNoViewsCanBeGenerated,
    M::MappingStoreProviderReturnsNullEdmType,
    M::DuplicateMemberMapping,
    M::MappingFunctionImportUnexpectedEntityTypeMapping,
    M::MappingFunctionImportUnexpectedComplexTypeMapping,
    M::DistinctFragmentInReadWriteContainer,
    M::EntitySetMismatchOnAssociationSetEnd,
    M::InvalidModificationFunctionMappingAssociationEndForeignKey,
    M::CannotLoadDifferentVersionOfSchemaInTheSameItemCollection,
    M::MappingDifferentMappingEdmStoreVersion,
    M::MappingDifferentEdmStoreVersion,
    M::UnmappedFunctionImport,
    M::MappingFunctionImportReturnTypePropertyNotMapped,
    M::InvalidType,
    M::MappingFunctionImportTVFExpected,
    M::MappingFunctionImportScalarMappingTypeMismatch,
    M::MappingFunctionImportScalarMappingToMulticolumnTVF,
    M::MappingFunctionImportTargetFunctionMustBeComposable,
    M::UnsupportedFunctionCallInQueryView,
    M::FunctionResultMappingCountMismatch,
];

/// Mapping codes the designer can recover from
pub const DESIGNER_EXEMPT_MAPPING_ERRORS: &[MappingErrorCode] = &[
    M::DuplicateCondition,
    M::IncompatibleMemberMapping,
    // AmbiguousFunctionMappingForAssociationSet
    M::AmbiguousModificationFunctionMappingForAssociationSet,
    // MissingSetClosureInFunctionMapping
    M::MissingSetClosureInModificationFunctionMapping,
    // MissingFunctionMappingForEntityType
    M::MissingModificationFunctionMappingForEntityType,
    // AmbiguousResultBindingInFunctionMapping
    M::AmbiguousResultBindingInModificationFunctionMapping,
    // InvalidAssociationSetRoleInFunctionMapping
    M::InvalidAssociationSetRoleInModificationFunctionMapping,
    // InvalidAssociationSetCardinalityInFunctionMapping
    M::InvalidAssociationSetCardinalityInModificationFunctionMapping,
    M::NoEquivalentStorePrimitiveTypeFound,
    M::NoEquivalentStorePrimitiveTypeWithFacetsFound,
    // InvalidFunctionMappingPropertyParameterTypeMismatch
    M::InvalidModificationFunctionMappingPropertyParameterTypeMismatch,
    // InvalidFunctionMappingNotValidFunctionParameter
    M::InvalidModificationFunctionMappingNotValidFunctionParameter,
    // InvalidFunctionMappingAssociationSetNotMappedForOperation
    M::InvalidModificationFunctionMappingAssociationSetNotMappedForOperation,
    // Also listed as unrecoverable; the unrecoverable table wins
    M::MappingFunctionImportTargetFunctionMustBeComposable,
    M::MappingFunctionImportTargetParameterHasNoCorrespondingImportParameter,
    M::MappingFunctionImportImportParameterHasNoCorrespondingTargetParameter,
    M::MappingFunctionImportIncompatibleParameterMode,
    M::MappingFunctionImportIncompatibleParameterType,
    M::EmptyContainerMapping,
    M::ItemWithSameNameExistsBothInCSpaceAndSSpace,
    M::MappingFunctionImportEntityTypeMappingForFunctionNotReturningEntitySet,
    M::NoTypeNameForTypeSpecificQueryView,
    M::QueryViewExistsForEntitySetAndType,
    M::TypeNameContainsMultipleTypesForQueryView,
    M::IsTypeOfQueryViewForBaseType,
];

pub fn is_unrecoverable_schema_error(code: i32) -> bool {
    SchemaErrorCode::from_i32(code).is_some_and(|code| UNRECOVERABLE_SCHEMA_ERRORS.contains(&code))
}

pub fn is_unrecoverable_mapping_error(code: i32) -> bool {
    MappingErrorCode::from_i32(code).is_some_and(|code| UNRECOVERABLE_MAPPING_ERRORS.contains(&code))
}

/// Whether a runtime code is in either unrecoverable table
pub fn is_unrecoverable_runtime_error(code: i32) -> bool {
    is_unrecoverable_schema_error(code) || is_unrecoverable_mapping_error(code)
}

/// Whether a runtime code was deliberately kept out of the unrecoverable tables
pub fn is_designer_exempt(code: i32) -> bool {
    SchemaErrorCode::from_i32(code).is_some_and(|code| DESIGNER_EXEMPT_SCHEMA_ERRORS.contains(&code))
        || MappingErrorCode::from_i32(code).is_some_and(|code| DESIGNER_EXEMPT_MAPPING_ERRORS.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    /// Exempt schema codes as recorded, in recorded order
    const RECORDED_EXEMPT_SCHEMA: &[&str] = &[
        "InvalidErrorCodeValue",
        "TooManyErrors",
        "BadProperty",
        "PrecisionOutOfRange",
        "ScaleOutOfRange",
        "InvalidDefault",
        "RequiredFacetMissing",
        "BadPrecisionAndScale",
        "InvalidChangeUnitUsage",
        "CircularlyDefinedType",
        "InvalidKey",
        "InvalidOperation",
        "InvalidFacetInProviderManifest",
        "InvalidValueForParameterTypeSemantics",
        "InvalidPrimitiveTypeKind",
        "InvalidDateTimeKind",
        "InvalidTypeConversionDestinationType",
        "ByteValueExpected",
        "FunctionWithNonScalarTypeNotSupported",
        "PrecisionMoreThan29",
        "EntityKeyMustBeScalar",
        "BinaryEntityKeyCurrentlyNotSupported",
        "NoPreferredMappingForPrimitiveTypeKind",
        "TooManyPreferredMappingsForPrimitiveTypeKind",
        "EndWithManyMultiplicityCannotHaveOperationsSpecified",
        "EntitySetTypeHasNoKeys",
        "InvalidNumberOfParametersForAggregateFunction",
        "InvalidParameterTypeForAggregateFunction",
        "ComposableFunctionWithoutReturnType",
        "NonComposableFunctionWithReturnType",
        "NonComposableFunctionAttributesNotValid",
        "SystemNamespace",
        "ProviderManifestExplicitPromotionToSelf",
        "ConcurrencyRedefinedOnSubTypeOfEntitySetType",
        "FunctionImportUnsupportedReturnType",
        "FunctionImportUnknownEntitySet",
        "FunctionImportReturnsEntitiesButDoesNotSpecifyEntitySet",
        "FunctionImportEntityTypeDoesNotMatchEntitySet",
        "FunctionImportSpecifiesEntitySetButDoesNotReturnEntityType",
        "InternalError",
        "KeyMissingOnEntityType",
        "CannotUseSystemNamespaceAsAlias",
        "InvalidNamespaceOrAliasSpecified",
        "FailedToRetrieveProviderManifest",
        "ProviderManifestTokenMismatch",
        "ProviderManifestTokenNotFound",
    ];

    /// Exempt mapping codes as recorded, in recorded order
    const RECORDED_EXEMPT_MAPPING: &[&str] = &[
        "DuplicateCondition",
        "IncompatibleMemberMapping",
        "AmbiguousFunctionMappingForAssociationSet",
        "MissingSetClosureInFunctionMapping",
        "MissingFunctionMappingForEntityType",
        "AmbiguousResultBindingInFunctionMapping",
        "InvalidAssociationSetRoleInFunctionMapping",
        "InvalidAssociationSetCardinalityInFunctionMapping",
        "NoEquivalentStorePrimitiveTypeFound",
        "NoEquivalentStorePrimitiveTypeWithFacetsFound",
        "InvalidFunctionMappingPropertyParameterTypeMismatch",
        "InvalidFunctionMappingNotValidFunctionParameter",
        "InvalidFunctionMappingAssociationSetNotMappedForOperation",
        "MappingFunctionImportTargetFunctionMustBeComposable",
        "MappingFunctionImportTargetParameterHasNoCorrespondingImportParameter",
        "MappingFunctionImportImportParameterHasNoCorrespondingTargetParameter",
        "MappingFunctionImportIncompatibleParameterMode",
        "MappingFunctionImportIncompatibleParameterType",
        "EmptyContainerMapping",
        "ItemWithSameNameExistsBothInCSpaceAndSSpace",
        "MappingFunctionImportEntityTypeMappingForFunctionNotReturningEntitySet",
        "NoTypeNameForTypeSpecificQueryView",
        "QueryViewExistsForEntitySetAndType",
        "TypeNameContainsMultipleTypesForQueryView",
        "IsTypeOfQueryViewForBaseType",
    ];

    /// Older recorded name to current variant name
    fn current_name(recorded: &str) -> String {
        match recorded {
            "PrecisionMoreThan29" => "PrecisionMoreThanAllowedMax".to_string(),
            "AmbiguousFunctionMappingForAssociationSet"
            | "MissingSetClosureInFunctionMapping"
            | "MissingFunctionMappingForEntityType"
            | "AmbiguousResultBindingInFunctionMapping"
            | "InvalidAssociationSetRoleInFunctionMapping"
            | "InvalidAssociationSetCardinalityInFunctionMapping" => recorded.replace("Function", "ModificationFunction"),
            "InvalidFunctionMappingPropertyParameterTypeMismatch"
            | "InvalidFunctionMappingNotValidFunctionParameter"
            | "InvalidFunctionMappingAssociationSetNotMappedForOperation" => {
                recorded.replacen("InvalidFunction", "InvalidModificationFunction", 1)
            }
            _ => recorded.to_string(),
        }
    }

    #[test]
    fn exempt_schema_table_matches_the_recorded_list() {
        assert_eq!(DESIGNER_EXEMPT_SCHEMA_ERRORS.len(), 46);
        let expected: Vec<String> = RECORDED_EXEMPT_SCHEMA.iter().map(|n| current_name(n)).collect();
        let actual: Vec<String> = DESIGNER_EXEMPT_SCHEMA_ERRORS.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn exempt_mapping_table_matches_the_recorded_list() {
        assert_eq!(DESIGNER_EXEMPT_MAPPING_ERRORS.len(), 25);
        let expected: Vec<String> = RECORDED_EXEMPT_MAPPING.iter().map(|n| current_name(n)).collect();
        let actual: Vec<String> = DESIGNER_EXEMPT_MAPPING_ERRORS.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn unrecoverable_table_sizes() {
        assert_eq!(UNRECOVERABLE_SCHEMA_ERRORS.len(), 92);
        assert_eq!(UNRECOVERABLE_MAPPING_ERRORS.len(), 62);
    }

    #[test]
    fn tables_are_disjoint() {
        let unrecoverable: HashSet<_> = UNRECOVERABLE_SCHEMA_ERRORS.iter().collect();
        assert!(DESIGNER_EXEMPT_SCHEMA_ERRORS.iter().all(|c| !unrecoverable.contains(c)));

        // The one recorded overlap
        let unrecoverable: HashSet<_> = UNRECOVERABLE_MAPPING_ERRORS.iter().collect();
        let overlap: Vec<_> = DESIGNER_EXEMPT_MAPPING_ERRORS
            .iter()
            .filter(|c| unrecoverable.contains(c))
            .collect();
        assert_eq!(overlap, vec![&M::MappingFunctionImportTargetFunctionMustBeComposable]);
    }

    #[test]
    fn tables_have_no_duplicates() {
        let schema: HashSet<_> = UNRECOVERABLE_SCHEMA_ERRORS.iter().collect();
        assert_eq!(schema.len(), UNRECOVERABLE_SCHEMA_ERRORS.len());
        let mapping: HashSet<_> = UNRECOVERABLE_MAPPING_ERRORS.iter().collect();
        assert_eq!(mapping.len(), UNRECOVERABLE_MAPPING_ERRORS.len());
        let schema: HashSet<_> = DESIGNER_EXEMPT_SCHEMA_ERRORS.iter().collect();
        assert_eq!(schema.len(), DESIGNER_EXEMPT_SCHEMA_ERRORS.len());
        let mapping: HashSet<_> = DESIGNER_EXEMPT_MAPPING_ERRORS.iter().collect();
        assert_eq!(mapping.len(), DESIGNER_EXEMPT_MAPPING_ERRORS.len());
    }

    #[test]
    fn lookups_by_number() {
        assert!(is_unrecoverable_runtime_error(5));
        assert!(is_unrecoverable_runtime_error(40));
        assert!(is_unrecoverable_runtime_error(2016));
        assert!(is_unrecoverable_runtime_error(2049));

        assert!(!is_unrecoverable_runtime_error(58));
        assert!(is_designer_exempt(58));
        assert!(!is_unrecoverable_runtime_error(151));
        assert!(is_designer_exempt(151));
        assert!(!is_unrecoverable_runtime_error(2026));
        assert!(is_designer_exempt(2026));

        // Listed in both tables
        assert!(is_unrecoverable_runtime_error(2111));
        assert!(is_designer_exempt(2111));

        // Neither listed nor exempt
        assert!(!is_unrecoverable_runtime_error(2054));
        assert!(!is_designer_exempt(2054));
        assert!(!is_unrecoverable_runtime_error(2062));
        assert!(!is_designer_exempt(2062));
        assert!(!is_unrecoverable_runtime_error(2078));
        assert!(!is_designer_exempt(-1));
    }
}
