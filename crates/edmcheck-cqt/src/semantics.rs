//! Type semantics for command-tree typing
//!
//! Structural equality, promotion, common-type computation and the
//! comparability predicates used by argument validation. Nothing here
//! widens silently: when two types have no common type the answer is `None`.

use std::sync::Arc;

use edmcheck_core::{EdmType, EntityTypeDef, PrimitiveTypeKind, TypeUsage};

/// Cycle guard when walking base-type chains
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Type relationship queries over `TypeUsage`
pub struct TypeSemantics;

impl TypeSemantics {
    /// Same type, ignoring facets. Row members must match by name and type.
    pub fn is_structurally_equal(a: &TypeUsage, b: &TypeUsage) -> bool {
        match (a.edm_type(), b.edm_type()) {
            (EdmType::Row(left), EdmType::Row(right)) => {
                left.properties.len() == right.properties.len()
                    && left
                        .properties
                        .iter()
                        .zip(&right.properties)
                        .all(|(l, r)| {
                            l.name == r.name
                                && Self::is_structurally_equal(&l.type_usage, &r.type_usage)
                        })
            }
            (EdmType::Collection(left), EdmType::Collection(right)) => {
                Self::is_structurally_equal(left, right)
            }
            (left, right) => left == right,
        }
    }

    /// Whether `from` implicitly promotes to `to`
    ///
    /// Promotion is reflexive. Row promotion is positional and ignores
    /// member names.
    pub fn is_promotable_to(from: &TypeUsage, to: &TypeUsage) -> bool {
        match (from.edm_type(), to.edm_type()) {
            (EdmType::Primitive(f), EdmType::Primitive(t)) => f.promotes_to(*t),
            (EdmType::Entity(f), EdmType::Entity(t)) => f.is_sub_type_of(t),
            (EdmType::Ref(f), EdmType::Ref(t)) => f.is_sub_type_of(t),
            (EdmType::Collection(f), EdmType::Collection(t)) => Self::is_promotable_to(f, t),
            (EdmType::Row(f), EdmType::Row(t)) => {
                f.properties.len() == t.properties.len()
                    && f
                        .properties
                        .iter()
                        .zip(&t.properties)
                        .all(|(l, r)| Self::is_promotable_to(&l.type_usage, &r.type_usage))
            }
            (left, right) => left == right,
        }
    }

    pub fn is_structurally_equal_or_promotable_to(from: &TypeUsage, to: &TypeUsage) -> bool {
        Self::is_structurally_equal(from, to) || Self::is_promotable_to(from, to)
    }

    /// Narrowest type both arguments promote to
    pub fn common_type(a: &TypeUsage, b: &TypeUsage) -> Option<TypeUsage> {
        let nullable = a.is_nullable() || b.is_nullable();

        if Self::is_structurally_equal(a, b) {
            return Some(a.clone().with_nullable(nullable));
        }

        let common = match (a.edm_type(), b.edm_type()) {
            (EdmType::Primitive(left), EdmType::Primitive(right)) => left
                .promotions()
                .iter()
                .copied()
                .find(|candidate| right.promotes_to(*candidate))
                .map(TypeUsage::primitive),
            (EdmType::Entity(left), EdmType::Entity(right)) => {
                Self::common_super_type(left, right).map(TypeUsage::entity)
            }
            (EdmType::Ref(left), EdmType::Ref(right)) => {
                Self::common_super_type(left, right).map(TypeUsage::ref_to)
            }
            (EdmType::Collection(left), EdmType::Collection(right)) => {
                Self::common_type(left, right).map(TypeUsage::collection_of)
            }
            (EdmType::Row(left), EdmType::Row(right)) => {
                if left.properties.len() != right.properties.len() {
                    return None;
                }
                let mut columns = Vec::with_capacity(left.properties.len());
                for (l, r) in left.properties.iter().zip(&right.properties) {
                    if l.name != r.name {
                        return None;
                    }
                    columns.push((l.name.clone(), Self::common_type(&l.type_usage, &r.type_usage)?));
                }
                Some(TypeUsage::row(columns))
            }
            _ => None,
        };

        common.map(|t| t.with_nullable(nullable))
    }

    /// Left-to-right fold of `common_type`; `None` if any step fails or the input is empty
    pub fn common_type_of<'a, I>(types: I) -> Option<TypeUsage>
    where
        I: IntoIterator<Item = &'a TypeUsage>,
    {
        let mut iter = types.into_iter();
        let mut common = iter.next()?.clone();
        for next in iter {
            common = Self::common_type(&common, next)?;
        }
        Some(common)
    }

    pub fn has_common_type(a: &TypeUsage, b: &TypeUsage) -> bool {
        Self::common_type(a, b).is_some()
    }

    /// Closest common ancestor of two entity types
    fn common_super_type(
        left: &Arc<EntityTypeDef>,
        right: &Arc<EntityTypeDef>,
    ) -> Option<Arc<EntityTypeDef>> {
        let mut candidate = Some(left.clone());
        let mut depth = 0;
        while let Some(current) = candidate {
            if right.is_sub_type_of(&current) {
                return Some(current);
            }
            depth += 1;
            if depth > MAX_HIERARCHY_DEPTH {
                break;
            }
            candidate = current.base_type.clone();
        }
        None
    }

    pub fn is_equal_comparable(t: &TypeUsage) -> bool {
        match t.edm_type() {
            EdmType::Primitive(_) | EdmType::Enum(_) | EdmType::Entity(_) | EdmType::Ref(_) => true,
            EdmType::Row(row) => row
                .properties
                .iter()
                .all(|p| Self::is_equal_comparable(&p.type_usage)),
            _ => false,
        }
    }

    pub fn is_equal_comparable_to(a: &TypeUsage, b: &TypeUsage) -> bool {
        Self::is_equal_comparable(a) && Self::is_equal_comparable(b) && Self::has_common_type(a, b)
    }

    pub fn is_order_comparable(t: &TypeUsage) -> bool {
        match t.edm_type() {
            EdmType::Primitive(kind) => *kind != PrimitiveTypeKind::Binary,
            EdmType::Enum(_) => true,
            _ => false,
        }
    }

    pub fn is_order_comparable_to(a: &TypeUsage, b: &TypeUsage) -> bool {
        Self::is_order_comparable(a) && Self::is_order_comparable(b) && Self::has_common_type(a, b)
    }

    /// Valid for grouping keys, Distinct, and the set operators
    pub fn is_set_comparable(t: &TypeUsage) -> bool {
        match t.edm_type() {
            EdmType::Entity(_) | EdmType::Primitive(_) | EdmType::Enum(_) | EdmType::Ref(_) => true,
            EdmType::Row(row) => row
                .properties
                .iter()
                .all(|p| Self::is_set_comparable(&p.type_usage)),
            _ => false,
        }
    }

    /// Valid as a sort key: order comparable, or a row of sort keys
    pub fn is_valid_sort_key(t: &TypeUsage) -> bool {
        match t.as_row() {
            Some(row) => row
                .properties
                .iter()
                .all(|p| Self::is_valid_sort_key(&p.type_usage)),
            None => Self::is_order_comparable(t),
        }
    }

    pub fn is_valid_is_null_operand(t: &TypeUsage) -> bool {
        t.is_ref() || t.is_entity() || Self::is_scalar(t)
    }

    pub fn is_scalar(t: &TypeUsage) -> bool {
        t.is_primitive() || t.is_enum()
    }

    /// Entity and complex types take part in Treat, OfType and IsOf
    pub fn is_polymorphic_type(t: &TypeUsage) -> bool {
        matches!(t.edm_type(), EdmType::Entity(_) | EdmType::Complex(_))
    }

    /// Both types polymorphic and in the same hierarchy, in either direction
    pub fn is_valid_polymorphic_cast(from: &TypeUsage, to: &TypeUsage) -> bool {
        Self::is_polymorphic_type(from)
            && Self::is_polymorphic_type(to)
            && (Self::is_structurally_equal(from, to)
                || Self::is_promotable_to(from, to)
                || Self::is_promotable_to(to, from))
    }

    /// Casts are defined between scalar types only
    pub fn is_cast_allowed(from: &TypeUsage, to: &TypeUsage) -> bool {
        match (from.edm_type(), to.edm_type()) {
            (EdmType::Primitive(_), EdmType::Primitive(_)) => true,
            (EdmType::Primitive(_), EdmType::Enum(_)) => true,
            (EdmType::Enum(_), EdmType::Primitive(_)) => true,
            (EdmType::Enum(f), EdmType::Enum(t)) => f == t,
            _ => false,
        }
    }

    /// Entity (or ref) subtyping, reflexive
    pub fn is_sub_type_of(sub: &TypeUsage, sup: &TypeUsage) -> bool {
        match (sub.edm_type(), sup.edm_type()) {
            (EdmType::Entity(a), EdmType::Entity(b)) | (EdmType::Ref(a), EdmType::Ref(b)) => {
                a.is_sub_type_of(b)
            }
            _ => Self::is_structurally_equal(sub, sup),
        }
    }

    /// Next wider type in the promotion list of a primitive type
    pub fn closest_promotable_type(t: &TypeUsage) -> Option<TypeUsage> {
        t.primitive_kind()
            .and_then(|kind| kind.promotions().get(1).copied())
            .map(TypeUsage::primitive)
    }

    pub fn is_primitive_kind(t: &TypeUsage, kind: PrimitiveTypeKind) -> bool {
        t.primitive_kind() == Some(kind)
    }

    pub fn is_boolean(t: &TypeUsage) -> bool {
        Self::is_primitive_kind(t, PrimitiveTypeKind::Boolean)
    }

    pub fn is_numeric(t: &TypeUsage) -> bool {
        t.primitive_kind().is_some_and(|k| k.is_numeric())
    }

    pub fn is_integer(t: &TypeUsage) -> bool {
        t.primitive_kind().is_some_and(|k| k.is_integer())
    }

    pub fn is_unsigned(t: &TypeUsage) -> bool {
        t.primitive_kind().is_some_and(|k| k.is_unsigned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcheck_core::{ComplexTypeDef, DataSpace};

    fn int32() -> TypeUsage {
        TypeUsage::primitive(PrimitiveTypeKind::Int32)
    }

    fn hierarchy() -> (Arc<EntityTypeDef>, Arc<EntityTypeDef>, Arc<EntityTypeDef>) {
        let product = Arc::new(
            EntityTypeDef::new("Shop", "Product", DataSpace::CSpace)
                .with_property("Id", int32())
                .with_key(&["Id"]),
        );
        let book = Arc::new(EntityTypeDef::new("Shop", "Book", DataSpace::CSpace).with_base(product.clone()));
        let album = Arc::new(EntityTypeDef::new("Shop", "Album", DataSpace::CSpace).with_base(product.clone()));
        (product, book, album)
    }

    #[test]
    fn numeric_common_type_is_narrowest_shared_promotion() {
        let byte = TypeUsage::primitive(PrimitiveTypeKind::Byte);
        let sbyte = TypeUsage::primitive(PrimitiveTypeKind::SByte);
        let single = TypeUsage::primitive(PrimitiveTypeKind::Single);

        assert_eq!(
            TypeSemantics::common_type(&byte, &sbyte).and_then(|t| t.primitive_kind()),
            Some(PrimitiveTypeKind::Int16)
        );
        assert_eq!(
            TypeSemantics::common_type(&int32(), &single).and_then(|t| t.primitive_kind()),
            Some(PrimitiveTypeKind::Single)
        );
        assert!(TypeSemantics::common_type(&int32(), &TypeUsage::boolean()).is_none());
    }

    #[test]
    fn common_type_is_symmetric_for_numerics() {
        for a in PrimitiveTypeKind::ALL.iter().filter(|k| k.is_numeric()) {
            for b in PrimitiveTypeKind::ALL.iter().filter(|k| k.is_numeric()) {
                let left = TypeSemantics::common_type(&TypeUsage::primitive(*a), &TypeUsage::primitive(*b));
                let right = TypeSemantics::common_type(&TypeUsage::primitive(*b), &TypeUsage::primitive(*a));
                assert_eq!(left.and_then(|t| t.primitive_kind()), right.and_then(|t| t.primitive_kind()));
            }
        }
    }

    #[test]
    fn entity_common_type_is_closest_ancestor() {
        let (product, book, album) = hierarchy();
        let common = TypeSemantics::common_type(&TypeUsage::entity(book.clone()), &TypeUsage::entity(album));
        assert_eq!(common, Some(TypeUsage::entity(product.clone())));

        assert!(TypeSemantics::is_promotable_to(&TypeUsage::entity(book.clone()), &TypeUsage::entity(product.clone())));
        assert!(!TypeSemantics::is_promotable_to(&TypeUsage::entity(product), &TypeUsage::entity(book)));
    }

    #[test]
    fn row_promotion_ignores_names_but_common_type_does_not() {
        let a = TypeUsage::row(vec![("x", TypeUsage::primitive(PrimitiveTypeKind::Int16))]);
        let b = TypeUsage::row(vec![("y", int32())]);
        assert!(TypeSemantics::is_promotable_to(&a, &b));
        assert!(!TypeSemantics::is_structurally_equal(&a, &b));
        assert!(TypeSemantics::common_type(&a, &b).is_none());
    }

    #[test]
    fn comparability() {
        let (product, _, _) = hierarchy();
        let address = Arc::new(ComplexTypeDef::new("Shop", "Address", DataSpace::CSpace));
        let binary = TypeUsage::primitive(PrimitiveTypeKind::Binary);

        assert!(TypeSemantics::is_equal_comparable(&binary));
        assert!(!TypeSemantics::is_order_comparable(&binary));
        assert!(TypeSemantics::is_set_comparable(&TypeUsage::entity(product.clone())));
        assert!(!TypeSemantics::is_set_comparable(&TypeUsage::complex(address.clone())));
        assert!(!TypeSemantics::is_equal_comparable(&TypeUsage::collection_of(int32())));
        assert!(TypeSemantics::is_polymorphic_type(&TypeUsage::complex(address)));
        assert!(!TypeSemantics::is_order_comparable(&TypeUsage::entity(product)));
    }

    #[test]
    fn unsigned_promotes_to_next_wider_type() {
        let byte = TypeUsage::primitive(PrimitiveTypeKind::Byte);
        assert!(TypeSemantics::is_unsigned(&byte));
        assert_eq!(
            TypeSemantics::closest_promotable_type(&byte).and_then(|t| t.primitive_kind()),
            Some(PrimitiveTypeKind::Int16)
        );
        assert!(TypeSemantics::closest_promotable_type(&TypeUsage::primitive(PrimitiveTypeKind::Double)).is_none());
    }

    #[test]
    fn casts_between_scalars_only() {
        let (product, _, _) = hierarchy();
        assert!(TypeSemantics::is_cast_allowed(&int32(), &TypeUsage::primitive(PrimitiveTypeKind::String)));
        assert!(!TypeSemantics::is_cast_allowed(&TypeUsage::entity(product), &int32()));
    }
}
