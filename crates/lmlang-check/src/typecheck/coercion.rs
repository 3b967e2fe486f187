//! Type coercion and widening rules.
//!
//! Defines which implicit type conversions are allowed between operand
//! types. Coercion is a conservative, lossless policy:
//!
//! - Bool -> any integer type (true=1, false=0)
//! - Safe integer widening within the same sign family: u8->u16->u32->u64,
//!   i8->i16->i32->i64
//! - Safe float widening: f32 -> f64
//! - `&mut T -> &T` (mutable to immutable pointer)
//! - NO implicit int <-> float conversion (requires an explicit `As` cast)
//! - NO narrowing conversions

use lmlang_core::{LmType, TypeId, TypeRegistry};

/// Widening edges consulted by the subtype relation (`is_subtype`), a
/// strictly more permissive table than [`can_coerce`]'s same-sign-family
/// policy: the subtype relation also allows `bool -> char` and signed
/// widening across the unsigned/signed boundary when no precision is
/// lost, per §4.4's worked pairs (`bool -> char,u8..u64,f32,f64,int`;
/// `u8 -> u16..u64,f32,f64,i16..,int`; `i32 -> i64,int,f64`; `f32 -> f64`).
fn primitive_widens_to(from: TypeId, to: TypeId) -> bool {
    use TypeId as T;
    match from {
        T::BOOL => matches!(
            to,
            T::CHAR | T::U8 | T::U16 | T::U32 | T::U64 | T::I8 | T::I16 | T::I32 | T::I64 | T::F32 | T::F64 | T::INT
        ),
        T::CHAR => matches!(to, T::U16 | T::U32 | T::U64 | T::I32 | T::I64 | T::INT),
        T::U8 => matches!(to, T::U16 | T::U32 | T::U64 | T::I16 | T::I32 | T::I64 | T::INT | T::F32 | T::F64),
        T::U16 => matches!(to, T::U32 | T::U64 | T::I32 | T::I64 | T::INT | T::F32 | T::F64),
        T::U32 => matches!(to, T::U64 | T::I64 | T::INT | T::F64),
        T::U64 => matches!(to, T::F64),
        T::I8 => matches!(to, T::I16 | T::I32 | T::I64 | T::INT | T::F32 | T::F64),
        T::I16 => matches!(to, T::I32 | T::I64 | T::INT | T::F32 | T::F64),
        T::I32 => matches!(to, T::I64 | T::INT | T::F64),
        T::I64 => matches!(to, T::F64),
        T::INT => matches!(to, T::I64 | T::F64),
        T::F32 => matches!(to, T::F64),
        _ => false,
    }
}

/// The subtype relation `sub <: sup` of §4.4.
///
/// Recurses structurally through pointers and `Optional`; everything else
/// bottoms out at nominal/structural equality, which is already implied
/// by `sub == sup` since the registry interns structurally-equal types to
/// one id (two differently-named structs with identical field lists are
/// still distinct ids -- nominal typing, not shape typing).
pub fn is_subtype(sub: TypeId, sup: TypeId, registry: &TypeRegistry) -> bool {
    if sub == sup || sup == TypeId::INFERRED {
        return true;
    }

    // The void* universal-pointer hack: short-circuits both directions of
    // the pointer subtype check regardless of the qualifier or the other
    // side's pointee. See the open question in DESIGN.md.
    if is_void_pointer(sub, registry) || is_void_pointer(sup, registry) {
        if let (Some(LmType::Pointer { .. }), Some(LmType::Pointer { .. })) = (registry.get(sub), registry.get(sup)) {
            return true;
        }
    }

    match (registry.get(sub), registry.get(sup)) {
        (Some(LmType::Literal { value, size_bits }), Some(LmType::Primitive(p))) => {
            if p.is_integer() {
                p.size_bytes() * 8 >= *size_bits
            } else {
                // Only `bool` accepts a literal that is exactly 0 or 1.
                matches!(p, lmlang_core::ScalarKind::Bool) && (*value == 0 || *value == 1)
            }
        }
        (Some(LmType::Primitive(_)), Some(LmType::Primitive(_))) => primitive_widens_to(sub, sup),
        (
            Some(LmType::Pointer { pointee: p1, mutable: m1 }),
            Some(LmType::Pointer { pointee: p2, mutable: m2 }),
        ) => {
            let qualifier_ok = *m1 || !*m2; // a mutable source may widen to immutable, never the reverse
            qualifier_ok && (*p1 == *p2 || is_subtype(*p1, *p2, registry))
        }
        (Some(LmType::Array { element, .. }), Some(LmType::Pointer { pointee, .. })) => {
            *element == *pointee || is_subtype(*element, *pointee, registry)
        }
        (_, Some(LmType::Optional { base })) => *base == sub || is_subtype(sub, *base, registry),
        _ => false,
    }
}

fn is_void_pointer(id: TypeId, registry: &TypeRegistry) -> bool {
    matches!(registry.get(id), Some(LmType::Pointer { pointee, .. }) if *pointee == TypeId::VOID)
}

/// Peer resolution (§4.4): the join of two operand types under a binary
/// operator. Tries widening in both directions; fails if neither is a
/// subtype of the other.
pub fn peer_resolve(a: TypeId, b: TypeId, registry: &TypeRegistry) -> Option<TypeId> {
    if a == b {
        return Some(a);
    }
    if is_subtype(a, b, registry) {
        return Some(b);
    }
    if is_subtype(b, a, registry) {
        return Some(a);
    }
    None
}

/// Returns `true` if a value of type `from` can implicitly coerce to type `to`.
pub fn can_coerce(from: TypeId, to: TypeId, registry: &TypeRegistry) -> bool {
    if from == to {
        return true;
    }

    if from == TypeId::BOOL && is_integer(to) {
        return true;
    }

    if is_integer(from) && is_integer(to) {
        if let (Some(ra), Some(rb)) = (integer_rank(from), integer_rank(to)) {
            return same_sign_family(from, to) && ra < rb;
        }
        return false;
    }

    if from == TypeId::F32 && to == TypeId::F64 {
        return true;
    }

    if let (
        Some(LmType::Pointer { pointee: p1, mutable: true }),
        Some(LmType::Pointer { pointee: p2, mutable: false }),
    ) = (registry.get(from), registry.get(to))
    {
        return p1 == p2;
    }

    false
}

/// True for any sized or default-literal integer type.
pub fn is_integer(type_id: TypeId) -> bool {
    matches!(
        type_id,
        TypeId::U8
            | TypeId::U16
            | TypeId::U32
            | TypeId::U64
            | TypeId::I8
            | TypeId::I16
            | TypeId::I32
            | TypeId::I64
            | TypeId::INT
    )
}

pub fn is_float(type_id: TypeId) -> bool {
    type_id == TypeId::F32 || type_id == TypeId::F64
}

pub fn is_numeric(type_id: TypeId) -> bool {
    is_integer(type_id) || is_float(type_id)
}

/// True for numeric types plus `Bool`, which coerces to integer in
/// arithmetic position.
pub fn is_numeric_or_bool(type_id: TypeId) -> bool {
    type_id == TypeId::BOOL || is_numeric(type_id)
}

fn is_unsigned(type_id: TypeId) -> bool {
    matches!(type_id, TypeId::U8 | TypeId::U16 | TypeId::U32 | TypeId::U64)
}

fn is_signed(type_id: TypeId) -> bool {
    matches!(type_id, TypeId::I8 | TypeId::I16 | TypeId::I32 | TypeId::I64 | TypeId::INT)
}

fn same_sign_family(a: TypeId, b: TypeId) -> bool {
    (is_unsigned(a) && is_unsigned(b)) || (is_signed(a) && is_signed(b))
}

/// Widening rank within a sign family; `None` for non-integer types.
fn integer_rank(type_id: TypeId) -> Option<u8> {
    match type_id {
        TypeId::U8 | TypeId::I8 => Some(0),
        TypeId::U16 | TypeId::I16 => Some(1),
        TypeId::U32 | TypeId::I32 => Some(2),
        TypeId::U64 | TypeId::I64 | TypeId::INT => Some(3),
        _ => None,
    }
}

/// Finds the common (wider) numeric type for two types, if one can widen
/// to the other. Resolves `Bool` to `I8` first so `Bool + Bool` produces
/// `I8`, not `Bool`.
pub fn common_numeric_type(a: TypeId, b: TypeId) -> Option<TypeId> {
    let a = if a == TypeId::BOOL { TypeId::I8 } else { a };
    let b = if b == TypeId::BOOL { TypeId::I8 } else { b };

    if a == b {
        return Some(a);
    }
    if !is_numeric(a) || !is_numeric(b) {
        return None;
    }
    if is_integer(a) != is_integer(b) {
        return None;
    }

    if is_integer(a) {
        if !same_sign_family(a, b) {
            return None;
        }
        let (ra, rb) = (integer_rank(a)?, integer_rank(b)?);
        Some(if ra >= rb { a } else { b })
    } else if a == TypeId::F64 || b == TypeId::F64 {
        Some(TypeId::F64)
    } else {
        Some(TypeId::F32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_coerces_to_any_integer() {
        let reg = TypeRegistry::new();
        assert!(can_coerce(TypeId::BOOL, TypeId::I32, &reg));
        assert!(can_coerce(TypeId::BOOL, TypeId::U64, &reg));
    }

    #[test]
    fn integer_widening_within_sign_family_only() {
        let reg = TypeRegistry::new();
        assert!(can_coerce(TypeId::I8, TypeId::I32, &reg));
        assert!(!can_coerce(TypeId::I32, TypeId::I8, &reg));
        assert!(!can_coerce(TypeId::U8, TypeId::I32, &reg));
    }

    #[test]
    fn float_widens_f32_to_f64_only() {
        let reg = TypeRegistry::new();
        assert!(can_coerce(TypeId::F32, TypeId::F64, &reg));
        assert!(!can_coerce(TypeId::F64, TypeId::F32, &reg));
    }

    #[test]
    fn no_implicit_int_float_conversion() {
        let reg = TypeRegistry::new();
        assert!(!can_coerce(TypeId::I32, TypeId::F32, &reg));
        assert!(!can_coerce(TypeId::F32, TypeId::I32, &reg));
    }

    #[test]
    fn mutable_pointer_coerces_to_immutable() {
        let mut reg = TypeRegistry::new();
        let mut_ptr = reg.register(LmType::Pointer { pointee: TypeId::I32, mutable: true });
        let imm_ptr = reg.register(LmType::Pointer { pointee: TypeId::I32, mutable: false });
        assert!(can_coerce(mut_ptr, imm_ptr, &reg));
        assert!(!can_coerce(imm_ptr, mut_ptr, &reg));
    }

    #[test]
    fn bool_is_subtype_of_char_and_every_integer() {
        let reg = TypeRegistry::new();
        assert!(is_subtype(TypeId::BOOL, TypeId::CHAR, &reg));
        assert!(is_subtype(TypeId::BOOL, TypeId::I64, &reg));
    }

    #[test]
    fn literal_is_subtype_of_wide_enough_primitive() {
        let mut reg = TypeRegistry::new();
        let lit8 = reg.register(LmType::Literal { value: 100, size_bits: 8 });
        assert!(is_subtype(lit8, TypeId::I32, &reg));
        let lit32 = reg.register(LmType::Literal { value: 100_000, size_bits: 32 });
        assert!(!is_subtype(lit32, TypeId::I8, &reg));
    }

    #[test]
    fn literal_zero_or_one_is_subtype_of_bool() {
        let mut reg = TypeRegistry::new();
        let lit = reg.register(LmType::Literal { value: 1, size_bits: 8 });
        assert!(is_subtype(lit, TypeId::BOOL, &reg));
    }

    #[test]
    fn array_is_subtype_of_pointer_to_element() {
        let mut reg = TypeRegistry::new();
        let arr = reg.register(LmType::Array { element: TypeId::I32, length: 4 });
        let ptr = reg.register(LmType::Pointer { pointee: TypeId::I32, mutable: false });
        assert!(is_subtype(arr, ptr, &reg));
    }

    #[test]
    fn void_pointer_is_universal() {
        let mut reg = TypeRegistry::new();
        let void_ptr = reg.register(LmType::Pointer { pointee: TypeId::VOID, mutable: true });
        let i32_ptr = reg.register(LmType::Pointer { pointee: TypeId::I32, mutable: false });
        assert!(is_subtype(void_ptr, i32_ptr, &reg));
        assert!(is_subtype(i32_ptr, void_ptr, &reg));
    }

    #[test]
    fn mutable_pointer_widens_to_immutable_not_reverse() {
        let mut reg = TypeRegistry::new();
        let mut_ptr = reg.register(LmType::Pointer { pointee: TypeId::I32, mutable: true });
        let imm_ptr = reg.register(LmType::Pointer { pointee: TypeId::I32, mutable: false });
        assert!(is_subtype(mut_ptr, imm_ptr, &reg));
        assert!(!is_subtype(imm_ptr, mut_ptr, &reg));
    }

    #[test]
    fn peer_resolve_picks_common_supertype() {
        let reg = TypeRegistry::new();
        assert_eq!(peer_resolve(TypeId::BOOL, TypeId::I32, &reg), Some(TypeId::I32));
        assert_eq!(peer_resolve(TypeId::I32, TypeId::I64, &reg), Some(TypeId::I64));
    }

    #[test]
    fn peer_resolve_fails_without_common_supertype() {
        let reg = TypeRegistry::new();
        assert_eq!(peer_resolve(TypeId::I64, TypeId::F32, &reg), None);
    }

    #[test]
    fn common_numeric_type_picks_wider() {
        assert_eq!(common_numeric_type(TypeId::I8, TypeId::I32), Some(TypeId::I32));
        assert_eq!(common_numeric_type(TypeId::BOOL, TypeId::BOOL), Some(TypeId::I8));
        assert_eq!(common_numeric_type(TypeId::F32, TypeId::F64), Some(TypeId::F64));
        assert_eq!(common_numeric_type(TypeId::U8, TypeId::I8), None);
        assert_eq!(common_numeric_type(TypeId::I32, TypeId::F32), None);
    }
}
