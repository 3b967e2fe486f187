//! The type lattice.
//!
//! `LmType` is the closed set of type shapes the core understands:
//! `Inferred` (the top type, meaning "not yet known"), `Primitive`
//! scalars, integer-literal singletons, pointers, arrays, structs,
//! function signatures, `Optional`, and the syntactic (uninstantiated)
//! generics the parser may hand us. Subtyping and peer resolution over
//! this lattice live in `lmlang-check::typecheck::coercion`, which is
//! the only thing that needs to reason about widening; this module just
//! owns the shapes and their interning.
//!
//! All types use nominal identity via [`crate::type_id::TypeId`]; structs
//! use [`IndexMap`] for insertion-ordered fields, matching declaration order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::type_id::TypeId;

/// A type in the lattice. Each variant carries exactly the data needed to
/// answer the questions the type checker asks of it (size, subtyping,
/// field/element lookup); it does not carry derived data like printed
/// form (computed on demand by `TypeRegistry::canonical_form`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LmType {
    /// The top type: unconstrained, "not yet known". Every type is a
    /// subtype of `Inferred`; after type checking no destination may
    /// still carry it.
    Inferred,

    /// A concrete scalar primitive.
    Primitive(ScalarKind),

    /// An integer-literal singleton type, e.g. the type of the literal
    /// `32` before it commits to a concrete primitive. `size_bits` is the
    /// minimum bit width needed to represent the value, used by the
    /// `Literal(v) <: Primitive(p)` subtype rule.
    Literal { value: i64, size_bits: u32 },

    /// Pointer/reference to another type. `mutable` distinguishes an
    /// exclusive (`&mut`-like) pointer from a shared one for qualifier
    /// widening.
    Pointer { pointee: TypeId, mutable: bool },

    /// Fixed-size array `[T; N]`. `Array(t,n) <: Pointer(t)`; `.len`
    /// publishes `Literal(n)`.
    Array { element: TypeId, length: u64 },

    /// Function signature (possibly multi-return).
    Function {
        params: Vec<TypeId>,
        returns: Vec<TypeId>,
    },

    /// Named struct, nominal typing, insertion-ordered fields.
    Struct { name: String, fields: IndexMap<String, TypeId> },

    /// `Optional(T)`: either a value of `T` or the absence of one.
    Optional { base: TypeId },

    /// Syntactic generic parameter list, not instantiated. The core
    /// admits these but never drives instantiation (see Non-goals).
    Generic { name: String, params: Vec<String> },

    /// A generic applied to concrete type arguments. Still uninterpreted
    /// by the core beyond structural bookkeeping.
    InstantiatedGeneric { generic: TypeId, args: Vec<TypeId> },

    /// Zero-size unit type, the type of statements with no value.
    Unit,

    /// The diverging / bottom type: a subtype of everything. Produced by
    /// control flow that never returns to its caller.
    Never,

    /// Reserved pointee for the universal `void*` pointer. Never itself
    /// interned as a standalone variable's type; only ever appears as
    /// `Pointer { pointee: TypeId::VOID, .. }`.
    Void,
}

/// Scalar primitive kinds. No unsigned/signed split beyond what the name
/// itself encodes (`u8` vs `i8`) -- arithmetic signedness is a property
/// of the scalar kind here, unlike an LLVM-style type-erased `iN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Char,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// The default integer literal type, distinct from `I32`; see the
    /// widening table in `coercion.rs` for how it interacts with the
    /// sized integer types.
    Int,
}

impl ScalarKind {
    /// Size in bytes, used for `Literal(v) <: Primitive(p)` and for the
    /// emitter's layout computations.
    pub fn size_bytes(self) -> u32 {
        match self {
            ScalarKind::Bool => 1,
            ScalarKind::Char => 4,
            ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
            ScalarKind::Int => 4,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ScalarKind::F32 | ScalarKind::F64 | ScalarKind::Bool)
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }
}

impl LmType {
    /// Size in bytes where statically known; `None` for types whose size
    /// depends on a registry lookup of a nested type (callers should
    /// prefer `TypeRegistry::size_of` which resolves those).
    pub fn self_contained_size_bytes(&self) -> Option<u32> {
        match self {
            LmType::Primitive(s) => Some(s.size_bytes()),
            LmType::Literal { size_bits, .. } => Some(size_bits.div_ceil(8)),
            LmType::Pointer { .. } => Some(8),
            LmType::Unit | LmType::Never | LmType::Void => Some(0),
            _ => None,
        }
    }
}

/// Computes the minimum bit width needed to represent a signed integer
/// literal value, used when constructing `LmType::Literal`.
pub fn literal_bit_width(value: i64) -> u32 {
    if value == 0 {
        return 1;
    }
    let magnitude_bits = 64 - value.unsigned_abs().leading_zeros();
    // Reserve one bit for sign; round up to a byte-sized width.
    let needed = magnitude_bits + 1;
    [8, 16, 32, 64]
        .into_iter()
        .find(|&w| w >= needed)
        .unwrap_or(64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        assert_eq!(ScalarKind::Bool.size_bytes(), 1);
        assert_eq!(ScalarKind::I32.size_bytes(), 4);
        assert_eq!(ScalarKind::F64.size_bytes(), 8);
    }

    #[test]
    fn integer_vs_float_classification() {
        assert!(ScalarKind::I64.is_integer());
        assert!(!ScalarKind::F64.is_integer());
        assert!(ScalarKind::F32.is_float());
        assert!(!ScalarKind::Bool.is_float());
    }

    #[test]
    fn literal_bit_width_small_values() {
        assert_eq!(literal_bit_width(0), 1);
        assert_eq!(literal_bit_width(1), 8);
        assert_eq!(literal_bit_width(127), 8);
        assert_eq!(literal_bit_width(128), 16);
        assert_eq!(literal_bit_width(32_768), 32);
        assert_eq!(literal_bit_width(i64::MAX), 64);
    }

    #[test]
    fn serde_roundtrip_struct_type() {
        let ty = LmType::Struct {
            name: "Point".into(),
            fields: IndexMap::from([("x".into(), TypeId::F64), ("y".into(), TypeId::F64)]),
        };
        let json = serde_json::to_string(&ty).unwrap();
        let back: LmType = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn serde_roundtrip_pointer_and_array() {
        let ptr = LmType::Pointer { pointee: TypeId::I32, mutable: true };
        let json = serde_json::to_string(&ptr).unwrap();
        let back: LmType = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);

        let arr = LmType::Array { element: TypeId::CHAR, length: 16 };
        let json = serde_json::to_string(&arr).unwrap();
        let back: LmType = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn struct_fields_preserve_insertion_order() {
        let mut fields = IndexMap::new();
        fields.insert("z".to_string(), TypeId::I32);
        fields.insert("a".to_string(), TypeId::I32);
        let st = LmType::Struct { name: "Ordered".into(), fields };
        if let LmType::Struct { fields, .. } = st {
            let keys: Vec<&str> = fields.keys().map(|s| s.as_str()).collect();
            assert_eq!(keys, vec!["z", "a"]);
        }
    }
}
