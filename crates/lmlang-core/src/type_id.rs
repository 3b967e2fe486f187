//! `TypeId` and `TypeRegistry`: nominal identity and structural interning.
//!
//! Every type reachable from a `Module` goes through the registry. The
//! registry pre-registers the built-in scalar/sentinel types on
//! construction so that `TypeId::I32` etc. are stable across every
//! `TypeRegistry::new()` call; anything registered after that point
//! (structs, arrays, pointers, generics) gets interned by its canonical
//! printed form, so two structurally-equal types collapse to one TypeId.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{LmType, ScalarKind};

/// Unique identifier for a type in the type registry. Comparison is by
/// value (`TypeId` is `Copy`), but because the registry interns by
/// structural form, value equality on two `TypeId`s obtained from the
/// same registry implies structural equality of the underlying types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl TypeId {
    pub const BOOL: TypeId = TypeId(0);
    pub const CHAR: TypeId = TypeId(1);
    pub const U8: TypeId = TypeId(2);
    pub const U16: TypeId = TypeId(3);
    pub const U32: TypeId = TypeId(4);
    pub const U64: TypeId = TypeId(5);
    pub const I8: TypeId = TypeId(6);
    pub const I16: TypeId = TypeId(7);
    pub const I32: TypeId = TypeId(8);
    pub const I64: TypeId = TypeId(9);
    pub const F32: TypeId = TypeId(10);
    pub const F64: TypeId = TypeId(11);
    pub const INT: TypeId = TypeId(12);
    pub const UNIT: TypeId = TypeId(13);
    pub const NEVER: TypeId = TypeId(14);
    pub const INFERRED: TypeId = TypeId(15);
    /// Pointee used to build the universal `void*`: see the `void*`
    /// open question in the design notes.
    pub const VOID: TypeId = TypeId(16);
}

/// Registry of all types reachable from a `Module`, providing nominal
/// identity via [`TypeId`] and structural interning for everything
/// registered beyond the built-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: Vec<LmType>,
    /// Canonical printed form -> TypeId, used for structural interning.
    interned: HashMap<String, TypeId>,
    /// User-facing name -> TypeId, for struct/generic declarations.
    names: HashMap<String, TypeId>,
    next_id: u32,
}

impl TypeRegistry {
    const BUILTIN_COUNT: u32 = 17;

    /// Creates a registry with the 17 built-in types pre-registered:
    /// bool, char, the six sized integers, f32/f64, int, unit, never,
    /// inferred, and the void-pointee sentinel, in that order.
    pub fn new() -> Self {
        let types = vec![
            LmType::Primitive(ScalarKind::Bool),
            LmType::Primitive(ScalarKind::Char),
            LmType::Primitive(ScalarKind::U8),
            LmType::Primitive(ScalarKind::U16),
            LmType::Primitive(ScalarKind::U32),
            LmType::Primitive(ScalarKind::U64),
            LmType::Primitive(ScalarKind::I8),
            LmType::Primitive(ScalarKind::I16),
            LmType::Primitive(ScalarKind::I32),
            LmType::Primitive(ScalarKind::I64),
            LmType::Primitive(ScalarKind::F32),
            LmType::Primitive(ScalarKind::F64),
            LmType::Primitive(ScalarKind::Int),
            LmType::Unit,
            LmType::Never,
            LmType::Inferred,
            LmType::Void,
        ];
        debug_assert_eq!(types.len() as u32, Self::BUILTIN_COUNT);

        TypeRegistry {
            types,
            interned: HashMap::new(),
            names: HashMap::new(),
            next_id: Self::BUILTIN_COUNT,
        }
    }

    /// Registers a type, reusing an existing `TypeId` if a structurally
    /// equal type (by canonical printed form) is already interned.
    pub fn register(&mut self, ty: LmType) -> TypeId {
        let form = self.canonical_form(&ty);
        if let Some(&id) = self.interned.get(&form) {
            return id;
        }
        let id = TypeId(self.next_id);
        self.next_id += 1;
        self.interned.insert(form, id);
        self.types.push(ty);
        id
    }

    /// Registers a named type (struct, generic), recording the name for
    /// `get_by_name` lookups. Duplicate names are rejected; duplicate
    /// *structure* under a fresh name still interns to a fresh id since
    /// nominal types are distinguished by name, not merely shape.
    pub fn register_named(&mut self, name: &str, ty: LmType) -> Result<TypeId, CoreError> {
        if self.names.contains_key(name) {
            return Err(CoreError::DuplicateTypeName { name: name.to_string() });
        }
        let id = TypeId(self.next_id);
        self.next_id += 1;
        self.types.push(ty);
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get(&self, id: TypeId) -> Option<&LmType> {
        self.types.get(id.0 as usize)
    }

    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Size in bytes, resolving nested types through the registry.
    pub fn size_of(&self, id: TypeId) -> Option<u32> {
        let ty = self.get(id)?;
        match ty {
            LmType::Array { element, length } => {
                Some(self.size_of(*element)? * (*length as u32))
            }
            LmType::Struct { fields, .. } => {
                fields.values().try_fold(0u32, |acc, &f| Some(acc + self.size_of(f)?))
            }
            LmType::Optional { base } => self.size_of(*base),
            other => other.self_contained_size_bytes(),
        }
    }

    /// The canonical printed form used as the interning key. Two types
    /// with the same printed form are structurally identical.
    fn canonical_form(&self, ty: &LmType) -> String {
        match ty {
            LmType::Inferred => "inferred".to_string(),
            LmType::Primitive(s) => format!("{s:?}"),
            LmType::Literal { value, size_bits } => format!("literal({value},{size_bits})"),
            LmType::Pointer { pointee, mutable } => {
                format!("ptr({}{})", if *mutable { "mut " } else { "" }, pointee)
            }
            LmType::Array { element, length } => format!("array({element},{length})"),
            LmType::Function { params, returns } => {
                let p: Vec<String> = params.iter().map(|t| t.to_string()).collect();
                let r: Vec<String> = returns.iter().map(|t| t.to_string()).collect();
                format!("fn({})->({})", p.join(","), r.join(","))
            }
            LmType::Struct { name, .. } => format!("struct({name})"),
            LmType::Optional { base } => format!("optional({base})"),
            LmType::Generic { name, params } => format!("generic({name},{})", params.join(",")),
            LmType::InstantiatedGeneric { generic, args } => {
                let a: Vec<String> = args.iter().map(|t| t.to_string()).collect();
                format!("inst({generic},{})", a.join(","))
            }
            LmType::Unit => "unit".to_string(),
            LmType::Never => "never".to_string(),
            LmType::Void => "void".to_string(),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
