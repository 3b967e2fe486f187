//! Instructions: the three-address records that make up a basic block.
//!
//! An `Instruction` is built exclusively through the smart constructors
//! below, one per opcode family, each enforcing the arg/ref arity its
//! opcode requires. There is no public way to build an `Instruction`
//! whose shape violates the invariants in the data model (e.g. a `Br`
//! with zero references, or a `Lit` with a reference instead of a
//! payload) -- this collapses what used to be several overlapping
//! constructors in the source into one path per opcode.

use serde::{Deserialize, Serialize};

use crate::ops::Op;
use crate::type_id::TypeId;

/// A source-location token, carried by instructions for diagnostics.
/// The lexer/parser (outside the core) populate real spans; passes that
/// synthesize instructions (constant folding, drop insertion) may leave
/// this `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub line: u32,
    pub column: u32,
}

/// A literal payload. `Instruction::args` for a `Lit` instruction is
/// exactly one of these, paired with the type tag that selects which
/// variant applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// An argument slot: literal data that is not itself a reference to
/// another instruction's destination. Used for `Lit` payloads, `Br`/`Jmp`
/// successor positions, and similar non-SSA data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    Literal(Literal),
    /// A successor block position, for `Br`/`Jmp`.
    BlockIndex(u32),
    /// A data-pool index, for `Lit` instructions whose payload lives in
    /// the module's interned data pool rather than inline.
    DataPoolIndex(u32),
}

/// A single IR instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Op,
    pub dest: Option<String>,
    pub args: Vec<Arg>,
    pub refs: Vec<String>,
    /// Type assigned by the type checker; `None` before it runs,
    /// `Some(TypeId::INFERRED)` is never a valid post-check state.
    pub ty: Option<TypeId>,
    pub token: Option<Token>,
}

impl Instruction {
    /// Destination name used for multi-value calls whose result is
    /// discarded (`_ := call f x`).
    pub const DISCARD: &'static str = "_";

    fn new(op: Op) -> Self {
        Instruction {
            op,
            dest: None,
            args: Vec::new(),
            refs: Vec::new(),
            ty: None,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    // -- Arithmetic / logical / comparison: binary, two refs --

    fn binary(op: Op, dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        let mut i = Self::new(op);
        i.dest = Some(dest.into());
        i.refs = vec![lhs.into(), rhs.into()];
        i
    }

    pub fn add(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Add, dest, lhs, rhs)
    }
    pub fn sub(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Sub, dest, lhs, rhs)
    }
    pub fn mul(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Mul, dest, lhs, rhs)
    }
    pub fn div(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Div, dest, lhs, rhs)
    }
    pub fn modulo(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Mod, dest, lhs, rhs)
    }
    pub fn and(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::And, dest, lhs, rhs)
    }
    pub fn or(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Or, dest, lhs, rhs)
    }
    pub fn eq(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Eq, dest, lhs, rhs)
    }
    pub fn neq(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Neq, dest, lhs, rhs)
    }
    pub fn gt(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Gt, dest, lhs, rhs)
    }
    pub fn lt(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Lt, dest, lhs, rhs)
    }
    pub fn gte(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Gte, dest, lhs, rhs)
    }
    pub fn lte(dest: impl Into<String>, lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::binary(Op::Lte, dest, lhs, rhs)
    }

    pub fn not(dest: impl Into<String>, src: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Not);
        i.dest = Some(dest.into());
        i.refs = vec![src.into()];
        i
    }

    // -- LIT: carries (data-pool index, payload) --

    pub fn lit(dest: impl Into<String>, value: Literal) -> Self {
        let mut i = Self::new(Op::Lit);
        i.dest = Some(dest.into());
        i.args = vec![Arg::Literal(value)];
        i
    }

    // -- Single-ref ownership ops: REF/BRW/MOVE/COPY/ALLOC --

    fn single_ref(op: Op, dest: impl Into<String>, src: impl Into<String>) -> Self {
        let mut i = Self::new(op);
        i.dest = Some(dest.into());
        i.refs = vec![src.into()];
        i
    }

    pub fn mov(dest: impl Into<String>, src: impl Into<String>) -> Self {
        Self::single_ref(Op::Move, dest, src)
    }
    pub fn brw(dest: impl Into<String>, src: impl Into<String>) -> Self {
        Self::single_ref(Op::Brw, dest, src)
    }
    pub fn reference(dest: impl Into<String>, src: impl Into<String>) -> Self {
        Self::single_ref(Op::Ref, dest, src)
    }
    pub fn copy(dest: impl Into<String>, src: impl Into<String>) -> Self {
        Self::single_ref(Op::Copy, dest, src)
    }
    pub fn alloc(dest: impl Into<String>, size_hint: impl Into<String>) -> Self {
        Self::single_ref(Op::Alloc, dest, size_hint)
    }

    // -- Side-effecting --

    pub fn print(src: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Print);
        i.refs = vec![src.into()];
        i
    }

    pub fn free(name: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Free);
        i.refs = vec![name.into()];
        i
    }

    /// Raw memory store: `set obj offset value`.
    pub fn set(object: impl Into<String>, offset: impl Into<String>, value: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Set);
        i.refs = vec![object.into(), offset.into(), value.into()];
        i
    }

    pub fn call(dest: impl Into<String>, callee: impl Into<String>, args: Vec<String>) -> Self {
        let mut i = Self::new(Op::Call);
        i.dest = Some(dest.into());
        i.refs = {
            let mut refs = vec![callee.into()];
            refs.extend(args);
            refs
        };
        i
    }

    pub fn decl(dest: impl Into<String>, declared_type: Option<TypeId>, expr: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Decl);
        i.dest = Some(dest.into());
        i.refs = vec![expr.into()];
        i.ty = declared_type;
        i
    }

    pub fn assign(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Assign);
        i.refs = vec![lhs.into(), rhs.into()];
        i
    }

    // -- Misc --

    pub fn access(dest: impl Into<String>, object: impl Into<String>, field: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Access);
        i.dest = Some(dest.into());
        i.refs = vec![object.into()];
        i.args = vec![Arg::Literal(Literal::Str(field.into()))];
        i
    }

    pub fn index(dest: impl Into<String>, object: impl Into<String>, idx: impl Into<String>) -> Self {
        let mut i = Self::new(Op::Index);
        i.dest = Some(dest.into());
        i.refs = vec![object.into(), idx.into()];
        i
    }

    pub fn cast(dest: impl Into<String>, src: impl Into<String>, target: TypeId) -> Self {
        let mut i = Self::new(Op::As);
        i.dest = Some(dest.into());
        i.refs = vec![src.into()];
        i.ty = Some(target);
        i
    }

    pub fn init(dest: impl Into<String>, fields: Vec<String>) -> Self {
        let mut i = Self::new(Op::Init);
        i.dest = Some(dest.into());
        i.refs = fields;
        i
    }

    pub fn nop() -> Self {
        Self::new(Op::Nop)
    }

    // -- Terminators --

    pub fn ret(values: Vec<String>) -> Self {
        let mut i = Self::new(Op::Ret);
        i.refs = values;
        i
    }

    pub fn jmp(target: u32) -> Self {
        let mut i = Self::new(Op::Jmp);
        i.args = vec![Arg::BlockIndex(target)];
        i
    }

    pub fn br(cond: impl Into<String>, if_true: u32, if_false: u32) -> Self {
        let mut i = Self::new(Op::Br);
        i.refs = vec![cond.into()];
        i.args = vec![Arg::BlockIndex(if_true), Arg::BlockIndex(if_false)];
        i
    }

    /// The branch's (true, false) successor positions. Panics if called
    /// on a non-`Br` instruction; callers are expected to check `op`
    /// first (mirrors the discriminated-record invariant in the data model).
    pub fn branch_targets(&self) -> (u32, u32) {
        assert_eq!(self.op, Op::Br);
        match (&self.args[0], &self.args[1]) {
            (Arg::BlockIndex(t), Arg::BlockIndex(f)) => (*t, *f),
            _ => unreachable!("Br instruction with non-BlockIndex args"),
        }
    }

    pub fn jump_target(&self) -> u32 {
        assert_eq!(self.op, Op::Jmp);
        match &self.args[0] {
            Arg::BlockIndex(t) => *t,
            _ => unreachable!("Jmp instruction with non-BlockIndex arg"),
        }
    }

    /// Whether this instruction is eligible for dead-code elimination at
    /// all (side-effecting ops never are, regardless of `dest` usage).
    pub fn is_removable(&self) -> bool {
        !self.op.is_side_effecting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_constructors_set_refs_in_order() {
        let i = Instruction::add("z", "x", "y");
        assert_eq!(i.op, Op::Add);
        assert_eq!(i.dest.as_deref(), Some("z"));
        assert_eq!(i.refs, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn lit_carries_payload_not_refs() {
        let i = Instruction::lit("x", Literal::Int(32));
        assert!(i.refs.is_empty());
        assert_eq!(i.args.len(), 1);
    }

    #[test]
    fn br_has_one_ref_and_two_args() {
        let i = Instruction::br("cond", 1, 2);
        assert_eq!(i.refs.len(), 1);
        assert_eq!(i.branch_targets(), (1, 2));
    }

    #[test]
    fn jmp_has_one_arg() {
        let i = Instruction::jmp(3);
        assert_eq!(i.jump_target(), 3);
    }

    #[test]
    fn single_ref_ops_carry_exactly_one_reference() {
        for i in [
            Instruction::mov("y", "x"),
            Instruction::brw("y", "x"),
            Instruction::reference("y", "x"),
            Instruction::copy("y", "x"),
            Instruction::alloc("y", "8"),
        ] {
            assert_eq!(i.refs.len(), 1);
        }
    }

    #[test]
    fn serde_roundtrip() {
        let i = Instruction::add("z", "x", "y");
        let json = serde_json::to_string(&i).unwrap();
        let back: Instruction = serde_json::from_str(&json).unwrap();
        assert_eq!(i, back);
    }
}
