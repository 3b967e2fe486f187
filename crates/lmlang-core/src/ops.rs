//! The IR operation vocabulary.
//!
//! `Op` is a closed tag set partitioned into arithmetic, logical, misc,
//! side-effecting, terminator and meta groups. Every `Instruction` in the
//! IR carries exactly one `Op`; the partitions below exist to answer
//! cheap membership questions (is this a terminator? does it have
//! observable side effects?) without falling back to a giant match in
//! every caller.
//!
//! # Design: closed tag set, not dynamically-typed payloads
//!
//! Earlier prototypes of this IR represented opcodes as bare strings and
//! built instructions through several overlapping smart constructors.
//! `Op` replaces all of that with one enum and one constructor per
//! variant on [`crate::instruction::Instruction`] (see `instruction.rs`),
//! so an instruction with a mismatched arity for its opcode cannot be
//! constructed at all.

use serde::{Deserialize, Serialize};

/// The complete IR opcode set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    // -- Arithmetic --
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // -- Logical / comparison --
    And,
    Or,
    Not,
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,

    // -- Misc --
    /// Prefix member access, e.g. taking a field off a freshly computed value.
    Dot,
    /// Infix field access (`obj.field`).
    Access,
    /// Explicit cast (`AS`); carries no payload of its own, the target type
    /// lives in the instruction's type slot once the type checker runs.
    As,
    Index,
    Assign,
    /// Load of a literal value from the data pool.
    Lit,
    /// Shared borrow.
    Brw,
    /// Exclusive borrow.
    Ref,
    Move,
    Copy,
    /// Declares a block-formal parameter binding.
    Param,
    /// Struct field initializer inside an `Init`.
    Field,
    /// Struct/array aggregate initialization.
    Init,

    // -- Side-effecting --
    Print,
    Call,
    Alloc,
    Free,
    /// Raw memory store (`set obj offset value`): writes `value` at
    /// `offset` bytes into the allocation `obj` points to. Carries no
    /// destination, mirroring `Print`/`Free`.
    Set,
    Syscall,
    Decl,
    Multidecl,
    Asm,

    // -- Terminators (Ret is also side-effecting; see `is_terminator`/`is_side_effecting`) --
    Br,
    Jmp,
    Ret,

    // -- Meta --
    Nop,
    Label,
}

/// Arithmetic opcodes, used by table lookups that only care about this group.
pub const ARITHMETIC: &[Op] = &[Op::Add, Op::Sub, Op::Mul, Op::Div, Op::Mod];

/// Logical / comparison opcodes.
pub const LOGICAL: &[Op] = &[
    Op::And,
    Op::Or,
    Op::Not,
    Op::Eq,
    Op::Neq,
    Op::Gt,
    Op::Lt,
    Op::Gte,
    Op::Lte,
];

/// Opcodes with observable side effects: never eligible for DCE removal.
///
/// `Ret` appears here AND in [`TERMINATORS`] -- it is simultaneously a
/// terminator and a side-effecting op, exactly as in the source.
pub const SIDE_EFFECTS: &[Op] = &[
    Op::Ret,
    Op::Print,
    Op::Call,
    Op::Alloc,
    Op::Free,
    Op::Set,
    Op::Syscall,
    Op::Decl,
    Op::Multidecl,
    Op::Asm,
];

/// Terminator opcodes: exactly one closes every reachable basic block.
pub const TERMINATORS: &[Op] = &[Op::Br, Op::Jmp, Op::Ret];

impl Op {
    /// True for `Add`/`Sub`/`Mul`/`Div`/`Mod`.
    pub fn is_arithmetic(self) -> bool {
        ARITHMETIC.contains(&self)
    }

    /// True for the logical/comparison group.
    pub fn is_logical(self) -> bool {
        LOGICAL.contains(&self)
    }

    /// True for ops whose evaluation order and presence can never be
    /// dropped by dead-code elimination.
    pub fn is_side_effecting(self) -> bool {
        SIDE_EFFECTS.contains(&self)
    }

    /// True for the three opcodes allowed to end a basic block.
    pub fn is_terminator(self) -> bool {
        TERMINATORS.contains(&self)
    }

    /// True for ops whose two operands commute, and are therefore subject
    /// to canonicalization (operand-tuple sorted by name).
    ///
    /// Only the handful of commutative binary ops observed in the source
    /// are canonicalized: `Add`, `Mul`, `Eq`, `Neq`.
    pub fn is_commutative(self) -> bool {
        matches!(self, Op::Add | Op::Mul | Op::Eq | Op::Neq)
    }

    /// True for ops whose result depends purely on their operands, with no
    /// observable effect beyond producing a destination value. Used by
    /// local value numbering and very-busy-expressions to decide whether
    /// an instruction participates in value-key congruence at all.
    pub fn is_pure(self) -> bool {
        self.is_arithmetic() || self.is_logical() || matches!(self, Op::Lit)
    }

    /// True for the single-reference ops whose one reference is a borrow
    /// or ownership transfer rather than a plain value use.
    pub fn is_single_ref_ownership_op(self) -> bool {
        matches!(self, Op::Ref | Op::Brw | Op::Move | Op::Copy | Op::Alloc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_membership() {
        assert!(Op::Add.is_arithmetic());
        assert!(!Op::Eq.is_arithmetic());
    }

    #[test]
    fn side_effects_membership() {
        assert!(Op::Call.is_side_effecting());
        assert!(Op::Alloc.is_side_effecting());
        assert!(!Op::Add.is_side_effecting());
        assert!(!Op::Lit.is_side_effecting());
    }

    #[test]
    fn terminators_membership() {
        assert!(Op::Br.is_terminator());
        assert!(Op::Jmp.is_terminator());
        assert!(Op::Ret.is_terminator());
        assert!(Op::Ret.is_side_effecting());
        assert!(!Op::Add.is_terminator());
    }

    #[test]
    fn commutative_ops() {
        assert!(Op::Add.is_commutative());
        assert!(Op::Mul.is_commutative());
        assert!(!Op::Sub.is_commutative());
        assert!(!Op::Lt.is_commutative());
    }

    #[test]
    fn serde_roundtrip() {
        let op = Op::Add;
        let json = serde_json::to_string(&op).unwrap();
        let back: Op = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
