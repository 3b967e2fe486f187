//! Basic blocks and their local (single-block) transforms.
//!
//! A `BasicBlock` is a straight-line sequence of non-terminator
//! instructions followed by exactly one terminator. This module owns the
//! five per-block operations from the component design: `gen`/`use_`,
//! `canonicalize`, `to_ssa`, `dce`, and `lvn`. None of these need the
//! CFG -- they operate entirely within one block's instruction list,
//! which is why they live in the core rather than `lmlang-check`
//! (whose job starts once blocks need to be related to each other).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::instruction::{Instruction, Literal};
use crate::ops::Op;

/// An ordered sequence of instructions, terminated by exactly one
/// terminator, with an optional list of block-formal parameters (names
/// bound by predecessors' branch arguments, used by the textual IR's
/// `block ::= '$' label ...` form when blocks are parameterized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Instruction,
    pub parameters: Vec<String>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>, terminator: Instruction) -> Self {
        assert!(terminator.op.is_terminator(), "block terminator must be BR/JMP/RET");
        BasicBlock {
            label: label.into(),
            instructions: Vec::new(),
            terminator,
            parameters: Vec::new(),
        }
    }

    pub fn push(&mut self, instr: Instruction) {
        assert!(!instr.op.is_terminator(), "terminators must be set via `terminator`, not pushed");
        self.instructions.push(instr);
    }

    /// Names called via `Call` in this block, in order, duplicates
    /// included. Used by reachable-functions pruning.
    pub fn called_functions(&self) -> Vec<String> {
        self.instructions
            .iter()
            .filter(|i| i.op == Op::Call)
            .filter_map(|i| i.refs.first().cloned())
            .collect()
    }

    /// Destinations defined anywhere in this block.
    pub fn gen(&self) -> HashSet<String> {
        self.instructions
            .iter()
            .filter_map(|i| i.dest.clone())
            .collect()
    }

    /// Free variables read before being defined earlier in this block
    /// (a forward scan: a name used before its first local definition).
    pub fn use_(&self) -> HashSet<String> {
        let mut defined = HashSet::new();
        let mut used = HashSet::new();
        for instr in &self.instructions {
            for r in &instr.refs {
                if !defined.contains(r) {
                    used.insert(r.clone());
                }
            }
            if let Some(d) = &instr.dest {
                defined.insert(d.clone());
            }
        }
        for r in &self.terminator.refs {
            if !defined.contains(r) {
                used.insert(r.clone());
            }
        }
        used
    }

    /// Sorts the reference tuple of commutative ops (`Add`, `Mul`, `Eq`,
    /// `Neq`) lexicographically by name, giving a deterministic printed
    /// form. Idempotent: a second call leaves an already-sorted tuple
    /// unchanged.
    pub fn canonicalize(&mut self) {
        for instr in &mut self.instructions {
            if instr.op.is_commutative() && instr.refs.len() == 2 {
                instr.refs.sort();
            }
        }
    }

    /// Drops every `Nop` instruction from the block.
    pub fn remove_nop(&mut self) {
        self.instructions.retain(|i| i.op != Op::Nop);
    }

    /// Renames redefinitions inside this block so that each destination
    /// name appears at most once: the first definition of `x` keeps its
    /// name; every later redefinition is renamed to `x'k` with `k`
    /// starting at 0 and strictly increasing, and every subsequent use of
    /// `x` inside the same block is rewritten to the latest renamed
    /// form. Does not cross block boundaries.
    pub fn to_ssa(&mut self) {
        let mut version: HashMap<String, u32> = HashMap::new();
        let mut current_name: HashMap<String, String> = HashMap::new();
        let mut defined: HashSet<String> = HashSet::new();

        for instr in &mut self.instructions {
            for r in &mut instr.refs {
                if let Some(renamed) = current_name.get(r) {
                    *r = renamed.clone();
                }
            }
            if let Some(dest) = instr.dest.clone() {
                if defined.contains(&dest) {
                    let k = version.entry(dest.clone()).and_modify(|v| *v += 1).or_insert(0);
                    let renamed = format!("{dest}'{k}");
                    current_name.insert(dest.clone(), renamed.clone());
                    instr.dest = Some(renamed);
                } else {
                    defined.insert(dest);
                }
            }
        }
        for r in &mut self.terminator.refs {
            if let Some(renamed) = current_name.get(r) {
                *r = renamed.clone();
            }
        }
    }

    /// Removes instructions whose destination is unused by anything
    /// later in the block (including the terminator) and whose op is not
    /// side-effecting, unless the destination is in `keep`. NOPs are
    /// swept as part of this pass.
    ///
    /// Instructions without a destination are kept unless they are
    /// `Nop` -- there is nothing to prove "unused" about an op with no
    /// destination other than `Nop` itself (e.g. `Assign` writes through
    /// a pointer and is never eligible here even though it is not in the
    /// side-effecting set; only `Nop` is structurally dead by construction).
    pub fn dce(&mut self, keep: Option<&HashSet<String>>) {
        let mut needed: HashSet<String> = self.terminator.refs.iter().cloned().collect();
        if let Some(k) = keep {
            needed.extend(k.iter().cloned());
        }

        let mut kept_rev = Vec::with_capacity(self.instructions.len());
        for instr in self.instructions.drain(..).rev() {
            let keep_this = match &instr.dest {
                Some(d) => {
                    needed.contains(d)
                        || !instr.is_removable()
                        || keep.map(|k| k.contains(d)).unwrap_or(false)
                }
                None => instr.op != Op::Nop,
            };

            if keep_this {
                if let Some(d) = &instr.dest {
                    needed.remove(d);
                }
                for r in &instr.refs {
                    needed.insert(r.clone());
                }
                kept_rev.push(instr);
            }
        }
        kept_rev.reverse();
        self.instructions = kept_rev;
    }
}

/// A value number: an opaque identity shared by every instruction whose
/// computation is congruent (same op, same operand value-numbers).
pub type ValueNumber = u32;

/// Name -> value number, threaded across blocks by the LVN driver in
/// `lmlang-check` (seeded with function parameters before the entry
/// block runs).
pub type NumberEnv = HashMap<String, ValueNumber>;

/// A hashable literal payload, used as part of a `ValueKey` for `Lit`
/// instructions. Floats are compared by bit pattern so the key can
/// derive `Eq`/`Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Int(i64),
    Bool(bool),
    Str(String),
    FloatBits(u64),
}

impl From<&Literal> for LiteralKey {
    fn from(l: &Literal) -> Self {
        match l {
            Literal::Int(v) => LiteralKey::Int(*v),
            Literal::Bool(v) => LiteralKey::Bool(*v),
            Literal::Str(v) => LiteralKey::Str(v.clone()),
            Literal::Float(v) => LiteralKey::FloatBits(v.to_bits()),
        }
    }
}

/// The congruence key for local value numbering: `(op, operand numbers)`
/// for pure binary/unary ops, `(op, payload)` for `Lit`. Two
/// instructions with equal keys compute the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Lit(LiteralKey),
    Unary(Op, ValueNumber),
    Binary(Op, ValueNumber, ValueNumber),
}

/// The value-number table threaded through a function's LVN pass.
/// REF/MOVE/ALLOC instructions are never entered here -- each one
/// produces a distinct loan/allocation identity even when their operand
/// numbers collide, so deduplicating them would be unsound.
#[derive(Debug, Clone, Default)]
pub struct ValueTable {
    keys: HashMap<ValueKey, (ValueNumber, String)>,
    canonical_name: HashMap<ValueNumber, String>,
    next: ValueNumber,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh value number bound to no instruction shape in
    /// particular (used for parameters, and for instructions whose
    /// result isn't poolable).
    pub fn fresh(&mut self, canonical_name: impl Into<String>) -> ValueNumber {
        let n = self.next;
        self.next += 1;
        self.canonical_name.insert(n, canonical_name.into());
        n
    }
}

impl BasicBlock {
    /// Local value numbering, threaded with a table and name->number
    /// environment seeded by predecessors (or, for the entry block, by
    /// the function's parameters).
    ///
    /// For every pure instruction (`Lit`, arithmetic, logical): builds a
    /// value key; if an equal key is already bound, the instruction
    /// becomes `Nop` and its destination is bound to the existing
    /// number (so later refs resolve to the prior instruction's
    /// destination). Otherwise a fresh number is allocated and operand
    /// references are normalized to the canonical variable name for
    /// their number. Side-effecting and single-ref ownership
    /// instructions (`Ref`/`Move`/`Brw`/`Alloc`/`Call`/...) are never
    /// deduplicated; only their operand references are normalized.
    pub fn lvn(&mut self, table: &mut ValueTable, env: &mut NumberEnv) {
        for instr in &mut self.instructions {
            normalize_refs(&mut instr.refs, env, table);

            if !instr.op.is_pure() {
                if let Some(d) = &instr.dest {
                    let num = table.fresh(d.clone());
                    env.insert(d.clone(), num);
                }
                continue;
            }

            let Some(key) = value_key(instr, env) else {
                if let Some(d) = &instr.dest {
                    let num = table.fresh(d.clone());
                    env.insert(d.clone(), num);
                }
                continue;
            };

            if let Some(&(num, ref canon)) = table.keys.get(&key) {
                if let Some(d) = &instr.dest {
                    env.insert(d.clone(), num);
                }
                let _ = canon;
                *instr = Instruction::nop();
            } else if let Some(d) = instr.dest.clone() {
                let num = table.fresh(d.clone());
                table.keys.insert(key, (num, d.clone()));
                env.insert(d, num);
            }
        }
        normalize_refs(&mut self.terminator.refs, env, table);
    }
}

fn normalize_refs(refs: &mut [String], env: &NumberEnv, table: &ValueTable) {
    for r in refs.iter_mut() {
        if let Some(&num) = env.get(r) {
            if let Some(canon) = table.canonical_name.get(&num) {
                *r = canon.clone();
            }
        }
    }
}

fn value_key(instr: &Instruction, env: &NumberEnv) -> Option<ValueKey> {
    match instr.op {
        Op::Lit => match instr.args.first() {
            Some(crate::instruction::Arg::Literal(l)) => Some(ValueKey::Lit(LiteralKey::from(l))),
            _ => None,
        },
        op if op.is_arithmetic() || op.is_logical() => match instr.refs.as_slice() {
            [a] => env.get(a).map(|&na| ValueKey::Unary(op, na)),
            [a, b] => {
                let na = *env.get(a)?;
                let nb = *env.get(b)?;
                Some(ValueKey::Binary(op, na, nb))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    fn ret_block(label: &str) -> BasicBlock {
        BasicBlock::new(label, Instruction::ret(vec![]))
    }

    #[test]
    fn gen_and_use() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::add("y", "x", "z"));
        assert_eq!(b.gen(), HashSet::from(["x".to_string(), "y".to_string()]));
        assert_eq!(b.use_(), HashSet::from(["z".to_string()]));
    }

    #[test]
    fn canonicalize_sorts_commutative_refs() {
        let mut b = ret_block("entry");
        b.push(Instruction::add("z", "y", "x"));
        b.canonicalize();
        assert_eq!(b.instructions[0].refs, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let mut b = ret_block("entry");
        b.push(Instruction::add("z", "y", "x"));
        b.canonicalize();
        let after_first = b.instructions[0].refs.clone();
        b.canonicalize();
        assert_eq!(b.instructions[0].refs, after_first);
    }

    #[test]
    fn canonicalize_skips_non_commutative() {
        let mut b = ret_block("entry");
        b.push(Instruction::sub("z", "y", "x"));
        b.canonicalize();
        assert_eq!(b.instructions[0].refs, vec!["y".to_string(), "x".to_string()]);
    }

    #[test]
    fn to_ssa_renames_redefinitions() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::lit("x", Literal::Int(2)));
        b.push(Instruction::add("y", "x", "x"));
        b.to_ssa();
        assert_eq!(b.instructions[0].dest.as_deref(), Some("x"));
        assert_eq!(b.instructions[1].dest.as_deref(), Some("x'0"));
        assert_eq!(b.instructions[2].refs, vec!["x'0".to_string(), "x'0".to_string()]);
    }

    #[test]
    fn to_ssa_second_redefinition_increments() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::lit("x", Literal::Int(2)));
        b.push(Instruction::lit("x", Literal::Int(3)));
        b.to_ssa();
        assert_eq!(b.instructions[1].dest.as_deref(), Some("x'0"));
        assert_eq!(b.instructions[2].dest.as_deref(), Some("x'1"));
    }

    #[test]
    fn dce_removes_dead_code() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1))); // dead
        b.push(Instruction::lit("y", Literal::Int(2)));
        b.terminator = Instruction::ret(vec!["y".to_string()]);
        b.dce(None);
        assert_eq!(b.instructions.len(), 1);
        assert_eq!(b.instructions[0].dest.as_deref(), Some("y"));
    }

    #[test]
    fn dce_keeps_reused_variable() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::add("y", "x", "x"));
        b.terminator = Instruction::ret(vec!["y".to_string()]);
        b.dce(None);
        assert_eq!(b.instructions.len(), 2);
    }

    #[test]
    fn dce_keeps_side_effects() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::print("x"));
        b.dce(None);
        assert_eq!(b.instructions.len(), 2);
    }

    #[test]
    fn dce_respects_keep_set() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        let keep: HashSet<String> = HashSet::from(["x".to_string()]);
        b.dce(Some(&keep));
        assert_eq!(b.instructions.len(), 1);
    }

    #[test]
    fn lvn_removes_duplicate_values() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("a", Literal::Int(1)));
        b.push(Instruction::lit("b", Literal::Int(1)));
        b.push(Instruction::add("c", "a", "b"));
        let mut table = ValueTable::new();
        let mut env = NumberEnv::new();
        b.lvn(&mut table, &mut env);
        assert_eq!(b.instructions[1].op, Op::Nop);
        // c := a + a, both operands normalized to the canonical var "a"
        assert_eq!(b.instructions[2].refs, vec!["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn lvn_with_overwritten_variable() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::lit("x", Literal::Int(2)));
        let mut table = ValueTable::new();
        let mut env = NumberEnv::new();
        b.lvn(&mut table, &mut env);
        // Different literal values never collide into the same key.
        assert_ne!(b.instructions[0].op, Op::Nop);
        assert_ne!(b.instructions[1].op, Op::Nop);
    }

    #[test]
    fn lvn_never_deduplicates_ref_or_move() {
        let mut b = ret_block("entry");
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::reference("r1", "x"));
        b.push(Instruction::reference("r2", "x"));
        let mut table = ValueTable::new();
        let mut env = NumberEnv::new();
        b.lvn(&mut table, &mut env);
        assert_ne!(b.instructions[1].op, Op::Nop);
        assert_ne!(b.instructions[2].op, Op::Nop);
    }

    #[test]
    fn remove_nop_drops_nops() {
        let mut b = ret_block("entry");
        b.push(Instruction::nop());
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.remove_nop();
        assert_eq!(b.instructions.len(), 1);
    }
}
