//! Very busy expressions (§4.3): a backward MUST analysis over syntactic
//! expression keys, pre-LVN (keyed on operand *names*, not value
//! numbers -- [`lmlang_core::BasicBlock::lvn`]'s value-number keys are
//! private to the core and serve a different, congruence-based purpose).

use std::collections::HashSet;

use lmlang_core::{Instruction, Literal, Op};

use crate::dataflow::{Analysis, Direction};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LitBits {
    Int(i64),
    Bool(bool),
    Str(String),
    FloatBits(u64),
}

impl From<&Literal> for LitBits {
    fn from(l: &Literal) -> Self {
        match l {
            Literal::Int(v) => LitBits::Int(*v),
            Literal::Bool(v) => LitBits::Bool(*v),
            Literal::Str(v) => LitBits::Str(v.clone()),
            Literal::Float(v) => LitBits::FloatBits(v.to_bits()),
        }
    }
}

/// A syntactic value key: `(op, operand, operand?)` for arithmetic, or
/// the literal payload for `Lit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKey {
    Lit(LitBits),
    Unary(Op, String),
    Binary(Op, String, String),
}

fn expr_key(instr: &Instruction) -> Option<ExprKey> {
    match instr.op {
        Op::Lit => match instr.args.first() {
            Some(lmlang_core::Arg::Literal(l)) => Some(ExprKey::Lit(LitBits::from(l))),
            _ => None,
        },
        op if op.is_arithmetic() => match instr.refs.as_slice() {
            [a] => Some(ExprKey::Unary(op, a.clone())),
            [a, b] => Some(ExprKey::Binary(op, a.clone(), b.clone())),
            _ => None,
        },
        _ => None,
    }
}

fn key_mentions(key: &ExprKey, name: &str) -> bool {
    match key {
        ExprKey::Lit(_) => false,
        ExprKey::Unary(_, a) => a == name,
        ExprKey::Binary(_, a, b) => a == name || b == name,
    }
}

/// Very busy expressions, with the function-wide universe precomputed
/// once so both [`Analysis::init`] and [`Analysis::entry_init`] -- which
/// for a MUST/intersection analysis must start at the lattice top, not
/// bottom -- can return it without per-call recomputation.
pub struct VeryBusyExpressions {
    universe: HashSet<ExprKey>,
}

impl VeryBusyExpressions {
    pub fn new(function: &lmlang_core::Function) -> Self {
        let mut universe = HashSet::new();
        for block in &function.blocks {
            for instr in &block.instructions {
                if let Some(k) = expr_key(instr) {
                    universe.insert(k);
                }
            }
        }
        VeryBusyExpressions { universe }
    }
}

impl Analysis for VeryBusyExpressions {
    type Domain = HashSet<ExprKey>;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn init(&self) -> Self::Domain {
        self.universe.clone()
    }

    fn entry_init(&self, _function: &lmlang_core::Function) -> Self::Domain {
        self.universe.clone()
    }

    fn transfer(&self, function: &lmlang_core::Function, block: lmlang_core::BlockId, value: &Self::Domain) -> Self::Domain {
        let b = &function.blocks[block.index()];
        let mut set = value.clone();
        for instr in b.instructions.iter().rev() {
            if !(instr.op.is_arithmetic() || instr.op == Op::Lit) {
                continue;
            }
            if let Some(d) = &instr.dest {
                set.retain(|k| !key_mentions(k, d));
            }
            if let Some(k) = expr_key(instr) {
                set.insert(k);
            }
        }
        set
    }

    fn merge(&self, _function: &lmlang_core::Function, _block: lmlang_core::BlockId, values: Vec<&Self::Domain>) -> Self::Domain {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else { return self.universe.clone() };
        let mut acc = first.clone();
        for v in iter {
            acc.retain(|k| v.contains(k));
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::run;
    use lmlang_core::{BasicBlock, BlockId, Function};

    #[test]
    fn expression_recomputed_on_both_branches_is_very_busy_at_entry() {
        // entry: br cond L R ; L: z := x + y ; jmp end ; R: z := x + y ; jmp end ; end: ret
        let entry = BasicBlock::new("entry", Instruction::br("cond", 1, 2));
        let mut left = BasicBlock::new("L", Instruction::jmp(3));
        left.push(Instruction::add("z", "x", "y"));
        let mut right = BasicBlock::new("R", Instruction::jmp(3));
        right.push(Instruction::add("z", "x", "y"));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let f = Function::new("f", vec![], vec![], vec![entry, left, right, end]);

        let analysis = VeryBusyExpressions::new(&f);
        let results = run(&f, &analysis);
        let entry_out = results.out_at(BlockId(0));
        assert!(entry_out.contains(&ExprKey::Binary(Op::Add, "x".to_string(), "y".to_string())));
    }

    #[test]
    fn destination_overwrite_kills_dependent_keys() {
        let mut b = BasicBlock::new("entry", Instruction::ret(vec![]));
        b.push(Instruction::lit("x", Literal::Int(9)));
        b.push(Instruction::add("y", "x", "x"));
        let f = Function::new("f", vec![], vec![], vec![b]);
        let analysis = VeryBusyExpressions::new(&f);
        let results = run(&f, &analysis);
        // `x` is redefined before the `add` reads it, so "x + x" computed
        // with the block-entry value of `x` is not guaranteed anywhere.
        assert!(!results.in_at(BlockId(0)).contains(&ExprKey::Binary(Op::Add, "x".to_string(), "x".to_string())));
    }
}
