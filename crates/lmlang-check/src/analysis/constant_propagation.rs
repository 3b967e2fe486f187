//! Constant propagation (§4.3): per-variable abstract value in ℤ ∪ {?},
//! plus the follow-up rewrite pass that folds known destinations into
//! `LIT` instructions.

use std::collections::HashMap;

use lmlang_core::{Arg, BlockId, Function, Instruction, Literal, Op};

use crate::dataflow::{self, Analysis, Direction};

/// The lattice value for one variable: a known integer, or "not
/// statically known". A variable absent from the map entirely is
/// distinct from `Unknown` -- it means no predecessor has mentioned it,
/// which `merge` treats as compatible rather than forcing `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstVal {
    Known(i64),
    Unknown,
}

pub type ConstMap = HashMap<String, ConstVal>;

fn value_of(map: &ConstMap, name: &str) -> ConstVal {
    map.get(name).copied().unwrap_or(ConstVal::Unknown)
}

fn literal_int(lit: &Literal) -> Option<i64> {
    match lit {
        Literal::Int(v) => Some(*v),
        Literal::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

/// Applies one instruction's effect to a constant-value map.
fn eval_instruction(instr: &Instruction, state: &ConstMap) -> ConstMap {
    let mut out = state.clone();
    let Some(dest) = &instr.dest else { return out };

    let value = match instr.op {
        Op::Lit => match instr.args.first() {
            Some(Arg::Literal(l)) => literal_int(l).map(ConstVal::Known).unwrap_or(ConstVal::Unknown),
            _ => ConstVal::Unknown,
        },
        Op::Add | Op::Sub | Op::Mul | Op::Gt => match instr.refs.as_slice() {
            [a, b] => match (value_of(state, a), value_of(state, b)) {
                (ConstVal::Known(x), ConstVal::Known(y)) => {
                    let folded = match instr.op {
                        Op::Add => x.checked_add(y),
                        Op::Sub => x.checked_sub(y),
                        Op::Mul => x.checked_mul(y),
                        Op::Gt => Some((x > y) as i64),
                        _ => unreachable!(),
                    };
                    folded.map(ConstVal::Known).unwrap_or(ConstVal::Unknown)
                }
                _ => ConstVal::Unknown,
            },
            _ => ConstVal::Unknown,
        },
        _ => ConstVal::Unknown,
    };
    out.insert(dest.clone(), value);
    out
}

pub struct ConstantPropagation;

impl Analysis for ConstantPropagation {
    type Domain = ConstMap;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn init(&self) -> Self::Domain {
        HashMap::new()
    }

    fn transfer(&self, function: &Function, block: BlockId, value: &Self::Domain) -> Self::Domain {
        let b = &function.blocks[block.index()];
        let mut state = value.clone();
        for instr in &b.instructions {
            state = eval_instruction(instr, &state);
        }
        state
    }

    fn merge(&self, _function: &Function, _block: BlockId, values: Vec<&Self::Domain>) -> Self::Domain {
        let mut merged: ConstMap = HashMap::new();
        for v in values {
            for (name, val) in v.iter() {
                merged
                    .entry(name.clone())
                    .and_modify(|existing| {
                        if *existing != *val {
                            *existing = ConstVal::Unknown;
                        }
                    })
                    .or_insert(*val);
            }
        }
        merged
    }
}

/// Runs constant propagation and rewrites every instruction whose
/// destination is known, at the point it is defined, into a `LIT` of
/// that value. Instructions already `LIT` are left untouched.
pub fn rewrite_constants(function: &mut Function) {
    let results = dataflow::run(function, &ConstantPropagation);
    for (bi, block) in function.blocks.iter_mut().enumerate() {
        let mut state = results.in_at(BlockId(bi as u32)).clone();
        for instr in block.instructions.iter_mut() {
            let next = eval_instruction(instr, &state);
            if instr.op != Op::Lit {
                if let Some(dest) = &instr.dest {
                    if let Some(ConstVal::Known(v)) = next.get(dest) {
                        *instr = Instruction::lit(dest.clone(), Literal::Int(*v));
                    }
                }
            }
            state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::BasicBlock;

    #[test]
    fn literal_and_pure_arithmetic_fold_to_known_values() {
        let mut b = BasicBlock::new("entry", Instruction::ret(vec!["z".to_string()]));
        b.push(Instruction::lit("x", Literal::Int(2)));
        b.push(Instruction::lit("y", Literal::Int(3)));
        b.push(Instruction::add("z", "x", "y"));
        let f = Function::new("f", vec![], vec![], vec![b]);
        let results = dataflow::run(&f, &ConstantPropagation);
        assert_eq!(results.out_at(BlockId(0)).get("z"), Some(&ConstVal::Known(5)));
    }

    #[test]
    fn disagreeing_predecessors_merge_to_unknown() {
        let mut entry = BasicBlock::new("entry", Instruction::br("cond", 1, 2));
        entry.push(Instruction::lit("cond", Literal::Bool(true)));
        let mut left = BasicBlock::new("L", Instruction::jmp(3));
        left.push(Instruction::lit("x", Literal::Int(1)));
        let mut right = BasicBlock::new("R", Instruction::jmp(3));
        right.push(Instruction::lit("x", Literal::Int(2)));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let f = Function::new("f", vec![], vec![], vec![entry, left, right, end]);
        let results = dataflow::run(&f, &ConstantPropagation);
        assert_eq!(results.in_at(BlockId(3)).get("x"), Some(&ConstVal::Unknown));
    }

    #[test]
    fn rewrite_constants_folds_arithmetic_into_lit() {
        let mut b = BasicBlock::new("entry", Instruction::ret(vec!["z".to_string()]));
        b.push(Instruction::lit("x", Literal::Int(2)));
        b.push(Instruction::lit("y", Literal::Int(3)));
        b.push(Instruction::add("z", "x", "y"));
        let mut f = Function::new("f", vec![], vec![], vec![b]);
        rewrite_constants(&mut f);
        let rewritten = &f.blocks[0].instructions[2];
        assert_eq!(rewritten.op, Op::Lit);
        assert_eq!(rewritten.dest.as_deref(), Some("z"));
    }
}
