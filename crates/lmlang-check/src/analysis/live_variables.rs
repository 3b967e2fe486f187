//! Live variables (§4.3): backward dataflow built directly on
//! [`BasicBlock::gen`]/[`BasicBlock::use_`] -- `live_in = use ∪ (live_out
//! - gen)`.

use std::collections::HashSet;

use lmlang_core::{BlockId, Function};

use crate::dataflow::{Analysis, Direction};

pub struct LiveVariables;

impl Analysis for LiveVariables {
    type Domain = HashSet<String>;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn init(&self) -> Self::Domain {
        HashSet::new()
    }

    /// `value` here is the merged-from-successors value, i.e. the
    /// semantic `live_out[b]`; this produces the semantic `live_in[b]`.
    fn transfer(&self, function: &Function, block: BlockId, value: &Self::Domain) -> Self::Domain {
        let b = &function.blocks[block.index()];
        let mut live = value.clone();
        for d in b.gen() {
            live.remove(&d);
        }
        live.extend(b.use_());
        live
    }

    fn merge(&self, _function: &Function, _block: BlockId, values: Vec<&Self::Domain>) -> Self::Domain {
        values.into_iter().fold(HashSet::new(), |mut acc, v| {
            acc.extend(v.iter().cloned());
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::run;
    use lmlang_core::{BasicBlock, Instruction, Literal};

    /// §8 scenario 4: a diamond CFG's live sets.
    fn diamond() -> Function {
        let mut entry = BasicBlock::new("entry", Instruction::br("cond", 1, 2));
        entry.push(Instruction::lit("x", Literal::Int(34)));
        entry.push(Instruction::lit("y", Literal::Int(35)));
        entry.push(Instruction::gt("cond", "x", "y"));

        let mut left = BasicBlock::new("L", Instruction::jmp(3));
        left.push(Instruction::lit("one", Literal::Int(1)));
        left.push(Instruction::add("z", "x", "one"));

        let mut right = BasicBlock::new("R", Instruction::jmp(3));
        right.push(Instruction::add("z", "x", "x"));

        let mut end = BasicBlock::new("end", Instruction::ret(vec![]));
        end.push(Instruction::lit("zero", Literal::Int(0)));
        end.push(Instruction::add("x", "z", "zero"));
        end.push(Instruction::print("x"));

        Function::new("f", vec![], vec![], vec![entry, left, right, end])
    }

    #[test]
    fn diamond_live_sets_match_spec_scenario() {
        let f = diamond();
        let results = run(&f, &LiveVariables);

        assert!(results.in_at(BlockId(0)).is_empty());
        assert_eq!(results.in_at(BlockId(1)), &HashSet::from(["x".to_string()]));
        assert_eq!(results.in_at(BlockId(2)), &HashSet::from(["x".to_string()]));
        assert_eq!(results.in_at(BlockId(3)), &HashSet::from(["z".to_string()]));

        assert_eq!(results.out_at(BlockId(0)), &HashSet::from(["x".to_string()]));
        assert_eq!(results.out_at(BlockId(1)), &HashSet::from(["z".to_string()]));
        assert_eq!(results.out_at(BlockId(2)), &HashSet::from(["z".to_string()]));
        assert!(results.out_at(BlockId(3)).is_empty());
    }
}
