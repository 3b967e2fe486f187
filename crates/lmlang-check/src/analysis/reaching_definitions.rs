//! Reaching definitions (§4.3): forward dataflow over `(name, defining
//! block label)` pairs, with a `None` label sentinel marking a
//! function-parameter definition (the `__init__` case).

use std::collections::HashSet;

use lmlang_core::{BlockId, Function};

use crate::dataflow::{Analysis, Direction};

/// A single reaching definition: the defined name and the label of the
/// block that defines it, or `None` for a function parameter.
pub type Def = (String, Option<String>);

pub struct ReachingDefinitions;

impl Analysis for ReachingDefinitions {
    type Domain = HashSet<Def>;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn init(&self) -> Self::Domain {
        HashSet::new()
    }

    fn entry_init(&self, function: &Function) -> Self::Domain {
        function.params.iter().map(|(name, _)| (name.clone(), None)).collect()
    }

    fn transfer(&self, function: &Function, block: BlockId, value: &Self::Domain) -> Self::Domain {
        let b = &function.blocks[block.index()];
        let defined = b.gen();
        let mut out: Self::Domain = value.iter().filter(|(n, _)| !defined.contains(n)).cloned().collect();
        out.extend(defined.into_iter().map(|n| (n, Some(b.label.clone()))));
        out
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
    use lmlang_core::{BasicBlock, Instruction, Literal, TypeId};

    #[test]
    fn parameter_definitions_seed_entry_with_sentinel() {
        let entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        let f = Function::new("f", vec![("p".to_string(), TypeId::I32)], vec![], vec![entry]);
        let results = run(&f, &ReachingDefinitions);
        assert!(results.in_at(BlockId(0)).contains(&("p".to_string(), None)));
    }

    #[test]
    fn definition_reaches_successor_when_not_redefined() {
        let mut entry = BasicBlock::new("entry", Instruction::jmp(1));
        entry.push(Instruction::lit("x", Literal::Int(1)));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let f = Function::new("f", vec![], vec![], vec![entry, end]);
        let results = run(&f, &ReachingDefinitions);
        assert!(results.in_at(BlockId(1)).contains(&("x".to_string(), Some("entry".to_string()))));
    }

    #[test]
    fn redefinition_kills_prior_reaching_def() {
        let mut entry = BasicBlock::new("entry", Instruction::jmp(1));
        entry.push(Instruction::lit("x", Literal::Int(1)));
        let mut redefine = BasicBlock::new("redefine", Instruction::jmp(2));
        redefine.push(Instruction::lit("x", Literal::Int(2)));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let f = Function::new("f", vec![], vec![], vec![entry, redefine, end]);
        let results = run(&f, &ReachingDefinitions);
        let end_in = results.in_at(BlockId(2));
        assert!(!end_in.contains(&("x".to_string(), Some("entry".to_string()))));
        assert!(end_in.contains(&("x".to_string(), Some("redefine".to_string()))));
    }
}
