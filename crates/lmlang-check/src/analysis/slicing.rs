//! Static program slicing (§4.3): a single reverse pass, not a
//! fixed-point analysis, computing the instructions that transitively
//! affect a target name.

use std::collections::HashSet;

use lmlang_core::{BlockId, Function};

/// One kept instruction site within a slice: a block and the index of
/// the instruction within [`lmlang_core::BasicBlock::instructions`].
/// Terminators are always part of the slice and are not enumerated
/// here -- callers that need them can read `function.blocks[b].terminator`
/// directly for every block touched by the slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceSite {
    pub block: BlockId,
    pub instruction_index: usize,
}

/// Walks `function` once, from the last block to the first and, within
/// each block, from its terminator back to its first instruction,
/// keeping any instruction whose destination is already known to affect
/// `target` (seeded with `target` itself) or whose side effect touches
/// a name already known to matter. Every kept instruction's references
/// are added to the affected set, growing it as the walk proceeds
/// backward.
pub fn slice(function: &Function, target: &str) -> HashSet<SliceSite> {
    let mut effected: HashSet<String> = HashSet::from([target.to_string()]);
    let mut kept = HashSet::new();

    for (bi, block) in function.blocks.iter().enumerate().rev() {
        let block_id = BlockId(bi as u32);

        // Terminators are always retained and unconditionally contribute
        // their references -- they can always affect whether the sliced
        // fragment's blocks are reachable at all.
        effected.extend(block.terminator.refs.iter().cloned());

        for (ii, instr) in block.instructions.iter().enumerate().rev() {
            let defines_effected = instr.dest.as_deref().is_some_and(|d| effected.contains(d));
            let side_effecting_and_touches = instr.op.is_side_effecting() && instr.refs.iter().any(|r| effected.contains(r));

            if defines_effected || side_effecting_and_touches {
                kept.insert(SliceSite { block: block_id, instruction_index: ii });
                effected.extend(instr.refs.iter().cloned());
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::{BasicBlock, Instruction, Literal};

    #[test]
    fn slice_keeps_only_instructions_feeding_the_target() {
        let mut b = BasicBlock::new("entry", Instruction::ret(vec!["z".to_string()]));
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::lit("unrelated", Literal::Int(99)));
        b.push(Instruction::add("z", "x", "x"));
        let f = Function::new("f", vec![], vec![], vec![b]);

        let site = slice(&f, "z");
        // index 0 = lit x (feeds z via add), index 1 = lit unrelated
        // (dropped), index 2 = add z,x,x (defines target directly).
        assert!(site.contains(&SliceSite { block: BlockId(0), instruction_index: 0 }));
        assert!(!site.contains(&SliceSite { block: BlockId(0), instruction_index: 1 }));
        assert!(site.contains(&SliceSite { block: BlockId(0), instruction_index: 2 }));
    }

    #[test]
    fn side_effecting_instruction_kept_when_it_touches_the_target() {
        let mut b = BasicBlock::new("entry", Instruction::ret(vec![]));
        b.push(Instruction::lit("x", Literal::Int(1)));
        b.push(Instruction::print("x"));
        let f = Function::new("f", vec![], vec![], vec![b]);

        let site = slice(&f, "x");
        assert!(site.contains(&SliceSite { block: BlockId(0), instruction_index: 1 }));
        assert!(site.contains(&SliceSite { block: BlockId(0), instruction_index: 0 }));
    }
}
