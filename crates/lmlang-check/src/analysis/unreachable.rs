//! Unreachable-block pruning (§4.3/§4.7 supplement, grounded in the
//! original prototype's `remove_unreachable_blocks`): a forward
//! reachability walk from `blocks[0]` that drops any block the walk
//! never visits, renumbering surviving `Br`/`Jmp` targets to match the
//! compacted block list.

use std::collections::{HashMap, HashSet, VecDeque};

use lmlang_core::{Arg, Function, Op};

fn successors(function: &Function, index: usize) -> Vec<usize> {
    let term = &function.blocks[index].terminator;
    match term.op {
        Op::Br => {
            let (t, f) = term.branch_targets();
            vec![t as usize, f as usize]
        }
        Op::Jmp => vec![term.jump_target() as usize],
        _ => vec![],
    }
}

/// Removes every block unreached from `blocks[0]`, remaps the surviving
/// blocks' terminator targets, and invalidates the cached CFG. Not run
/// implicitly by the type checker or borrow checker -- callers opt in
/// alongside DCE/LVN/canonicalize.
pub fn prune_unreachable_blocks(function: &mut Function) {
    let n = function.blocks.len();
    if n == 0 {
        return;
    }

    let mut reachable = HashSet::from([0usize]);
    let mut queue = VecDeque::from([0usize]);
    while let Some(i) = queue.pop_front() {
        for s in successors(function, i) {
            if reachable.insert(s) {
                queue.push_back(s);
            }
        }
    }

    if reachable.len() == n {
        return;
    }

    let mut remap: HashMap<usize, u32> = HashMap::new();
    for i in 0..n {
        if reachable.contains(&i) {
            remap.insert(i, remap.len() as u32);
        }
    }

    let mut blocks = Vec::with_capacity(reachable.len());
    for (i, block) in function.blocks.drain(..).enumerate() {
        if reachable.contains(&i) {
            blocks.push(block);
        }
    }

    for block in &mut blocks {
        match block.terminator.op {
            Op::Br => {
                let (t, f) = block.terminator.branch_targets();
                block.terminator.args = vec![Arg::BlockIndex(remap[&(t as usize)]), Arg::BlockIndex(remap[&(f as usize)])];
            }
            Op::Jmp => {
                let t = block.terminator.jump_target();
                block.terminator.args = vec![Arg::BlockIndex(remap[&(t as usize)])];
            }
            _ => {}
        }
    }

    function.blocks = blocks;
    function.invalidate_cfg();
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::{BasicBlock, Instruction};

    #[test]
    fn dead_block_is_removed_and_targets_renumbered() {
        let entry = BasicBlock::new("entry", Instruction::jmp(2));
        let dead = BasicBlock::new("dead", Instruction::ret(vec![]));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let mut f = Function::new("f", vec![], vec![], vec![entry, dead, end]);

        prune_unreachable_blocks(&mut f);

        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.blocks[0].label, "entry");
        assert_eq!(f.blocks[1].label, "end");
        assert_eq!(f.blocks[0].terminator.jump_target(), 1);
    }

    #[test]
    fn fully_reachable_function_is_left_unchanged() {
        let entry = BasicBlock::new("entry", Instruction::jmp(1));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let mut f = Function::new("f", vec![], vec![], vec![entry, end]);
        prune_unreachable_blocks(&mut f);
        assert_eq!(f.blocks.len(), 2);
    }
}
