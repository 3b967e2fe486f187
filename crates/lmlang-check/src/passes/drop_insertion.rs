//! Automatic drop insertion (§4.7): for every `Alloc` destination, finds
//! the one block where it is safe to insert a matching `Free` and does
//! so, without requiring the surface language to ever write `free`
//! itself.
//!
//! Placement rule (§9 open question, resolved here): let `S` be every
//! block reachable from the allocating block `B` (inclusive) -- the
//! subgraph of blocks `B`'s allocation can still be live in. Starting
//! from the highest-indexed block in `S`, walk backward through `S`'s
//! internal predecessor edges (ties broken by highest index) until
//! landing on a block whose *every* predecessor in the whole function,
//! not just in `S`, is itself inside `S`. Such a block is only ever
//! reached by a path that already executed `B`, so freeing there can't
//! run on a path where the value was never allocated, and no walk from
//! `B` can reach it twice without passing back through `B` first (ruling
//! out a double free via re-entry). If `B` itself is reachable from
//! within `S` -- the allocation sits on a loop back-edge and could
//! re-execute before any candidate drop point is reached -- or no block
//! in `S` satisfies the predecessor condition, placement is ambiguous
//! and the function is rejected with [`LifetimeError`].

use std::collections::HashSet;

use lmlang_core::{BlockId, Cfg, Function, Op};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifetimeError {
    #[error("cannot determine a unique free point for '{name}' allocated in function '{function}'")]
    AmbiguousDropPoint { function: String, name: String },
}

fn reachable_from(cfg: &Cfg, start: BlockId) -> HashSet<BlockId> {
    let mut seen = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(b) = stack.pop() {
        for s in cfg.successors(b) {
            if seen.insert(s) {
                stack.push(s);
            }
        }
    }
    seen
}

fn find_drop_point(cfg: &Cfg, subgraph: &HashSet<BlockId>) -> Option<BlockId> {
    let mut current = *subgraph.iter().max()?;
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(current) {
            return None;
        }
        let preds = cfg.predecessors(current);
        if preds.iter().all(|p| subgraph.contains(p)) {
            return Some(current);
        }
        match preds.iter().filter(|p| subgraph.contains(p) && **p != current).max().copied() {
            Some(next) => current = next,
            None => return None,
        }
    }
}

/// Inserts a `Free` for every `Alloc` destination in `function`,
/// immediately before the terminator of its computed drop point.
/// Idempotent: rerunning on an already-processed function is a no-op,
/// since every allocation's drop point already holds its `Free`.
pub fn insert_drops(function: &mut Function) -> Result<(), LifetimeError> {
    let cfg = Cfg::build(function);

    let allocs: Vec<(BlockId, String)> = function
        .blocks
        .iter()
        .enumerate()
        .flat_map(|(bi, block)| {
            block
                .instructions
                .iter()
                .filter(|i| i.op == Op::Alloc)
                .filter_map(|i| i.dest.clone())
                .map(move |name| (BlockId(bi as u32), name))
        })
        .collect();

    for (origin, name) in allocs {
        let subgraph = reachable_from(&cfg, origin);

        let reenters_origin = cfg.predecessors(origin).iter().any(|p| subgraph.contains(p));
        if reenters_origin {
            return Err(LifetimeError::AmbiguousDropPoint { function: function.name.clone(), name });
        }

        let drop_block = find_drop_point(&cfg, &subgraph).ok_or_else(|| LifetimeError::AmbiguousDropPoint {
            function: function.name.clone(),
            name: name.clone(),
        })?;

        let block = &mut function.blocks[drop_block.index()];
        let already_freed = block.instructions.iter().any(|i| i.op == Op::Free && i.refs.first() == Some(&name));
        if !already_freed {
            block.push(lmlang_core::Instruction::free(name));
        }
    }

    function.invalidate_cfg();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::{BasicBlock, Instruction, Op};

    #[test]
    fn straight_line_alloc_is_freed_before_return() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::alloc("p", "8"));
        entry.push(Instruction::print("p"));
        let mut f = Function::new("f", vec![], vec![], vec![entry]);

        insert_drops(&mut f).unwrap();

        let last = f.blocks[0].instructions.last().unwrap();
        assert_eq!(last.op, Op::Free);
        assert_eq!(last.refs, vec!["p".to_string()]);
    }

    #[test]
    fn alloc_before_a_diamond_is_freed_at_the_join() {
        let mut entry = BasicBlock::new("entry", Instruction::br("cond", 1, 2));
        entry.push(Instruction::alloc("p", "8"));
        entry.push(Instruction::lit("cond", lmlang_core::Literal::Bool(true)));
        let left = BasicBlock::new("left", Instruction::jmp(3));
        let right = BasicBlock::new("right", Instruction::jmp(3));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let mut f = Function::new("f", vec![], vec![], vec![entry, left, right, end]);

        insert_drops(&mut f).unwrap();

        assert!(f.blocks[1].instructions.iter().all(|i| i.op != Op::Free));
        assert!(f.blocks[2].instructions.iter().all(|i| i.op != Op::Free));
        let join = &f.blocks[3];
        assert_eq!(join.instructions.last().unwrap().op, Op::Free);
    }

    #[test]
    fn alloc_inside_a_loop_body_is_rejected() {
        let entry = BasicBlock::new("entry", Instruction::jmp(1));
        let mut header = BasicBlock::new("header", Instruction::br("cond", 2, 3));
        header.push(Instruction::lit("cond", lmlang_core::Literal::Bool(true)));
        let mut body = BasicBlock::new("body", Instruction::jmp(1));
        body.push(Instruction::alloc("p", "8"));
        let end = BasicBlock::new("end", Instruction::ret(vec![]));
        let mut f = Function::new("f", vec![], vec![], vec![entry, header, body, end]);

        let err = insert_drops(&mut f).unwrap_err();
        assert!(matches!(err, LifetimeError::AmbiguousDropPoint { .. }));
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::alloc("p", "8"));
        let mut f = Function::new("f", vec![], vec![], vec![entry]);

        insert_drops(&mut f).unwrap();
        insert_drops(&mut f).unwrap();

        let frees = f.blocks[0].instructions.iter().filter(|i| i.op == Op::Free).count();
        assert_eq!(frees, 1);
    }
}
