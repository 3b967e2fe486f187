//! The borrow checker (§4.6): a CFG-sensitive ownership/loan state
//! tracker. `state` is the per-variable decision procedure executed
//! instruction-by-instruction inside one block; this module drives it
//! over a whole function, merging loan state at CFG join points
//! (reconciling the two views the spec calls out: the per-variable
//! `State` machine is the actual transfer function, and the
//! `HashMap<name, State>` threaded between blocks is its CFG-merge
//! encoding -- one mechanism, not two).

pub mod state;

use std::collections::{HashMap, HashSet, VecDeque};

use lmlang_core::{BasicBlock, BlockId, Cfg, Function, Op};

use crate::analysis::LiveVariables;
use crate::dataflow;

pub use state::{BorrowConflict, State};
use state::rank;

/// The per-variable state map threaded between blocks.
pub type Loans = HashMap<String, State>;

fn current(loans: &Loans, name: &str) -> State {
    loans.get(name).cloned().unwrap_or(State::Owning)
}

/// Whether `name` is referenced by any instruction in `block.instructions[from..]`
/// or by the block's terminator -- the "later use in the current block"
/// test that gates exclusive-borrow conflicts per §4.6.
fn used_later(block: &BasicBlock, from: usize, name: &str) -> bool {
    block.instructions[from..].iter().any(|i| i.refs.iter().any(|r| r == name))
        || block.terminator.refs.iter().any(|r| r == name)
}

/// Runs the single-block borrow-check step (§4.1's `borrow_check(loans,
/// live)`): applies every instruction's ownership transition in order,
/// returning the resulting loan state or the first conflict found.
pub fn borrow_check_block(block: &BasicBlock, loans: Loans) -> Result<Loans, BorrowConflict> {
    let mut state = loans;

    for (i, instr) in block.instructions.iter().enumerate() {
        match instr.op {
            Op::Move => {
                let src = &instr.refs[0];
                let dest = instr.dest.clone().expect("MOVE always has a destination");
                match current(&state, src) {
                    State::Moved(to) => return Err(BorrowConflict::UseAfterMove { name: src.clone(), moved_to: to }),
                    State::ExclusivelyBorrowed(by) | State::SharedBorrowed(by) => {
                        return Err(BorrowConflict::MoveWhileBorrowed { name: src.clone(), by });
                    }
                    _ => {}
                }
                state.insert(dest.clone(), State::Owning);
                state.insert(src.clone(), State::Moved(dest));
            }
            Op::Brw => {
                let src = &instr.refs[0];
                let dest = instr.dest.clone().expect("BRW always has a destination");
                match current(&state, src) {
                    State::Moved(to) => return Err(BorrowConflict::UseAfterMove { name: src.clone(), moved_to: to }),
                    State::ExclusivelyBorrowed(by) if used_later(block, i + 1, &by) => {
                        return Err(BorrowConflict::SharedBorrowWhileExclusivelyBorrowed { dest, src: src.clone(), by });
                    }
                    _ => {}
                }
                state.insert(dest.clone(), State::SharedBorrowing(src.clone()));
                state.insert(src.clone(), State::SharedBorrowed(dest));
            }
            Op::Ref => {
                let src = &instr.refs[0];
                let dest = instr.dest.clone().expect("REF always has a destination");
                match current(&state, src) {
                    State::Moved(to) => return Err(BorrowConflict::UseAfterMove { name: src.clone(), moved_to: to }),
                    State::SharedBorrowed(by) if used_later(block, i + 1, &by) => {
                        return Err(BorrowConflict::ExclusiveBorrowWhileSharedBorrowed { dest, src: src.clone(), by });
                    }
                    State::ExclusivelyBorrowed(by) if used_later(block, i + 1, &by) => {
                        return Err(BorrowConflict::ExclusiveBorrowWhileExclusivelyBorrowed { dest, src: src.clone(), by });
                    }
                    _ => {}
                }
                state.insert(dest.clone(), State::ExclusivelyBorrowing(src.clone()));
                state.insert(src.clone(), State::ExclusivelyBorrowed(dest));
            }
            _ => {
                for r in &instr.refs {
                    if let State::Moved(to) = current(&state, r) {
                        return Err(BorrowConflict::UseAfterMove { name: r.clone(), moved_to: to });
                    }
                }
                if let Some(dest) = &instr.dest {
                    state.insert(dest.clone(), State::Owning);
                }
            }
        }
    }

    for r in &block.terminator.refs {
        if let State::Moved(to) = current(&state, r) {
            return Err(BorrowConflict::UseAfterMove { name: r.clone(), moved_to: to });
        }
    }

    Ok(state)
}

/// Pointwise merge of incoming loan maps at a CFG join: for each name
/// live at `live_in`, keeps the most conservative state observed across
/// predecessors (see [`state::rank`]). Names not live at block entry are
/// dropped -- a dead loan cannot be violated.
fn merge_loans(preds: &[BlockId], out_states: &[Loans], live_in: &HashSet<String>) -> Loans {
    let mut merged: Loans = HashMap::new();
    for p in preds {
        for (name, s) in &out_states[p.index()] {
            if !live_in.contains(name) {
                continue;
            }
            merged
                .entry(name.clone())
                .and_modify(|existing| {
                    if rank(s) > rank(existing) {
                        *existing = s.clone();
                    }
                })
                .or_insert_with(|| s.clone());
        }
    }
    merged
}

/// Drives [`borrow_check_block`] over every block of `function` in CFG
/// order, merging loan state at join points with
/// [`crate::analysis::LiveVariables`]'s in-sets. Forward; the first
/// conflict found short-circuits the whole traversal.
pub fn borrow_check_function(function: &Function) -> Result<(), BorrowConflict> {
    let cfg = Cfg::build(function);
    let live = dataflow::run(function, &LiveVariables);
    let n = function.blocks.len();

    let mut out_states: Vec<Loans> = vec![HashMap::new(); n];
    let mut visited = vec![false; n];
    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut queued: HashSet<usize> = (0..n).collect();

    while let Some(bi) = queue.pop_front() {
        queued.remove(&bi);
        let block = BlockId(bi as u32);
        let preds = cfg.predecessors(block);

        let in_loans = if preds.is_empty() {
            HashMap::new()
        } else {
            merge_loans(&preds, &out_states, live.in_at(block))
        };

        let result = borrow_check_block(&function.blocks[bi], in_loans)?;

        if !visited[bi] || result != out_states[bi] {
            visited[bi] = true;
            out_states[bi] = result;
            for succ in cfg.successors(block) {
                if queued.insert(succ.index()) {
                    queue.push_back(succ.index());
                }
            }
        }
    }

    Ok(())
}


#[cfg(test)]
mod proptests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::{merge_loans, State};
    use lmlang_core::BlockId;

    proptest! {
        /// The merge at a CFG join must not depend on the order
        /// `predecessors()` happens to return -- only on which states are
        /// present, since the worklist in `borrow_check_function` makes no
        /// promise about visiting predecessors in any particular order.
        #[test]
        fn merge_loans_is_order_independent(rotate in 0usize..4) {
            let preds: Vec<BlockId> = (0..4).map(BlockId).collect();
            let mut out_states = vec![HashMap::new(), HashMap::new(), HashMap::new(), HashMap::new()];
            out_states[0].insert("x".to_string(), State::Owning);
            out_states[1].insert("x".to_string(), State::Moved("y".to_string()));
            out_states[2].insert("x".to_string(), State::SharedBorrowing("y".to_string()));
            out_states[3].insert("x".to_string(), State::Owning);
            let live_in = std::collections::HashSet::from(["x".to_string()]);

            let baseline = merge_loans(&preds, &out_states, &live_in);

            let mut rotated_preds = preds.clone();
            rotated_preds.rotate_left(rotate);
            let rotated = merge_loans(&rotated_preds, &out_states, &live_in);

            prop_assert_eq!(baseline.get("x"), rotated.get("x"));
        }
    }
}
