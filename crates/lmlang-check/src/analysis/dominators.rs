//! Dominators (§4.3): forward iterative intersection.
//! `dom[entry] = {entry}`; `dom[n] = {n} ∪ ∩{dom[p] | p ∈ pred(n)}`.

use std::collections::HashSet;

use lmlang_core::{BlockId, Function};

use crate::dataflow::{Analysis, Direction};

/// Dominators, with the function's full block set precomputed so
/// [`Analysis::init`] can start every not-yet-visited block at the
/// intersection lattice's top ("every block dominates me") rather than
/// the empty set -- necessary for correct convergence on functions with
/// back edges (loops), where a loop-body block's first merge would
/// otherwise see an unvisited predecessor's default and prematurely
/// shrink to the empty set.
pub struct Dominators {
    all_blocks: HashSet<BlockId>,
}

impl Dominators {
    pub fn new(function: &Function) -> Self {
        let all_blocks = (0..function.blocks.len()).map(|i| BlockId(i as u32)).collect();
        Dominators { all_blocks }
    }
}

impl Analysis for Dominators {
    type Domain = HashSet<BlockId>;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn init(&self) -> Self::Domain {
        self.all_blocks.clone()
    }

    fn entry_init(&self, _function: &Function) -> Self::Domain {
        HashSet::from([BlockId(0)])
    }

    fn transfer(&self, _function: &Function, block: BlockId, value: &Self::Domain) -> Self::Domain {
        let mut dom = value.clone();
        dom.insert(block);
        dom
    }

    fn merge(&self, _function: &Function, _block: BlockId, values: Vec<&Self::Domain>) -> Self::Domain {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.all_blocks.clone();
        };
        let mut acc = first.clone();
        for v in iter {
            acc.retain(|b| v.contains(b));
        }
        acc
    }
}
