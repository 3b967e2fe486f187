//! The generic monotone dataflow framework (§4.2).
//!
//! A worklist engine parameterized over a finite-height lattice `Domain`
//! and the three functions [`Analysis::init`]/[`Analysis::transfer`]/
//! [`Analysis::merge`] that a concrete analysis supplies. The six
//! concrete analyses in [`crate::analysis`] are all thin [`Analysis`]
//! impls driven by [`run`].
//!
//! Grounded in the original prototype's `analyze` routine: the worklist
//! is FIFO, seeded with every block in insertion order, and a block is
//! re-enqueued only when its freshly computed value differs from the one
//! already recorded. The very first block the queue yields is
//! special-cased to receive the caller-supplied `init` directly rather
//! than going through `merge` -- there is nothing to merge yet on the
//! first pass. This makes iteration deterministic given the function's
//! fixed block insertion order (§5's ordering guarantee).

use std::collections::{HashMap, HashSet, VecDeque};

use lmlang_core::{BlockId, Cfg, Function};

/// Iteration direction for a concrete analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A monotone dataflow analysis over some per-block lattice `Domain`.
pub trait Analysis {
    type Domain: Clone + PartialEq;

    fn direction(&self) -> Direction;

    /// The default value assigned to every block before iteration starts.
    fn init(&self) -> Self::Domain;

    /// The value assigned to the entry block (forward) or an exit block
    /// (backward) instead of merging predecessors/successors that do not
    /// exist. Defaults to [`Analysis::init`]. Receives the function so
    /// analyses that seed the entry value from e.g. function parameters
    /// (reaching definitions' `__init__` sentinel) can do so.
    fn entry_init(&self, function: &Function) -> Self::Domain {
        let _ = function;
        self.init()
    }

    /// `out[b] = transfer(b, in[b])` for a forward analysis; the reverse
    /// role for a backward one (still receives the value merged from the
    /// neighbor side and produces the value propagated onward).
    fn transfer(&self, function: &Function, block: BlockId, value: &Self::Domain) -> Self::Domain;

    /// Combines the values flowing in from every predecessor
    /// (forward) or successor (backward) edge.
    fn merge(&self, function: &Function, block: BlockId, values: Vec<&Self::Domain>) -> Self::Domain;
}

/// The two maps a dataflow run produces, keyed by block. For a forward
/// analysis `in_values[b]` is the value before `b` runs and
/// `out_values[b]` the value after. For a backward analysis the same
/// naming holds semantically (`in` = block-entry value in the program's
/// forward sense) even though the engine computes `out` before `in`
/// internally.
pub struct Results<D> {
    pub in_values: HashMap<BlockId, D>,
    pub out_values: HashMap<BlockId, D>,
}

impl<D> Results<D> {
    pub fn in_at(&self, block: BlockId) -> &D {
        &self.in_values[&block]
    }

    pub fn out_at(&self, block: BlockId) -> &D {
        &self.out_values[&block]
    }
}

/// Runs `analysis` to a fixed point over `function`'s CFG.
pub fn run<A: Analysis>(function: &Function, analysis: &A) -> Results<A::Domain> {
    let cfg = Cfg::build(function);
    let n = function.blocks.len();
    let dir = analysis.direction();

    // `computed_in`/`computed_out` here are in the engine's own
    // merge-then-transfer order, which only matches the *semantic*
    // in/out naming for a forward analysis; see the swap below.
    let mut computed_in: Vec<A::Domain> = (0..n).map(|_| analysis.init()).collect();
    let mut computed_out: Vec<A::Domain> = (0..n).map(|_| analysis.init()).collect();

    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut queued: HashSet<usize> = (0..n).collect();
    let mut first = true;

    while let Some(bi) = queue.pop_front() {
        queued.remove(&bi);
        let block = BlockId(bi as u32);
        let incoming = neighbors_in(&cfg, block, dir);

        let in_val = if first || incoming.is_empty() {
            analysis.entry_init(function)
        } else {
            let refs: Vec<&A::Domain> = incoming.iter().map(|p| &computed_out[p.index()]).collect();
            analysis.merge(function, block, refs)
        };
        first = false;

        computed_in[bi] = in_val.clone();
        let out_val = analysis.transfer(function, block, &in_val);

        if out_val != computed_out[bi] {
            computed_out[bi] = out_val;
            for succ in neighbors_out(&cfg, block, dir) {
                if queued.insert(succ.index()) {
                    queue.push_back(succ.index());
                }
            }
        }
    }

    let mut in_values = HashMap::new();
    let mut out_values = HashMap::new();
    for i in 0..n {
        let block = BlockId(i as u32);
        match dir {
            Direction::Forward => {
                in_values.insert(block, computed_in[i].clone());
                out_values.insert(block, computed_out[i].clone());
            }
            // Backward: the engine's "in" (merged from successors) is the
            // semantic out[b]; its "out" (transferred) is the semantic in[b].
            Direction::Backward => {
                in_values.insert(block, computed_out[i].clone());
                out_values.insert(block, computed_in[i].clone());
            }
        }
    }

    Results { in_values, out_values }
}

fn neighbors_in(cfg: &Cfg, block: BlockId, dir: Direction) -> Vec<BlockId> {
    match dir {
        Direction::Forward => cfg.predecessors(block),
        Direction::Backward => cfg.successors(block),
    }
}

fn neighbors_out(cfg: &Cfg, block: BlockId, dir: Direction) -> Vec<BlockId> {
    match dir {
        Direction::Forward => cfg.successors(block),
        Direction::Backward => cfg.predecessors(block),
    }
}
