//! The control-flow graph built over one function's blocks.
//!
//! Construction scans each block's terminator: `Br` contributes two
//! successor edges (true, false), `Jmp` contributes one, `Ret`
//! contributes none. Block positions double as petgraph node indices
//! (block `i` is always node `i`), so [`crate::id::BlockId`]'s existing
//! `NodeIndex` bridge is all the plumbing this needs.
//!
//! `Cfg` is deliberately the only thing in the core that reaches for
//! petgraph directly -- the dataflow engine and concrete analyses in
//! `lmlang-check` only ever call `predecessors`/`successors`/`entry`.

use petgraph::graph::DiGraph;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::function::Function;
use crate::id::BlockId;
use crate::ops::Op;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cfg {
    #[serde(with = "cfg_graph_serde")]
    graph: DiGraph<BlockId, ()>,
}

impl Cfg {
    /// Builds the CFG for `function` from its blocks' terminators.
    pub fn build(function: &Function) -> Self {
        let mut graph = DiGraph::<BlockId, ()>::new();
        for i in 0..function.blocks.len() {
            graph.add_node(BlockId(i as u32));
        }
        for (i, block) in function.blocks.iter().enumerate() {
            let from = BlockId(i as u32).into();
            match block.terminator.op {
                Op::Br => {
                    let (t, f) = block.terminator.branch_targets();
                    graph.add_edge(from, BlockId(t).into(), ());
                    graph.add_edge(from, BlockId(f).into(), ());
                }
                Op::Jmp => {
                    let t = block.terminator.jump_target();
                    graph.add_edge(from, BlockId(t).into(), ());
                }
                Op::Ret => {}
                other => unreachable!("non-terminator op {other:?} in terminator position"),
            }
        }
        Cfg { graph }
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Predecessors of `block`, sorted by block position for determinism
    /// (insertion order, per the ordering guarantee in the concurrency
    /// section).
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let mut v: Vec<BlockId> = self
            .graph
            .neighbors_directed(block.into(), Direction::Incoming)
            .map(BlockId::from)
            .collect();
        v.sort();
        v
    }

    /// Successors of `block`, sorted by block position.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let mut v: Vec<BlockId> = self
            .graph
            .neighbors_directed(block.into(), Direction::Outgoing)
            .map(BlockId::from)
            .collect();
        v.sort();
        v
    }

    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }
}

mod cfg_graph_serde {
    use petgraph::graph::DiGraph;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::id::BlockId;

    pub fn serialize<S: Serializer>(graph: &DiGraph<BlockId, ()>, s: S) -> Result<S::Ok, S::Error> {
        let edges: Vec<(u32, u32)> = graph
            .raw_edges()
            .iter()
            .map(|e| (e.source().index() as u32, e.target().index() as u32))
            .collect();
        (graph.node_count() as u32, edges).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DiGraph<BlockId, ()>, D::Error> {
        let (node_count, edges): (u32, Vec<(u32, u32)>) = Deserialize::deserialize(d)?;
        let mut graph = DiGraph::<BlockId, ()>::new();
        for i in 0..node_count {
            graph.add_node(BlockId(i));
        }
        for (from, to) in edges {
            graph.add_edge(BlockId(from).into(), BlockId(to).into(), ());
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    fn diamond() -> Function {
        let mut entry = crate::block::BasicBlock::new("entry", Instruction::br("cond", 1, 2));
        entry.push(Instruction::lit("cond", crate::instruction::Literal::Bool(true)));
        let left = crate::block::BasicBlock::new("L", Instruction::jmp(3));
        let right = crate::block::BasicBlock::new("R", Instruction::jmp(3));
        let end = crate::block::BasicBlock::new("end", Instruction::ret(vec![]));
        Function::new("f", vec![], vec![], vec![entry, left, right, end])
    }

    #[test]
    fn br_produces_two_successors() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        assert_eq!(cfg.successors(BlockId(0)), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn end_block_has_two_predecessors() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        assert_eq!(cfg.predecessors(BlockId(3)), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn ret_has_no_successors() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        assert!(cfg.successors(BlockId(3)).is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Cfg = serde_json::from_str(&json).unwrap();
        assert_eq!(back.successors(BlockId(0)), cfg.successors(BlockId(0)));
    }
}
