//! Stable ID newtype used by the IR.
//!
//! `BlockId` is the one identity the core crate needs: a basic block's
//! position is a stable handle that the CFG built over a `Function`
//! (in `lmlang-check`) can bridge to a petgraph `NodeIndex` without the
//! rest of the core depending on petgraph at all.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Identifies a basic block by its position within `Function::blocks`.
///
/// `blocks[0]` is always the entry block. Successor positions stored in
/// terminators (`Br`/`Jmp`) are `BlockId` values, not labels -- labels
/// are for humans and textual IR, `BlockId` is what the engine walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for BlockId {
    fn from(i: usize) -> Self {
        BlockId(i as u32)
    }
}

// Bridge to petgraph's NodeIndex<u32>, used by the CFG graph in lmlang-check.

impl From<NodeIndex<u32>> for BlockId {
    fn from(idx: NodeIndex<u32>) -> Self {
        BlockId(idx.index() as u32)
    }
}

impl From<BlockId> for NodeIndex<u32> {
    fn from(id: BlockId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_display() {
        assert_eq!(format!("{}", BlockId(3)), "3");
    }

    #[test]
    fn block_id_from_usize() {
        assert_eq!(BlockId::from(7usize), BlockId(7));
        assert_eq!(BlockId(7).index(), 7);
    }

    #[test]
    fn block_id_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(42);
        let id = BlockId::from(idx);
        assert_eq!(id.0, 42);
        let back: NodeIndex<u32> = id.into();
        assert_eq!(back.index(), 42);
    }

    #[test]
    fn serde_roundtrip() {
        let id = BlockId(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
