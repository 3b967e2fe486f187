//! Functions: ordered blocks with parameters, return types, and a
//! lazily-built, explicitly-cached CFG.

use serde::{Deserialize, Serialize};

use crate::block::BasicBlock;
use crate::cfg::Cfg;
use crate::error::CoreError;
use crate::id::BlockId;
use crate::type_id::TypeId;

/// A function's formal parameter: a name paired with its declared type.
pub type Param = (String, TypeId);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Vec<Param>,
    /// Ordered list of basic blocks; `blocks[0]` is always the entry
    /// block.
    pub blocks: Vec<BasicBlock>,
    /// True when this function is itself a module's top-level entry
    /// (the module's own name doubles as this function's name).
    pub is_module: bool,
    /// True for the program's `main` entry point.
    pub is_main: bool,
    /// Cached CFG, explicitly invalidated (set back to `None`) by any
    /// pass that reorders or adds/removes blocks. Not automatically
    /// kept in sync -- see the concurrency/resource model's caching note.
    #[serde(skip)]
    pub cfg_cache: Option<Cfg>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        returns: Vec<Param>,
        blocks: Vec<BasicBlock>,
    ) -> Self {
        Function {
            name: name.into(),
            params,
            returns,
            blocks,
            is_module: false,
            is_main: false,
            cfg_cache: None,
        }
    }

    pub fn entry_block(&self) -> &BasicBlock {
        &self.blocks[0]
    }

    pub fn block_at(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub fn block_at_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index())
    }

    pub fn block_index_of(&self, label: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.label == label)
            .map(BlockId::from)
    }

    /// Returns the cached CFG, building and caching it first if absent.
    pub fn cfg(&mut self) -> &Cfg {
        if self.cfg_cache.is_none() {
            self.cfg_cache = Some(Cfg::build(self));
        }
        self.cfg_cache.as_ref().unwrap()
    }

    /// Drops the cached CFG. Must be called by any pass that reorders,
    /// inserts, or removes blocks before the next `cfg()` call.
    pub fn invalidate_cfg(&mut self) {
        self.cfg_cache = None;
    }

    /// Re-validates structural invariants: unique block labels, and
    /// every `Br`/`Jmp` successor position pointing at a real block.
    /// The parser is trusted to have produced valid IR; this exists for
    /// IR handed in from elsewhere (the textual front end, or hand-built
    /// fixtures) and for passes to self-check after mutating blocks.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = std::collections::HashSet::new();
        for block in &self.blocks {
            if !seen.insert(block.label.clone()) {
                return Err(CoreError::DuplicateBlockLabel {
                    function: self.name.clone(),
                    label: block.label.clone(),
                });
            }
        }
        let n = self.blocks.len() as u32;
        for block in &self.blocks {
            let targets: Vec<u32> = match block.terminator.op {
                crate::ops::Op::Br => {
                    let (t, f) = block.terminator.branch_targets();
                    vec![t, f]
                }
                crate::ops::Op::Jmp => vec![block.terminator.jump_target()],
                crate::ops::Op::Ret => vec![],
                other => {
                    return Err(CoreError::MalformedBlock {
                        function: self.name.clone(),
                        block: block.label.clone(),
                        reason: format!("terminator slot holds non-terminator op {other:?}"),
                    })
                }
            };
            for t in targets {
                if t >= n {
                    return Err(CoreError::InvalidSuccessor {
                        function: self.name.clone(),
                        block: block.label.clone(),
                        index: t as usize,
                    });
                }
            }
        }
        Ok(())
    }
}
