//! The top-level container: a mapping from function name to [`Function`],
//! an interned data pool of literal payloads, an inlined-constants table,
//! a user-defined types table, and an imports table.
//!
//! The module's own name doubles as its entry function's name
//! (`is_module = true, is_main = true` at the top level), matching the
//! way a whole program is itself one more function in this IR.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::function::Function;
use crate::instruction::Literal;
use crate::type_id::TypeId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: HashMap<String, Function>,
    /// Interned literal payloads, addressed by `Arg::DataPoolIndex`.
    pub data_pool: Vec<Literal>,
    /// Inlined named constants, resolved at parse/check time rather than
    /// re-evaluated per use.
    pub constants: HashMap<String, Literal>,
    /// User-defined (nominal) types, by name, into the type registry.
    pub user_types: HashMap<String, TypeId>,
    /// Other modules this one imports, keyed by import path.
    pub imports: HashMap<String, Module>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            functions: HashMap::new(),
            data_pool: Vec::new(),
            constants: HashMap::new(),
            user_types: HashMap::new(),
            imports: HashMap::new(),
        }
    }

    /// Interns `literal` into the data pool, returning its index. Does
    /// not deduplicate -- two equal literals used at different sites get
    /// distinct pool slots, mirroring how distinct call sites stay
    /// distinct under local value numbering.
    pub fn intern(&mut self, literal: Literal) -> u32 {
        self.data_pool.push(literal);
        (self.data_pool.len() - 1) as u32
    }

    pub fn data_at(&self, index: u32) -> Option<&Literal> {
        self.data_pool.get(index as usize)
    }

    pub fn insert_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    /// Marks `name` as this module's entry function (`is_module = true`)
    /// and, when `main`, as the program's `main` entry (`is_main = true`).
    pub fn mark_entry(&mut self, name: &str) -> Result<(), CoreError> {
        let is_main = name == "main";
        let f = self
            .functions
            .get_mut(name)
            .ok_or_else(|| CoreError::UnknownName {
                name: name.to_string(),
                function: self.name.clone(),
                block: String::new(),
            })?;
        f.is_module = true;
        f.is_main = is_main;
        Ok(())
    }

    /// Every function reachable from `main` by direct `Call` references,
    /// transitively. Used by the reachable-functions pruning pass.
    pub fn reachable_from_main(&self) -> std::collections::HashSet<String> {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec!["main".to_string()];
        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(f) = self.functions.get(&name) {
                for block in &f.blocks {
                    for callee in block.called_functions() {
                        if !seen.contains(&callee) {
                            stack.push(callee);
                        }
                    }
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BasicBlock;
    use crate::instruction::Instruction;

    fn leaf_function(name: &str) -> Function {
        Function::new(
            name,
            vec![],
            vec![],
            vec![BasicBlock::new("entry", Instruction::ret(vec![]))],
        )
    }

    #[test]
    fn intern_does_not_deduplicate() {
        let mut m = Module::new("m");
        let a = m.intern(Literal::Int(1));
        let b = m.intern(Literal::Int(1));
        assert_ne!(a, b);
        assert_eq!(m.data_pool.len(), 2);
    }

    #[test]
    fn mark_entry_sets_flags() {
        let mut m = Module::new("m");
        m.insert_function(leaf_function("main"));
        m.mark_entry("main").unwrap();
        assert!(m.function("main").unwrap().is_module);
        assert!(m.function("main").unwrap().is_main);
    }

    #[test]
    fn mark_entry_unknown_name_errors() {
        let mut m = Module::new("m");
        assert!(matches!(m.mark_entry("nope"), Err(CoreError::UnknownName { .. })));
    }

    #[test]
    fn reachable_from_main_excludes_unused() {
        let mut m = Module::new("m");
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::call("_", "used", vec![]));
        m.insert_function(Function::new("main", vec![], vec![], vec![entry]));
        m.insert_function(leaf_function("used"));
        m.insert_function(leaf_function("unused"));
        let reachable = m.reachable_from_main();
        assert!(reachable.contains("main"));
        assert!(reachable.contains("used"));
        assert!(!reachable.contains("unused"));
    }
}
