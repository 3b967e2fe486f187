//! Reachable-functions pruning (§4.7): drop every function not
//! transitively reachable from `main`, via
//! [`lmlang_core::Module::reachable_from_main`].

use lmlang_core::Module;

/// Removes every function unreachable from `main`, returning the removed
/// names (unspecified order) and logging them at `info` level. Functions
/// are dropped outright rather than marked dead -- nothing downstream
/// (type checker, borrow checker, emitter) ever sees them.
pub fn prune_unreachable_functions(module: &mut Module) -> Vec<String> {
    let reachable = module.reachable_from_main();
    let removed: Vec<String> = module
        .functions
        .keys()
        .filter(|name| !reachable.contains(*name))
        .cloned()
        .collect();

    for name in &removed {
        module.functions.remove(name);
    }

    if !removed.is_empty() {
        tracing::info!(removed = ?removed, "pruned unreachable functions");
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::{BasicBlock, Function, Instruction};

    fn leaf(name: &str) -> Function {
        Function::new(name, vec![], vec![], vec![BasicBlock::new("entry", Instruction::ret(vec![]))])
    }

    /// §8 scenario 6.
    #[test]
    fn unreachable_function_is_removed_and_reported() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::call("_", "used", vec![]));
        let mut module = Module::new("m");
        module.insert_function(Function::new("main", vec![], vec![], vec![entry]));
        module.insert_function(leaf("used"));
        module.insert_function(leaf("unused"));

        let removed = prune_unreachable_functions(&mut module);

        assert_eq!(removed, vec!["unused".to_string()]);
        assert!(module.functions.contains_key("main"));
        assert!(module.functions.contains_key("used"));
        assert!(!module.functions.contains_key("unused"));
    }

    #[test]
    fn fully_reachable_module_is_left_unchanged() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::call("_", "used", vec![]));
        let mut module = Module::new("m");
        module.insert_function(Function::new("main", vec![], vec![], vec![entry]));
        module.insert_function(leaf("used"));

        let removed = prune_unreachable_functions(&mut module);

        assert!(removed.is_empty());
        assert_eq!(module.functions.len(), 2);
    }
}
