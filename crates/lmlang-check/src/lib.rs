//! Semantic analysis over [`lmlang_core`] IR (§4): the generic monotone
//! dataflow framework, the concrete analyses built on it, the type
//! checker, the borrow checker, and the passes that run once both have
//! accepted a function.

pub mod analysis;
pub mod borrow;
pub mod dataflow;
pub mod passes;
pub mod typecheck;

pub use borrow::{borrow_check_block, borrow_check_function, BorrowConflict, Loans};
pub use dataflow::{run, Analysis, Direction, Results};
pub use passes::{insert_drops, prune_unreachable_functions, LifetimeError};
pub use typecheck::{check_function, check_module, TypeError, TypingEnv};
