//! Module- and function-level transforms that run after type checking
//! and borrow checking succeed (§4.7): reachable-functions pruning and
//! automatic drop insertion. Unreachable-block pruning and static
//! slicing live in [`crate::analysis`] since they operate on a single
//! function's blocks without needing anything module-wide; this module
//! holds the two passes that either see the whole module or need their
//! own dedicated error type.

pub mod drop_insertion;
pub mod prune;

pub use drop_insertion::{insert_drops, LifetimeError};
pub use prune::prune_unreachable_functions;
