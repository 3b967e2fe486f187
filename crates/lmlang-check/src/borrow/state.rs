//! Per-variable ownership state (§4.6): the decision procedure executed
//! instruction-by-instruction inside one block, used both standalone
//! (single-block tests) and as the transfer function the CFG wrapper in
//! [`super::borrow_check_function`] drives over the whole function.

use thiserror::Error;

/// A variable's ownership state at some point in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Owning,
    Moved(String),
    SharedBorrowing(String),
    SharedBorrowed(String),
    ExclusivelyBorrowing(String),
    ExclusivelyBorrowed(String),
}

/// How conservatively a state should be treated when two CFG
/// predecessors disagree on a variable's state at a join point: higher
/// wins. There is no precise path-sensitive model here -- a variable
/// merged from a `Moved` path and an `Owning` path is treated as `Moved`,
/// since accepting it could let a later use slip through on the path
/// where it actually was moved.
pub(super) fn rank(state: &State) -> u8 {
    match state {
        State::Owning => 0,
        State::SharedBorrowing(_) | State::SharedBorrowed(_) => 1,
        State::ExclusivelyBorrowing(_) | State::ExclusivelyBorrowed(_) => 2,
        State::Moved(_) => 3,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BorrowConflict {
    #[error("Cannot use moved value '{name}', it was moved to '{moved_to}'")]
    UseAfterMove { name: String, moved_to: String },

    #[error("'{dest}' cannot mutably borrow '{src}'; '{src}' already shared borrowed by '{by}'")]
    ExclusiveBorrowWhileSharedBorrowed { dest: String, src: String, by: String },

    #[error("'{dest}' cannot mutably borrow '{src}'; '{src}' already mutably borrowed by '{by}'")]
    ExclusiveBorrowWhileExclusivelyBorrowed { dest: String, src: String, by: String },

    #[error("'{dest}' cannot share borrow '{src}'; '{src}' already mutably borrowed by '{by}'")]
    SharedBorrowWhileExclusivelyBorrowed { dest: String, src: String, by: String },

    #[error("cannot move '{name}'; it is currently borrowed by '{by}'")]
    MoveWhileBorrowed { name: String, by: String },
}
