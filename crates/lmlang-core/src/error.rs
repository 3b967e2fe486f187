//! Core error types.
//!
//! The core crate only ever raises the structural slice of the error
//! taxonomy: malformed IR, unknown names, duplicate type registrations,
//! and internal-invariant violations. `TypeError`, `BorrowConflict` and
//! `LifetimeError` are raised by `lmlang-check`, which depends on this
//! crate rather than the other way around.

use thiserror::Error;

use crate::type_id::TypeId;

/// Errors produced by the lmlang-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to register a type name that already exists in the registry.
    #[error("duplicate type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A TypeId was not found in the type registry.
    #[error("type not found: {id}")]
    TypeNotFound { id: TypeId },

    /// A basic block references a successor position that does not exist.
    #[error("function '{function}': block '{block}' has an out-of-range successor index {index}")]
    InvalidSuccessor {
        function: String,
        block: String,
        index: usize,
    },

    /// Two blocks in the same function share a label.
    #[error("function '{function}': duplicate block label '{label}'")]
    DuplicateBlockLabel { function: String, label: String },

    /// A reachable block has no terminator, or a non-terminator op was
    /// found in terminator position (or vice versa).
    #[error("function '{function}': block '{block}' is malformed: {reason}")]
    MalformedBlock {
        function: String,
        block: String,
        reason: String,
    },

    /// An instruction's arg/ref arity did not match its opcode's
    /// required shape. Should be unreachable given the smart
    /// constructors, but is validated defensively on IR handed in from
    /// outside the core (e.g. the textual front end).
    #[error("instruction '{op:?}' has invalid arity: {reason}")]
    InvalidArity { op: String, reason: String },

    /// A reference named a variable not defined anywhere visible to the
    /// current basic block.
    #[error("unknown name '{name}' referenced in function '{function}', block '{block}'")]
    UnknownName {
        name: String,
        function: String,
        block: String,
    },

    /// An assertion-style internal invariant was violated. Surfaced as an
    /// error rather than a panic so driver code can still attribute it to
    /// a function/pass, but it always indicates a core bug, not bad input.
    #[error("internal invariant violated in {context}: {reason}")]
    InternalInvariant { context: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let e = CoreError::UnknownName {
            name: "x".into(),
            function: "f".into(),
            block: "entry".into(),
        };
        assert_eq!(
            e.to_string(),
            "unknown name 'x' referenced in function 'f', block 'entry'"
        );
    }
}
