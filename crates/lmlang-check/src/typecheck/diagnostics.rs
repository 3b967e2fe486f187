//! Type error diagnostics with rich context fields and fix suggestions.
//!
//! [`TypeError`] captures enough context for every type error to be acted
//! on without re-walking the function: which function/block/instruction is
//! involved, expected vs actual types, and an optional fix suggestion.

use lmlang_core::TypeId;
use serde::{Deserialize, Serialize};

/// A type error detected during static type checking.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum TypeError {
    /// An instruction's operand carries a type incompatible with what its
    /// opcode requires.
    #[error(
        "type mismatch in function '{function}' block '{block}' instruction {index}: expected {expected}, got {actual}"
    )]
    TypeMismatch {
        function: String,
        block: String,
        index: usize,
        expected: TypeId,
        actual: TypeId,
        suggestion: Option<FixSuggestion>,
    },

    /// A reference named a value with no recorded type (used before its
    /// defining instruction was typed, or the name does not exist).
    #[error("untyped reference '{name}' in function '{function}' block '{block}' instruction {index}")]
    UntypedReference {
        function: String,
        block: String,
        index: usize,
        name: String,
    },

    /// An instruction received the wrong number of operands for its opcode.
    #[error(
        "wrong operand count in function '{function}' block '{block}' instruction {index}: expected {expected}, got {actual}"
    )]
    WrongOperandCount {
        function: String,
        block: String,
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// A type ID referenced by an instruction is not registered.
    #[error("unknown type: {type_id} not found in registry")]
    UnknownType { type_id: TypeId },

    /// A non-numeric type was used where an arithmetic operation requires
    /// a numeric type.
    #[error(
        "non-numeric type {type_id} used in arithmetic operation in function '{function}' block '{block}' instruction {index}"
    )]
    NonNumericArithmetic {
        function: String,
        block: String,
        index: usize,
        type_id: TypeId,
    },

    /// A non-boolean type was used where a boolean condition is required
    /// (an `And`/`Or`/`Not` operand, or a `Br` condition).
    #[error("non-boolean condition in function '{function}' block '{block}': expected Bool, got {actual}")]
    NonBooleanCondition {
        function: String,
        block: String,
        actual: TypeId,
    },

    /// Two operands of a binary op have incompatible types and no common
    /// numeric type could be found.
    #[error(
        "incompatible operand types in function '{function}' block '{block}' instruction {index}: {lhs} vs {rhs}"
    )]
    IncompatibleOperands {
        function: String,
        block: String,
        index: usize,
        lhs: TypeId,
        rhs: TypeId,
    },

    /// A call site's argument count does not match the callee's arity.
    #[error(
        "wrong argument count calling '{callee}' in function '{function}' block '{block}': expected {expected}, got {actual}"
    )]
    WrongArgumentCount {
        function: String,
        block: String,
        callee: String,
        expected: usize,
        actual: usize,
    },

    /// A call references a function name with no declaration in the module.
    #[error("call to undeclared function '{callee}' in function '{function}' block '{block}'")]
    UndeclaredCallee {
        function: String,
        block: String,
        callee: String,
    },

    /// After both passes of §4.5's bidirectional inference, a destination
    /// still carries `Inferred`. A hard error, reported against the
    /// producing instruction's token.
    #[error(
        "unresolved type for '{name}' in function '{function}' block '{block}' instruction {index}: still Inferred after type checking"
    )]
    InferredNotResolved {
        function: String,
        block: String,
        index: usize,
        name: String,
    },

    /// An `Init` instruction supplied a different number of field values
    /// than its target struct type declares.
    #[error(
        "wrong field count initializing struct '{struct_name}' in function '{function}' block '{block}' instruction {index}: expected {expected}, got {actual}"
    )]
    WrongInitArity {
        function: String,
        block: String,
        index: usize,
        struct_name: String,
        expected: usize,
        actual: usize,
    },

    /// An `Access`/`Dot` instruction named a field that does not exist on
    /// the object's type.
    #[error(
        "unknown field '{field}' on type {type_id} in function '{function}' block '{block}' instruction {index}"
    )]
    UnknownField {
        function: String,
        block: String,
        index: usize,
        type_id: TypeId,
        field: String,
    },

    /// An `As` cast's source type is not a subtype of the cast's target
    /// type.
    #[error(
        "invalid cast in function '{function}' block '{block}' instruction {index}: {from} is not a subtype of {to}"
    )]
    InvalidCast {
        function: String,
        block: String,
        index: usize,
        from: TypeId,
        to: TypeId,
    },

    /// A `Ret` instruction in a non-module function returned a different
    /// number of values than `function.returns` declares.
    #[error(
        "wrong return arity in function '{function}' block '{block}': expected {expected}, got {actual}"
    )]
    WrongReturnArity {
        function: String,
        block: String,
        expected: usize,
        actual: usize,
    },

    /// An `Index` instruction's object type is neither a `Pointer` nor an
    /// `Array`.
    #[error("type {type_id} is not indexable in function '{function}' block '{block}' instruction {index}")]
    NotIndexable {
        function: String,
        block: String,
        index: usize,
        type_id: TypeId,
    },
}

/// A suggested fix for a type error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSuggestion {
    /// Insert an `As` cast between the two types.
    InsertCast { from: TypeId, to: TypeId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_message_is_readable() {
        let e = TypeError::TypeMismatch {
            function: "f".into(),
            block: "entry".into(),
            index: 2,
            expected: TypeId::I32,
            actual: TypeId::BOOL,
            suggestion: Some(FixSuggestion::InsertCast { from: TypeId::BOOL, to: TypeId::I32 }),
        };
        assert!(e.to_string().contains("type mismatch"));
    }
}
