//! The static type checker (§4.4-§4.5): coercion/subtyping rules, error
//! diagnostics, and the per-function/per-module type rule resolver.

pub mod coercion;
pub mod diagnostics;
pub mod rules;

pub use coercion::{can_coerce, common_numeric_type, is_float, is_integer, is_numeric, is_numeric_or_bool, is_subtype, peer_resolve};
pub use diagnostics::{FixSuggestion, TypeError};
pub use rules::{check_function, check_module, TypingEnv};
