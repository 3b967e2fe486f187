//! The six concrete analyses of §4.3, plus the two function-local
//! transforms that supplement them (static slicing, unreachable-block
//! pruning). Four of the six ([`ReachingDefinitions`], [`LiveVariables`],
//! [`VeryBusyExpressions`], [`Dominators`]) and constant propagation are
//! thin [`crate::dataflow::Analysis`] impls driven by [`crate::dataflow::run`];
//! interval analysis drives its own bounded worklist (see [`interval`]
//! for why).

pub mod constant_propagation;
pub mod dominators;
pub mod interval;
pub mod live_variables;
pub mod reaching_definitions;
pub mod slicing;
pub mod unreachable;
pub mod very_busy_expressions;

pub use constant_propagation::{rewrite_constants, ConstMap, ConstVal, ConstantPropagation};
pub use dominators::Dominators;
pub use interval::{run as run_interval_analysis, Interval, IntervalMap, IntervalResults};
pub use live_variables::LiveVariables;
pub use reaching_definitions::{Def, ReachingDefinitions};
pub use slicing::{slice, SliceSite};
pub use unreachable::prune_unreachable_blocks;
pub use very_busy_expressions::{ExprKey, VeryBusyExpressions};
