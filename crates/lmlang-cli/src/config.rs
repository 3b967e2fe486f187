//! Pipeline configuration: which optional passes run and the caps
//! placed on the bounded analyses.

/// Controls which of the optional module/function passes the `check`
/// subcommand runs, and bounds the iterative analyses that don't
/// terminate on a fixed lattice height by construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Run reachable-functions pruning before type checking.
    pub prune: bool,
    /// Run automatic drop insertion after borrow checking succeeds.
    pub insert_drops: bool,
    /// Run unreachable-block pruning plus local DCE/LVN/canonicalize.
    pub optimize: bool,
    /// Upper bound on interval analysis's widening iterations before it
    /// gives up and falls back to the unbounded interval for any
    /// variable that hasn't stabilized.
    pub interval_iteration_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { prune: false, insert_drops: false, optimize: false, interval_iteration_cap: 50 }
    }
}
