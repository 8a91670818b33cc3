//! # Color Value Resolution
//!
//! Answers the protocol's central question: how many units of asset A does
//! output O carry? The answer is computed by walking the transaction graph
//! backward from O to A's genesis, applying A's kernel at every hop, and
//! memoizing every intermediate result so the second question about the
//! same history is free.
//!
//! The engine is read-mostly and safely shared: the cache is the only
//! mutable state, entries are permanent once written (the ledger does not
//! rewrite history), and concurrent queries over overlapping subgraphs
//! collapse into single computations.

pub mod engine;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::AssetDefinition;
use crate::config::{DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_RESOLUTION_DEPTH};
use crate::graph::{GraphError, OutPoint, TxId};

pub use engine::ColorResolver;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Runtime knobs for the resolution engine.
///
/// An explicit value handed to [`ColorResolver::new`] — never ambient
/// process state. Defaults come from [`crate::config`].
#[derive(Clone, Copy, Debug)]
pub struct ResolverConfig {
    /// Ceiling on backward-traversal depth. The graph is acyclic, so this
    /// only exists to fail loudly on pathological data.
    pub max_depth: u32,
    /// Cap on concurrent transaction fetches during resolution fan-out.
    pub max_concurrent_fetches: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

// ---------------------------------------------------------------------------
// Status & result
// ---------------------------------------------------------------------------

/// Where a color computation stands.
///
/// `Resolved` with value zero is meaningful — the output exists, can carry
/// color, and carries none of this asset. `Uncolorable` means the output
/// can never carry this asset's color: structurally ineligible, or inside
/// a transaction the kernel refuses to interpret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorStatus {
    /// A computation for this output is in flight.
    Pending,
    /// The color value is known.
    Resolved,
    /// The output cannot carry this asset's color.
    Uncolorable,
}

/// The answer to one resolution query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutput {
    /// The queried output.
    pub outpoint: OutPoint,
    /// The asset it was queried under.
    pub asset: AssetDefinition,
    /// Color value; zero unless `status` is [`ColorStatus::Resolved`].
    pub value: u64,
    /// Computation outcome.
    pub status: ColorStatus,
}

impl ResolvedOutput {
    /// `true` when the output carries a nonzero amount of the asset.
    pub fn is_colored(&self) -> bool {
        self.status == ColorStatus::Resolved && self.value > 0
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures that abort a resolution.
///
/// `Clone` so one in-flight computation can hand the same failure to every
/// caller that collapsed onto it. Protocol violations are *not* errors —
/// they resolve to [`ColorStatus::Uncolorable`] and affect only their own
/// subgraph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A referenced transaction is missing from the graph source. This is
    /// a data-availability problem and always reaches the caller; it is
    /// never downgraded to "no color".
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxId),

    /// Backward traversal exceeded the configured depth ceiling.
    #[error("resolution exceeded the depth limit of {limit}")]
    DepthExceeded {
        /// The configured [`ResolverConfig::max_depth`].
        limit: u32,
    },

    /// The graph backend failed, or an in-flight computation disappeared
    /// without reporting.
    #[error("resolution backend error: {0}")]
    Backend(String),
}

impl From<GraphError> for ResolveError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownTransaction(txid) => ResolveError::UnknownTransaction(txid),
            GraphError::Backend(msg) => ResolveError::Backend(msg),
        }
    }
}
