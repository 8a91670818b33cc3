//! # The resolution engine
//!
//! Recursive backward traversal with two layers of memoization:
//!
//! 1. a **per-output color cache** keyed by (outpoint, kernel, genesis) —
//!    the permanent record of every answer ever computed, and
//! 2. a **fetch memo** keyed by txid — each transaction is pulled from the
//!    graph source at most once per resolver, however many queries need it.
//!
//! Both layers are fronted by single-flight registries: the first request
//! for a key becomes the leader and spawns the computation, later requests
//! subscribe to the leader's broadcast instead of duplicating work.
//! Computations run in spawned tasks, so a caller that abandons its query
//! leaves the shared work running to completion — the cache still gets
//! populated for whoever asks next.
//!
//! Errors are never cached. A transaction missing today may be indexed
//! tomorrow, and a permanent record of a transient failure would be wrong.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{try_join_all, BoxFuture};
use tokio::sync::{watch, Semaphore};

use crate::asset::AssetDefinition;
use crate::graph::{LedgerTransaction, OutPoint, TransactionGraph, TxId};
use crate::kernel::{KernelId, KernelVerdict};

use super::{ColorStatus, ResolveError, ResolvedOutput, ResolverConfig};

// ---------------------------------------------------------------------------
// Cache keys & entries
// ---------------------------------------------------------------------------

/// Cache key for one output's color under one asset.
///
/// The genesis is part of the key: two assets sharing a kernel but not a
/// genesis must never share cached values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct OutputKey {
    outpoint: OutPoint,
    kernel: KernelId,
    genesis: OutPoint,
}

/// Single-flight key for one transaction's whole-output computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeKey {
    txid: TxId,
    kernel: KernelId,
    genesis: OutPoint,
}

/// A finished cache entry. `status` is always `Resolved` or `Uncolorable`;
/// pending work lives in the in-flight registries, not the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CachedColor {
    value: u64,
    status: ColorStatus,
}

impl CachedColor {
    const UNCOLORABLE: CachedColor = CachedColor {
        value: 0,
        status: ColorStatus::Uncolorable,
    };
}

type NodeResult = Result<Arc<Vec<CachedColor>>, ResolveError>;
type NodeSlot = watch::Receiver<Option<NodeResult>>;
type FetchResult = Result<LedgerTransaction, ResolveError>;
type FetchSlot = watch::Receiver<Option<FetchResult>>;

// ---------------------------------------------------------------------------
// ColorResolver
// ---------------------------------------------------------------------------

/// The memoizing color value resolution engine.
///
/// Cheap to clone (shared interior); safe to query concurrently from any
/// number of tasks. The cache only grows — ledger transactions are
/// immutable once they exist, so no entry ever needs invalidation, and
/// discarding the whole resolver costs performance, never correctness.
pub struct ColorResolver<G: TransactionGraph + 'static> {
    shared: Arc<Shared<G>>,
}

impl<G: TransactionGraph + 'static> Clone for ColorResolver<G> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<G> {
    graph: Arc<G>,
    config: ResolverConfig,
    cache: DashMap<OutputKey, CachedColor>,
    nodes_inflight: DashMap<NodeKey, NodeSlot>,
    fetched: DashMap<TxId, LedgerTransaction>,
    fetches_inflight: DashMap<TxId, FetchSlot>,
    fetch_limit: Semaphore,
}

impl<G: TransactionGraph + 'static> ColorResolver<G> {
    /// Builds a resolver over a graph source with the given configuration.
    pub fn new(graph: Arc<G>, config: ResolverConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                graph,
                config,
                cache: DashMap::new(),
                nodes_inflight: DashMap::new(),
                fetched: DashMap::new(),
                fetches_inflight: DashMap::new(),
                fetch_limit: Semaphore::new(config.max_concurrent_fetches.max(1)),
            }),
        }
    }

    /// Resolves the color value of `target` under `asset`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnknownTransaction`] when the graph source cannot
    /// produce a transaction the traversal needs — this is never masked as
    /// "no color". [`ResolveError::DepthExceeded`] when the walk runs past
    /// the configured ceiling.
    pub async fn resolve(
        &self,
        asset: &AssetDefinition,
        target: OutPoint,
    ) -> Result<ResolvedOutput, ResolveError> {
        let cached = resolve_output(self.shared.clone(), asset.clone(), target, 0).await?;
        Ok(ResolvedOutput {
            outpoint: target,
            asset: asset.clone(),
            value: cached.value,
            status: cached.status,
        })
    }

    /// Non-blocking look at what the engine knows about an output.
    ///
    /// `Resolved`/`Uncolorable` for cached answers, `Pending` when the
    /// containing transaction's computation is in flight, `None` when the
    /// engine has never been asked.
    pub fn peek(&self, asset: &AssetDefinition, target: OutPoint) -> Option<ColorStatus> {
        let key = OutputKey {
            outpoint: target,
            kernel: asset.kernel,
            genesis: asset.genesis,
        };
        if let Some(hit) = self.shared.cache.get(&key) {
            return Some(hit.status);
        }
        let node = NodeKey {
            txid: target.txid,
            kernel: asset.kernel,
            genesis: asset.genesis,
        };
        if self.shared.nodes_inflight.contains_key(&node) {
            return Some(ColorStatus::Pending);
        }
        None
    }

    /// Number of finished per-output cache entries.
    pub fn cache_len(&self) -> usize {
        self.shared.cache.len()
    }
}

// ---------------------------------------------------------------------------
// Resolution internals
// ---------------------------------------------------------------------------
//
// Free functions over `Arc<Shared<G>>` rather than methods: the leader
// computations run in spawned tasks, which must own their state.

/// Resolves one output's color, recursing into its ancestry as needed.
///
/// Boxed because the recursion depth is data-dependent.
fn resolve_output<G: TransactionGraph + 'static>(
    shared: Arc<Shared<G>>,
    asset: AssetDefinition,
    target: OutPoint,
    depth: u32,
) -> BoxFuture<'static, Result<CachedColor, ResolveError>> {
    Box::pin(async move {
        if depth > shared.config.max_depth {
            return Err(ResolveError::DepthExceeded {
                limit: shared.config.max_depth,
            });
        }

        let key = OutputKey {
            outpoint: target,
            kernel: asset.kernel,
            genesis: asset.genesis,
        };
        if let Some(hit) = shared.cache.get(&key) {
            return Ok(*hit);
        }
        tracing::debug!(outpoint = %target, asset = %asset.moniker, depth, "cache miss");

        let kernel = asset.kernel.kernel();
        let tx = fetch_transaction(shared.clone(), target.txid).await?;

        // Genesis identity: the full issuance amount is read off the
        // genesis transaction itself. The recursion bottoms out here.
        if target == asset.genesis {
            let cached = match kernel.issuance_value(&tx, target.vout) {
                Some(value) => CachedColor {
                    value,
                    status: ColorStatus::Resolved,
                },
                None => CachedColor::UNCOLORABLE,
            };
            shared.cache.insert(key, cached);
            return Ok(cached);
        }

        // Structural short-circuits: a dangling output index or an output
        // that can never carry color ends the walk without touching the
        // transaction's ancestry.
        let colorable = match tx.outputs.get(target.vout as usize) {
            Some(output) => kernel.is_colorable(output),
            None => false,
        };
        if !colorable {
            shared.cache.insert(key, CachedColor::UNCOLORABLE);
            return Ok(CachedColor::UNCOLORABLE);
        }

        let colors = transaction_colors(shared, asset, tx, depth).await?;
        Ok(colors
            .get(target.vout as usize)
            .copied()
            .unwrap_or(CachedColor::UNCOLORABLE))
    })
}

/// Computes (or joins the in-flight computation of) the color of every
/// output of one transaction under one asset.
async fn transaction_colors<G: TransactionGraph + 'static>(
    shared: Arc<Shared<G>>,
    asset: AssetDefinition,
    tx: LedgerTransaction,
    depth: u32,
) -> NodeResult {
    let key = NodeKey {
        txid: tx.id,
        kernel: asset.kernel,
        genesis: asset.genesis,
    };

    // Single flight: exactly one leader per key. The registry entry is
    // created under the map guard; the leader task is spawned after the
    // guard is released.
    let (sender, mut slot) = match shared.nodes_inflight.entry(key) {
        Entry::Occupied(existing) => (None, existing.get().clone()),
        Entry::Vacant(vacant) => {
            let (sender, receiver) = watch::channel(None);
            vacant.insert(receiver.clone());
            (Some(sender), receiver)
        }
    };

    if let Some(sender) = sender {
        // The leader runs detached so that a caller abandoning its query
        // cannot unwind work other callers are waiting on.
        let task_shared = shared.clone();
        tokio::spawn(async move {
            let result = compute_transaction_colors(task_shared.clone(), asset, tx, depth).await;
            if let Ok(colors) = &result {
                for (vout, cached) in colors.iter().enumerate() {
                    let output_key = OutputKey {
                        outpoint: OutPoint::new(key.txid, vout as u32),
                        kernel: key.kernel,
                        genesis: key.genesis,
                    };
                    task_shared.cache.insert(output_key, *cached);
                }
            }
            // Registry cleanup before the broadcast: a waiter that wakes
            // and re-asks must find the cache, not a dead in-flight entry.
            task_shared.nodes_inflight.remove(&key);
            let _ = sender.send(Some(result));
        });
    }

    wait_for_slot(&mut slot, "color computation").await
}

/// The actual per-transaction kernel application. Runs only in leader
/// tasks.
async fn compute_transaction_colors<G: TransactionGraph + 'static>(
    shared: Arc<Shared<G>>,
    asset: AssetDefinition,
    tx: LedgerTransaction,
    depth: u32,
) -> NodeResult {
    tracing::debug!(txid = %tx.id, asset = %asset.moniker, inputs = tx.inputs.len(), "applying kernel");

    // Resolve every input's source output. The futures run concurrently;
    // `try_join_all` keeps the results in input order, which the kernels'
    // positional rules depend on.
    let resolved = try_join_all(tx.inputs.iter().map(|input| {
        resolve_output(shared.clone(), asset.clone(), input.prevout, depth + 1)
    }))
    .await?;
    let input_colors: Vec<u64> = resolved
        .iter()
        .map(|cached| match cached.status {
            ColorStatus::Resolved => cached.value,
            _ => 0,
        })
        .collect();

    let kernel = asset.kernel.kernel();
    let mut entries: Vec<CachedColor> = match kernel.apply(&tx, &input_colors) {
        KernelVerdict::Colored(values) => tx
            .outputs
            .iter()
            .zip(values)
            .map(|(output, value)| {
                if kernel.is_colorable(output) {
                    CachedColor {
                        value,
                        status: ColorStatus::Resolved,
                    }
                } else {
                    CachedColor::UNCOLORABLE
                }
            })
            .collect(),
        // A malformed transaction poisons exactly its own outputs.
        KernelVerdict::Uncolorable => vec![CachedColor::UNCOLORABLE; tx.outputs.len()],
    };

    // The genesis transaction's designated output is valued by the
    // issuance rule, never by transfer application — without this, caching
    // a sibling output of the genesis would overwrite the genesis entry.
    if tx.id == asset.genesis.txid {
        if let Some(entry) = entries.get_mut(asset.genesis.vout as usize) {
            *entry = match kernel.issuance_value(&tx, asset.genesis.vout) {
                Some(value) => CachedColor {
                    value,
                    status: ColorStatus::Resolved,
                },
                None => CachedColor::UNCOLORABLE,
            };
        }
    }
    Ok(Arc::new(entries))
}

/// Fetches a transaction through the memo, the single-flight registry,
/// and the concurrency limit — in that order.
async fn fetch_transaction<G: TransactionGraph + 'static>(
    shared: Arc<Shared<G>>,
    txid: TxId,
) -> FetchResult {
    if let Some(tx) = shared.fetched.get(&txid) {
        return Ok(tx.clone());
    }

    let (sender, mut slot) = match shared.fetches_inflight.entry(txid) {
        Entry::Occupied(existing) => (None, existing.get().clone()),
        Entry::Vacant(vacant) => {
            let (sender, receiver) = watch::channel(None);
            vacant.insert(receiver.clone());
            (Some(sender), receiver)
        }
    };

    if let Some(sender) = sender {
        let task_shared = shared.clone();
        tokio::spawn(async move {
            // The semaphore is never closed, so acquire cannot fail.
            let _permit = task_shared.fetch_limit.acquire().await.ok();
            let result = task_shared
                .graph
                .get_transaction(&txid)
                .await
                .map_err(ResolveError::from);
            drop(_permit);

            if let Ok(tx) = &result {
                task_shared.fetched.insert(txid, tx.clone());
            }
            task_shared.fetches_inflight.remove(&txid);
            let _ = sender.send(Some(result));
        });
    }

    wait_for_slot(&mut slot, "transaction fetch").await
}

/// Waits for a single-flight leader's broadcast.
async fn wait_for_slot<T: Clone>(
    slot: &mut watch::Receiver<Option<Result<T, ResolveError>>>,
    what: &str,
) -> Result<T, ResolveError> {
    let guard = slot
        .wait_for(Option::is_some)
        .await
        .map_err(|_| ResolveError::Backend(format!("in-flight {what} vanished")))?;
    (*guard)
        .clone()
        .ok_or_else(|| ResolveError::Backend(format!("in-flight {what} vanished")))?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
