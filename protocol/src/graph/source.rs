//! The transaction-graph access boundary.
//!
//! Everything the color engine knows about the ledger arrives through
//! [`TransactionGraph`]: a pure lookup from transaction id to transaction.
//! No color knowledge lives behind this trait, and nothing in the engine
//! assumes where the data comes from — an in-memory map, the sled-backed
//! [`TxStore`](super::store::TxStore), or a remote ledger daemon all look
//! the same.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::types::{LedgerTransaction, TxId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by graph lookups.
///
/// `Clone` because resolution fan-out shares one failure with every waiter
/// of a collapsed in-flight computation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The referenced transaction is not known to this graph source.
    ///
    /// This is a data-availability condition, not a protocol one: callers
    /// must propagate it, never reinterpret it as "no color".
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxId),

    /// The underlying store failed. Carried as a message because backend
    /// error types are neither `Clone` nor stable across backends.
    #[error("graph backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// TransactionGraph
// ---------------------------------------------------------------------------

/// Read access to the directed acyclic transaction graph.
///
/// Implementations are expected to be cheap to call repeatedly — the
/// resolution engine memoizes on its side, but composition and indexing
/// also go through this trait. Lookups are suspension points: the backing
/// source may be I/O-bound.
#[async_trait]
pub trait TransactionGraph: Send + Sync {
    /// Fetches a transaction by id.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownTransaction`] if the id is not known — a
    /// broken or truncated graph from the caller's point of view.
    async fn get_transaction(&self, txid: &TxId) -> Result<LedgerTransaction, GraphError>;
}

// ---------------------------------------------------------------------------
// InMemoryGraph
// ---------------------------------------------------------------------------

/// A concurrent in-memory graph source.
///
/// The workhorse for unit tests, demos, and anything that already holds
/// its transactions in memory. Thread-safe; share via `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    transactions: DashMap<TxId, LedgerTransaction>,
}

impl InMemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a transaction, keyed by its own id. Replaces any previous
    /// entry with the same id (which, ids being content hashes, must have
    /// been identical anyway).
    pub fn insert(&self, tx: LedgerTransaction) -> TxId {
        let id = tx.id;
        self.transactions.insert(id, tx);
        id
    }

    /// Number of transactions held.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns `true` if the graph holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[async_trait]
impl TransactionGraph for InMemoryGraph {
    async fn get_transaction(&self, txid: &TxId) -> Result<LedgerTransaction, GraphError> {
        self.transactions
            .get(txid)
            .map(|entry| entry.clone())
            .ok_or(GraphError::UnknownTransaction(*txid))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{OutPoint, TxInput, TxOutput};

    fn sample_tx() -> LedgerTransaction {
        LedgerTransaction::new(
            vec![TxInput::new(
                OutPoint::new(TxId::from_bytes([0xAA; 32]), 0),
                5_000,
            )],
            vec![TxOutput::to_address(4_500, "chr1qqqq")],
        )
    }

    #[tokio::test]
    async fn insert_then_get() {
        let graph = InMemoryGraph::new();
        let tx = sample_tx();
        let id = graph.insert(tx.clone());

        let fetched = graph.get_transaction(&id).await.unwrap();
        assert_eq!(fetched, tx);
    }

    #[tokio::test]
    async fn missing_transaction_is_unknown() {
        let graph = InMemoryGraph::new();
        let ghost = TxId::from_bytes([0x99; 32]);

        let err = graph.get_transaction(&ghost).await.unwrap_err();
        assert_eq!(err, GraphError::UnknownTransaction(ghost));
    }

    #[tokio::test]
    async fn reinsert_is_idempotent() {
        let graph = InMemoryGraph::new();
        let tx = sample_tx();
        graph.insert(tx.clone());
        graph.insert(tx);
        assert_eq!(graph.len(), 1);
    }
}
