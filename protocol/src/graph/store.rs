//! # TxStore — naive local transaction index
//!
//! A deliberately simple persistent transaction index built on sled's
//! embedded key-value store. The wallet tells the store about every
//! transaction it cares about (its own history plus whatever provenance
//! chains it has fetched), and the store answers graph lookups and
//! unspent-output scans from local data.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees", each an independent B+ tree
//! with its own keyspace:
//!
//! | Tree           | Key                       | Value                        |
//! |----------------|---------------------------|------------------------------|
//! | `transactions` | `txid` (32B)              | `bincode(LedgerTransaction)` |
//! | `spent`        | `txid (32B) || vout (4B BE)` | spender `txid` (32B)      |
//! | `metadata`     | key (UTF-8)               | value (bytes)                |
//!
//! Vout bytes are big-endian so sled's lexicographic ordering matches
//! numeric ordering within one transaction's outputs.
//!
//! ## Write ordering
//!
//! Indexing a transaction writes the spent marks first and the transaction
//! record second. A crash between the two can leave inputs marked spent
//! without the spender on record — the unspent scan then under-reports,
//! which is the safe direction for a wallet (it will never try to spend a
//! consumed output).

use sled::{Batch, Db, Tree};
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use super::source::{GraphError, TransactionGraph};
use super::types::{LedgerTransaction, OutPoint, TxId, TxOutput};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction not found: {0}")]
    NotFound(TxId),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// TxStore
// ---------------------------------------------------------------------------

/// Persistent naive transaction index.
///
/// Wraps a sled `Db` and exposes typed accessors for transactions, spend
/// status, and arbitrary metadata (the node keeps its registry export
/// here). All serialization uses bincode for compactness.
///
/// # Thread Safety
///
/// sled is inherently thread-safe — trees support lock-free concurrent
/// reads and serialized writes. `TxStore` can be shared across tasks via
/// `Arc<TxStore>` without external synchronization.
#[derive(Debug, Clone)]
pub struct TxStore {
    /// The underlying sled database handle.
    db: Db,
    /// Transactions indexed by raw txid bytes.
    transactions: Tree,
    /// Spent-prevout index: outpoint key -> spending txid.
    spent: Tree,
    /// Arbitrary key-value metadata (registry export, schema version).
    metadata: Tree,
}

impl TxStore {
    /// Opens or creates a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary store that lives in memory and is cleaned up
    /// when dropped. Ideal for unit tests — no filesystem side effects.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let transactions = db.open_tree("transactions")?;
        let spent = db.open_tree("spent")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            transactions,
            spent,
            metadata,
        })
    }

    // -- Transaction operations ---------------------------------------------

    /// Indexes a transaction: records it and marks its inputs spent.
    ///
    /// Idempotent — re-indexing the same transaction overwrites identical
    /// data. Returns the transaction's id for convenience.
    pub fn insert_transaction(&self, tx: &LedgerTransaction) -> StoreResult<TxId> {
        let value = bincode::serialize(tx)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut spend_marks = Batch::default();
        for input in &tx.inputs {
            spend_marks.insert(
                outpoint_key(&input.prevout).to_vec(),
                tx.id.as_bytes().to_vec(),
            );
        }
        self.spent.apply_batch(spend_marks)?;
        self.transactions.insert(tx.id.as_bytes(), value)?;

        tracing::debug!(txid = %tx.id, inputs = tx.inputs.len(), "indexed transaction");
        Ok(tx.id)
    }

    /// Fetches a transaction by id (synchronous form).
    pub fn transaction(&self, txid: &TxId) -> StoreResult<LedgerTransaction> {
        let bytes = self
            .transactions
            .get(txid.as_bytes())?
            .ok_or(StoreError::NotFound(*txid))?;
        bincode::deserialize(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Returns `true` if the store holds a transaction with the given id.
    pub fn contains(&self, txid: &TxId) -> StoreResult<bool> {
        Ok(self.transactions.contains_key(txid.as_bytes())?)
    }

    /// Number of indexed transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns `true` if the store holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    // -- Spend status -------------------------------------------------------

    /// Returns the id of the transaction that spent the given outpoint,
    /// or `None` if it is unspent as far as this index knows.
    pub fn spender(&self, outpoint: &OutPoint) -> StoreResult<Option<TxId>> {
        let entry = self.spent.get(outpoint_key(outpoint))?;
        Ok(entry.map(|bytes| {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            TxId::from_bytes(arr)
        }))
    }

    /// Returns `true` if the outpoint has no recorded spender.
    pub fn is_unspent(&self, outpoint: &OutPoint) -> StoreResult<bool> {
        Ok(self.spender(outpoint)?.is_none())
    }

    // -- Unspent scan -------------------------------------------------------

    /// Scans the whole index for unspent outputs, optionally filtered to a
    /// set of addresses.
    ///
    /// This is the "naive" in naive transaction index: a full scan, no
    /// per-address index. Fine for wallet-scale data; a block explorer
    /// would want something smarter.
    pub fn unspent_outputs(
        &self,
        addresses: Option<&[String]>,
    ) -> StoreResult<Vec<(OutPoint, TxOutput)>> {
        let mut utxos = Vec::new();

        for entry in self.transactions.iter() {
            let (_, bytes) = entry?;
            let tx: LedgerTransaction = bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            for (vout, output) in tx.outputs.iter().enumerate() {
                if output.lock.is_unspendable() {
                    continue;
                }
                if let Some(filter) = addresses {
                    match output.lock.address() {
                        Some(addr) if filter.iter().any(|a| a == addr) => {}
                        _ => continue,
                    }
                }
                let outpoint = OutPoint::new(tx.id, vout as u32);
                if self.is_unspent(&outpoint)? {
                    utxos.push((outpoint, output.clone()));
                }
            }
        }

        // Deterministic order for callers that snapshot the result.
        utxos.sort_by_key(|(op, _)| *op);
        Ok(utxos)
    }

    // -- Metadata -----------------------------------------------------------

    /// Stores an arbitrary metadata value under a string key.
    pub fn put_meta(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.metadata.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// Fetches a metadata value, or `None` if absent.
    pub fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.metadata.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// Encodes an outpoint as a fixed 36-byte sled key: txid || vout (BE).
fn outpoint_key(outpoint: &OutPoint) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(outpoint.txid.as_bytes());
    key[32..].copy_from_slice(&outpoint.vout.to_be_bytes());
    key
}

#[async_trait]
impl TransactionGraph for TxStore {
    async fn get_transaction(&self, txid: &TxId) -> Result<LedgerTransaction, GraphError> {
        match self.transaction(txid) {
            Ok(tx) => Ok(tx),
            Err(StoreError::NotFound(id)) => Err(GraphError::UnknownTransaction(id)),
            Err(other) => Err(GraphError::Backend(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
