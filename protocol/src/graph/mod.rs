//! The base-ledger transaction graph: data model, access trait, and the
//! naive local index.
//!
//! The graph is append-only and acyclic by construction — an output cannot
//! be spent before it exists — which is what makes backward color
//! resolution terminate.

pub mod source;
pub mod store;
pub mod types;

pub use source::{GraphError, InMemoryGraph, TransactionGraph};
pub use store::{StoreError, TxStore};
pub use types::{
    LedgerTransaction, LockScript, OutPoint, SignedTransaction, TxId, TxInput, TxOutput,
};
