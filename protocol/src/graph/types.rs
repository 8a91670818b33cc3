//! Core type definitions for the base-ledger transaction model.
//!
//! CHROMA layers color semantics on an unmodified UTXO ledger, so these
//! types model exactly what the ledger records and nothing more: value,
//! locking conditions, input ordering, and the sequence field the enhanced
//! kernel uses as its tag channel. Color is never stored here — it is
//! always derived by interpretation.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::SEQUENCE_FINAL;
use crate::crypto::hash::double_sha256;

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// A base-ledger transaction id: `double_sha256` of the transaction's
/// canonical signable bytes.
///
/// The id is stable across signing — witnesses are excluded from the
/// preimage — so drafts can reference the id of the transaction they will
/// become before any signature exists.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Creates a `TxId` from a raw 32-byte hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex-encoded transaction id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded transaction id.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for TxId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Transaction ids serialize as hex strings so that JSON payloads (API,
// registry exports) stay human-readable instead of 32-element arrays.
impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// OutPoint
// ---------------------------------------------------------------------------

/// A reference to one output of one transaction: the identity of a
/// spendable unit on the ledger.
///
/// `Ord` is derived so that coin selection can break ties deterministically
/// by outpoint — same candidate set, same draft, every time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    /// The transaction that created the output.
    pub txid: TxId,
    /// The output's index within that transaction.
    pub vout: u32,
}

impl OutPoint {
    /// Creates a new outpoint.
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

// ---------------------------------------------------------------------------
// LockScript
// ---------------------------------------------------------------------------

/// The locking condition of an output.
///
/// The base ledger sees opaque script bytes; CHROMA only needs to
/// distinguish spendable pay-to-address outputs from provably-unspendable
/// data carriers, because the latter can never carry color.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockScript {
    /// Standard pay-to-address output (bech32 address string).
    Address(String),
    /// Provably unspendable data carrier (OP_RETURN-style). Used by the
    /// enhanced kernel for its marker outputs.
    DataCarrier(Vec<u8>),
}

impl LockScript {
    /// Returns `true` if the output can never be spent.
    pub fn is_unspendable(&self) -> bool {
        matches!(self, LockScript::DataCarrier(_))
    }

    /// Returns the address if this is a pay-to-address lock.
    pub fn address(&self) -> Option<&str> {
        match self {
            LockScript::Address(addr) => Some(addr),
            LockScript::DataCarrier(_) => None,
        }
    }

    /// Canonical byte encoding used in the transaction id preimage.
    ///
    /// A single discriminant byte followed by the payload. The separator
    /// discipline lives in [`LedgerTransaction::signable_bytes`].
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            LockScript::Address(addr) => {
                let mut buf = Vec::with_capacity(1 + addr.len());
                buf.push(0x01);
                buf.extend_from_slice(addr.as_bytes());
                buf
            }
            LockScript::DataCarrier(data) => {
                let mut buf = Vec::with_capacity(1 + data.len());
                buf.push(0x6A); // the ledger's data-carrier opcode
                buf.extend_from_slice(data);
                buf
            }
        }
    }
}

impl fmt::Display for LockScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockScript::Address(addr) => write!(f, "{}", addr),
            LockScript::DataCarrier(data) => write!(f, "data:{}", hex::encode(data)),
        }
    }
}

// ---------------------------------------------------------------------------
// TxOutput / TxInput
// ---------------------------------------------------------------------------

/// One output of a ledger transaction: a value locked under a condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Value in base-ledger units.
    pub value: u64,
    /// The locking condition.
    pub lock: LockScript,
}

impl TxOutput {
    /// Creates a pay-to-address output.
    pub fn to_address(value: u64, address: impl Into<String>) -> Self {
        Self {
            value,
            lock: LockScript::Address(address.into()),
        }
    }

    /// Creates a zero-value data-carrier output.
    pub fn data_carrier(data: Vec<u8>) -> Self {
        Self {
            value: 0,
            lock: LockScript::DataCarrier(data),
        }
    }
}

/// One input of a ledger transaction.
///
/// `value` mirrors the value of the output being spent. The ledger wire
/// format does not repeat it, but every wallet-side consumer needs it (fee
/// math, positional color accounting), so the graph layer fills it in when
/// a transaction is indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The output being spent.
    pub prevout: OutPoint,
    /// Value of the spent output, in base-ledger units.
    pub value: u64,
    /// The sequence field. Ordinary payments carry [`SEQUENCE_FINAL`];
    /// the enhanced kernel stores its tag in the first input's sequence.
    pub sequence: u32,
}

impl TxInput {
    /// Creates an input with the default (final) sequence.
    pub fn new(prevout: OutPoint, value: u64) -> Self {
        Self {
            prevout,
            value,
            sequence: SEQUENCE_FINAL,
        }
    }

    /// Creates an input carrying an explicit sequence tag.
    pub fn with_sequence(prevout: OutPoint, value: u64, sequence: u32) -> Self {
        Self {
            prevout,
            value,
            sequence,
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerTransaction
// ---------------------------------------------------------------------------

/// A base-ledger transaction as the graph layer sees it.
///
/// The `id` is the double-SHA-256 hash of [`signable_bytes`], which
/// excludes witnesses — it is stable across signing, so a draft knows the
/// id of the transaction it will become.
///
/// [`signable_bytes`]: LedgerTransaction::signable_bytes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Transaction id: `hex(double_sha256(signable_bytes))` as [`TxId`].
    pub id: TxId,
    /// Ordered inputs. Order is consensus-relevant for the color kernels.
    pub inputs: Vec<TxInput>,
    /// Ordered outputs. Order is consensus-relevant for the color kernels.
    pub outputs: Vec<TxOutput>,
}

impl LedgerTransaction {
    /// Builds a transaction from inputs and outputs, computing its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: TxId::from_bytes([0u8; 32]),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Returns the canonical byte representation used for id computation
    /// and signing.
    ///
    /// Deterministic concatenation with null-byte separators and
    /// fixed-width little-endian integers. serde is intentionally avoided
    /// because field ordering is not guaranteed across formats.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.inputs.len() * 48 + self.outputs.len() * 48);

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.prevout.txid.as_bytes());
            buf.extend_from_slice(&input.prevout.vout.to_le_bytes());
            buf.extend_from_slice(&input.value.to_le_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            let lock = output.lock.canonical_bytes();
            buf.extend_from_slice(&(lock.len() as u32).to_le_bytes());
            buf.extend_from_slice(&lock);
        }

        buf
    }

    /// Computes the transaction id from the current field values.
    pub fn compute_id(&self) -> TxId {
        TxId::from_bytes(double_sha256(&self.signable_bytes()))
    }

    /// Total value of all outputs, saturating on (impossible) overflow.
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value))
    }

    /// Total value of all inputs, saturating on (impossible) overflow.
    pub fn total_input_value(&self) -> u64 {
        self.inputs.iter().fold(0u64, |acc, i| acc.saturating_add(i.value))
    }

    /// The implied fee: input value minus output value, zero if the
    /// transaction somehow creates value (a coinbase, or corrupt data).
    pub fn fee(&self) -> u64 {
        self.total_input_value().saturating_sub(self.total_output_value())
    }

    /// Returns the sequence tag channel: the first input's sequence field.
    /// `None` for input-less transactions (coinbase-style).
    pub fn sequence_tag(&self) -> Option<u32> {
        self.inputs.first().map(|i| i.sequence)
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// A ledger transaction together with its input witnesses.
///
/// Produced by a [`DraftSigner`](crate::wallet::DraftSigner) from an
/// unsigned draft; consumed by whatever broadcasts to the ledger. The
/// witnesses are hex-encoded signatures, one per input, in input order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The underlying transaction. Its id is unchanged by signing.
    pub transaction: LedgerTransaction,
    /// Hex-encoded witness per input, aligned to `transaction.inputs`.
    pub witnesses: Vec<String>,
}

impl SignedTransaction {
    /// Returns `true` if every input carries a witness.
    pub fn is_fully_signed(&self) -> bool {
        self.witnesses.len() == self.transaction.inputs.len()
            && self.witnesses.iter().all(|w| !w.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_txid(byte: u8) -> TxId {
        TxId::from_bytes([byte; 32])
    }

    fn sample_tx() -> LedgerTransaction {
        LedgerTransaction::new(
            vec![TxInput::new(OutPoint::new(dummy_txid(0xAA), 0), 10_000)],
            vec![
                TxOutput::to_address(6_000, "chr1qqqq"),
                TxOutput::to_address(3_000, "chr1pppp"),
            ],
        )
    }

    #[test]
    fn txid_hex_roundtrip() {
        let id = dummy_txid(0x42);
        let recovered = TxId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn txid_rejects_short_hex() {
        assert!(TxId::from_hex("abcd").is_err());
    }

    #[test]
    fn txid_serde_as_hex_string() {
        let id = dummy_txid(0x11);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let recovered: TxId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn outpoint_ordering_is_total() {
        let a = OutPoint::new(dummy_txid(0x01), 5);
        let b = OutPoint::new(dummy_txid(0x01), 7);
        let c = OutPoint::new(dummy_txid(0x02), 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn data_carrier_is_unspendable() {
        let marker = TxOutput::data_carrier(vec![0x43, 0x43]);
        assert!(marker.lock.is_unspendable());
        assert_eq!(marker.value, 0);
        assert_eq!(marker.lock.address(), None);
    }

    #[test]
    fn transaction_id_is_deterministic() {
        let tx1 = sample_tx();
        let tx2 = sample_tx();
        assert_eq!(tx1.id, tx2.id, "same inputs must produce the same id");
        assert_eq!(tx1.id, tx1.compute_id());
    }

    #[test]
    fn sequence_affects_id() {
        let prevout = OutPoint::new(dummy_txid(0xAA), 0);
        let outputs = vec![TxOutput::to_address(1_000, "chr1qqqq")];
        let tx1 = LedgerTransaction::new(vec![TxInput::new(prevout, 1_000)], outputs.clone());
        let tx2 = LedgerTransaction::new(
            vec![TxInput::with_sequence(prevout, 1_000, 0x33)],
            outputs,
        );
        assert_ne!(tx1.id, tx2.id, "sequence tag must be committed to the id");
    }

    #[test]
    fn output_order_affects_id() {
        let input = TxInput::new(OutPoint::new(dummy_txid(0xAA), 0), 9_000);
        let a = TxOutput::to_address(6_000, "chr1qqqq");
        let b = TxOutput::to_address(3_000, "chr1pppp");
        let tx1 = LedgerTransaction::new(vec![input.clone()], vec![a.clone(), b.clone()]);
        let tx2 = LedgerTransaction::new(vec![input], vec![b, a]);
        assert_ne!(tx1.id, tx2.id, "output order is consensus-relevant");
    }

    #[test]
    fn fee_is_input_minus_output() {
        let tx = sample_tx();
        assert_eq!(tx.total_input_value(), 10_000);
        assert_eq!(tx.total_output_value(), 9_000);
        assert_eq!(tx.fee(), 1_000);
    }

    #[test]
    fn sequence_tag_reads_first_input() {
        let prevout = OutPoint::new(dummy_txid(0xAA), 0);
        let tx = LedgerTransaction::new(
            vec![
                TxInput::with_sequence(prevout, 500, 0x25),
                TxInput::new(OutPoint::new(dummy_txid(0xBB), 1), 500),
            ],
            vec![TxOutput::to_address(900, "chr1qqqq")],
        );
        assert_eq!(tx.sequence_tag(), Some(0x25));
    }

    #[test]
    fn transaction_json_roundtrip() {
        let tx = sample_tx();
        let json = serde_json::to_string(&tx).unwrap();
        let recovered: LedgerTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, recovered);
    }

    #[test]
    fn signed_transaction_completeness() {
        let tx = sample_tx();
        let unsigned = SignedTransaction {
            transaction: tx.clone(),
            witnesses: vec![],
        };
        assert!(!unsigned.is_fully_signed());

        let signed = SignedTransaction {
            transaction: tx,
            witnesses: vec!["deadbeef".to_string()],
        };
        assert!(signed.is_fully_signed());
    }
}
