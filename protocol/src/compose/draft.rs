//! # Draft types
//!
//! The vocabulary of transaction composition: what the composer consumes
//! (candidate outputs with known color, transfer targets) and what it
//! produces (an unsigned draft whose every side carries an explicit color
//! manifest). The manifest is the composer showing its work — a signer or
//! auditor can check per-asset conservation without re-running resolution.

use serde::{Deserialize, Serialize};

use crate::asset::AssetDefinition;
use crate::config::{DEFAULT_FEE_RATE, DUST_THRESHOLD, SEQUENCE_FINAL};
use crate::graph::{LedgerTransaction, LockScript, OutPoint, TxId, TxInput, TxOutput};
use crate::resolve::ResolvedOutput;

// ---------------------------------------------------------------------------
// Composer inputs
// ---------------------------------------------------------------------------

/// One requested movement of asset units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTarget {
    /// The asset being moved.
    pub asset: AssetDefinition,
    /// How many units. Must be positive.
    pub amount: u64,
    /// Where the units go.
    pub to: LockScript,
}

impl TransferTarget {
    /// Creates a transfer target.
    pub fn new(asset: AssetDefinition, amount: u64, to: LockScript) -> Self {
        Self { asset, amount, to }
    }
}

/// An unspent output offered to the composer, with its color already
/// resolved.
///
/// Candidates come from the wallet's unspent scan joined against the
/// resolution engine: the composer itself never touches the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOutput {
    /// The spendable output.
    pub outpoint: OutPoint,
    /// Its base-ledger value.
    pub value: u64,
    /// Its locking condition, kept so the signer knows which key to use.
    pub lock: LockScript,
    /// The asset units it carries, if any.
    pub color: Option<(AssetDefinition, u64)>,
}

impl CandidateOutput {
    /// A plain base-ledger output carrying no color.
    pub fn uncolored(outpoint: OutPoint, value: u64, lock: LockScript) -> Self {
        Self {
            outpoint,
            value,
            lock,
            color: None,
        }
    }

    /// An output carrying asset units.
    pub fn colored(
        outpoint: OutPoint,
        value: u64,
        lock: LockScript,
        asset: AssetDefinition,
        amount: u64,
    ) -> Self {
        Self {
            outpoint,
            value,
            lock,
            color: Some((asset, amount)),
        }
    }

    /// Builds a candidate from a resolution result plus the ledger facts
    /// the resolver does not carry. Outputs that resolved to zero color
    /// or uncolorable become plain base-ledger candidates.
    pub fn from_resolution(resolved: &ResolvedOutput, value: u64, lock: LockScript) -> Self {
        if resolved.is_colored() {
            Self::colored(
                resolved.outpoint,
                value,
                lock,
                resolved.asset.clone(),
                resolved.value,
            )
        } else {
            Self::uncolored(resolved.outpoint, value, lock)
        }
    }

    /// The amount of `asset` this candidate carries.
    pub fn color_amount(&self, asset: &AssetDefinition) -> u64 {
        match &self.color {
            Some((a, amount)) if a == asset => *amount,
            _ => 0,
        }
    }
}

/// Runtime knobs for the composer. An explicit value, never ambient
/// state; defaults come from [`crate::config`].
#[derive(Clone, Copy, Debug)]
pub struct ComposerConfig {
    /// Fee rate in base units per estimated byte.
    pub fee_rate: u64,
    /// Base-ledger change below this value is folded into the fee.
    /// Colored outputs are exempt — rounding color away would destroy it.
    pub dust_threshold: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_FEE_RATE,
            dust_threshold: DUST_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// Manifests & the draft
// ---------------------------------------------------------------------------

/// How much of which asset one draft entry carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorManifest {
    /// The asset's moniker.
    pub asset: String,
    /// Units carried.
    pub amount: u64,
}

/// One input of an unsigned draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftInput {
    /// The output being spent.
    pub outpoint: OutPoint,
    /// Value of the spent output.
    pub value: u64,
    /// Locking condition of the spent output; tells the signer which key
    /// must witness this input.
    pub lock: LockScript,
    /// Sequence field. The first input may carry a kernel tag.
    pub sequence: u32,
    /// Color this input is known to contribute.
    pub color: Option<ColorManifest>,
}

/// One output of an unsigned draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOutput {
    /// Base-ledger value.
    pub value: u64,
    /// Locking condition.
    pub lock: LockScript,
    /// Color this output is intended to carry.
    pub color: Option<ColorManifest>,
}

/// An unsigned transaction plus the color bookkeeping that justifies it.
///
/// Produced by the composer, consumed by a
/// [`DraftSigner`](crate::wallet::DraftSigner). The draft's transaction id
/// is already final — ids commit to everything except witnesses — so
/// callers may reference [`expected_txid`](Self::expected_txid) before
/// signing, which is how an issuance knows its genesis outpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedDraft {
    /// Ordered inputs with their manifests.
    pub inputs: Vec<DraftInput>,
    /// Ordered outputs with their manifests.
    pub outputs: Vec<DraftOutput>,
    /// Base-ledger fee the draft pays.
    pub fee: u64,
}

impl UnsignedDraft {
    /// Lowers the draft to the ledger transaction it will become.
    pub fn to_transaction(&self) -> LedgerTransaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput::with_sequence(input.outpoint, input.value, input.sequence))
            .collect();
        let outputs = self
            .outputs
            .iter()
            .map(|output| TxOutput {
                value: output.value,
                lock: output.lock.clone(),
            })
            .collect();
        LedgerTransaction::new(inputs, outputs)
    }

    /// The id the signed transaction will have.
    pub fn expected_txid(&self) -> TxId {
        self.to_transaction().id
    }

    /// Total units of `moniker` entering through the inputs.
    pub fn input_color_total(&self, moniker: &str) -> u64 {
        manifest_total(self.inputs.iter().map(|i| i.color.as_ref()), moniker)
    }

    /// Total units of `moniker` leaving through the outputs.
    pub fn output_color_total(&self, moniker: &str) -> u64 {
        manifest_total(self.outputs.iter().map(|o| o.color.as_ref()), moniker)
    }

    /// Total base-ledger value entering.
    pub fn total_input_value(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    /// Total base-ledger value leaving.
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

fn manifest_total<'a>(
    manifests: impl Iterator<Item = Option<&'a ColorManifest>>,
    moniker: &str,
) -> u64 {
    manifests
        .flatten()
        .filter(|m| m.asset == moniker)
        .map(|m| m.amount)
        .sum()
}

/// Default sequence for inputs that carry no tag.
pub(super) const UNTAGGED: u32 = SEQUENCE_FINAL;
