//! # EPOBC — the enhanced padded order-based kernel
//!
//! Order-based distribution with an explicit in-band tag. The tag lives in
//! the sequence field of a transaction's **first input** and carries two
//! things: a marker distinguishing genesis from transfer transactions, and
//! a padding code naming how many leading outputs are non-colorable
//! padding (markers, carriers) that order-based distribution must skip.
//!
//! The bit layout is pinned by interoperability with wallets already in
//! the field — see the constants in [`crate::config`] and the fixture
//! tests at the bottom of this file. Do not re-derive it.
//!
//! A sequence that decodes to no valid marker means "not an EPOBC
//! transaction": every output is uncolorable under this kernel. An
//! out-of-range padding code means the same. Neither is ever a panic.

use crate::config::{
    EPOBC_GENESIS_MARKER, EPOBC_MARKER_MASK, EPOBC_MAX_PADDING_CODE, EPOBC_PADDING_SHIFT,
    EPOBC_TRANSFER_MARKER,
};
use crate::graph::{LedgerTransaction, TxOutput};

use super::obc;
use super::{KernelVerdict, PaddingPlan};

// ---------------------------------------------------------------------------
// Tag codec
// ---------------------------------------------------------------------------

/// What kind of EPOBC transaction a tag announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    /// Declares new supply at this transaction.
    Genesis,
    /// Moves existing supply forward.
    Transfer,
}

/// A decoded EPOBC sequence tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag {
    /// Genesis or transfer.
    pub kind: TagKind,
    /// Number of leading padding outputs, 0..=63.
    pub padding: u32,
}

impl Tag {
    /// A genesis tag with the given padding count.
    pub fn genesis(padding: u32) -> Self {
        Self {
            kind: TagKind::Genesis,
            padding,
        }
    }

    /// A transfer tag with the given padding count.
    pub fn transfer(padding: u32) -> Self {
        Self {
            kind: TagKind::Transfer,
            padding,
        }
    }

    /// Encodes the tag into a sequence field value. Reserved bits are
    /// written as zero.
    pub fn encode(&self) -> u32 {
        let marker = match self.kind {
            TagKind::Genesis => EPOBC_GENESIS_MARKER,
            TagKind::Transfer => EPOBC_TRANSFER_MARKER,
        };
        marker | ((self.padding & EPOBC_MAX_PADDING_CODE) << EPOBC_PADDING_SHIFT)
    }

    /// Decodes a sequence field value.
    ///
    /// `None` when the marker bits match neither genesis nor transfer —
    /// the transaction is simply not an EPOBC transaction. Reserved bits
    /// are ignored on read.
    pub fn decode(sequence: u32) -> Option<Self> {
        let kind = match sequence & EPOBC_MARKER_MASK {
            EPOBC_GENESIS_MARKER => TagKind::Genesis,
            EPOBC_TRANSFER_MARKER => TagKind::Transfer,
            _ => return None,
        };
        let padding = (sequence >> EPOBC_PADDING_SHIFT) & EPOBC_MAX_PADDING_CODE;
        Some(Self { kind, padding })
    }
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// The enhanced padded order-based kernel. Stateless; all methods are pure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EpobcKernel;

impl EpobcKernel {
    /// Same structural rule as OBC: spendable, nonzero-value address
    /// outputs only.
    pub fn is_colorable(&self, output: &TxOutput) -> bool {
        !output.lock.is_unspendable() && output.value > 0
    }

    /// Reads the transaction's tag, if its first input carries one.
    pub fn tag(&self, tx: &LedgerTransaction) -> Option<Tag> {
        tx.sequence_tag().and_then(Tag::decode)
    }

    /// Maps an input color vector to an output color vector.
    ///
    /// Only transfer-tagged transactions propagate color. A missing or
    /// foreign tag, a genesis tag, an out-of-range padding code, or a
    /// malformed color vector all yield [`KernelVerdict::Uncolorable`].
    pub fn apply(&self, tx: &LedgerTransaction, input_colors: &[u64]) -> KernelVerdict {
        let Some(tag) = self.tag(tx) else {
            return KernelVerdict::Uncolorable;
        };
        // Genesis transactions declare supply; they never move it. Their
        // outputs are valued through the issuance path instead.
        if tag.kind != TagKind::Transfer {
            return KernelVerdict::Uncolorable;
        }
        let padding = tag.padding as usize;
        if padding >= tx.outputs.len() {
            return KernelVerdict::Uncolorable;
        }
        if input_colors.len() != tx.inputs.len() {
            return KernelVerdict::Uncolorable;
        }

        // The padding outputs are forced to zero and excluded from the
        // value line; order-based distribution runs over the rest.
        match obc::distribute(&tx.inputs, input_colors, &tx.outputs[padding..]) {
            Some(tail) => {
                let mut colors = vec![0u64; padding];
                colors.extend(tail);
                KernelVerdict::Colored(colors)
            }
            None => KernelVerdict::Uncolorable,
        }
    }

    /// The supply declared by an EPOBC genesis output.
    ///
    /// The transaction must carry a genesis tag, the output must sit past
    /// the padding, and it must be structurally colorable. The supply is
    /// the output's ledger value.
    pub fn issuance_value(&self, tx: &LedgerTransaction, vout: u32) -> Option<u64> {
        let tag = self.tag(tx)?;
        if tag.kind != TagKind::Genesis {
            return None;
        }
        if vout < tag.padding {
            return None;
        }
        let output = tx.outputs.get(vout as usize)?;
        if !self.is_colorable(output) {
            return None;
        }
        Some(output.value)
    }

    /// EPOBC transfers lead with one zero-value marker output and announce
    /// it through a transfer tag with padding code 1.
    pub fn compose_padding(&self, _logical_outputs: &[TxOutput]) -> PaddingPlan {
        PaddingPlan {
            leading: vec![TxOutput::data_carrier(b"CC".to_vec())],
            sequence_tag: Some(Tag::transfer(1).encode()),
        }
    }

    /// Issuance carries the same marker output under a genesis tag, so
    /// the declared supply sits at output index 1.
    pub fn issuance_padding(&self) -> PaddingPlan {
        PaddingPlan {
            leading: vec![TxOutput::data_carrier(b"CC".to_vec())],
            sequence_tag: Some(Tag::genesis(1).encode()),
        }
    }
}
