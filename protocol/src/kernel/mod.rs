//! # Color Kernels
//!
//! A color kernel is the scheme-specific rule set that encodes and decodes
//! color through one transaction: which outputs can carry color at all,
//! how an input color vector maps to an output color vector, and what
//! markers a new transaction must include for later decoding.
//!
//! Kernels are a **closed set**. Color interpretation is consensus among
//! the wallets that share an asset, and an open registration mechanism
//! would trade away exhaustiveness checking for flexibility nobody asked
//! for. Adding a scheme means adding a variant here and handling it in
//! every `match` — the compiler enforces that every code path knows every
//! kernel.
//!
//! Two schemes ship today:
//!
//! - [`ObcKernel`] — simple order-based coloring ("obc")
//! - [`EpobcKernel`] — enhanced padded order-based coloring ("epobc")
//!
//! All kernel methods are pure functions of their arguments. That purity
//! is what makes resolution results cacheable forever.

pub mod epobc;
pub mod obc;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{LedgerTransaction, TxOutput};

pub use epobc::{EpobcKernel, Tag, TagKind};
pub use obc::ObcKernel;

// ---------------------------------------------------------------------------
// KernelId
// ---------------------------------------------------------------------------

/// Stable identity of a coloring scheme.
///
/// An asset definition carries exactly one of these, fixed at creation.
/// The string forms (`"obc"`, `"epobc"`) appear in asset descriptors and
/// must never change for an existing scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelId {
    /// Simple order-based coloring.
    Obc,
    /// Enhanced padded order-based coloring.
    Epobc,
}

impl KernelId {
    /// The kernel implementation behind this identity.
    pub fn kernel(self) -> ColorKernel {
        ColorKernel::for_id(self)
    }

    /// The stable string form used in descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelId::Obc => "obc",
            KernelId::Epobc => "epobc",
        }
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse failure for kernel identity strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown kernel id: {0}")]
pub struct UnknownKernel(pub String);

impl FromStr for KernelId {
    type Err = UnknownKernel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "obc" => Ok(KernelId::Obc),
            "epobc" => Ok(KernelId::Epobc),
            other => Err(UnknownKernel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// KernelVerdict
// ---------------------------------------------------------------------------

/// The outcome of applying a kernel to one transaction.
///
/// `Colored` carries one value per output, aligned to the transaction's
/// output order; zero is a meaningful value. `Uncolorable` means the
/// transaction cannot be interpreted under the scheme at all — wrong tag,
/// structural mismatch — and poisons only this transaction's outputs,
/// never the query that asked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelVerdict {
    /// Per-output color values, aligned to the transaction's outputs.
    Colored(Vec<u64>),
    /// The transaction is not interpretable under this scheme.
    Uncolorable,
}

impl KernelVerdict {
    /// Returns the color vector, or `None` for `Uncolorable`.
    pub fn colors(&self) -> Option<&[u64]> {
        match self {
            KernelVerdict::Colored(colors) => Some(colors),
            KernelVerdict::Uncolorable => None,
        }
    }

    /// Total color carried by the verdict; zero for `Uncolorable`.
    pub fn total(&self) -> u64 {
        self.colors()
            .map(|c| c.iter().sum())
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// PaddingPlan
// ---------------------------------------------------------------------------

/// What a kernel requires a new transaction to carry besides its logical
/// colored outputs.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PaddingPlan {
    /// Marker outputs that must precede the colored outputs, in order.
    pub leading: Vec<TxOutput>,
    /// Value to store in the first input's sequence field, if the scheme
    /// tags its transactions.
    pub sequence_tag: Option<u32>,
}

impl PaddingPlan {
    /// Number of padding outputs the plan prepends.
    pub fn len(&self) -> usize {
        self.leading.len()
    }

    /// `true` when the plan adds nothing.
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.sequence_tag.is_none()
    }
}

// ---------------------------------------------------------------------------
// ColorKernel
// ---------------------------------------------------------------------------

/// The closed set of kernel implementations behind one capability surface.
///
/// Every method dispatches exhaustively; a new scheme cannot be added
/// without the compiler pointing at every place that must learn about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorKernel {
    /// Simple order-based.
    Obc(ObcKernel),
    /// Enhanced padded order-based.
    Epobc(EpobcKernel),
}

impl ColorKernel {
    /// The implementation registered under an identity.
    pub fn for_id(id: KernelId) -> Self {
        match id {
            KernelId::Obc => ColorKernel::Obc(ObcKernel),
            KernelId::Epobc => ColorKernel::Epobc(EpobcKernel),
        }
    }

    /// The identity this implementation answers to.
    pub fn id(&self) -> KernelId {
        match self {
            ColorKernel::Obc(_) => KernelId::Obc,
            ColorKernel::Epobc(_) => KernelId::Epobc,
        }
    }

    /// Whether an output is structurally capable of carrying color.
    pub fn is_colorable(&self, output: &TxOutput) -> bool {
        match self {
            ColorKernel::Obc(k) => k.is_colorable(output),
            ColorKernel::Epobc(k) => k.is_colorable(output),
        }
    }

    /// Maps an input color vector to an output color vector for one
    /// transaction. Pure; malformed structure yields
    /// [`KernelVerdict::Uncolorable`], never a panic.
    pub fn apply(&self, tx: &LedgerTransaction, input_colors: &[u64]) -> KernelVerdict {
        match self {
            ColorKernel::Obc(k) => k.apply(tx, input_colors),
            ColorKernel::Epobc(k) => k.apply(tx, input_colors),
        }
    }

    /// The supply a genesis output declares, or `None` if the output
    /// cannot serve as a genesis under this scheme.
    pub fn issuance_value(&self, tx: &LedgerTransaction, vout: u32) -> Option<u64> {
        match self {
            ColorKernel::Obc(k) => k.issuance_value(tx, vout),
            ColorKernel::Epobc(k) => k.issuance_value(tx, vout),
        }
    }

    /// The markers and tag a new transfer transaction must carry around
    /// the given logical colored outputs.
    pub fn compose_padding(&self, logical_outputs: &[TxOutput]) -> PaddingPlan {
        match self {
            ColorKernel::Obc(k) => k.compose_padding(logical_outputs),
            ColorKernel::Epobc(k) => k.compose_padding(logical_outputs),
        }
    }

    /// The markers and tag a new issuance transaction must carry ahead of
    /// its genesis output.
    pub fn issuance_padding(&self) -> PaddingPlan {
        match self {
            ColorKernel::Obc(k) => k.issuance_padding(),
            ColorKernel::Epobc(k) => k.issuance_padding(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_id_string_roundtrip() {
        for id in [KernelId::Obc, KernelId::Epobc] {
            assert_eq!(id.to_string().parse::<KernelId>(), Ok(id));
        }
        assert!("pobc".parse::<KernelId>().is_err());
        assert!("OBC".parse::<KernelId>().is_err(), "ids are case-sensitive");
    }

    #[test]
    fn kernel_id_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&KernelId::Epobc).unwrap(), "\"epobc\"");
        let id: KernelId = serde_json::from_str("\"obc\"").unwrap();
        assert_eq!(id, KernelId::Obc);
    }

    #[test]
    fn dispatch_preserves_identity() {
        for id in [KernelId::Obc, KernelId::Epobc] {
            assert_eq!(ColorKernel::for_id(id).id(), id);
            assert_eq!(id.kernel().id(), id);
        }
    }

    #[test]
    fn verdict_total() {
        assert_eq!(KernelVerdict::Colored(vec![3, 0, 4]).total(), 7);
        assert_eq!(KernelVerdict::Uncolorable.total(), 0);
        assert_eq!(KernelVerdict::Uncolorable.colors(), None);
    }

    #[test]
    fn padding_plans_differ_by_scheme() {
        let logical = [crate::graph::TxOutput::to_address(10, "chr1a")];
        assert!(KernelId::Obc.kernel().compose_padding(&logical).is_empty());
        assert!(!KernelId::Epobc.kernel().compose_padding(&logical).is_empty());
    }
}
