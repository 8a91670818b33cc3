//! # Asset Definitions
//!
//! An asset definition binds a local human name (the moniker) to the two
//! facts that actually identify an overlay asset: the genesis outpoint
//! where its supply was declared, and the kernel that interprets its
//! history. The genesis and kernel are the asset; the moniker is local
//! convenience and never leaves the wallet unless the user exports it.
//!
//! Definitions are immutable after creation. There is no rename, no
//! re-genesis, no kernel migration — any of those would make two wallets
//! disagree about which units exist.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{OutPoint, TxId};
use crate::kernel::KernelId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by asset definition and registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    /// No definition is registered under the moniker.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// A definition is already registered under the moniker.
    #[error("duplicate moniker: {0}")]
    DuplicateMoniker(String),

    /// The moniker is empty or contains reserved characters.
    #[error("invalid moniker: {0:?}")]
    InvalidMoniker(String),

    /// The descriptor string does not parse.
    #[error("bad asset descriptor: {0}")]
    BadDescriptor(String),
}

// ---------------------------------------------------------------------------
// AssetDefinition
// ---------------------------------------------------------------------------

/// A registered overlay asset: moniker, genesis, kernel.
///
/// Equality covers all three fields. Two definitions with the same genesis
/// and kernel but different monikers are the same asset on the ledger but
/// distinct registry entries — the resolution cache keys on genesis and
/// kernel, so they share cached work.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDefinition {
    /// Local human-readable name.
    pub moniker: String,
    /// The output where this asset's supply was declared.
    pub genesis: OutPoint,
    /// The scheme that interprets this asset's history.
    pub kernel: KernelId,
}

impl AssetDefinition {
    /// Creates a definition after validating the moniker.
    ///
    /// Monikers must be non-empty and must not contain `:`, which the
    /// descriptor encoding uses as its field separator.
    pub fn new(
        moniker: impl Into<String>,
        genesis: OutPoint,
        kernel: KernelId,
    ) -> Result<Self, AssetError> {
        let moniker = moniker.into();
        if moniker.is_empty() || moniker.contains(':') || moniker.contains(char::is_whitespace) {
            return Err(AssetError::InvalidMoniker(moniker));
        }
        Ok(Self {
            moniker,
            genesis,
            kernel,
        })
    }

    /// The portable descriptor string: `<kernel>:<genesis-txid>:<vout>`.
    ///
    /// Deliberately moniker-free — the receiving wallet picks its own
    /// local name on import. Round-trips through
    /// [`from_descriptor`](Self::from_descriptor).
    pub fn descriptor(&self) -> String {
        format!("{}:{}:{}", self.kernel, self.genesis.txid, self.genesis.vout)
    }

    /// Parses a descriptor string and binds it to a local moniker.
    pub fn from_descriptor(moniker: impl Into<String>, descriptor: &str) -> Result<Self, AssetError> {
        let mut parts = descriptor.splitn(3, ':');
        let (kernel, txid, vout) = match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(t), Some(v)) => (k, t, v),
            _ => {
                return Err(AssetError::BadDescriptor(format!(
                    "expected <kernel>:<txid>:<vout>, got {descriptor:?}"
                )))
            }
        };

        let kernel: KernelId = kernel
            .parse()
            .map_err(|e| AssetError::BadDescriptor(format!("{e}")))?;
        let txid = TxId::from_hex(txid)
            .map_err(|_| AssetError::BadDescriptor(format!("bad genesis txid: {txid:?}")))?;
        let vout: u32 = vout
            .parse()
            .map_err(|_| AssetError::BadDescriptor(format!("bad output index: {vout:?}")))?;

        Self::new(moniker, OutPoint::new(txid, vout), kernel)
    }
}

impl fmt::Display for AssetDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.moniker, self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> OutPoint {
        OutPoint::new(TxId::from_bytes([0xAB; 32]), 1)
    }

    #[test]
    fn descriptor_roundtrip() {
        let asset = AssetDefinition::new("gold", genesis(), KernelId::Epobc).unwrap();
        let descriptor = asset.descriptor();
        let imported = AssetDefinition::from_descriptor("gold", &descriptor).unwrap();
        assert_eq!(asset, imported);
    }

    #[test]
    fn descriptor_shape() {
        let asset = AssetDefinition::new("gold", genesis(), KernelId::Obc).unwrap();
        let descriptor = asset.descriptor();
        assert!(descriptor.starts_with("obc:"));
        assert!(descriptor.ends_with(":1"));
        assert!(!descriptor.contains("gold"), "monikers stay local");
    }

    #[test]
    fn moniker_validation() {
        assert!(AssetDefinition::new("", genesis(), KernelId::Obc).is_err());
        assert!(AssetDefinition::new("a:b", genesis(), KernelId::Obc).is_err());
        assert!(AssetDefinition::new("a b", genesis(), KernelId::Obc).is_err());
        assert!(AssetDefinition::new("gold-2026", genesis(), KernelId::Obc).is_ok());
    }

    #[test]
    fn bad_descriptors_are_rejected() {
        for descriptor in [
            "",
            "gold",
            "obc:zz:0",
            "pobc:abab:0",
            "obc:abcd:0", // txid too short
            &format!("obc:{}:x", TxId::from_bytes([0xAB; 32]).to_hex()),
        ] {
            assert!(
                matches!(
                    AssetDefinition::from_descriptor("gold", descriptor),
                    Err(AssetError::BadDescriptor(_))
                ),
                "descriptor {descriptor:?} should be rejected"
            );
        }
    }

    #[test]
    fn definitions_with_same_genesis_share_identity_fields() {
        let a = AssetDefinition::new("gold", genesis(), KernelId::Epobc).unwrap();
        let b = AssetDefinition::new("oro", genesis(), KernelId::Epobc).unwrap();
        assert_ne!(a, b, "registry entries differ");
        assert_eq!(a.descriptor(), b.descriptor(), "ledger identity agrees");
    }

    #[test]
    fn definition_json_roundtrip() {
        let asset = AssetDefinition::new("gold", genesis(), KernelId::Epobc).unwrap();
        let json = serde_json::to_string(&asset).unwrap();
        let recovered: AssetDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(asset, recovered);
    }
}
