//! # Protocol Configuration & Constants
//!
//! Every magic number in CHROMA lives here. The overlay protocol is pure
//! interpretation convention layered on the base ledger, which means these
//! values ARE the protocol: change a tag bit after assets have been issued
//! and every wallet in the field decodes a different history.
//!
//! Runtime knobs (cache depth, fee rates) live in the explicit `*Config`
//! structs of their owning modules and are passed in at construction.
//! Nothing in this file is mutable and nothing here is ambient state.

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet — real assets, real provenance. Mistakes here are forever.
pub const NETWORK_ID_MAINNET: u32 = 0x4348524D; // "CHRM"

/// Testnet — where tag layouts go to be regretted before mainnet.
pub const NETWORK_ID_TESTNET: u32 = 0x43485254; // "CHRT"

/// Human-readable network prefixes for addresses.
/// Bech32 HRP values — short enough to type, long enough to be unambiguous.
pub const MAINNET_HRP: &str = "chr";
pub const TESTNET_HRP: &str = "tchr";

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol fingerprint, used in asset descriptor tooling and API banners.
pub const PROTOCOL_FINGERPRINT: &str = "ALAS-CHROMA-2026";

/// The full version string, assembled at release time.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Kernel Tag Encoding (EPOBC)
// ---------------------------------------------------------------------------
//
// The enhanced padded order-based kernel stores its tag in the sequence
// field of a transaction's FIRST input. The layout is pinned by
// interoperability with deployed wallets — it is verified against fixture
// transactions in the kernel tests, not re-derived from first principles:
//
//   bits  0..6   marker: GENESIS or TRANSFER (any other value = untagged)
//   bits  6..12  padding code: number of leading non-colorable outputs
//   bits 12..32  reserved, ignored on read, zero on write

/// Marker bits identifying an issuance (genesis) transaction.
pub const EPOBC_GENESIS_MARKER: u32 = 0b100101;

/// Marker bits identifying a transfer transaction.
pub const EPOBC_TRANSFER_MARKER: u32 = 0b110011;

/// Mask covering the marker bits of a sequence tag.
pub const EPOBC_MARKER_MASK: u32 = 0b111111;

/// Bit offset of the padding code within the sequence tag.
pub const EPOBC_PADDING_SHIFT: u32 = 6;

/// Maximum encodable padding code (6 bits). Codes that exceed a
/// transaction's output count are rejected at decode time regardless.
pub const EPOBC_MAX_PADDING_CODE: u32 = 0b111111;

/// Default sequence value for untagged inputs. Decodes as "no tag" under
/// every kernel, so uncolored transactions stay uncolored.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Maximum number of inputs per transaction. Keeps draft size bounded.
pub const MAX_TX_INPUTS: usize = 256;

/// Maximum number of outputs per transaction.
pub const MAX_TX_OUTPUTS: usize = 256;

/// Outputs below this base-ledger value are uneconomical to spend and are
/// folded into the fee rather than emitted as change.
pub const DUST_THRESHOLD: u64 = 546;

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Default fee rate in base units per estimated byte.
pub const DEFAULT_FEE_RATE: u64 = 10;

/// Estimated fixed overhead of a serialized transaction in bytes.
pub const TX_BASE_WEIGHT: usize = 10;

/// Estimated serialized size of one input (prevout + sequence + witness).
pub const TX_INPUT_WEIGHT: usize = 148;

/// Estimated serialized size of one output (value + locking condition).
pub const TX_OUTPUT_WEIGHT: usize = 34;

// ---------------------------------------------------------------------------
// Resolution Engine Defaults
// ---------------------------------------------------------------------------

/// Default ceiling on backward-traversal depth. The transaction graph is
/// acyclic by construction, so this exists to fail loudly on pathological
/// or corrupted input data rather than recurse without bound.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: u32 = 4096;

/// Default cap on concurrent transaction fetches during a resolution
/// fan-out. The graph accessor is an I/O-bound collaborator; this bounds
/// how hard we hammer it.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns the human-readable prefix for a given network ID.
/// Returns `None` for unrecognized networks — we don't guess.
pub fn hrp_for_network(network_id: u32) -> Option<&'static str> {
    match network_id {
        NETWORK_ID_MAINNET => Some(MAINNET_HRP),
        NETWORK_ID_TESTNET => Some(TESTNET_HRP),
        _ => None,
    }
}

/// Returns a friendly name for a network ID, mainly for logging.
pub fn network_name(network_id: u32) -> String {
    match network_id {
        NETWORK_ID_MAINNET => "mainnet".to_string(),
        NETWORK_ID_TESTNET => "testnet".to_string(),
        other => format!("unknown(0x{:08X})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_ids_are_distinct() {
        assert_ne!(NETWORK_ID_MAINNET, NETWORK_ID_TESTNET);
    }

    #[test]
    fn epobc_markers_are_distinct_and_fit_mask() {
        assert_ne!(EPOBC_GENESIS_MARKER, EPOBC_TRANSFER_MARKER);
        assert_eq!(EPOBC_GENESIS_MARKER & EPOBC_MARKER_MASK, EPOBC_GENESIS_MARKER);
        assert_eq!(EPOBC_TRANSFER_MARKER & EPOBC_MARKER_MASK, EPOBC_TRANSFER_MARKER);
    }

    #[test]
    fn final_sequence_is_not_a_valid_marker() {
        // An untagged (final) sequence must never decode as genesis or
        // transfer, or every ordinary payment would look colored.
        let marker = SEQUENCE_FINAL & EPOBC_MARKER_MASK;
        assert_ne!(marker, EPOBC_GENESIS_MARKER);
        assert_ne!(marker, EPOBC_TRANSFER_MARKER);
    }

    #[test]
    fn hrp_for_known_networks() {
        assert_eq!(hrp_for_network(NETWORK_ID_MAINNET), Some("chr"));
        assert_eq!(hrp_for_network(NETWORK_ID_TESTNET), Some("tchr"));
        assert_eq!(hrp_for_network(0xDEADBEEF), None);
    }

    #[test]
    fn network_name_formatting() {
        assert_eq!(network_name(NETWORK_ID_MAINNET), "mainnet");
        assert_eq!(network_name(0xCAFEBABE), "unknown(0xCAFEBABE)");
    }

    #[test]
    fn fee_constants_sanity() {
        assert!(DEFAULT_FEE_RATE > 0);
        assert!(TX_INPUT_WEIGHT > TX_OUTPUT_WEIGHT);
        assert!(DUST_THRESHOLD > 0);
    }
}
