//! # Hashing Utilities
//!
//! Cryptographic hash functions used throughout CHROMA. We support two
//! primary hash functions and refuse to support more without a very good
//! reason:
//!
//! - **SHA-256** — For the base ledger. Transaction ids are the classic
//!   `double_sha256` construction so that overlay ids line up with what
//!   every other piece of ledger tooling computes.
//!
//! - **BLAKE3** — For CHROMA-native derivations, chiefly address hashes.
//!   Faster than SHA-256 on every platform that matters, and nothing
//!   external needs to agree with us here.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// Returns a 32-byte digest as a `Vec<u8>`. Used primarily for the
/// double-hashing construction below. For CHROMA-internal hashing,
/// prefer `blake3_hash()`.
///
/// # Example
///
/// ```
/// use chroma_protocol::crypto::sha256;
///
/// let hash = sha256(b"chroma protocol");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
///
/// Same as `sha256()` but returns `[u8; 32]` for callers that want
/// a fixed-size type without the heap allocation.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// This is the transaction-id construction of the base ledger. The
/// double-hash protects against length extension (which SHA-256 alone is
/// vulnerable to, though in practice this matters less than people think).
///
/// # Example
///
/// ```
/// use chroma_protocol::crypto::double_sha256;
///
/// let tx_id = double_sha256(b"raw transaction bytes");
/// assert_eq!(tx_id.len(), 32);
/// ```
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256_array(&sha256(data))
}

/// Compute the BLAKE3 hash of the input data.
///
/// Returns a 32-byte digest as a fixed-size array. This is the workhorse
/// for CHROMA-native data such as address payloads. Uses the `blake3`
/// crate which takes advantage of SIMD on supported platforms.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Instead of allocating a buffer to concatenate inputs, we feed them
/// sequentially into the hasher. Same result, less allocation.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of empty string — the canonical test vector everyone
        // should have memorized by now.
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn sha256_array_matches_vec() {
        let vec_result = sha256(b"test data");
        let arr_result = sha256_array(b"test data");
        assert_eq!(vec_result.as_slice(), arr_result.as_slice());
    }

    #[test]
    fn double_sha256_differs_from_single() {
        let single = sha256(b"chroma");
        let double = double_sha256(b"chroma");
        assert_ne!(single.as_slice(), double.as_slice());

        // But double should equal SHA-256 of the single hash.
        let manual_double = sha256_array(&single);
        assert_eq!(double, manual_double);
    }

    #[test]
    fn blake3_deterministic() {
        let a = blake3_hash(b"chroma");
        let b = blake3_hash(b"chroma");
        assert_eq!(a, b);
    }

    #[test]
    fn blake3_different_inputs() {
        let a = blake3_hash(b"chroma");
        let b = blake3_hash(b"Chroma"); // case sensitive!
        assert_ne!(a, b);
    }

    #[test]
    fn blake3_hash_multi_matches_concatenation() {
        let multi = blake3_hash_multi(&[b"hello", b" world"]);
        let single = blake3_hash(b"hello world");
        assert_eq!(multi, single);
    }
}
