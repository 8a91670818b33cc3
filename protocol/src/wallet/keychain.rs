//! # Keychain
//!
//! Ed25519 keypairs and the address-keyed set the wallet signs with.
//!
//! ## Why Ed25519?
//!
//! - Deterministic signatures (no k-value footguns like ECDSA).
//! - 128-bit security level in 32+32 bytes. Compact and sufficient.
//! - Constant-time implementations exist and are well-audited.
//!
//! Addresses are `bech32(hrp, blake3(pubkey)[..20])`. Twenty bytes of
//! BLAKE3 matches the base ledger's address-hash width, and bech32 gives
//! users something they can read over the phone without transposing a 0
//! and an O.
//!
//! Key bytes are never logged. If you add logging to this module, you
//! will be asked to leave.

use std::fmt;

use bech32::{Bech32, Hrp};
use dashmap::DashMap;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::config::MAINNET_HRP;
use crate::crypto::blake3_hash;

/// Errors raised by key and address operations.
///
/// Intentionally vague about *why* something failed — leaking details
/// about key material through error messages is a classic footgun.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The human-readable prefix is not valid bech32.
    #[error("invalid address prefix: {0:?}")]
    InvalidPrefix(String),

    /// Address encoding failed.
    #[error("address encoding failed")]
    AddressEncoding,

    /// Secret key material had the wrong shape.
    #[error("invalid secret key bytes")]
    InvalidSecretKey,
}

// ---------------------------------------------------------------------------
// ChromaKeypair
// ---------------------------------------------------------------------------

/// One Ed25519 keypair: the authority to spend everything locked to its
/// address.
///
/// Intentionally does NOT implement `Serialize`/`Deserialize`.
/// Serializing private keys should be a deliberate, conscious act, not
/// something that happens because a keypair ended up inside a JSON
/// response. Use [`to_seed`](Self::to_seed) / [`from_seed`](Self::from_seed)
/// explicitly.
pub struct ChromaKeypair {
    signing_key: SigningKey,
}

impl ChromaKeypair {
    /// Generates a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic construction from a 32-byte seed. A weak seed makes
    /// a weak key; feed this from a CSPRNG or a proper KDF.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Exports the 32-byte seed. Handle with extreme care.
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The public key bytes. Safe to share.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The bech32 address derived from this keypair's public key.
    pub fn address(&self, hrp: &str) -> Result<String, KeyError> {
        let hrp = Hrp::parse(hrp).map_err(|_| KeyError::InvalidPrefix(hrp.to_string()))?;
        let digest = blake3_hash(&self.public_key_bytes());
        bech32::encode::<Bech32>(hrp, &digest[..20]).map_err(|_| KeyError::AddressEncoding)
    }

    /// Signs a message. Ed25519 is deterministic — same key, same
    /// message, same signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verifies a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_bytes);
        self.signing_key
            .verifying_key()
            .verify(message, &signature)
            .is_ok()
    }
}

impl Clone for ChromaKeypair {
    /// Cloning a keypair is allowed but should make you uncomfortable.
    /// Every copy of a private key is another thing to protect.
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for ChromaKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material, not even "partially".
        write!(f, "ChromaKeypair(pub={})", hex::encode(self.public_key_bytes()))
    }
}

impl PartialEq for ChromaKeypair {
    /// Public-key equality: identity is the public half, and comparing
    /// secret material in a non-constant-time way is a bad habit.
    fn eq(&self, other: &Self) -> bool {
        self.public_key_bytes() == other.public_key_bytes()
    }
}

impl Eq for ChromaKeypair {}

// ---------------------------------------------------------------------------
// Keychain
// ---------------------------------------------------------------------------

/// The wallet's address-keyed set of keypairs.
///
/// Concurrent; share via `Arc`. Persistence of the seeds themselves is a
/// storage concern outside this crate's core — the keychain only holds
/// live keys for a session.
#[derive(Debug)]
pub struct Keychain {
    hrp: String,
    keys: DashMap<String, ChromaKeypair>,
}

impl Keychain {
    /// An empty keychain deriving addresses under the given prefix.
    pub fn new(hrp: impl Into<String>) -> Self {
        Self {
            hrp: hrp.into(),
            keys: DashMap::new(),
        }
    }

    /// An empty mainnet keychain.
    pub fn mainnet() -> Self {
        Self::new(MAINNET_HRP)
    }

    /// The address prefix this keychain derives under.
    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    /// Generates a fresh keypair and returns its address.
    pub fn generate_address(&self) -> Result<String, KeyError> {
        self.insert(ChromaKeypair::generate())
    }

    /// Imports a keypair from seed bytes and returns its address.
    pub fn import_seed(&self, seed: &[u8; 32]) -> Result<String, KeyError> {
        self.insert(ChromaKeypair::from_seed(seed))
    }

    /// The keypair that controls an address, if this keychain holds it.
    pub fn keypair_for(&self, address: &str) -> Option<ChromaKeypair> {
        self.keys.get(address).map(|entry| entry.clone())
    }

    /// `true` if the keychain controls the address.
    pub fn contains(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    /// All controlled addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<_> = self.keys.iter().map(|e| e.key().clone()).collect();
        addresses.sort();
        addresses
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` when no keys are held.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn insert(&self, keypair: ChromaKeypair) -> Result<String, KeyError> {
        let address = keypair.address(&self.hrp)?;
        self.keys.insert(address.clone(), keypair);
        tracing::debug!(address = %address, "keychain holds new address");
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = ChromaKeypair::generate();
        let msg = b"move 100 units of gold";
        let sig = kp.sign(msg);
        assert!(kp.verify(msg, &sig));
        assert!(!kp.verify(b"move 1000 units of gold", &sig));
    }

    #[test]
    fn seed_roundtrip_preserves_identity() {
        let kp = ChromaKeypair::generate();
        let restored = ChromaKeypair::from_seed(&kp.to_seed());
        assert_eq!(kp, restored);
    }

    #[test]
    fn deterministic_addresses() {
        let seed = [7u8; 32];
        let a = ChromaKeypair::from_seed(&seed).address("chr").unwrap();
        let b = ChromaKeypair::from_seed(&seed).address("chr").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("chr1"));
    }

    #[test]
    fn distinct_keys_distinct_addresses() {
        let a = ChromaKeypair::generate().address("chr").unwrap();
        let b = ChromaKeypair::generate().address("chr").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let kp = ChromaKeypair::generate();
        assert!(matches!(
            kp.address("not a prefix"),
            Err(KeyError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = ChromaKeypair::generate();
        let debug = format!("{:?}", kp);
        assert!(debug.starts_with("ChromaKeypair(pub="));
        assert!(!debug.contains(&hex::encode(kp.to_seed())));
    }

    #[test]
    fn keychain_generates_and_finds_keys() {
        let keychain = Keychain::mainnet();
        let address = keychain.generate_address().unwrap();
        assert!(keychain.contains(&address));
        assert_eq!(keychain.len(), 1);

        let keypair = keychain.keypair_for(&address).unwrap();
        assert_eq!(keypair.address(keychain.hrp()).unwrap(), address);
        assert_eq!(keychain.keypair_for("chr1nothere"), None);
    }

    #[test]
    fn keychain_import_is_deterministic() {
        let seed = [9u8; 32];
        let a = Keychain::mainnet().import_seed(&seed).unwrap();
        let b = Keychain::mainnet().import_seed(&seed).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn addresses_are_sorted() {
        let keychain = Keychain::mainnet();
        for _ in 0..4 {
            keychain.generate_address().unwrap();
        }
        let addresses = keychain.addresses();
        let mut sorted = addresses.clone();
        sorted.sort();
        assert_eq!(addresses, sorted);
    }
}
