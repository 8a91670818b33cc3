//! # Draft signing
//!
//! Turns an [`UnsignedDraft`] into a [`SignedTransaction`] by witnessing
//! every input with the key that controls its locking address.
//!
//! Signing does not change the transaction id — ids commit to everything
//! except witnesses — so a draft's `expected_txid` survives this step
//! unchanged, and an issuance registered before signing stays valid after.

use std::sync::Arc;

use thiserror::Error;

use crate::compose::UnsignedDraft;
use crate::graph::SignedTransaction;

use super::keychain::Keychain;

/// Failures raised while witnessing a draft.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignError {
    /// No key was available for the input at the given index. The index
    /// lets the caller report exactly which spent output is orphaned.
    #[error("cannot sign input {input_index}: no key for its address")]
    SigningFailed {
        /// Index of the input that could not be witnessed.
        input_index: usize,
    },
}

/// Anything that can witness an unsigned draft.
///
/// The composer and resolution engine only ever produce unsigned drafts;
/// this trait is the narrow seam where key material enters the picture.
/// Hardware wallets, remote signing services, and the local
/// [`KeychainSigner`] all fit behind it.
pub trait DraftSigner {
    /// Produces a fully signed transaction from a draft.
    ///
    /// # Errors
    ///
    /// [`SignError::SigningFailed`] naming the first input that could not
    /// be witnessed. No partially signed transaction is returned.
    fn sign_draft(&self, draft: &UnsignedDraft) -> Result<SignedTransaction, SignError>;
}

/// Signs drafts with keys held in a local [`Keychain`].
///
/// Every input's lock must be an address the keychain controls. The
/// witness for each input is the Ed25519 signature over the transaction's
/// signable bytes, hex-encoded in input order.
#[derive(Debug, Clone)]
pub struct KeychainSigner {
    keychain: Arc<Keychain>,
}

impl KeychainSigner {
    /// Creates a signer over a shared keychain.
    pub fn new(keychain: Arc<Keychain>) -> Self {
        Self { keychain }
    }
}

impl DraftSigner for KeychainSigner {
    fn sign_draft(&self, draft: &UnsignedDraft) -> Result<SignedTransaction, SignError> {
        let transaction = draft.to_transaction();
        let message = transaction.signable_bytes();

        let mut witnesses = Vec::with_capacity(draft.inputs.len());
        for (input_index, input) in draft.inputs.iter().enumerate() {
            let keypair = input
                .lock
                .address()
                .and_then(|address| self.keychain.keypair_for(address))
                .ok_or(SignError::SigningFailed { input_index })?;
            witnesses.push(hex::encode(keypair.sign(&message)));
        }

        tracing::debug!(txid = %transaction.id, inputs = witnesses.len(), "signed draft");
        Ok(SignedTransaction {
            transaction,
            witnesses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ColorManifest, DraftInput, DraftOutput};
    use crate::config::SEQUENCE_FINAL;
    use crate::graph::{LockScript, OutPoint, TxId};

    fn draft_spending(addresses: &[&str]) -> UnsignedDraft {
        let inputs = addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| DraftInput {
                outpoint: OutPoint::new(TxId::from_bytes([i as u8; 32]), 0),
                value: 1_000,
                lock: LockScript::Address(addr.to_string()),
                sequence: SEQUENCE_FINAL,
                color: None,
            })
            .collect();
        UnsignedDraft {
            inputs,
            outputs: vec![DraftOutput {
                value: 900,
                lock: LockScript::Address("chr1dest".to_string()),
                color: Some(ColorManifest {
                    asset: "gold".to_string(),
                    amount: 900,
                }),
            }],
            fee: 100,
        }
    }

    #[test]
    fn signs_every_input_with_its_key() {
        let keychain = Arc::new(Keychain::mainnet());
        let a = keychain.generate_address().unwrap();
        let b = keychain.generate_address().unwrap();
        let draft = draft_spending(&[&a, &b]);

        let signed = KeychainSigner::new(keychain.clone())
            .sign_draft(&draft)
            .unwrap();
        assert!(signed.is_fully_signed());
        assert_eq!(signed.witnesses.len(), 2);
        assert_eq!(signed.transaction.id, draft.expected_txid());

        // Each witness verifies under its own input's key.
        let message = signed.transaction.signable_bytes();
        for (input, witness) in draft.inputs.iter().zip(&signed.witnesses) {
            let keypair = keychain.keypair_for(input.lock.address().unwrap()).unwrap();
            let signature = hex::decode(witness).unwrap();
            assert!(keypair.verify(&message, &signature));
        }
    }

    #[test]
    fn missing_key_names_the_input() {
        let keychain = Arc::new(Keychain::mainnet());
        let known = keychain.generate_address().unwrap();
        let draft = draft_spending(&[&known, "chr1stranger"]);

        let err = KeychainSigner::new(keychain).sign_draft(&draft).unwrap_err();
        assert_eq!(err, SignError::SigningFailed { input_index: 1 });
    }

    #[test]
    fn data_carrier_input_cannot_be_signed() {
        let keychain = Arc::new(Keychain::mainnet());
        let mut draft = draft_spending(&[]);
        draft.inputs.push(DraftInput {
            outpoint: OutPoint::new(TxId::from_bytes([0xEE; 32]), 0),
            value: 0,
            lock: LockScript::DataCarrier(vec![0x43]),
            sequence: SEQUENCE_FINAL,
            color: None,
        });

        let err = KeychainSigner::new(keychain).sign_draft(&draft).unwrap_err();
        assert_eq!(err, SignError::SigningFailed { input_index: 0 });
    }

    #[test]
    fn signing_preserves_the_draft_txid() {
        let keychain = Arc::new(Keychain::mainnet());
        let address = keychain.generate_address().unwrap();
        let draft = draft_spending(&[&address]);
        let expected = draft.expected_txid();

        let signed = KeychainSigner::new(keychain).sign_draft(&draft).unwrap();
        assert_eq!(signed.transaction.id, expected);
        assert_eq!(signed.transaction.compute_id(), expected);
    }
}
