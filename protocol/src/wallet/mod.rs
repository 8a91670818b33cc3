//! Wallet collaborators: the keychain that holds spending authority and
//! the signer that turns unsigned drafts into broadcastable transactions.
//!
//! The color engine itself never sees a private key. It hands back an
//! [`UnsignedDraft`](crate::compose::UnsignedDraft); everything in this
//! module sits on the far side of that boundary.

pub mod keychain;
pub mod signer;

pub use keychain::{ChromaKeypair, KeyError, Keychain};
pub use signer::{DraftSigner, KeychainSigner, SignError};
