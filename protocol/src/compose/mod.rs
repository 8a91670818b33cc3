//! Coin selection and unsigned-draft construction under per-color
//! conservation.

pub mod composer;
pub mod draft;

pub use composer::{ComposeError, Composer, IssuanceDraft};
pub use draft::{
    CandidateOutput, ColorManifest, ComposerConfig, DraftInput, DraftOutput, TransferTarget,
    UnsignedDraft,
};
