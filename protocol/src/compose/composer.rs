//! # The transaction composer
//!
//! Coin selection and draft construction under per-color conservation.
//! The composer's one guarantee: it never creates or destroys color. For
//! every asset in a draft, the units entering through selected inputs
//! equal the units leaving through produced outputs — transfers plus
//! change — and before returning, the composer replays the asset's kernel
//! over the draft to prove its own bookkeeping.
//!
//! ## Draft layout
//!
//! The positional kernels make layout part of correctness. Drafts are
//! always assembled as:
//!
//! ```text
//! inputs:  [group 1 colored] [group 2 colored] ... [uncolored for fee]
//! outputs: [kernel padding] [group 1 transfers+change] [group 2 ...] [base change]
//! ```
//!
//! Colored inputs are fully colored (unit count equals ledger value), and
//! colored outputs are valued at exactly their unit count, so each group's
//! span on the joint value line meets its outputs' span edge to edge. The
//! fee always comes out of the uncolored tail.

use thiserror::Error;

use crate::asset::AssetDefinition;
use crate::config::{
    MAX_TX_INPUTS, MAX_TX_OUTPUTS, TX_BASE_WEIGHT, TX_INPUT_WEIGHT, TX_OUTPUT_WEIGHT,
};
use crate::graph::{LockScript, OutPoint, TxOutput};
use crate::kernel::KernelId;

use super::draft::{
    CandidateOutput, ColorManifest, ComposerConfig, DraftInput, DraftOutput, TransferTarget,
    UnsignedDraft, UNTAGGED,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by draft composition. No partial drafts: any error
/// means nothing was produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// The transfer list was empty.
    #[error("no transfers requested")]
    NoTransfers,

    /// A transfer requested zero units.
    #[error("zero-amount transfer for asset {0}")]
    ZeroAmount(String),

    /// Transfers span assets whose kernels disagree. A transaction has
    /// one tag-bearing field, so one draft speaks one scheme.
    #[error("transfers mix incompatible kernels: {first} and {second}")]
    IncompatibleKernels {
        /// Kernel of the first transfer's asset.
        first: KernelId,
        /// The first disagreeing kernel encountered.
        second: KernelId,
    },

    /// Not enough of an asset among the candidates.
    #[error("insufficient funds for asset {asset}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// The asset that came up short.
        asset: String,
        /// Units the transfers require.
        requested: u64,
        /// Units the candidates offer.
        available: u64,
    },

    /// Not enough uncolored value to pay the fee (and, for issuance, fund
    /// the declared supply).
    #[error("insufficient base funds: requested {requested}, available {available}")]
    InsufficientBaseFunds {
        /// Base units required.
        requested: u64,
        /// Base units the uncolored candidates offer.
        available: u64,
    },

    /// The draft would exceed the transaction limits.
    #[error("draft exceeds transaction limits: {inputs} inputs, {outputs} outputs")]
    DraftTooLarge {
        /// Inputs the draft would carry.
        inputs: usize,
        /// Outputs the draft would carry.
        outputs: usize,
    },

    /// Replaying the kernel over the finished draft did not reproduce the
    /// intended manifest. Internal invariant guard; composed drafts never
    /// leave with broken color algebra.
    #[error("composed draft does not reproduce the {asset} manifest")]
    ManifestMismatch {
        /// The asset whose manifest failed verification.
        asset: String,
    },
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

/// An issuance draft plus the genesis outpoint it will create.
///
/// The genesis outpoint references [`UnsignedDraft::expected_txid`], which
/// signing does not change — the asset can be registered before the
/// transaction is broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuanceDraft {
    /// The unsigned issuance transaction.
    pub draft: UnsignedDraft,
    /// Where the new asset's supply will live.
    pub genesis: OutPoint,
}

/// Builds unsigned drafts from resolved candidates and transfer targets.
///
/// One draft per call; composition is synchronous and self-contained.
/// Candidates arrive with their color already resolved — the composer
/// performs no ledger access.
#[derive(Clone, Copy, Debug, Default)]
pub struct Composer {
    config: ComposerConfig,
}

/// Transfers for one asset plus the inputs selected to fund them.
struct ColorGroup<'a> {
    asset: AssetDefinition,
    requested: u64,
    transfers: Vec<&'a TransferTarget>,
    selected: Vec<&'a CandidateOutput>,
    selected_value: u64,
}

impl Composer {
    /// Creates a composer with the given configuration.
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Builds an unsigned transfer draft.
    ///
    /// `change_for` names the change destination per asset; `base_change`
    /// receives leftover uncolored value. Selection is greedy largest
    /// first with outpoint order breaking ties, so the same candidates
    /// and transfers always produce the same draft.
    ///
    /// # Errors
    ///
    /// See [`ComposeError`]; shortfalls name the exact asset and amounts.
    pub fn compose<F>(
        &self,
        candidates: &[CandidateOutput],
        transfers: &[TransferTarget],
        change_for: F,
        base_change: LockScript,
    ) -> Result<UnsignedDraft, ComposeError>
    where
        F: Fn(&AssetDefinition) -> LockScript,
    {
        if transfers.is_empty() {
            return Err(ComposeError::NoTransfers);
        }

        // Group transfers by asset, preserving first-appearance order.
        let mut groups: Vec<ColorGroup> = Vec::new();
        for transfer in transfers {
            if transfer.amount == 0 {
                return Err(ComposeError::ZeroAmount(transfer.asset.moniker.clone()));
            }
            match groups.iter_mut().find(|g| g.asset == transfer.asset) {
                Some(group) => {
                    group.requested += transfer.amount;
                    group.transfers.push(transfer);
                }
                None => groups.push(ColorGroup {
                    asset: transfer.asset.clone(),
                    requested: transfer.amount,
                    transfers: vec![transfer],
                    selected: Vec::new(),
                    selected_value: 0,
                }),
            }
        }

        // One tag-bearing field per transaction: every group must speak
        // the same scheme.
        let kernel_id = groups[0].asset.kernel;
        if let Some(conflicting) = groups.iter().find(|g| g.asset.kernel != kernel_id) {
            return Err(ComposeError::IncompatibleKernels {
                first: kernel_id,
                second: conflicting.asset.kernel,
            });
        }
        let kernel = kernel_id.kernel();

        // Greedy per-color selection. Only fully colored candidates keep
        // the value line aligned; a partially colored output cannot be
        // spent without splitting color mid-output.
        for group in &mut groups {
            let mut available: Vec<&CandidateOutput> = candidates
                .iter()
                .filter(|c| {
                    let amount = c.color_amount(&group.asset);
                    amount > 0 && amount == c.value
                })
                .collect();
            available.sort_by(|a, b| b.value.cmp(&a.value).then(a.outpoint.cmp(&b.outpoint)));
            let total_available: u64 = available.iter().map(|c| c.value).sum();

            for candidate in available {
                if group.selected_value >= group.requested {
                    break;
                }
                group.selected.push(candidate);
                group.selected_value += candidate.value;
            }
            if group.selected_value < group.requested {
                return Err(ComposeError::InsufficientFunds {
                    asset: group.asset.moniker.clone(),
                    requested: group.requested,
                    available: total_available,
                });
            }
        }

        // Colored side of the draft.
        let mut inputs: Vec<DraftInput> = Vec::new();
        let mut colored_outputs: Vec<DraftOutput> = Vec::new();
        for group in &groups {
            for candidate in &group.selected {
                inputs.push(DraftInput {
                    outpoint: candidate.outpoint,
                    value: candidate.value,
                    lock: candidate.lock.clone(),
                    sequence: UNTAGGED,
                    color: Some(ColorManifest {
                        asset: group.asset.moniker.clone(),
                        amount: candidate.value,
                    }),
                });
            }
            for transfer in &group.transfers {
                colored_outputs.push(DraftOutput {
                    value: transfer.amount,
                    lock: transfer.to.clone(),
                    color: Some(ColorManifest {
                        asset: group.asset.moniker.clone(),
                        amount: transfer.amount,
                    }),
                });
            }
            let change = group.selected_value - group.requested;
            if change > 0 {
                colored_outputs.push(DraftOutput {
                    value: change,
                    lock: change_for(&group.asset),
                    color: Some(ColorManifest {
                        asset: group.asset.moniker.clone(),
                        amount: change,
                    }),
                });
            }
        }

        // Kernel padding around the logical outputs.
        let logical: Vec<TxOutput> = colored_outputs
            .iter()
            .map(|o| TxOutput {
                value: o.value,
                lock: o.lock.clone(),
            })
            .collect();
        let padding = kernel.compose_padding(&logical);

        // Uncolored inputs for the fee.
        let committed_outputs = padding.len() + colored_outputs.len();
        let (base_inputs, base_value, mut fee) =
            self.select_base(candidates, inputs.len(), committed_outputs, 0)?;

        let mut outputs: Vec<DraftOutput> = padding
            .leading
            .iter()
            .map(|p| DraftOutput {
                value: p.value,
                lock: p.lock.clone(),
                color: None,
            })
            .collect();
        outputs.extend(colored_outputs);

        let base_change_value = base_value - fee;
        if base_change_value >= self.config.dust_threshold {
            outputs.push(DraftOutput {
                value: base_change_value,
                lock: base_change,
                color: None,
            });
        } else {
            // Sub-dust change is uneconomical to spend; fold it into the fee.
            fee += base_change_value;
        }

        for candidate in base_inputs {
            inputs.push(DraftInput {
                outpoint: candidate.outpoint,
                value: candidate.value,
                lock: candidate.lock.clone(),
                sequence: UNTAGGED,
                color: None,
            });
        }

        // The scheme tag rides the first input's sequence field.
        if let (Some(tag), Some(first)) = (padding.sequence_tag, inputs.first_mut()) {
            first.sequence = tag;
        }

        if inputs.len() > MAX_TX_INPUTS || outputs.len() > MAX_TX_OUTPUTS {
            return Err(ComposeError::DraftTooLarge {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }

        let draft = UnsignedDraft {
            inputs,
            outputs,
            fee,
        };

        // Conservation self-check: replay every asset's kernel over the
        // finished draft and demand the intended manifests back.
        for group in &groups {
            self.verify_manifest(&draft, &group.asset)?;
        }

        tracing::debug!(
            txid = %draft.expected_txid(),
            inputs = draft.inputs.len(),
            outputs = draft.outputs.len(),
            fee = draft.fee,
            "composed transfer draft"
        );
        Ok(draft)
    }

    /// Builds an unsigned issuance draft declaring `supply` units of a
    /// new asset.
    ///
    /// The supply is funded from uncolored candidates — issuance is the
    /// one place color comes into existence, and it does so by locking
    /// base value under a genesis output. The returned genesis outpoint
    /// is what [`AssetRegistry::define`](crate::asset::AssetRegistry::define)
    /// should record.
    pub fn compose_issuance(
        &self,
        moniker: &str,
        kernel_id: KernelId,
        supply: u64,
        to: LockScript,
        candidates: &[CandidateOutput],
        base_change: LockScript,
    ) -> Result<IssuanceDraft, ComposeError> {
        if supply == 0 {
            return Err(ComposeError::ZeroAmount(moniker.to_string()));
        }
        let kernel = kernel_id.kernel();
        let padding = kernel.issuance_padding();

        let committed_outputs = padding.len() + 1;
        let (base_inputs, base_value, mut fee) =
            self.select_base(candidates, 0, committed_outputs, supply)?;

        let mut outputs: Vec<DraftOutput> = padding
            .leading
            .iter()
            .map(|p| DraftOutput {
                value: p.value,
                lock: p.lock.clone(),
                color: None,
            })
            .collect();
        let genesis_vout = outputs.len() as u32;
        outputs.push(DraftOutput {
            value: supply,
            lock: to,
            color: Some(ColorManifest {
                asset: moniker.to_string(),
                amount: supply,
            }),
        });

        let base_change_value = base_value - fee - supply;
        if base_change_value >= self.config.dust_threshold {
            outputs.push(DraftOutput {
                value: base_change_value,
                lock: base_change,
                color: None,
            });
        } else {
            fee += base_change_value;
        }

        let mut inputs: Vec<DraftInput> = base_inputs
            .into_iter()
            .map(|candidate| DraftInput {
                outpoint: candidate.outpoint,
                value: candidate.value,
                lock: candidate.lock.clone(),
                sequence: UNTAGGED,
                color: None,
            })
            .collect();
        if let (Some(tag), Some(first)) = (padding.sequence_tag, inputs.first_mut()) {
            first.sequence = tag;
        }

        if inputs.len() > MAX_TX_INPUTS || outputs.len() > MAX_TX_OUTPUTS {
            return Err(ComposeError::DraftTooLarge {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }

        let draft = UnsignedDraft {
            inputs,
            outputs,
            fee,
        };
        let genesis = OutPoint::new(draft.expected_txid(), genesis_vout);

        // The declared supply must be readable off the finished draft.
        let tx = draft.to_transaction();
        if kernel.issuance_value(&tx, genesis_vout) != Some(supply) {
            return Err(ComposeError::ManifestMismatch {
                asset: moniker.to_string(),
            });
        }

        tracing::debug!(
            txid = %genesis.txid,
            vout = genesis.vout,
            supply,
            kernel = %kernel_id,
            "composed issuance draft"
        );
        Ok(IssuanceDraft { draft, genesis })
    }

    /// Selects uncolored inputs until they cover `extra_required` plus
    /// the fee, re-estimating the fee as inputs are added. The estimate
    /// reserves room for one base change output.
    fn select_base<'a>(
        &self,
        candidates: &'a [CandidateOutput],
        colored_inputs: usize,
        committed_outputs: usize,
        extra_required: u64,
    ) -> Result<(Vec<&'a CandidateOutput>, u64, u64), ComposeError> {
        let mut available: Vec<&CandidateOutput> =
            candidates.iter().filter(|c| c.color.is_none()).collect();
        available.sort_by(|a, b| b.value.cmp(&a.value).then(a.outpoint.cmp(&b.outpoint)));

        let mut selected: Vec<&CandidateOutput> = Vec::new();
        let mut value: u64 = 0;
        let mut remaining = available.into_iter();
        loop {
            let fee = self.estimate_fee(colored_inputs + selected.len(), committed_outputs + 1);
            let required = extra_required.saturating_add(fee);
            if value >= required {
                return Ok((selected, value, fee));
            }
            match remaining.next() {
                Some(candidate) => {
                    value += candidate.value;
                    selected.push(candidate);
                }
                None => {
                    return Err(ComposeError::InsufficientBaseFunds {
                        requested: required,
                        available: value,
                    })
                }
            }
        }
    }

    /// Fee for a draft of the given shape at the configured rate.
    fn estimate_fee(&self, inputs: usize, outputs: usize) -> u64 {
        let size = TX_BASE_WEIGHT + inputs * TX_INPUT_WEIGHT + outputs * TX_OUTPUT_WEIGHT;
        (size as u64) * self.config.fee_rate
    }

    /// Replays `asset`'s kernel over the draft and compares against the
    /// intended manifests.
    fn verify_manifest(
        &self,
        draft: &UnsignedDraft,
        asset: &AssetDefinition,
    ) -> Result<(), ComposeError> {
        let mismatch = || ComposeError::ManifestMismatch {
            asset: asset.moniker.clone(),
        };

        let tx = draft.to_transaction();
        let input_colors: Vec<u64> = draft
            .inputs
            .iter()
            .map(|input| {
                input
                    .color
                    .as_ref()
                    .filter(|m| m.asset == asset.moniker)
                    .map_or(0, |m| m.amount)
            })
            .collect();

        let verdict = asset.kernel.kernel().apply(&tx, &input_colors);
        let colors = verdict.colors().ok_or_else(mismatch)?;
        for (index, output) in draft.outputs.iter().enumerate() {
            let intended = output
                .color
                .as_ref()
                .filter(|m| m.asset == asset.moniker)
                .map_or(0, |m| m.amount);
            if colors.get(index).copied().unwrap_or(0) != intended {
                return Err(mismatch());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
