//! # OBC — the simple order-based kernel
//!
//! The oldest and simplest coloring scheme: color flows along the joint
//! value line of a transaction. Lay every input's value end to end on a
//! number line; the first `color[i]` units of input `i`'s span are colored.
//! Outputs then consume the same line left to right, and an output's color
//! is the colored measure that lands inside its span.
//!
//! The rule is strictly positional. Swapping two inputs without swapping
//! their color values moves the colored spans and changes which outputs
//! they land in — input order is consensus-relevant.
//!
//! Colored measure that falls past the last output (the fee gap) is
//! destroyed. The composer never lets that happen to its own drafts; for
//! historical transactions it is simply what the scheme says.

use crate::graph::{LedgerTransaction, TxInput, TxOutput};

use super::{KernelVerdict, PaddingPlan};

/// The simple order-based kernel. Stateless; all methods are pure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObcKernel;

impl ObcKernel {
    /// An output can carry color if it is a spendable, nonzero-value
    /// address output. Data carriers and zero-value outputs cannot.
    pub fn is_colorable(&self, output: &TxOutput) -> bool {
        !output.lock.is_unspendable() && output.value > 0
    }

    /// Maps an input color vector to an output color vector.
    ///
    /// Returns [`KernelVerdict::Uncolorable`] for structurally malformed
    /// arguments: a color vector that is not aligned to the inputs, or a
    /// claimed color exceeding an input's recorded value.
    pub fn apply(&self, tx: &LedgerTransaction, input_colors: &[u64]) -> KernelVerdict {
        if input_colors.len() != tx.inputs.len() {
            return KernelVerdict::Uncolorable;
        }
        match distribute(&tx.inputs, input_colors, &tx.outputs) {
            Some(colors) => KernelVerdict::Colored(colors),
            None => KernelVerdict::Uncolorable,
        }
    }

    /// The supply declared by an OBC genesis output: its ledger value.
    ///
    /// `None` if the output does not exist or cannot carry color.
    pub fn issuance_value(&self, tx: &LedgerTransaction, vout: u32) -> Option<u64> {
        let output = tx.outputs.get(vout as usize)?;
        if !self.is_colorable(output) {
            return None;
        }
        Some(output.value)
    }

    /// OBC needs no markers and no tag: the colored outputs stand alone.
    pub fn compose_padding(&self, _logical_outputs: &[TxOutput]) -> PaddingPlan {
        PaddingPlan {
            leading: Vec::new(),
            sequence_tag: None,
        }
    }

    /// Issuance is equally unadorned: the genesis output is simply the
    /// first output of an ordinary transaction.
    pub fn issuance_padding(&self) -> PaddingPlan {
        PaddingPlan {
            leading: Vec::new(),
            sequence_tag: None,
        }
    }
}

/// Order-based distribution over the joint value line.
///
/// Shared with the enhanced kernel, which calls it on the output slice
/// that remains after stripping its padding outputs. Returns `None` when
/// a color exceeds its input's value or the line arithmetic would
/// overflow — both are malformed-transaction conditions, not panics.
pub(super) fn distribute(
    inputs: &[TxInput],
    input_colors: &[u64],
    outputs: &[TxOutput],
) -> Option<Vec<u64>> {
    // Colored spans on the input side of the line: input `i` occupies
    // `value_i` units, of which the leading `color_i` are colored.
    let mut spans: Vec<(u64, u64)> = Vec::new();
    let mut cursor: u64 = 0;
    for (input, &color) in inputs.iter().zip(input_colors) {
        if color > input.value {
            return None;
        }
        if color > 0 {
            spans.push((cursor, cursor.checked_add(color)?));
        }
        cursor = cursor.checked_add(input.value)?;
    }

    // Outputs consume the same line left to right. Non-colorable outputs
    // still occupy their recorded value but receive no color.
    let mut colors = Vec::with_capacity(outputs.len());
    let mut pos: u64 = 0;
    for output in outputs {
        let end = pos.checked_add(output.value)?;
        if output.lock.is_unspendable() || output.value == 0 {
            colors.push(0);
            pos = end;
            continue;
        }
        let mut colored = 0u64;
        for &(lo, hi) in &spans {
            let start = lo.max(pos);
            let stop = hi.min(end);
            if stop > start {
                colored += stop - start;
            }
        }
        colors.push(colored);
        pos = end;
    }
    Some(colors)
}
