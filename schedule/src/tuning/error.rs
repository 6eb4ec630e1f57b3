use snafu::Snafu;

use super::space::Knob;
use super::{ReorderPolicy, TuneKey};

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum TuneError {
    /// The same key was defined twice with different shapes.
    #[snafu(display("knob {key} redefined: {existing:?} vs {requested:?}"))]
    KnobConflict { key: TuneKey, existing: Knob, requested: Knob },

    #[snafu(display("no decision recorded for knob {key}"))]
    MissingKnob { key: TuneKey },

    #[snafu(display("knob {key} holds a {found} decision, expected {expected}"))]
    DecisionMismatch { key: TuneKey, expected: &'static str, found: &'static str },

    #[snafu(display("split {sizes:?} for knob {key} does not cover extent {extent} in {num_outputs} parts"))]
    InvalidSplit { key: TuneKey, extent: usize, num_outputs: usize, sizes: Vec<usize> },

    #[snafu(display("{perm:?} is not a {policy} permutation of {len} items for knob {key}"))]
    InvalidPermutation { key: TuneKey, len: usize, perm: Vec<usize>, policy: ReorderPolicy },

    #[snafu(display("config index {index} out of space of size {size}"))]
    IndexOutOfSpace { index: usize, size: usize },
}
