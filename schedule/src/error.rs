use snafu::Snafu;

use crate::tuning::TuneError;

pub type Result<T, E = PlanError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum PlanError {
    #[snafu(display("cannot schedule an empty stage chain"))]
    EmptyChain,

    #[snafu(display("stage {stage} has no spatial axes"))]
    NoSpatialAxes { stage: String },

    #[snafu(display("stage {stage} has a zero-extent axis"))]
    ZeroExtent { stage: String },

    /// Only pointwise stages can be fused behind a reduction.
    #[snafu(display("stage {stage} has reduction axes and cannot be a fused tail"))]
    TailHasReduction { stage: String },

    #[snafu(display("fused tail {tail} has spatial extents {tail_extents:?}, head {head} has {head_extents:?}"))]
    TailShapeMismatch { head: String, tail: String, head_extents: Vec<usize>, tail_extents: Vec<usize> },

    /// A plan was applied to a unit or engine state it was not made for.
    #[snafu(display("plan for rank {rank} does not match its stage: {reason}"))]
    PlanMismatch { rank: usize, reason: &'static str },

    #[snafu(display("tuning configuration rejected a knob: {source}"), context(false))]
    Tuning { source: TuneError },

    #[snafu(display("schedule engine rejected a primitive: {source}"), context(false))]
    Engine { source: vtile_ir::Error },
}
