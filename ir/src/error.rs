use snafu::Snafu;

use crate::types::{AxisId, BufferId, GpuDim};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structural rejections raised by a schedule engine.
///
/// None of these is recoverable inside a planning pass: they mean the caller's
/// bookkeeping disagrees with the engine's state.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("unknown buffer {buffer}"))]
    UnknownBuffer { buffer: BufferId },

    #[snafu(display("unknown axis {axis}"))]
    UnknownAxis { axis: AxisId },

    /// Axis exists but is owned by another stage.
    #[snafu(display("axis {axis} does not belong to stage {buffer}"))]
    ForeignAxis { axis: AxisId, buffer: BufferId },

    /// Axis was already split and no longer appears in the loop nest.
    #[snafu(display("axis {axis} is not a leaf of the loop nest"))]
    NotLeaf { axis: AxisId },

    #[snafu(display("axis {axis} is already bound to {dim}"))]
    AlreadyBound { axis: AxisId, dim: GpuDim },

    /// Physical dimension already taken by another axis of the same stage.
    #[snafu(display("{dim} of stage {buffer} is already bound to axis {holder}"))]
    DimensionTaken { dim: GpuDim, buffer: BufferId, holder: AxisId },

    #[snafu(display("axis {axis} is unrolled and cannot be bound"))]
    BindUnrolled { axis: AxisId },

    #[snafu(display("axis {axis} is bound to {dim} and cannot be unrolled"))]
    UnrollBound { axis: AxisId, dim: GpuDim },

    #[snafu(display("invalid split of axis {axis} (extent {extent}) into {sizes:?}"))]
    InvalidSplit { axis: AxisId, extent: usize, sizes: Vec<usize> },

    #[snafu(display("axis {axis} appears more than once in reorder"))]
    DuplicateReorder { axis: AxisId },

    #[snafu(display("stage {buffer} cannot be computed at itself"))]
    SelfAttach { buffer: BufferId },

    #[snafu(display("stage {buffer} is already attached to {parent}"))]
    AlreadyAttached { buffer: BufferId, parent: BufferId },

    #[snafu(display("stage {name} has a zero extent"))]
    ZeroExtent { name: String },
}
