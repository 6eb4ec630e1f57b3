//! The schedule-engine interface consumed by the planner.
//!
//! An engine owns the tensor-expression IR and exposes handle-based mutation
//! primitives. Everything here is synchronous; implementations reject only
//! structurally invalid input (see [`crate::Error`]).

use smallvec::SmallVec;

use crate::error::Result;
use crate::types::{AxisId, BufferId, GpuDim, MemScope};

/// Root axis handles of one stage, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageAxes {
    pub spatial: SmallVec<[AxisId; 4]>,
    pub reduction: SmallVec<[AxisId; 2]>,
}

pub trait ScheduleEngine {
    /// Root spatial and reduction axes of the stage computing `buffer`.
    fn stage_axes(&self, buffer: BufferId) -> Result<StageAxes>;

    fn extent(&self, axis: AxisId) -> Result<usize>;

    /// Replace a leaf axis by `sizes.len()` sub-axes, outer to inner.
    ///
    /// The product of `sizes` must cover the axis extent.
    fn split(&mut self, buffer: BufferId, axis: AxisId, sizes: &[usize]) -> Result<SmallVec<[AxisId; 4]>>;

    fn bind(&mut self, buffer: BufferId, axis: AxisId, dim: GpuDim) -> Result<()>;

    /// Place the listed leaf axes, in order, into the loop positions they occupy together.
    fn reorder(&mut self, buffer: BufferId, order: &[AxisId]) -> Result<()>;

    /// Nest the stage computing `buffer` inside loop `axis` of stage `parent`.
    fn compute_at(&mut self, buffer: BufferId, parent: BufferId, axis: AxisId) -> Result<()>;

    fn set_scope(&mut self, buffer: BufferId, scope: MemScope) -> Result<()>;

    /// Mark a leaf axis for full unrolling during lowering.
    fn unroll(&mut self, buffer: BufferId, axis: AxisId) -> Result<()>;

    /// Create a `scope` stage that performs the reduction of `buffer`.
    ///
    /// `buffer` becomes the pointwise stage copying the cached result to the real
    /// output; its spatial handles stay valid and its reduction axes move to the
    /// returned stage.
    fn cache_write(&mut self, buffer: BufferId, scope: MemScope) -> Result<BufferId>;
}
