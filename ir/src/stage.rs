//! Stage descriptions: one fused compute operation and its iteration space.

use bon::bon;
use smallvec::SmallVec;

use crate::types::{Axis, BufferId};

/// One fused compute operation.
///
/// Axis positions are derived from declaration order. The stage's rank in a
/// chain is not stored here; the orchestrator assigns it from the chain
/// position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    name: String,
    spatial: SmallVec<[Axis; 4]>,
    reduction: SmallVec<[Axis; 2]>,
    output: BufferId,
}

#[bon]
impl Stage {
    /// Describe a stage from its axis extents.
    ///
    /// ```ignore
    /// let stage = Stage::builder().name("sum").output(buf).spatial(vec![128, 1]).reduction(vec![64]).build();
    /// ```
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        output: BufferId,
        spatial: Vec<usize>,
        #[builder(default)] reduction: Vec<usize>,
    ) -> Self {
        Self {
            name,
            spatial: spatial.into_iter().enumerate().map(|(i, extent)| Axis::spatial(i, extent)).collect(),
            reduction: reduction.into_iter().enumerate().map(|(i, extent)| Axis::reduction(i, extent)).collect(),
            output,
        }
    }
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output buffer handle in the schedule engine.
    pub fn output(&self) -> BufferId {
        self.output
    }

    pub fn spatial(&self) -> &[Axis] {
        &self.spatial
    }

    pub fn reduction(&self) -> &[Axis] {
        &self.reduction
    }

    pub fn has_reduction(&self) -> bool {
        !self.reduction.is_empty()
    }

    pub fn spatial_extents(&self) -> SmallVec<[usize; 4]> {
        self.spatial.iter().map(|axis| axis.extent).collect()
    }

    pub fn reduction_extents(&self) -> SmallVec<[usize; 2]> {
        self.reduction.iter().map(|axis| axis.extent).collect()
    }
}
