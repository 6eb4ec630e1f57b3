//! What one planner invocation schedules.

use snafu::ensure;
use vtile_ir::Stage;

use crate::error::*;

/// A pointwise stage fused behind its predecessor.
///
/// Only constructible from a stage without reduction axes.
#[derive(Debug, Clone, Copy)]
pub struct TailStage<'a>(&'a Stage);

impl<'a> TailStage<'a> {
    pub fn new(stage: &'a Stage) -> Result<Self> {
        ensure!(!stage.has_reduction(), TailHasReductionSnafu { stage: stage.name() });
        Ok(Self(stage))
    }

    pub fn stage(&self) -> &'a Stage {
        self.0
    }
}

/// Input of one planner invocation.
#[derive(Debug, Clone, Copy)]
pub enum PlanUnit<'a> {
    /// A stage scheduled on its own output.
    Standalone(&'a Stage),
    /// A stage whose output is finished off by a fused pointwise tail.
    ///
    /// When the head reduces, its output becomes the staging buffer and the
    /// tail's output is the tiled kernel output.
    Fused { head: &'a Stage, tail: TailStage<'a> },
}

impl<'a> PlanUnit<'a> {
    /// Pair `head` with a fused `tail`.
    ///
    /// A reducing head shares its iteration space with the tail, so their
    /// spatial extents must agree.
    pub fn fused(head: &'a Stage, tail: &'a Stage) -> Result<Self> {
        let tail = TailStage::new(tail)?;
        if head.has_reduction() {
            let (head_extents, tail_extents) = (head.spatial_extents(), tail.stage().spatial_extents());
            ensure!(
                head_extents == tail_extents,
                TailShapeMismatchSnafu {
                    head: head.name(),
                    tail: tail.stage().name(),
                    head_extents: head_extents.to_vec(),
                    tail_extents: tail_extents.to_vec(),
                }
            );
        }
        Ok(Self::Fused { head, tail })
    }

    /// The stage whose extents drive the plan and whose reductions get staged.
    pub fn head(&self) -> &'a Stage {
        match *self {
            Self::Standalone(stage) | Self::Fused { head: stage, .. } => stage,
        }
    }

    pub fn tail(&self) -> Option<&'a Stage> {
        match *self {
            Self::Standalone(_) => None,
            Self::Fused { tail, .. } => Some(tail.stage()),
        }
    }

    /// The stage whose spatial axes get split, bound and reordered.
    pub fn target(&self) -> &'a Stage {
        match *self {
            Self::Fused { head, tail } if head.has_reduction() => tail.stage(),
            _ => self.head(),
        }
    }
}
