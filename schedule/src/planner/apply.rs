//! Committing a [`StagePlan`] to a schedule engine.

use smallvec::SmallVec;
use snafu::OptionExt;
use vtile_ir::{AxisId, BufferId, GpuDim, ScheduleEngine};

use super::plan::{LoopRef, ReductionTiling, StagePlan, Staging};
use super::unit::PlanUnit;
use crate::error::*;

/// Engine handles produced while applying a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStage {
    pub rank: usize,
    /// Stage whose spatial axes were tiled and bound.
    pub target: BufferId,
    pub staging: Option<BufferId>,
    /// Sub-axes of each tile, parallel to `StagePlan::tiles`.
    pub tiles: Vec<SmallVec<[AxisId; 4]>>,
    /// Loop nest passed to reorder, outer to inner.
    pub order: Vec<AxisId>,
    /// Sub-axes of each reduction split, parallel to `StagePlan::reductions`.
    pub reductions: Vec<SmallVec<[AxisId; 4]>>,
}

impl StagePlan {
    /// Issue the plan's primitives against `engine`.
    ///
    /// `unit` must be the unit the plan was made from. Engine rejections are
    /// returned as-is; the engine may be partially mutated at that point.
    #[tracing::instrument(skip_all, fields(rank = self.rank))]
    pub fn apply<E: ScheduleEngine + ?Sized>(&self, engine: &mut E, unit: &PlanUnit<'_>) -> Result<AppliedStage> {
        let rank = self.rank;
        let head = unit.head();

        let (target, staging) = match self.staging {
            None => (unit.target().output(), None),
            Some(Staging::CacheWrite { scope }) => {
                let local = engine.cache_write(head.output(), scope)?;
                (head.output(), Some(local))
            }
            Some(Staging::ReuseHead { scope }) => {
                let tail = unit.tail().context(PlanMismatchSnafu { rank, reason: "staging reuses a missing tail" })?;
                engine.set_scope(head.output(), scope)?;
                (tail.output(), Some(head.output()))
            }
        };

        let axes = engine.stage_axes(target)?;
        let spatial = |position: usize| {
            axes.spatial.get(position).copied().context(PlanMismatchSnafu { rank, reason: "spatial position" })
        };

        for &position in &self.bypassed {
            engine.bind(target, spatial(position)?, GpuDim::VThread)?;
        }

        let mut tiles = Vec::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            let parts = engine.split(target, spatial(tile.position)?, tile.split.sizes())?;
            snafu::ensure!(parts.len() == tile.parts(), PlanMismatchSnafu { rank, reason: "split arity" });
            for (part, dim) in tile.bindings() {
                engine.bind(target, parts[part], dim)?;
            }
            tiles.push(parts);
        }

        let resolve = |loop_ref: LoopRef| {
            let tile = self.tiles.get(loop_ref.tile()).context(PlanMismatchSnafu { rank, reason: "loop reference" })?;
            let part = match loop_ref {
                LoopRef::Low(_) => tile.low_part(),
                LoopRef::High(_) => tile.high_part(),
            };
            Ok::<_, PlanError>(tiles[loop_ref.tile()][part])
        };
        let order = self.order.iter().map(|&loop_ref| resolve(loop_ref)).collect::<Result<Vec<_>>>()?;
        engine.reorder(target, &order)?;
        tracing::debug!(%target, ?order, "applied loop order");

        let mut reductions = Vec::with_capacity(self.reductions.len());
        if let Some(local) = staging {
            let attach = self.attach.context(PlanMismatchSnafu { rank, reason: "staging without attach point" })?;
            engine.compute_at(local, target, resolve(attach)?)?;

            let local_axes = engine.stage_axes(local)?;
            for reduction in &self.reductions {
                let axis = local_axes
                    .reduction
                    .get(reduction.position)
                    .copied()
                    .context(PlanMismatchSnafu { rank, reason: "reduction position" })?;
                let parts = engine.split(local, axis, reduction.split.sizes())?;
                snafu::ensure!(parts.len() == 3, PlanMismatchSnafu { rank, reason: "reduction split arity" });
                if reduction.unroll {
                    engine.unroll(local, parts[ReductionTiling::UNROLL_PART])?;
                }
                reductions.push(parts);
            }
            tracing::debug!(%local, %target, reductions = reductions.len(), "staged reduction");
        }

        Ok(AppliedStage { rank, target, staging, tiles, order, reductions })
    }
}
