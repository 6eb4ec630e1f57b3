//! Axis-mapping planner.
//!
//! Maps the spatial axes of one stage onto the GPU hierarchy and stages its
//! reduction through a local accumulator:
//!
//! 1. **Staging** - reducing stages get a local buffer (cache write, or the
//!    head's own output when a pointwise tail is fused behind it)
//! 2. **Bypass** - degenerate axes bind straight to a virtual thread
//! 3. **Tiling** - the first three tileable axes split 4-way into
//!    `[block, vthread, thread, vthread]`, the rest 2-way into virtual threads
//! 4. **Reorder** - a tuned permutation over the outer virtual threads, each
//!    inner virtual thread nested right before its outer sibling
//! 5. **Reduction tiling** - the staging buffer is attached at the innermost
//!    loop and every non-trivial reduction axis splits 3-way with its
//!    thread-tile unrolled
//!
//! Planning is pure: [`plan_stage`] only talks to the tuning configuration and
//! returns a [`StagePlan`]. [`StagePlan::apply`] commits it to an engine.

pub mod apply;
pub mod plan;
pub mod unit;

use snafu::ensure;
use vtile_ir::{GpuDim, ScheduleEngine};

pub use apply::AppliedStage;
pub use plan::{AxisTiling, LoopRef, ReductionTiling, StagePlan, Staging, SubAxis, TileKind};
pub use unit::{PlanUnit, TailStage};

use crate::config::PlannerOptions;
use crate::error::*;
use crate::tuning::{TuneKey, TuningConfig};

/// Split spatial positions into (tileable, bypassed).
///
/// An axis is tileable when it has extent > 1, or when it is the last axis
/// and nothing has been selected yet, so a fully degenerate stage still tiles
/// its last axis.
pub fn select_tileable(extents: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut tileable = Vec::with_capacity(extents.len());
    let mut bypassed = Vec::new();
    for (position, &extent) in extents.iter().enumerate() {
        if extent > 1 || (position + 1 == extents.len() && tileable.is_empty()) {
            tileable.push(position);
        } else {
            bypassed.push(position);
        }
    }
    (tileable, bypassed)
}

/// Decide the mapping of one stage.
///
/// Queries `config` under keys namespaced by `rank`. Fails on an invalid stage
/// shape or when the configuration rejects or violates a knob.
#[tracing::instrument(skip_all, fields(rank = rank, stage = unit.head().name()))]
pub fn plan_stage<C: TuningConfig + ?Sized>(
    config: &mut C,
    unit: &PlanUnit<'_>,
    rank: usize,
    options: &PlannerOptions,
) -> Result<StagePlan> {
    let head = unit.head();
    ensure!(!head.spatial().is_empty(), NoSpatialAxesSnafu { stage: head.name() });
    ensure!(
        head.spatial().iter().chain(head.reduction()).all(|axis| axis.extent > 0),
        ZeroExtentSnafu { stage: head.name() }
    );

    let staging = head.has_reduction().then(|| match unit {
        PlanUnit::Standalone(_) => Staging::CacheWrite { scope: options.staging_scope },
        PlanUnit::Fused { .. } => Staging::ReuseHead { scope: options.staging_scope },
    });

    let extents = head.spatial_extents();
    let (tileable, bypassed) = select_tileable(&extents);
    tracing::debug!(?extents, ?tileable, ?bypassed, ?staging, "selected tileable axes");

    let mut tiles = Vec::with_capacity(tileable.len());
    for (index, &position) in tileable.iter().enumerate() {
        let kind = match (GpuDim::block(index), GpuDim::thread(index)) {
            (Some(block), Some(thread)) if index < options.block_dims => TileKind::Blocked { block, thread },
            _ => TileKind::Virtual,
        };
        let key = TuneKey::axis(rank, position);
        let split = config.define_split(&key, extents[position], kind.parts())?;
        split.validate(&key, extents[position], kind.parts())?;
        tracing::debug!(position, %key, sizes = ?split.sizes(), ?kind, "tiled axis");
        tiles.push(AxisTiling { position, key, split, kind });
    }

    let order_key = TuneKey::order(rank);
    let perm = config.define_reorder(&order_key, tiles.len(), options.reorder_policy)?;
    perm.validate(&order_key, tiles.len(), options.reorder_policy)?;
    let order: Vec<LoopRef> = perm.perm().iter().flat_map(|&i| [LoopRef::Low(i), LoopRef::High(i)]).collect();
    tracing::debug!(perm = ?perm.perm(), ?order, "loop order");

    let attach = staging.and(order.last().copied());
    let mut reductions = Vec::new();
    if staging.is_some() {
        for axis in head.reduction().iter().filter(|axis| axis.extent > 1) {
            let key = TuneKey::reduce(rank, axis.position);
            let split = config.define_split(&key, axis.extent, 3)?;
            split.validate(&key, axis.extent, 3)?;
            tracing::debug!(position = axis.position, %key, sizes = ?split.sizes(), "tiled reduction");
            reductions.push(ReductionTiling { position: axis.position, key, split, unroll: options.unroll_reductions });
        }
    }

    Ok(StagePlan { rank, staging, bypassed, tiles, order, attach, reductions })
}

/// Plan one stage and commit it to `engine`.
pub fn plan_and_apply<E, C>(
    engine: &mut E,
    config: &mut C,
    unit: &PlanUnit<'_>,
    rank: usize,
    options: &PlannerOptions,
) -> Result<AppliedStage>
where
    E: ScheduleEngine + ?Sized,
    C: TuningConfig + ?Sized,
{
    let plan = plan_stage(config, unit, rank, options)?;
    plan.apply(engine, unit)
}
