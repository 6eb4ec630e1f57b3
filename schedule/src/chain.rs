//! Stage orchestrator.
//!
//! Schedules the ordered stages of one fused kernel. When the chain ends in a
//! pointwise stage (no reduction axes) behind at least one other stage, that
//! tail is not planned on its own: it is folded into its predecessor's plan,
//! which stages the predecessor's reduction in the predecessor's own output
//! and tiles the tail's output instead.

use snafu::ensure;
use vtile_ir::{ScheduleEngine, Stage};

use crate::config::PlannerOptions;
use crate::error::*;
use crate::planner::{AppliedStage, PlanUnit, StagePlan, plan_stage};
use crate::tuning::TuningConfig;

/// Role of a stage within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    /// Planned on its own output.
    Standalone,
    /// Planned together with the fused tail that follows it.
    TailHead,
    /// Trailing pointwise stage, scheduled through its head.
    FusedTail,
}

/// Assign a role to every stage of a chain.
pub fn classify_chain(stages: &[Stage]) -> Result<Vec<StageRole>> {
    ensure!(!stages.is_empty(), EmptyChainSnafu);

    let mut roles = vec![StageRole::Standalone; stages.len()];
    if let [.., _, last] = stages
        && !last.has_reduction()
    {
        let n = roles.len();
        roles[n - 2] = StageRole::TailHead;
        roles[n - 1] = StageRole::FusedTail;
    }
    Ok(roles)
}

/// Plans for every non-tail stage of a chain, ready to be applied.
#[derive(Debug, Clone)]
pub struct ChainPlan<'a> {
    roles: Vec<StageRole>,
    entries: Vec<(PlanUnit<'a>, StagePlan)>,
}

impl<'a> ChainPlan<'a> {
    pub fn roles(&self) -> &[StageRole] {
        &self.roles
    }

    pub fn has_tail(&self) -> bool {
        self.roles.last() == Some(&StageRole::FusedTail)
    }

    /// Stage plans in rank order.
    pub fn plans(&self) -> impl Iterator<Item = &StagePlan> {
        self.entries.iter().map(|(_, plan)| plan)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Commit every plan in rank order.
    pub fn apply<E: ScheduleEngine + ?Sized>(&self, engine: &mut E) -> Result<Vec<AppliedStage>> {
        self.entries.iter().map(|(unit, plan)| plan.apply(engine, unit)).collect()
    }
}

/// Validate a chain and plan each non-tail stage with its chain position as rank.
///
/// Nothing is applied, so every input or tuning error surfaces before an
/// engine is touched.
#[tracing::instrument(skip_all, fields(stages = stages.len()))]
pub fn plan_chain<'a, C: TuningConfig + ?Sized>(
    config: &mut C,
    stages: &'a [Stage],
    options: &PlannerOptions,
) -> Result<ChainPlan<'a>> {
    let roles = classify_chain(stages)?;
    for stage in stages {
        ensure!(!stage.spatial().is_empty(), NoSpatialAxesSnafu { stage: stage.name() });
        ensure!(
            stage.spatial().iter().chain(stage.reduction()).all(|axis| axis.extent > 0),
            ZeroExtentSnafu { stage: stage.name() }
        );
    }

    let mut entries = Vec::with_capacity(stages.len());
    for (rank, (stage, role)) in stages.iter().zip(&roles).enumerate() {
        let unit = match role {
            StageRole::Standalone => PlanUnit::Standalone(stage),
            StageRole::TailHead => PlanUnit::fused(stage, &stages[rank + 1])?,
            StageRole::FusedTail => continue,
        };
        let plan = plan_stage(config, &unit, rank, options)?;
        entries.push((unit, plan));
    }
    tracing::debug!(?roles, planned = entries.len(), "planned chain");

    Ok(ChainPlan { roles, entries })
}

/// Schedule a fused kernel's stages onto `engine` with the standard GPU mapping.
///
/// Uses [`PlannerOptions::default`] regardless of the process environment.
pub fn schedule_chain<E, C>(engine: &mut E, config: &mut C, stages: &[Stage]) -> Result<Vec<AppliedStage>>
where
    E: ScheduleEngine + ?Sized,
    C: TuningConfig + ?Sized,
{
    schedule_chain_with_options(engine, config, stages, &PlannerOptions::default())
}

/// Schedule a fused kernel's stages onto `engine`.
pub fn schedule_chain_with_options<E, C>(
    engine: &mut E,
    config: &mut C,
    stages: &[Stage],
    options: &PlannerOptions,
) -> Result<Vec<AppliedStage>>
where
    E: ScheduleEngine + ?Sized,
    C: TuningConfig + ?Sized,
{
    plan_chain(config, stages, options)?.apply(engine)
}
