//! Mapping invariants over random stage shapes and random tuning points.

use proptest::prelude::*;
use vtile_ir::test::generators::{reduction_extents, spatial_extents};
use vtile_ir::{GpuDim, Schedule, Stage};

use crate::chain::{StageRole, classify_chain, plan_chain, schedule_chain_with_options};
use crate::config::PlannerOptions;
use crate::planner::{PlanUnit, plan_stage, select_tileable};
use crate::test::helpers::*;
use crate::tuning::{ConfigEntity, ConfigSpace};

/// Record the space of a chain and pick one of its points.
fn replay_point(shapes: &[(Vec<usize>, Vec<usize>)], seed: usize) -> (Schedule, Vec<Stage>, ConfigEntity) {
    let build = || {
        let mut schedule = Schedule::new();
        let stages: Vec<Stage> = shapes
            .iter()
            .enumerate()
            .map(|(i, (spatial, reduction))| schedule.stage(&format!("s{i}"), spatial, reduction).unwrap())
            .collect();
        (schedule, stages)
    };

    let (_, stages) = build();
    let mut space = ConfigSpace::new();
    plan_chain(&mut space, &stages, &PlannerOptions::default()).unwrap();
    let entity = space.entity(seed % space.size()).unwrap();

    let (schedule, stages) = build();
    (schedule, stages, entity)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn tileable_selection_partitions_axes(extents in spatial_extents()) {
        let (tileable, bypassed) = select_tileable(&extents);
        prop_assert!(!tileable.is_empty());
        prop_assert_eq!(tileable.len() + bypassed.len(), extents.len());
        for &position in &bypassed {
            prop_assert_eq!(extents[position], 1);
        }
        if extents.iter().all(|&e| e == 1) {
            prop_assert_eq!(tileable, vec![extents.len() - 1]);
        }
    }

    #[test]
    fn every_spatial_axis_is_bound(
        spatial in spatial_extents(),
        reduction in reduction_extents(),
        seed in any::<usize>(),
    ) {
        let (mut schedule, stages, mut entity) = replay_point(&[(spatial, reduction)], seed);
        schedule_chain_with_options(&mut schedule, &mut entity, &stages, &PlannerOptions::default()).unwrap();
        assert_spatial_coverage(&schedule, stages[0].output());
    }

    #[test]
    fn block_dims_within_budget(spatial in spatial_extents(), seed in any::<usize>()) {
        let (mut schedule, stages, mut entity) = replay_point(&[(spatial.clone(), vec![])], seed);
        schedule_chain_with_options(&mut schedule, &mut entity, &stages, &PlannerOptions::default()).unwrap();

        let (tileable, _) = select_tileable(&spatial);
        let expected: Vec<GpuDim> = (0..tileable.len().min(3)).filter_map(GpuDim::block).collect();
        prop_assert_eq!(block_dims(&schedule, stages[0].output()), expected);
    }

    #[test]
    fn loop_order_covers_tileable_axes(
        spatial in spatial_extents(),
        reduction in reduction_extents(),
    ) {
        let stage = Stage::builder().name("s").output(vtile_ir::BufferId(0)).spatial(spatial.clone()).reduction(reduction).build();
        let plan = plan_stage(&mut ConfigSpace::new(), &PlanUnit::Standalone(&stage), 0, &PlannerOptions::default()).unwrap();

        let (tileable, _) = select_tileable(&spatial);
        prop_assert_eq!(plan.order_len(), 2 * tileable.len());
        prop_assert_eq!(plan.attach.is_some(), stage.has_reduction());
        if let Some(attach) = plan.attach {
            prop_assert_eq!(plan.order.last().copied(), Some(attach));
        }
    }

    #[test]
    fn reductions_staged_once(
        spatial in spatial_extents(),
        reduction in reduction_extents(),
        seed in any::<usize>(),
    ) {
        let has_reduction = !reduction.is_empty();
        let (mut schedule, stages, mut entity) = replay_point(&[(spatial, reduction.clone())], seed);
        let before = schedule.buffers().count();
        let applied = schedule_chain_with_options(&mut schedule, &mut entity, &stages, &PlannerOptions::default()).unwrap();

        let created = schedule.buffers().count() - before;
        prop_assert_eq!(created, usize::from(has_reduction));
        prop_assert_eq!(applied[0].staging.is_some(), has_reduction);

        if let Some(local) = applied[0].staging {
            let (parent, axis) = schedule.attachment(local).unwrap().expect("staging is attached");
            prop_assert_eq!(parent, stages[0].output());
            prop_assert_eq!(applied[0].order.last().copied(), Some(axis));

            let nontrivial = reduction.iter().filter(|&&e| e > 1).count();
            prop_assert_eq!(applied[0].reductions.len(), nontrivial);
            prop_assert_eq!(unrolled(&schedule, local).len(), nontrivial);
            for split in &applied[0].reductions {
                prop_assert_eq!(split.len(), 3);
                prop_assert!(schedule.is_unrolled(split[1]));
            }
        }
    }

    #[test]
    fn fused_tail_reuses_head(
        spatial in spatial_extents(),
        reduction in reduction_extents().prop_filter("reducing head", |r| !r.is_empty()),
        seed in any::<usize>(),
    ) {
        let shapes = [(spatial.clone(), reduction), (spatial, vec![])];
        let (mut schedule, stages, mut entity) = replay_point(&shapes, seed);
        prop_assert_eq!(classify_chain(&stages).unwrap(), vec![StageRole::TailHead, StageRole::FusedTail]);

        let before = schedule.buffers().count();
        let applied = schedule_chain_with_options(&mut schedule, &mut entity, &stages, &PlannerOptions::default()).unwrap();

        prop_assert_eq!(schedule.buffers().count(), before);
        prop_assert_eq!(applied.len(), 1);
        prop_assert_eq!(applied[0].staging, Some(stages[0].output()));
        prop_assert_eq!(schedule.attachment(stages[0].output()).unwrap().map(|(parent, _)| parent), Some(stages[1].output()));
        prop_assert!(schedule.bindings(stages[0].output()).is_empty());
        assert_spatial_coverage(&schedule, stages[1].output());
    }
}
