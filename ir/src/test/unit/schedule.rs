//! Unit tests for the reference schedule engine.

use crate::error::Error;
use crate::{AxisId, BufferId, GpuDim, MemScope, Schedule, ScheduleEngine};

fn single_stage(spatial: &[usize], reduction: &[usize]) -> (Schedule, BufferId) {
    let mut schedule = Schedule::new();
    let buffer = schedule.add_stage("s", spatial, reduction).expect("stage registers");
    (schedule, buffer)
}

#[test]
fn test_add_stage_lays_out_spatial_then_reduction() {
    let (schedule, buffer) = single_stage(&[8, 4], &[16]);

    let axes = schedule.stage_axes(buffer).unwrap();
    assert_eq!(axes.spatial.len(), 2);
    assert_eq!(axes.reduction.len(), 1);
    let expected: Vec<AxisId> = axes.spatial.iter().chain(axes.reduction.iter()).copied().collect();
    assert_eq!(schedule.leaves(buffer).unwrap(), expected.as_slice());
    assert_eq!(schedule.extent(axes.reduction[0]).unwrap(), 16);
    assert_eq!(schedule.scope(buffer).unwrap(), MemScope::Global);
}

#[test]
fn test_add_stage_rejects_zero_extent() {
    let mut schedule = Schedule::new();
    let err = schedule.add_stage("bad", &[4, 0], &[]).unwrap_err();
    assert!(matches!(err, Error::ZeroExtent { .. }));
}

#[test]
fn test_split_replaces_leaf_in_place() {
    let (mut schedule, buffer) = single_stage(&[8, 64], &[]);
    let axes = schedule.stage_axes(buffer).unwrap();

    let parts = schedule.split(buffer, axes.spatial[1], &[2, 4, 8]).unwrap();

    assert_eq!(parts.len(), 3);
    assert_eq!(schedule.leaves(buffer).unwrap(), &[axes.spatial[0], parts[0], parts[1], parts[2]]);
    assert_eq!(schedule.children(axes.spatial[1]), parts.as_slice());
    assert_eq!(schedule.leaf_descendants(axes.spatial[1]), parts.to_vec());
    assert_eq!(schedule.extent(parts[2]).unwrap(), 8);
}

#[test]
fn test_split_allows_padding_but_not_undercover() {
    let (mut schedule, buffer) = single_stage(&[10], &[]);
    let axis = schedule.stage_axes(buffer).unwrap().spatial[0];

    let err = schedule.split(buffer, axis, &[3, 3]).unwrap_err();
    assert!(matches!(err, Error::InvalidSplit { extent: 10, .. }));
    let err = schedule.split(buffer, axis, &[10, 0]).unwrap_err();
    assert!(matches!(err, Error::InvalidSplit { .. }));

    // ceil(10 / 4) * 4 = 12 covers 10.
    assert!(schedule.split(buffer, axis, &[3, 4]).is_ok());
}

#[test]
fn test_split_non_leaf_is_rejected() {
    let (mut schedule, buffer) = single_stage(&[16], &[]);
    let axis = schedule.stage_axes(buffer).unwrap().spatial[0];
    schedule.split(buffer, axis, &[4, 4]).unwrap();

    let err = schedule.split(buffer, axis, &[2, 8]).unwrap_err();
    assert_eq!(err, Error::NotLeaf { axis });
}

#[test]
fn test_bind_twice_is_rejected() {
    let (mut schedule, buffer) = single_stage(&[16], &[]);
    let axis = schedule.stage_axes(buffer).unwrap().spatial[0];

    schedule.bind(buffer, axis, GpuDim::VThread).unwrap();
    let err = schedule.bind(buffer, axis, GpuDim::BlockX).unwrap_err();
    assert_eq!(err, Error::AlreadyBound { axis, dim: GpuDim::VThread });
}

#[test]
fn test_physical_dimension_is_exclusive_per_stage() {
    let (mut schedule, buffer) = single_stage(&[16, 16], &[]);
    let axes = schedule.stage_axes(buffer).unwrap();

    schedule.bind(buffer, axes.spatial[0], GpuDim::BlockX).unwrap();
    let err = schedule.bind(buffer, axes.spatial[1], GpuDim::BlockX).unwrap_err();
    assert_eq!(err, Error::DimensionTaken { dim: GpuDim::BlockX, buffer, holder: axes.spatial[0] });
}

#[test]
fn test_vthread_is_shared() {
    let (mut schedule, buffer) = single_stage(&[2, 2, 2], &[]);
    let axes = schedule.stage_axes(buffer).unwrap();

    for &axis in &axes.spatial {
        schedule.bind(buffer, axis, GpuDim::VThread).unwrap();
    }
    assert_eq!(schedule.bindings(buffer).len(), 3);
}

#[test]
fn test_foreign_axis_is_rejected() {
    let mut schedule = Schedule::new();
    let a = schedule.add_stage("a", &[4], &[]).unwrap();
    let b = schedule.add_stage("b", &[4], &[]).unwrap();
    let axis_of_a = schedule.stage_axes(a).unwrap().spatial[0];

    let err = schedule.bind(b, axis_of_a, GpuDim::VThread).unwrap_err();
    assert_eq!(err, Error::ForeignAxis { axis: axis_of_a, buffer: b });
}

#[test]
fn test_unknown_handles() {
    let (mut schedule, buffer) = single_stage(&[4], &[]);

    assert_eq!(schedule.stage_axes(BufferId(9)).unwrap_err(), Error::UnknownBuffer { buffer: BufferId(9) });
    assert_eq!(schedule.unroll(buffer, AxisId(42)).unwrap_err(), Error::UnknownAxis { axis: AxisId(42) });
}

#[test]
fn test_reorder_fills_occupied_positions() {
    let (mut schedule, buffer) = single_stage(&[2, 3, 4, 5], &[]);
    let s = schedule.stage_axes(buffer).unwrap().spatial;

    // Only the last three move; the first keeps its slot.
    schedule.reorder(buffer, &[s[3], s[1], s[2]]).unwrap();
    assert_eq!(schedule.leaves(buffer).unwrap(), &[s[0], s[3], s[1], s[2]]);

    let err = schedule.reorder(buffer, &[s[0], s[0]]).unwrap_err();
    assert_eq!(err, Error::DuplicateReorder { axis: s[0] });
}

#[test]
fn test_compute_at_rules() {
    let mut schedule = Schedule::new();
    let producer = schedule.add_stage("p", &[8], &[4]).unwrap();
    let consumer = schedule.add_stage("c", &[8], &[]).unwrap();
    let loop_axis = schedule.stage_axes(consumer).unwrap().spatial[0];

    assert_eq!(
        schedule.compute_at(consumer, consumer, loop_axis).unwrap_err(),
        Error::SelfAttach { buffer: consumer }
    );

    schedule.compute_at(producer, consumer, loop_axis).unwrap();
    assert_eq!(schedule.attachment(producer).unwrap(), Some((consumer, loop_axis)));

    let err = schedule.compute_at(producer, consumer, loop_axis).unwrap_err();
    assert_eq!(err, Error::AlreadyAttached { buffer: producer, parent: consumer });
}

#[test]
fn test_unroll_and_bind_exclude_each_other() {
    let (mut schedule, buffer) = single_stage(&[4, 4], &[]);
    let s = schedule.stage_axes(buffer).unwrap().spatial;

    schedule.unroll(buffer, s[0]).unwrap();
    assert!(schedule.is_unrolled(s[0]));
    assert_eq!(schedule.bind(buffer, s[0], GpuDim::ThreadX).unwrap_err(), Error::BindUnrolled { axis: s[0] });

    schedule.bind(buffer, s[1], GpuDim::ThreadX).unwrap();
    assert_eq!(
        schedule.unroll(buffer, s[1]).unwrap_err(),
        Error::UnrollBound { axis: s[1], dim: GpuDim::ThreadX }
    );
}

#[test]
fn test_cache_write_moves_reduction_axes() {
    let (mut schedule, buffer) = single_stage(&[32, 8], &[64]);
    let before = schedule.stage_axes(buffer).unwrap();

    let cache = schedule.cache_write(buffer, MemScope::Local).unwrap();

    let original = schedule.stage_axes(buffer).unwrap();
    assert_eq!(original.spatial, before.spatial);
    assert!(original.reduction.is_empty());
    assert_eq!(schedule.leaves(buffer).unwrap(), before.spatial.as_slice());

    let cached = schedule.stage_axes(cache).unwrap();
    assert_eq!(cached.reduction, before.reduction);
    assert_eq!(cached.spatial.len(), 2);
    assert_eq!(schedule.extent(cached.spatial[0]).unwrap(), 32);
    assert_eq!(schedule.owner(before.reduction[0]), Some(cache));
    assert_eq!(schedule.scope(cache).unwrap(), MemScope::Local);
    assert_eq!(schedule.stage_name(cache).unwrap(), "s.local");

    // The moved reduction axis is now split through the cache stage.
    assert!(schedule.split(cache, before.reduction[0], &[4, 4, 4]).is_ok());
    assert!(matches!(
        schedule.split(buffer, cached.spatial[0], &[32]).unwrap_err(),
        Error::ForeignAxis { .. }
    ));
}

#[test]
fn test_display_dumps_loop_nest() {
    let (mut schedule, buffer) = single_stage(&[16], &[]);
    let axis = schedule.stage_axes(buffer).unwrap().spatial[0];
    let parts = schedule.split(buffer, axis, &[4, 4]).unwrap();
    schedule.bind(buffer, parts[0], GpuDim::BlockX).unwrap();
    schedule.unroll(buffer, parts[1]).unwrap();

    let dump = schedule.to_string();
    assert!(dump.contains("stage s (buf0) scope=global"), "{dump}");
    assert!(dump.contains("in 0..4 @ blockIdx.x"), "{dump}");
    assert!(dump.contains("unrolled"), "{dump}");
}
