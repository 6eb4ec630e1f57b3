use crate::{AxisKind, BufferId, Stage};

#[test]
fn test_builder_assigns_positions() {
    let stage = Stage::builder().name("sum").output(BufferId(3)).spatial(vec![128, 1]).reduction(vec![64]).build();

    assert_eq!(stage.name(), "sum");
    assert_eq!(stage.output(), BufferId(3));
    assert_eq!(stage.spatial().len(), 2);
    assert_eq!(stage.spatial()[1].position, 1);
    assert_eq!(stage.spatial()[1].kind, AxisKind::Spatial);
    assert!(stage.spatial()[1].is_degenerate());
    assert_eq!(stage.reduction()[0].kind, AxisKind::Reduction);
    assert_eq!(stage.reduction_extents().as_slice(), &[64]);
    assert!(stage.has_reduction());
}

#[test]
fn test_reduction_defaults_to_empty() {
    let stage = Stage::builder().name("relu").output(BufferId(0)).spatial(vec![32, 32]).build();

    assert!(!stage.has_reduction());
    assert_eq!(stage.spatial_extents().as_slice(), &[32, 32]);
}
