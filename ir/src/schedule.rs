//! In-memory reference schedule engine.
//!
//! [`Schedule`] tracks, per stage, the loop nest (leaf axes, outer to inner),
//! GPU bindings, unroll markers, storage scope and compute-at attachment. It
//! enforces the same structural rules a production engine would, so a planner
//! bug surfaces as a typed [`Error`] instead of a silently wrong kernel.

use std::collections::HashSet;
use std::fmt;

use smallvec::SmallVec;
use snafu::ensure;

use crate::engine::{ScheduleEngine, StageAxes};
use crate::error::*;
use crate::stage::Stage;
use crate::types::{AxisId, AxisKind, BufferId, GpuDim, MemScope};

#[derive(Debug, Clone)]
struct AxisNode {
    extent: usize,
    kind: AxisKind,
    owner: BufferId,
    /// Sub-axes after a split; empty while the axis is a leaf.
    children: SmallVec<[AxisId; 4]>,
    binding: Option<GpuDim>,
    unrolled: bool,
}

#[derive(Debug, Clone)]
struct StageNode {
    name: String,
    scope: MemScope,
    roots: StageAxes,
    /// Current loop nest, outer to inner.
    leaves: Vec<AxisId>,
    attachment: Option<(BufferId, AxisId)>,
}

/// Mutable schedule for one compile.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    stages: Vec<StageNode>,
    axes: Vec<AxisNode>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage with the given axis extents and return its output buffer.
    pub fn add_stage(&mut self, name: &str, spatial: &[usize], reduction: &[usize]) -> Result<BufferId> {
        ensure!(spatial.iter().chain(reduction).all(|&extent| extent > 0), ZeroExtentSnafu { name });

        let buffer = BufferId(self.stages.len());
        let spatial: SmallVec<[AxisId; 4]> =
            spatial.iter().map(|&extent| self.push_axis(extent, AxisKind::Spatial, buffer)).collect();
        let reduction: SmallVec<[AxisId; 2]> =
            reduction.iter().map(|&extent| self.push_axis(extent, AxisKind::Reduction, buffer)).collect();
        let leaves = spatial.iter().chain(reduction.iter()).copied().collect();

        self.stages.push(StageNode {
            name: name.to_string(),
            scope: MemScope::Global,
            roots: StageAxes { spatial, reduction },
            leaves,
            attachment: None,
        });
        tracing::trace!(%buffer, name, "registered stage");
        Ok(buffer)
    }

    /// Register a stage and return its [`Stage`] description.
    pub fn stage(&mut self, name: &str, spatial: &[usize], reduction: &[usize]) -> Result<Stage> {
        let output = self.add_stage(name, spatial, reduction)?;
        Ok(Stage::builder().name(name).output(output).spatial(spatial.to_vec()).reduction(reduction.to_vec()).build())
    }

    pub fn buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        (0..self.stages.len()).map(BufferId)
    }

    pub fn stage_name(&self, buffer: BufferId) -> Result<&str> {
        Ok(&self.stage_node(buffer)?.name)
    }

    pub fn scope(&self, buffer: BufferId) -> Result<MemScope> {
        Ok(self.stage_node(buffer)?.scope)
    }

    /// Current loop nest of a stage, outer to inner.
    pub fn leaves(&self, buffer: BufferId) -> Result<&[AxisId]> {
        Ok(&self.stage_node(buffer)?.leaves)
    }

    /// Parent stage and loop a stage was computed at, if any.
    pub fn attachment(&self, buffer: BufferId) -> Result<Option<(BufferId, AxisId)>> {
        Ok(self.stage_node(buffer)?.attachment)
    }

    pub fn binding(&self, axis: AxisId) -> Option<GpuDim> {
        self.axes.get(axis.0).and_then(|node| node.binding)
    }

    pub fn is_unrolled(&self, axis: AxisId) -> bool {
        self.axes.get(axis.0).is_some_and(|node| node.unrolled)
    }

    /// Sub-axes produced by splitting `axis`; empty for leaves.
    pub fn children(&self, axis: AxisId) -> &[AxisId] {
        self.axes.get(axis.0).map(|node| node.children.as_slice()).unwrap_or_default()
    }

    pub fn owner(&self, axis: AxisId) -> Option<BufferId> {
        self.axes.get(axis.0).map(|node| node.owner)
    }

    /// Every leaf reachable from `axis` through splits, outer to inner.
    pub fn leaf_descendants(&self, axis: AxisId) -> Vec<AxisId> {
        let mut out = Vec::new();
        let mut stack = vec![axis];
        while let Some(current) = stack.pop() {
            match self.axes.get(current.0) {
                Some(node) if !node.children.is_empty() => stack.extend(node.children.iter().rev()),
                Some(_) => out.push(current),
                None => {}
            }
        }
        out
    }

    /// All bound axes of a stage with their dimensions.
    pub fn bindings(&self, buffer: BufferId) -> Vec<(AxisId, GpuDim)> {
        self.axes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.owner == buffer)
            .filter_map(|(id, node)| node.binding.map(|dim| (AxisId(id), dim)))
            .collect()
    }

    fn push_axis(&mut self, extent: usize, kind: AxisKind, owner: BufferId) -> AxisId {
        let id = AxisId(self.axes.len());
        self.axes.push(AxisNode { extent, kind, owner, children: SmallVec::new(), binding: None, unrolled: false });
        id
    }

    fn stage_node(&self, buffer: BufferId) -> Result<&StageNode> {
        self.stages.get(buffer.0).ok_or_else(|| UnknownBufferSnafu { buffer }.build())
    }

    fn stage_node_mut(&mut self, buffer: BufferId) -> Result<&mut StageNode> {
        self.stages.get_mut(buffer.0).ok_or_else(|| UnknownBufferSnafu { buffer }.build())
    }

    fn axis_node(&self, axis: AxisId) -> Result<&AxisNode> {
        self.axes.get(axis.0).ok_or_else(|| UnknownAxisSnafu { axis }.build())
    }

    /// Position of `axis` in the loop nest of `buffer`.
    fn leaf_position(&self, buffer: BufferId, axis: AxisId) -> Result<usize> {
        let stage = self.stage_node(buffer)?;
        let node = self.axis_node(axis)?;
        ensure!(node.owner == buffer, ForeignAxisSnafu { axis, buffer });
        stage.leaves.iter().position(|&leaf| leaf == axis).ok_or_else(|| NotLeafSnafu { axis }.build())
    }
}

impl ScheduleEngine for Schedule {
    fn stage_axes(&self, buffer: BufferId) -> Result<StageAxes> {
        Ok(self.stage_node(buffer)?.roots.clone())
    }

    fn extent(&self, axis: AxisId) -> Result<usize> {
        Ok(self.axis_node(axis)?.extent)
    }

    fn split(&mut self, buffer: BufferId, axis: AxisId, sizes: &[usize]) -> Result<SmallVec<[AxisId; 4]>> {
        let position = self.leaf_position(buffer, axis)?;
        let node = self.axis_node(axis)?;
        if let Some(dim) = node.binding {
            return AlreadyBoundSnafu { axis, dim }.fail();
        }

        let (extent, kind) = (node.extent, node.kind);
        // An overflowing product trivially covers the extent.
        let covers = sizes.iter().try_fold(1usize, |acc, &size| acc.checked_mul(size)).is_none_or(|p| p >= extent);
        ensure!(
            !sizes.is_empty() && !sizes.contains(&0) && covers,
            InvalidSplitSnafu { axis, extent, sizes: sizes.to_vec() }
        );

        let children: SmallVec<[AxisId; 4]> = sizes.iter().map(|&size| self.push_axis(size, kind, buffer)).collect();
        self.axes[axis.0].children = children.clone();
        self.stage_node_mut(buffer)?.leaves.splice(position..=position, children.iter().copied());

        tracing::trace!(%buffer, %axis, ?sizes, ?children, "split");
        Ok(children)
    }

    fn bind(&mut self, buffer: BufferId, axis: AxisId, dim: GpuDim) -> Result<()> {
        self.leaf_position(buffer, axis)?;
        let node = self.axis_node(axis)?;
        if let Some(bound) = node.binding {
            return AlreadyBoundSnafu { axis, dim: bound }.fail();
        }
        ensure!(!node.unrolled, BindUnrolledSnafu { axis });

        if dim.is_physical()
            && let Some((holder, _)) = self.bindings(buffer).into_iter().find(|&(_, bound)| bound == dim)
        {
            return DimensionTakenSnafu { dim, buffer, holder }.fail();
        }

        self.axes[axis.0].binding = Some(dim);
        tracing::trace!(%buffer, %axis, %dim, "bind");
        Ok(())
    }

    fn reorder(&mut self, buffer: BufferId, order: &[AxisId]) -> Result<()> {
        let mut seen = HashSet::with_capacity(order.len());
        let mut positions = Vec::with_capacity(order.len());
        for &axis in order {
            ensure!(seen.insert(axis), DuplicateReorderSnafu { axis });
            positions.push(self.leaf_position(buffer, axis)?);
        }
        positions.sort_unstable();

        let stage = self.stage_node_mut(buffer)?;
        for (&position, &axis) in positions.iter().zip(order) {
            stage.leaves[position] = axis;
        }
        tracing::trace!(%buffer, ?order, "reorder");
        Ok(())
    }

    fn compute_at(&mut self, buffer: BufferId, parent: BufferId, axis: AxisId) -> Result<()> {
        ensure!(buffer != parent, SelfAttachSnafu { buffer });
        if let Some((attached, _)) = self.stage_node(buffer)?.attachment {
            return AlreadyAttachedSnafu { buffer, parent: attached }.fail();
        }
        self.leaf_position(parent, axis)?;

        self.stage_node_mut(buffer)?.attachment = Some((parent, axis));
        tracing::trace!(%buffer, %parent, %axis, "compute_at");
        Ok(())
    }

    fn set_scope(&mut self, buffer: BufferId, scope: MemScope) -> Result<()> {
        self.stage_node_mut(buffer)?.scope = scope;
        tracing::trace!(%buffer, %scope, "set_scope");
        Ok(())
    }

    fn unroll(&mut self, buffer: BufferId, axis: AxisId) -> Result<()> {
        self.leaf_position(buffer, axis)?;
        if let Some(dim) = self.axis_node(axis)?.binding {
            return UnrollBoundSnafu { axis, dim }.fail();
        }
        self.axes[axis.0].unrolled = true;
        tracing::trace!(%buffer, %axis, "unroll");
        Ok(())
    }

    fn cache_write(&mut self, buffer: BufferId, scope: MemScope) -> Result<BufferId> {
        let source = self.stage_node(buffer)?.clone();
        let cache = BufferId(self.stages.len());

        let spatial: SmallVec<[AxisId; 4]> = source
            .roots
            .spatial
            .iter()
            .map(|&axis| {
                let extent = self.axes[axis.0].extent;
                self.push_axis(extent, AxisKind::Spatial, cache)
            })
            .collect();

        // Reduction axes (and any sub-axes already derived from them) move to the cache stage.
        for node in self.axes.iter_mut().filter(|node| node.owner == buffer && node.kind == AxisKind::Reduction) {
            node.owner = cache;
        }
        let (moved, kept): (Vec<AxisId>, Vec<AxisId>) =
            source.leaves.iter().copied().partition(|leaf| self.axes[leaf.0].kind == AxisKind::Reduction);
        let leaves = spatial.iter().copied().chain(moved).collect();

        self.stages.push(StageNode {
            name: format!("{}.{scope}", source.name),
            scope,
            roots: StageAxes { spatial, reduction: source.roots.reduction.clone() },
            leaves,
            attachment: None,
        });

        let original = self.stage_node_mut(buffer)?;
        original.leaves = kept;
        original.roots.reduction.clear();

        tracing::trace!(%buffer, %cache, %scope, "cache_write");
        Ok(cache)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, stage) in self.stages.iter().enumerate() {
            write!(f, "stage {} ({}) scope={}", stage.name, BufferId(index), stage.scope)?;
            if let Some((parent, axis)) = stage.attachment {
                write!(f, " at {parent}/{axis}")?;
            }
            writeln!(f)?;
            for (depth, &leaf) in stage.leaves.iter().enumerate() {
                let node = &self.axes[leaf.0];
                write!(f, "{:indent$}for {leaf} in 0..{}", "", node.extent, indent = 2 * (depth + 1))?;
                if let Some(dim) = node.binding {
                    write!(f, " @ {dim}")?;
                }
                if node.unrolled {
                    write!(f, " unrolled")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
