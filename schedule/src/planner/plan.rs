//! Plan values produced by the planner.
//!
//! A [`StagePlan`] describes every binding, split, reorder and attachment of
//! one planner invocation without touching a schedule engine. Sub-axes are
//! referenced symbolically (spatial position + split part), so a plan can be
//! inspected, logged and compared before [`StagePlan::apply`] commits it.

use smallvec::{SmallVec, smallvec};
use vtile_ir::{GpuDim, MemScope};

use crate::tuning::{SplitEntity, TuneKey};

/// How a reducing stage gets its accumulation buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staging {
    /// A fresh buffer cached from the stage output and flushed back into it.
    CacheWrite { scope: MemScope },
    /// The head's own output is demoted to `scope`; the fused tail writes the kernel output.
    ReuseHead { scope: MemScope },
}

impl Staging {
    pub fn scope(&self) -> MemScope {
        match *self {
            Self::CacheWrite { scope } | Self::ReuseHead { scope } => scope,
        }
    }
}

/// Shape of the split applied to one tileable axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// `[block, vthread-high, thread, vthread-low]`.
    Blocked { block: GpuDim, thread: GpuDim },
    /// `[vthread-high, vthread-low]`, used once the block budget is spent.
    Virtual,
}

impl TileKind {
    /// Number of sub-axes the split produces.
    pub fn parts(&self) -> usize {
        match self {
            Self::Blocked { .. } => 4,
            Self::Virtual => 2,
        }
    }
}

/// Split and bindings of one tileable spatial axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisTiling {
    /// Spatial position in the target stage.
    pub position: usize,
    pub key: TuneKey,
    pub split: SplitEntity,
    pub kind: TileKind,
}

impl AxisTiling {
    pub fn parts(&self) -> usize {
        self.kind.parts()
    }

    /// Split part holding the outer virtual-thread sub-axis.
    pub fn high_part(&self) -> usize {
        match self.kind {
            TileKind::Blocked { .. } => 1,
            TileKind::Virtual => 0,
        }
    }

    /// Split part holding the inner virtual-thread sub-axis.
    pub fn low_part(&self) -> usize {
        match self.kind {
            TileKind::Blocked { .. } => 3,
            TileKind::Virtual => 1,
        }
    }

    /// `(part, dim)` bindings in the order they are issued.
    pub fn bindings(&self) -> SmallVec<[(usize, GpuDim); 4]> {
        let virtual_parts = [(self.high_part(), GpuDim::VThread), (self.low_part(), GpuDim::VThread)];
        match self.kind {
            TileKind::Blocked { block, thread } => {
                let mut out: SmallVec<[(usize, GpuDim); 4]> = smallvec![(0, block), (2, thread)];
                out.extend(virtual_parts);
                out
            }
            TileKind::Virtual => SmallVec::from_iter(virtual_parts),
        }
    }
}

/// A loop of the final nest, referring to `tiles[index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopRef {
    Low(usize),
    High(usize),
}

impl LoopRef {
    pub fn tile(&self) -> usize {
        match *self {
            Self::Low(index) | Self::High(index) => index,
        }
    }
}

/// Split of one reduction axis of the staging stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionTiling {
    /// Reduction position in the head stage.
    pub position: usize,
    pub key: TuneKey,
    /// `[outer, thread-tile, inner]`.
    pub split: SplitEntity,
    /// Unroll the thread-tile sub-axis.
    pub unroll: bool,
}

impl ReductionTiling {
    pub const UNROLL_PART: usize = 1;
}

/// A spatial sub-axis: the root axis itself (`part == None`) or one split part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubAxis {
    pub position: usize,
    pub part: Option<usize>,
}

/// Everything one planner invocation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Position of the stage in its chain; namespaces the tuning keys.
    pub rank: usize,
    pub staging: Option<Staging>,
    /// Degenerate spatial positions bound straight to a virtual thread.
    pub bypassed: Vec<usize>,
    /// Tileable axes in processing order.
    pub tiles: Vec<AxisTiling>,
    /// Final loop nest over the virtual-thread sub-axes, outer to inner.
    pub order: Vec<LoopRef>,
    /// Loop the staging buffer is computed at.
    pub attach: Option<LoopRef>,
    pub reductions: Vec<ReductionTiling>,
}

impl StagePlan {
    pub fn order_len(&self) -> usize {
        self.order.len()
    }

    /// Block dimensions in assignment order.
    pub fn block_dims(&self) -> Vec<GpuDim> {
        self.tiles
            .iter()
            .filter_map(|tile| match tile.kind {
                TileKind::Blocked { block, .. } => Some(block),
                TileKind::Virtual => None,
            })
            .collect()
    }

    /// Thread dimensions in assignment order.
    pub fn thread_dims(&self) -> Vec<GpuDim> {
        self.tiles
            .iter()
            .filter_map(|tile| match tile.kind {
                TileKind::Blocked { thread, .. } => Some(thread),
                TileKind::Virtual => None,
            })
            .collect()
    }

    pub fn tile_for(&self, position: usize) -> Option<&AxisTiling> {
        self.tiles.iter().find(|tile| tile.position == position)
    }

    /// Every spatial binding the plan issues, bypasses first.
    pub fn bindings(&self) -> Vec<(SubAxis, GpuDim)> {
        let bypassed = self.bypassed.iter().map(|&position| (SubAxis { position, part: None }, GpuDim::VThread));
        let tiled = self.tiles.iter().flat_map(|tile| {
            tile.bindings().into_iter().map(|(part, dim)| (SubAxis { position: tile.position, part: Some(part) }, dim))
        });
        bypassed.chain(tiled).collect()
    }

    /// Sub-axis referenced by a loop of the nest.
    pub fn resolve(&self, loop_ref: LoopRef) -> Option<SubAxis> {
        let tile = self.tiles.get(loop_ref.tile())?;
        let part = match loop_ref {
            LoopRef::Low(_) => tile.low_part(),
            LoopRef::High(_) => tile.high_part(),
        };
        Some(SubAxis { position: tile.position, part: Some(part) })
    }
}
