//! Fundamental type definitions: axis kinds, GPU dimensions, memory scopes and handles.

use serde::{Deserialize, Serialize};

/// Number of physical block (and thread) dimensions exposed by a GPU launch.
pub const MAX_GPU_DIMS: usize = 3;

/// Kind of an iteration-space axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AxisKind {
    /// Output-shape dimension, parallelizable across blocks and threads.
    Spatial,
    /// Accumulation dimension, not part of the output shape.
    Reduction,
}

/// One dimension of a stage's iteration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Axis {
    /// Trip count. Always positive.
    pub extent: usize,
    pub kind: AxisKind,
    /// Index within the ordered list of axes of the same kind.
    pub position: usize,
}

impl Axis {
    pub const fn spatial(position: usize, extent: usize) -> Self {
        Self { extent, kind: AxisKind::Spatial, position }
    }

    pub const fn reduction(position: usize, extent: usize) -> Self {
        Self { extent, kind: AxisKind::Reduction, position }
    }

    /// Extent-1 axes carry no parallelism.
    pub const fn is_degenerate(&self) -> bool {
        self.extent == 1
    }
}

/// GPU execution dimension an axis can be bound to.
///
/// Block and thread dimensions are physical and each may be used by at most
/// one axis of a stage. [`GpuDim::VThread`] is a replication marker that any
/// number of axes can share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(strum::Display, strum::AsRefStr, strum::EnumIter)]
pub enum GpuDim {
    #[strum(serialize = "blockIdx.x")]
    BlockX,
    #[strum(serialize = "blockIdx.y")]
    BlockY,
    #[strum(serialize = "blockIdx.z")]
    BlockZ,
    #[strum(serialize = "threadIdx.x")]
    ThreadX,
    #[strum(serialize = "threadIdx.y")]
    ThreadY,
    #[strum(serialize = "threadIdx.z")]
    ThreadZ,
    #[strum(serialize = "vthread")]
    VThread,
}

impl GpuDim {
    const BLOCKS: [Self; MAX_GPU_DIMS] = [Self::BlockX, Self::BlockY, Self::BlockZ];
    const THREADS: [Self; MAX_GPU_DIMS] = [Self::ThreadX, Self::ThreadY, Self::ThreadZ];

    /// The `index`-th block dimension (x, y, z), if it exists.
    pub fn block(index: usize) -> Option<Self> {
        Self::BLOCKS.get(index).copied()
    }

    /// The `index`-th thread dimension (x, y, z), if it exists.
    pub fn thread(index: usize) -> Option<Self> {
        Self::THREADS.get(index).copied()
    }

    pub const fn is_block(&self) -> bool {
        matches!(self, Self::BlockX | Self::BlockY | Self::BlockZ)
    }

    pub const fn is_thread(&self) -> bool {
        matches!(self, Self::ThreadX | Self::ThreadY | Self::ThreadZ)
    }

    /// Physical dimensions are bounded by the launch; virtual threads are not.
    pub const fn is_physical(&self) -> bool {
        !matches!(self, Self::VThread)
    }

    /// Position within the x/y/z triple for physical dimensions.
    pub const fn lane(&self) -> Option<usize> {
        match self {
            Self::BlockX | Self::ThreadX => Some(0),
            Self::BlockY | Self::ThreadY => Some(1),
            Self::BlockZ | Self::ThreadZ => Some(2),
            Self::VThread => None,
        }
    }
}

/// Storage scope of a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MemScope {
    /// Device memory visible to the whole kernel.
    #[default]
    Global,
    /// Memory shared by the threads of one block.
    Shared,
    /// Per-thread registers/scratch.
    Local,
}

/// Engine handle of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AxisId(pub usize);

/// Engine handle of a buffer (and of the stage computing it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(pub usize);

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ax{}", self.0)
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buf{}", self.0)
    }
}
