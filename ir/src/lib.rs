//! Iteration-space model and schedule-engine interface for vtile.
//!
//! # Module Organization
//!
//! - [`types`] - Axis kinds, GPU dimensions, memory scopes and engine handles
//! - [`stage`] - Stage descriptions (spatial and reduction axes of one fused op)
//! - [`engine`] - The [`ScheduleEngine`] trait the planner drives
//! - [`schedule`] - [`Schedule`], the in-memory reference engine
//! - [`error`] - Engine rejections

pub mod engine;
pub mod error;
pub mod schedule;
pub mod stage;
pub mod types;


pub use engine::{ScheduleEngine, StageAxes};
pub use error::{Error, Result};
pub use schedule::Schedule;
pub use stage::Stage;
pub use types::{Axis, AxisId, AxisKind, BufferId, GpuDim, MAX_GPU_DIMS, MemScope};
