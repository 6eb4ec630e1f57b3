//! GPU schedule synthesis for vtile.
//!
//! Maps chained tensor-compute stages onto the GPU execution hierarchy
//! (blocks, threads, virtual threads), driven by an auto-tuning configuration.
//!
//! # Module Organization
//!
//! - [`planner`] - Axis-mapping planner: per-stage bindings, tiling, loop order
//!   and reduction staging, produced as a [`StagePlan`] and applied separately
//! - [`chain`] - Stage orchestrator: role classification, fused tails, ranks
//! - [`tuning`] - Auto-tuning configuration interface, search-space recording
//!   and replay
//! - [`config`] - Planner options
//!
//! # Example
//!
//! ```ignore
//! use vtile_ir::Schedule;
//! use vtile_schedule::{ConfigSpace, schedule_chain};
//!
//! let mut schedule = Schedule::new();
//! let sum = schedule.stage("sum", &[128, 1], &[64])?;
//!
//! let mut space = ConfigSpace::new();
//! schedule_chain(&mut schedule, &mut space, &[sum])?;
//! println!("{schedule}");
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod planner;
pub mod tuning;


pub use chain::{ChainPlan, StageRole, classify_chain, plan_chain, schedule_chain, schedule_chain_with_options};
pub use config::PlannerOptions;
pub use error::{PlanError, Result};
pub use planner::{AppliedStage, PlanUnit, StagePlan, TailStage, plan_and_apply, plan_stage};
pub use tuning::{ConfigEntity, ConfigSpace, FallbackConfig, ReorderPolicy, TuneKey, TuningConfig};
