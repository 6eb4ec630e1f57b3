//! Planner configuration.
//!
//! Provides typed configuration with a bon builder and environment fallbacks.
//! The defaults reproduce the standard GPU mapping: three block/thread
//! dimensions, a local staging buffer, unrolled reduction tiles, and a fully
//! tunable loop order.

use bon::bon;
use vtile_ir::{MAX_GPU_DIMS, MemScope};

use crate::tuning::ReorderPolicy;

/// Knobs of the planner itself (not of the tuned kernel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Tileable axes that get a block+thread split. Never above [`MAX_GPU_DIMS`].
    pub block_dims: usize,
    /// Scope of the reduction staging buffer.
    pub staging_scope: MemScope,
    /// Mark the thread-tile of each reduction split for full unrolling.
    pub unroll_reductions: bool,
    /// Candidate set of the per-stage loop order knob.
    pub reorder_policy: ReorderPolicy,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            block_dims: MAX_GPU_DIMS,
            staging_scope: MemScope::Local,
            unroll_reductions: true,
            reorder_policy: ReorderPolicy::All,
        }
    }
}

#[bon]
impl PlannerOptions {
    /// Create planner options with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = MAX_GPU_DIMS)] block_dims: usize,
        #[builder(default = MemScope::Local)] staging_scope: MemScope,
        #[builder(default = true)] unroll_reductions: bool,
        #[builder(default)] reorder_policy: ReorderPolicy,
    ) -> Self {
        Self { block_dims: block_dims.min(MAX_GPU_DIMS), staging_scope, unroll_reductions, reorder_policy }
    }

    /// Create options from environment variables.
    ///
    /// Never consulted implicitly: pass the result to
    /// [`crate::schedule_chain_with_options`] to opt in.
    ///
    /// # Environment Variables
    ///
    /// * `VTILE_BLOCK_DIMS` - Block dimensions to use, clamped to 3 (default: 3)
    /// * `VTILE_NO_UNROLL=1` - Leave reduction thread-tiles as runtime loops
    /// * `VTILE_FIXED_ORDER=1` - Restrict the loop order knob to the identity
    pub fn from_env() -> Self {
        let block_dims =
            std::env::var("VTILE_BLOCK_DIMS").ok().and_then(|s| s.parse().ok()).unwrap_or(MAX_GPU_DIMS);
        let reorder_policy = if env_flag("VTILE_FIXED_ORDER") { ReorderPolicy::Identity } else { ReorderPolicy::All };

        Self {
            block_dims: block_dims.min(MAX_GPU_DIMS),
            unroll_reductions: !env_flag("VTILE_NO_UNROLL"),
            reorder_policy,
            ..Default::default()
        }
    }
}

/// Boolean environment flag: `1`, `true`, `yes` or `on` (any case) enable it.
fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| parse_flag(&value))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
