//! Auto-tuning configuration interface.
//!
//! The planner never picks split factors or loop orders itself. It asks a
//! [`TuningConfig`] for a decision under a [`TuneKey`], and the same key must
//! replay the same decision across tuning trials. The search that proposes
//! decisions lives outside this crate; the implementations here cover the
//! three roles a planning pass needs:
//!
//! - [`ConfigSpace`] - dry run that records every knob and its candidate count
//! - [`ConfigEntity`] - one concrete point of the space, replayed strictly
//! - [`FallbackConfig`] - replays a point and defaults unknown knobs
//!
//! All of them are plain per-instance values; parallel trials never share one.

pub mod entity;
pub mod error;
pub mod space;

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use snafu::ensure;

pub use entity::{ConfigEntity, FallbackConfig};
pub use error::TuneError;
pub use space::{ConfigSpace, Knob};

use error::*;

/// Name of one tuning decision.
///
/// Keys are namespaced by stage rank so the knobs of different stages in one
/// chain never alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TuneKey(String);

impl TuneKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Split of spatial axis `position` of the stage at `rank`.
    pub fn axis(rank: usize, position: usize) -> Self {
        Self(format!("r{rank}_axis_{position}"))
    }

    /// Loop order of the stage at `rank`.
    pub fn order(rank: usize) -> Self {
        Self(format!("r{rank}_ord"))
    }

    /// Split of reduction axis `position` of the stage at `rank`.
    pub fn reduce(rank: usize, position: usize) -> Self {
        Self(format!("r{rank}_reduce_{position}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TuneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TuneKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Which permutations a reorder knob admits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderPolicy {
    /// Every permutation of the input list is a legal candidate.
    #[default]
    All,
    /// Only the identity order.
    Identity,
}

impl fmt::Display for ReorderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Identity => f.write_str("identity"),
        }
    }
}

/// Extents of the sub-axes of one split, outer to inner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitEntity {
    sizes: SmallVec<[usize; 4]>,
}

impl SplitEntity {
    pub fn new(sizes: impl IntoIterator<Item = usize>) -> Self {
        Self { sizes: sizes.into_iter().collect() }
    }

    /// Fix the inner factors and derive the outer one so the split covers `extent`.
    pub fn from_inner(extent: usize, inner: &[usize]) -> Self {
        let tile = inner.iter().product::<usize>().max(1);
        let outer = extent.div_ceil(tile).max(1);
        Self { sizes: std::iter::once(outer).chain(inner.iter().copied()).collect() }
    }

    /// The first point of every split space: all inner factors are 1.
    pub fn trivial(extent: usize, num_outputs: usize) -> Self {
        Self::from_inner(extent, &vec![1; num_outputs.saturating_sub(1)])
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Check that this split re-expresses `extent` in exactly `num_outputs` parts.
    pub fn validate(&self, key: &TuneKey, extent: usize, num_outputs: usize) -> Result<(), TuneError> {
        let covers = self.sizes.iter().try_fold(1usize, |acc, &size| acc.checked_mul(size)).is_none_or(|p| p >= extent);
        ensure!(
            self.sizes.len() == num_outputs && !self.sizes.contains(&0) && covers,
            InvalidSplitSnafu { key: key.clone(), extent, num_outputs, sizes: self.sizes.to_vec() }
        );
        Ok(())
    }
}

/// Outer-to-inner order over the items handed to a reorder knob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReorderEntity {
    perm: Vec<usize>,
}

impl ReorderEntity {
    pub fn new(perm: Vec<usize>) -> Self {
        Self { perm }
    }

    pub fn identity(len: usize) -> Self {
        Self { perm: (0..len).collect() }
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    pub fn is_identity(&self) -> bool {
        self.perm.iter().enumerate().all(|(i, &p)| i == p)
    }

    /// Check that this is a permutation of `0..len` admitted by `policy`.
    pub fn validate(&self, key: &TuneKey, len: usize, policy: ReorderPolicy) -> Result<(), TuneError> {
        let mut seen = vec![false; len];
        let is_perm = self.perm.len() == len
            && self.perm.iter().all(|&p| p < len && !std::mem::replace(&mut seen[p], true));
        let admitted = match policy {
            ReorderPolicy::All => true,
            ReorderPolicy::Identity => self.is_identity(),
        };
        ensure!(is_perm && admitted, InvalidPermutationSnafu { key: key.clone(), len, perm: self.perm.clone(), policy });
        Ok(())
    }
}

/// A concrete value of one knob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Decision {
    Split(SplitEntity),
    Reorder(ReorderEntity),
}

impl Decision {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Split(_) => "split",
            Self::Reorder(_) => "reorder",
        }
    }
}

/// Source of tiling and ordering decisions, keyed for replay.
pub trait TuningConfig {
    /// Split an axis of `extent` into `num_outputs` sub-axes, outer to inner.
    fn define_split(&mut self, key: &TuneKey, extent: usize, num_outputs: usize) -> Result<SplitEntity, TuneError>;

    /// Order `len` items; the result is a permutation of `0..len`.
    fn define_reorder(&mut self, key: &TuneKey, len: usize, policy: ReorderPolicy)
    -> Result<ReorderEntity, TuneError>;
}

impl<T: TuningConfig + ?Sized> TuningConfig for &mut T {
    fn define_split(&mut self, key: &TuneKey, extent: usize, num_outputs: usize) -> Result<SplitEntity, TuneError> {
        (**self).define_split(key, extent, num_outputs)
    }

    fn define_reorder(
        &mut self,
        key: &TuneKey,
        len: usize,
        policy: ReorderPolicy,
    ) -> Result<ReorderEntity, TuneError> {
        (**self).define_reorder(key, len, policy)
    }
}
