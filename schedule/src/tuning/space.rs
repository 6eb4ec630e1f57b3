//! Search-space recording.
//!
//! Running the planner against a [`ConfigSpace`] performs a dry run: every
//! knob the planner defines is recorded with its shape, and the planner gets
//! the first candidate of each knob back. The recorded space can then be
//! sized and indexed by an external search.

use serde::{Deserialize, Serialize};

use super::entity::ConfigEntity;
use super::error::*;
use super::{Decision, ReorderEntity, ReorderPolicy, SplitEntity, TuneKey, TuningConfig};

/// Shape of one tuning decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Knob {
    Split { extent: usize, num_outputs: usize },
    Reorder { len: usize, policy: ReorderPolicy },
}

impl Knob {
    /// Number of distinct decisions this knob admits.
    pub fn candidates(&self) -> usize {
        match *self {
            Self::Split { extent, num_outputs } => split_candidates(extent, num_outputs).len(),
            Self::Reorder { len, policy: ReorderPolicy::All } => factorial(len),
            Self::Reorder { policy: ReorderPolicy::Identity, .. } => 1,
        }
    }

    /// The `index`-th decision, if `index < self.candidates()`.
    pub fn decision(&self, index: usize) -> Option<Decision> {
        let (decision, radix) = self.decode(index);
        (index < radix).then_some(decision)
    }

    /// Decision at `index` modulo the candidate count, together with that count.
    ///
    /// Enumerates the candidates once. A knob without candidates yields its
    /// default decision and a count of 0.
    fn decode(&self, index: usize) -> (Decision, usize) {
        match *self {
            Self::Split { extent, num_outputs } => {
                let mut candidates = split_candidates(extent, num_outputs);
                let radix = candidates.len();
                match radix {
                    0 => (self.default_decision(), 0),
                    _ => (Decision::Split(candidates.swap_remove(index % radix)), radix),
                }
            }
            Self::Reorder { len, policy: ReorderPolicy::All } => {
                let radix = factorial(len);
                (Decision::Reorder(ReorderEntity::new(nth_permutation(len, index % radix))), radix)
            }
            Self::Reorder { len, policy: ReorderPolicy::Identity } => {
                (Decision::Reorder(ReorderEntity::identity(len)), 1)
            }
        }
    }

    /// First candidate: no inner tiling, identity order.
    pub fn default_decision(&self) -> Decision {
        match *self {
            Self::Split { extent, num_outputs } => Decision::Split(SplitEntity::trivial(extent, num_outputs)),
            Self::Reorder { len, .. } => Decision::Reorder(ReorderEntity::identity(len)),
        }
    }
}

/// Every split of `extent` into `num_outputs` exact factors, outer to inner.
///
/// Ordered by the inner factors ascending, so the first entry is
/// `[extent, 1, .., 1]`.
pub fn split_candidates(extent: usize, num_outputs: usize) -> Vec<SplitEntity> {
    fn collect(remaining: usize, left: usize, inner: &mut Vec<usize>, out: &mut Vec<SplitEntity>) {
        if left == 0 {
            out.push(SplitEntity::new(std::iter::once(remaining).chain(inner.iter().copied())));
            return;
        }
        for divisor in divisors(remaining) {
            inner.push(divisor);
            collect(remaining / divisor, left - 1, inner, out);
            inner.pop();
        }
    }

    if num_outputs == 0 || extent == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    collect(extent, num_outputs - 1, &mut Vec::with_capacity(num_outputs), &mut out);
    out
}

/// Divisors of `n` in ascending order.
fn divisors(n: usize) -> Vec<usize> {
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut d = 1;
    while d <= n / d {
        if n % d == 0 {
            low.push(d);
            if d != n / d {
                high.push(n / d);
            }
        }
        d += 1;
    }
    low.extend(high.into_iter().rev());
    low
}

fn factorial(n: usize) -> usize {
    (1..=n).fold(1usize, |acc, k| acc.saturating_mul(k))
}

/// Decode `index` (factorial number system) into a permutation of `0..len`.
fn nth_permutation(len: usize, mut index: usize) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..len).collect();
    let mut perm = Vec::with_capacity(len);
    for remaining in (1..=len).rev() {
        let block = factorial(remaining - 1);
        perm.push(pool.remove(index / block));
        index %= block;
    }
    perm
}

/// Knobs recorded by a planning dry run, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSpace {
    knobs: Vec<(TuneKey, Knob)>,
}

impl ConfigSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knobs(&self) -> impl Iterator<Item = (&TuneKey, &Knob)> {
        self.knobs.iter().map(|(key, knob)| (key, knob))
    }

    pub fn knob(&self, key: &str) -> Option<&Knob> {
        self.knobs.iter().find(|(k, _)| k.as_str() == key).map(|(_, knob)| knob)
    }

    pub fn len(&self) -> usize {
        self.knobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty()
    }

    /// Number of points in the space (saturating).
    pub fn size(&self) -> usize {
        self.knobs.iter().fold(1usize, |acc, (_, knob)| acc.saturating_mul(knob.candidates()))
    }

    /// Decode a point of the space. The first knob varies fastest.
    pub fn entity(&self, index: usize) -> Result<ConfigEntity, TuneError> {
        let mut rest = index;
        let mut size = 1usize;
        let mut entity = ConfigEntity::at_index(index);
        for (key, knob) in &self.knobs {
            let (decision, radix) = knob.decode(rest);
            entity.insert(key.clone(), decision);
            rest /= radix.max(1);
            size = size.saturating_mul(radix);
        }
        snafu::ensure!(index < size, IndexOutOfSpaceSnafu { index, size });
        Ok(entity)
    }

    /// Record `knob` under `key`; redefining with the same shape is a replay.
    fn define(&mut self, key: &TuneKey, knob: Knob) -> Result<Decision, TuneError> {
        match self.knobs.iter().find(|(k, _)| k == key) {
            Some((_, existing)) if *existing != knob => {
                KnobConflictSnafu { key: key.clone(), existing: existing.clone(), requested: knob }.fail()
            }
            Some(_) => Ok(knob.default_decision()),
            None => {
                tracing::trace!(%key, ?knob, "define knob");
                let decision = knob.default_decision();
                self.knobs.push((key.clone(), knob));
                Ok(decision)
            }
        }
    }
}

impl TuningConfig for ConfigSpace {
    fn define_split(&mut self, key: &TuneKey, extent: usize, num_outputs: usize) -> Result<SplitEntity, TuneError> {
        match self.define(key, Knob::Split { extent, num_outputs })? {
            Decision::Split(split) => Ok(split),
            other => DecisionMismatchSnafu { key: key.clone(), expected: "split", found: other.kind() }.fail(),
        }
    }

    fn define_reorder(
        &mut self,
        key: &TuneKey,
        len: usize,
        policy: ReorderPolicy,
    ) -> Result<ReorderEntity, TuneError> {
        match self.define(key, Knob::Reorder { len, policy })? {
            Decision::Reorder(order) => Ok(order),
            other => DecisionMismatchSnafu { key: key.clone(), expected: "reorder", found: other.kind() }.fail(),
        }
    }
}
