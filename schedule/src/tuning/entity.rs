//! Concrete points of a tuning space.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::*;
use super::space::Knob;
use super::{Decision, ReorderEntity, ReorderPolicy, SplitEntity, TuneKey, TuningConfig};

/// One decision per knob.
///
/// Serializes to the JSON record a tuning log stores for a trial, so a trial
/// can be replayed later by deserializing the record and planning against it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntity {
    /// Index in the [`super::ConfigSpace`] this point was decoded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    decisions: BTreeMap<TuneKey, Decision>,
}

impl ConfigEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn at_index(index: usize) -> Self {
        Self { index: Some(index), decisions: BTreeMap::new() }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn with_split(mut self, key: TuneKey, sizes: impl IntoIterator<Item = usize>) -> Self {
        self.insert(key, Decision::Split(SplitEntity::new(sizes)));
        self
    }

    pub fn with_reorder(mut self, key: TuneKey, perm: Vec<usize>) -> Self {
        self.insert(key, Decision::Reorder(ReorderEntity::new(perm)));
        self
    }

    pub fn insert(&mut self, key: TuneKey, decision: Decision) -> Option<Decision> {
        self.decisions.insert(key, decision)
    }

    pub fn get(&self, key: &str) -> Option<&Decision> {
        self.decisions.get(key)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TuneKey, &Decision)> {
        self.decisions.iter()
    }

    fn lookup(&self, key: &TuneKey) -> Result<&Decision, TuneError> {
        self.decisions.get(key).ok_or_else(|| MissingKnobSnafu { key: key.clone() }.build())
    }
}

impl TuningConfig for ConfigEntity {
    fn define_split(&mut self, key: &TuneKey, extent: usize, num_outputs: usize) -> Result<SplitEntity, TuneError> {
        match self.lookup(key)? {
            Decision::Split(split) => {
                split.validate(key, extent, num_outputs)?;
                Ok(split.clone())
            }
            other => DecisionMismatchSnafu { key: key.clone(), expected: "split", found: other.kind() }.fail(),
        }
    }

    fn define_reorder(
        &mut self,
        key: &TuneKey,
        len: usize,
        policy: ReorderPolicy,
    ) -> Result<ReorderEntity, TuneError> {
        match self.lookup(key)? {
            Decision::Reorder(order) => {
                order.validate(key, len, policy)?;
                Ok(order.clone())
            }
            other => DecisionMismatchSnafu { key: key.clone(), expected: "reorder", found: other.kind() }.fail(),
        }
    }
}

/// Replays a [`ConfigEntity`] and fills in unknown knobs with their first candidate.
///
/// Defaulted knobs are recorded into the entity, so a second pass over the
/// same keys replays them instead of defaulting again.
#[derive(Debug, Clone, Default)]
pub struct FallbackConfig {
    entity: ConfigEntity,
    defaulted: Vec<TuneKey>,
}

impl FallbackConfig {
    pub fn new(entity: ConfigEntity) -> Self {
        Self { entity, defaulted: Vec::new() }
    }

    /// Keys that had no recorded decision, in the order they were first requested.
    pub fn defaulted(&self) -> &[TuneKey] {
        &self.defaulted
    }

    pub fn entity(&self) -> &ConfigEntity {
        &self.entity
    }

    pub fn into_entity(self) -> ConfigEntity {
        self.entity
    }

    fn fill(&mut self, key: &TuneKey, knob: Knob) {
        if self.entity.get(key.as_str()).is_none() {
            tracing::debug!(%key, ?knob, "no recorded decision, using default");
            self.entity.insert(key.clone(), knob.default_decision());
            self.defaulted.push(key.clone());
        }
    }
}

impl TuningConfig for FallbackConfig {
    fn define_split(&mut self, key: &TuneKey, extent: usize, num_outputs: usize) -> Result<SplitEntity, TuneError> {
        self.fill(key, Knob::Split { extent, num_outputs });
        self.entity.define_split(key, extent, num_outputs)
    }

    fn define_reorder(
        &mut self,
        key: &TuneKey,
        len: usize,
        policy: ReorderPolicy,
    ) -> Result<ReorderEntity, TuneError> {
        self.fill(key, Knob::Reorder { len, policy });
        self.entity.define_reorder(key, len, policy)
    }
}
