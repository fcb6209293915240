//! In-memory patch chain.
//!
//! Versions are contiguous integers starting at 0. Nothing here touches the
//! filesystem; loading and persisting units is the caller's job.

use std::collections::BTreeMap;

use crate::error::{ChainError, EngineError};
use crate::patch::PatchSet;
use crate::types::ConfigTree;

/// All known patch sets, keyed by version.
#[derive(Debug, Clone, Default)]
pub struct PatchChain {
    versions: BTreeMap<u32, PatchSet>,
}

impl PatchChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, version: u32, set: PatchSet) -> Option<PatchSet> {
        self.versions.insert(version, set)
    }

    pub fn get(&self, version: u32) -> Option<&PatchSet> {
        self.versions.get(&version)
    }

    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.versions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Check that the versions are exactly `0..=max` and return `max`.
    ///
    /// An empty chain is valid and yields `None`.
    pub fn ensure_contiguous(&self) -> Result<Option<u32>, ChainError> {
        let Some(&max) = self.versions.keys().next_back() else {
            return Ok(None);
        };
        for (expected, version) in (0..=max).zip(self.versions.keys()) {
            if *version != expected {
                return Err(ChainError::VersionGap {
                    missing: expected,
                    max,
                });
            }
        }
        Ok(Some(max))
    }

    /// The version a newly created patch set would receive.
    pub fn next_version(&self) -> Result<u32, ChainError> {
        Ok(self.ensure_contiguous()?.map_or(0, |max| max + 1))
    }

    /// Versions still to be applied after `last_applied`, in increasing order.
    ///
    /// Fails if the chain has a gap or `last_applied` lies beyond its end.
    pub fn pending(&self, last_applied: Option<u32>) -> Result<Vec<(u32, &PatchSet)>, ChainError> {
        let max = self.ensure_contiguous()?;
        if let Some(persisted) = last_applied {
            if max.is_none_or(|max| persisted > max) {
                return Err(ChainError::PersistedAhead { persisted, max });
            }
        }
        let start = last_applied.map_or(0, |v| v + 1);
        Ok(self
            .versions
            .range(start..)
            .map(|(version, set)| (*version, set))
            .collect())
    }

    /// Fold every version, in order, into one baseline tree per config path.
    pub fn baselines(&self) -> Result<BTreeMap<String, ConfigTree>, EngineError> {
        let mut baselines: BTreeMap<String, ConfigTree> = BTreeMap::new();
        for set in self.versions.values() {
            for (file, patch) in set {
                let current = baselines.remove(file).unwrap_or_default();
                let folded = patch.apply(current).map_err(|source| EngineError::Patch {
                    file: file.clone(),
                    source,
                })?;
                baselines.insert(file.clone(), folded);
            }
        }
        Ok(baselines)
    }
}

impl FromIterator<(u32, PatchSet)> for PatchChain {
    fn from_iter<I: IntoIterator<Item = (u32, PatchSet)>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}
