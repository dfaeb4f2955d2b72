//! In-memory coordinator registry
//!
//! The registry holds the list of coordinators eligible for selection. Writes
//! build a new list and swap it in under a short write lock, so a snapshot
//! handed to a reader never changes underneath it.

use crate::record::{CoordinatorKey, CoordinatorRecord};
use parking_lot::RwLock;
use qgate_common::error::{GatewayError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Indexed view consumed by the rotation selector
pub trait RotationSource {
    /// Number of selectable coordinators
    fn size(&self) -> usize;

    /// Coordinator at `index`, or `IndexOutOfRange`
    fn at(&self, index: usize) -> Result<CoordinatorRecord>;
}

/// Result of [`CoordinatorRegistry::remove_entry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The key was removed and is no longer registered
    Removed,
    /// The key was not registered
    Absent,
    /// A record was removed but another with the same key remains
    StillPresent,
}

/// Concurrency-safe list of coordinators
#[derive(Debug, Default)]
pub struct CoordinatorRegistry {
    records: RwLock<Arc<Vec<CoordinatorRecord>>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent view of the current contents
    pub fn snapshot(&self) -> Arc<Vec<CoordinatorRecord>> {
        self.records.read().clone()
    }

    /// Discard the current contents and install `records`
    ///
    /// Later duplicates of a key are dropped. Returns the number installed.
    pub fn replace_all(&self, records: Vec<CoordinatorRecord>) -> usize {
        let mut seen = HashSet::with_capacity(records.len());
        let deduped: Vec<CoordinatorRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.key()))
            .collect();
        let count = deduped.len();

        *self.records.write() = Arc::new(deduped);
        debug!(count, "Registry replaced");
        count
    }

    /// Add `record` if its key is absent
    pub fn upsert(&self, record: CoordinatorRecord) -> Result<()> {
        let mut guard = self.records.write();
        if guard.iter().any(|r| r == &record) {
            return Err(GatewayError::DuplicateCoordinator {
                host: record.host,
                port: record.port,
            });
        }

        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(record);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove the record with this key; returns whether one was removed
    pub fn remove_by_key(&self, host: &str, port: u16) -> bool {
        !matches!(self.remove_entry(host, port), Removal::Absent)
    }

    /// Remove the record with this key and report what the list holds after
    ///
    /// The outcome is decided under the same write lock as the removal.
    pub fn remove_entry(&self, host: &str, port: u16) -> Removal {
        let mut guard = self.records.write();
        let Some(position) = guard.iter().position(|r| r.matches(host, port)) else {
            return Removal::Absent;
        };

        let mut next = (**guard).clone();
        next.remove(position);
        let remaining = next.iter().any(|r| r.matches(host, port));
        *guard = Arc::new(next);

        if remaining {
            Removal::StillPresent
        } else {
            Removal::Removed
        }
    }

    /// Install `records` without deduplication
    #[cfg(test)]
    pub(crate) fn install_unchecked(&self, records: Vec<CoordinatorRecord>) {
        *self.records.write() = Arc::new(records);
    }

    pub fn contains(&self, host: &str, port: u16) -> bool {
        self.records.read().iter().any(|r| r.matches(host, port))
    }

    pub fn size(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Coordinator at `index` in the current list
    pub fn at(&self, index: usize) -> Result<CoordinatorRecord> {
        let guard = self.records.read();
        guard
            .get(index)
            .cloned()
            .ok_or(GatewayError::IndexOutOfRange {
                index,
                size: guard.len(),
            })
    }

    /// Keys of the current contents, in selection order
    pub fn keys(&self) -> Vec<CoordinatorKey> {
        self.records.read().iter().map(CoordinatorRecord::key).collect()
    }
}

impl RotationSource for CoordinatorRegistry {
    fn size(&self) -> usize {
        CoordinatorRegistry::size(self)
    }

    fn at(&self, index: usize) -> Result<CoordinatorRecord> {
        CoordinatorRegistry::at(self, index)
    }
}

impl RotationSource for [CoordinatorRecord] {
    fn size(&self) -> usize {
        self.len()
    }

    fn at(&self, index: usize) -> Result<CoordinatorRecord> {
        self.get(index).cloned().ok_or(GatewayError::IndexOutOfRange {
            index,
            size: self.len(),
        })
    }
}
