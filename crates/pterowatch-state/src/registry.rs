//! Registry: the authoritative set of watched servers.
//!
//! Map-level operations (insert, remove, iterate) take a shared-read /
//! exclusive-write lock. Runtime state of a given server is written only
//! through [`Registry::apply`] by that server's own watch loop, or replaced
//! wholesale by an operator [`Registry::reset`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::*;

/// Thread-safe, cloneable handle to the server registry.
#[derive(Clone, Default)]
pub struct Registry {
    records: Arc<RwLock<HashMap<ServerId, ServerRecord>>>,
}

/// Point-in-time copy of every record, sorted by id.
///
/// Iterating it never observes mutations made after [`Registry::all`]
/// returned, and it can be iterated any number of times.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Arc<[ServerRecord]>,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, ServerRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a ServerRecord;
    type IntoIter = std::slice::Iter<'a, ServerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, or replace the spec of an existing one while
    /// keeping its runtime state. Returns `true` if the record is new.
    ///
    /// Counters are clamped to the new policy's limits, and the revision is
    /// bumped so a decision computed under the old policy is discarded.
    pub async fn upsert(&self, spec: ServerSpec) -> StateResult<bool> {
        spec.validate()?;
        let mut records = self.records.write().await;
        match records.get_mut(&spec.id) {
            Some(existing) => {
                let runtime = &mut existing.runtime;
                runtime.consecutive_failures =
                    runtime.consecutive_failures.min(spec.policy.max_failures);
                runtime.restarts_used = runtime.restarts_used.min(spec.policy.max_restarts);
                existing.revision += 1;
                debug!(server_id = %spec.id, revision = existing.revision, "server spec replaced");
                existing.spec = spec;
                Ok(false)
            }
            None => {
                debug!(server_id = %spec.id, "server added");
                records.insert(spec.id.clone(), ServerRecord::new(spec));
                Ok(true)
            }
        }
    }

    /// Insert only if no record with this id exists. Returns `true` if inserted.
    pub async fn insert_if_absent(&self, spec: ServerSpec) -> StateResult<bool> {
        spec.validate()?;
        let mut records = self.records.write().await;
        if records.contains_key(&spec.id) {
            return Ok(false);
        }
        debug!(server_id = %spec.id, "server added");
        records.insert(spec.id.clone(), ServerRecord::new(spec));
        Ok(true)
    }

    pub async fn get(&self, id: &str) -> StateResult<ServerRecord> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(id.to_string()))
    }

    /// Snapshot of all records at call time.
    pub async fn all(&self) -> Snapshot {
        let records = self.records.read().await;
        let mut list: Vec<ServerRecord> = records.values().cloned().collect();
        list.sort_by(|a, b| a.spec.id.cmp(&b.spec.id));
        Snapshot {
            records: list.into(),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.records.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Remove a record and return it.
    pub async fn remove(&self, id: &str) -> StateResult<ServerRecord> {
        let mut records = self.records.write().await;
        let removed = records
            .remove(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        debug!(server_id = %id, "server removed");
        Ok(removed)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> StateResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        record.spec.enabled = enabled;
        debug!(server_id = %id, enabled, "server enablement changed");
        Ok(())
    }

    /// Store the result of one decision step.
    ///
    /// `revision` is the revision the caller read before probing; if the
    /// record was reset or its spec replaced in the meantime the update is
    /// rejected with [`StateError::Stale`].
    pub async fn apply(
        &self,
        id: &str,
        revision: u64,
        runtime: RuntimeState,
        observed: Observation,
    ) -> StateResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        if record.revision != revision {
            return Err(StateError::Stale(id.to_string()));
        }
        record.runtime = runtime;
        record.observed = observed;
        Ok(())
    }

    /// Record a failed stop/start request for operator visibility.
    pub async fn record_action_error(&self, id: &str, error: String) -> StateResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        record.observed.last_action_error = Some(error);
        Ok(())
    }

    /// Clear counters and phase (manual re-enablement after a lockout).
    pub async fn reset(&self, id: &str) -> StateResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        record.runtime = RuntimeState::default();
        record.observed.last_action_error = None;
        record.revision += 1;
        debug!(server_id = %id, revision = record.revision, "server runtime reset");
        Ok(())
    }
}
