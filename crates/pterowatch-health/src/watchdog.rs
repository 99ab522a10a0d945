//! Watchdog: the operator-facing boundary of the watcher.
//!
//! Wraps the registry and the scheduler so that every mutation keeps the
//! set of running loops in step with the registry: enabling starts a loop,
//! disabling or removing cancels it, and a reset restarts it from a fresh
//! interval.

use std::sync::Arc;

use tracing::{error, info};

use pterowatch_core::Policy;
use pterowatch_state::*;

use crate::collaborator::ServerDiscovery;
use crate::watcher::WatchScheduler;

/// Registry mutation and status queries for a running watcher.
#[derive(Clone)]
pub struct Watchdog {
    registry: Registry,
    scheduler: Arc<WatchScheduler>,
}

impl Watchdog {
    pub fn new(scheduler: WatchScheduler) -> Self {
        Self {
            registry: scheduler.registry().clone(),
            scheduler: Arc::new(scheduler),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &WatchScheduler {
        &self.scheduler
    }

    /// Add a server or replace its spec. Returns `true` if it is new.
    ///
    /// Runtime state of an existing server is preserved; spec changes reach
    /// its loop at the next tick.
    pub async fn add_server(&self, spec: ServerSpec) -> StateResult<bool> {
        let id = spec.id.clone();
        let enabled = spec.enabled;
        let created = self.registry.upsert(spec).await?;
        if enabled {
            self.scheduler.watch(&id).await?;
        } else {
            self.scheduler.unwatch(&id).await;
        }
        Ok(created)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> StateResult<()> {
        self.registry.set_enabled(id, enabled).await?;
        if enabled {
            self.scheduler.watch(id).await?;
        } else {
            self.scheduler.unwatch(id).await;
        }
        info!(server_id = %id, enabled, "server enablement changed");
        Ok(())
    }

    pub async fn remove_server(&self, id: &str) -> StateResult<ServerRecord> {
        self.scheduler.unwatch(id).await;
        let removed = self.registry.remove(id).await?;
        info!(server_id = %id, "server removed from watch");
        Ok(removed)
    }

    /// Clear counters, phase, and the restart budget (manual re-enablement
    /// after a lockout).
    pub async fn reset_server(&self, id: &str) -> StateResult<()> {
        self.registry.reset(id).await?;
        self.scheduler.unwatch(id).await;
        self.scheduler.watch(id).await?;
        info!(server_id = %id, "server runtime state reset");
        Ok(())
    }

    /// Add every discovered server that is not already known, with the
    /// given policy. Returns the number added.
    ///
    /// A discovery failure is logged and leaves the registry untouched.
    pub async fn discover(&self, discovery: &dyn ServerDiscovery, defaults: &Policy) -> usize {
        let found = match discovery.discover().await {
            Ok(found) => found,
            Err(e) => {
                error!(error = %e, "server discovery failed");
                return 0;
            }
        };

        let mut added = 0;
        for server in found {
            let spec = ServerSpec::new(server.id, server.endpoint, *defaults);
            let id = spec.id.clone();
            match self.registry.insert_if_absent(spec).await {
                Ok(true) => {
                    info!(server_id = %id, "discovered server added");
                    if let Err(e) = self.scheduler.watch(&id).await {
                        error!(server_id = %id, error = %e, "failed to start watch loop");
                    }
                    added += 1;
                }
                Ok(false) => {}
                Err(e) => error!(server_id = %id, error = %e, "discovered server rejected"),
            }
        }
        added
    }

    pub async fn status(&self, id: &str) -> StateResult<ServerStatus> {
        Ok(self.registry.get(id).await?.status())
    }

    pub async fn statuses(&self) -> Vec<ServerStatus> {
        self.registry.all().await.iter().map(ServerRecord::status).collect()
    }
}
