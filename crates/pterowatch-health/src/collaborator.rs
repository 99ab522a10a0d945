//! Seams to the hosting panel.
//!
//! The watch loops only ever talk to the panel through these traits, so the
//! state machine and scheduler can be exercised without any network I/O.

use async_trait::async_trait;

use pterowatch_core::Endpoint;
use pterowatch_state::{ProbeOutcome, ServerId};

/// Reports whether a server's container is running.
///
/// Implementations apply their own short timeout; the scheduler also bounds
/// every call. Transport failures are reported as [`ProbeOutcome::ProbeError`].
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, id: &str) -> ProbeOutcome;
}

/// Issues power signals. Both calls are fire-and-forget: success means the
/// panel accepted the request, not that the container changed state.
#[async_trait]
pub trait RecoveryActuator: Send + Sync {
    /// Forced stop (`kill`).
    async fn issue_stop(&self, id: &str) -> anyhow::Result<()>;

    async fn issue_start(&self, id: &str) -> anyhow::Result<()>;
}

/// A server found by bulk discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    pub id: ServerId,
    pub endpoint: Endpoint,
}

/// Lists every server visible to the watcher's credentials.
#[async_trait]
pub trait ServerDiscovery: Send + Sync {
    async fn discover(&self) -> anyhow::Result<Vec<DiscoveredServer>>;
}
