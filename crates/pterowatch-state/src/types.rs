//! Domain types for the server registry.
//!
//! A [`ServerRecord`] pairs the durable [`ServerSpec`] with the mutable
//! [`RuntimeState`] of the recovery state machine. [`ServerStatus`] is the
//! serializable view handed to operators.

use serde::Serialize;
use tokio::time::Instant;

use pterowatch_core::{ConfigResult, Endpoint, Policy, ServerEntry};

use crate::error::{StateError, StateResult};

/// Panel identifier of a game server (the short Pterodactyl UUID).
pub type ServerId = String;

// ── Spec ──────────────────────────────────────────────────────────

/// Operator-supplied configuration for one watched server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerSpec {
    pub id: ServerId,
    /// Informational only; never used for health decisions.
    pub endpoint: Endpoint,
    pub enabled: bool,
    pub policy: Policy,
}

impl ServerSpec {
    /// An enabled spec.
    pub fn new(id: impl Into<ServerId>, endpoint: Endpoint, policy: Policy) -> Self {
        Self {
            id: id.into(),
            endpoint,
            enabled: true,
            policy,
        }
    }

    /// Build a spec from a `[[servers]]` entry layered over `defaults`.
    pub fn from_entry(entry: &ServerEntry, defaults: &Policy) -> ConfigResult<Self> {
        Ok(Self {
            id: entry.id.clone(),
            endpoint: entry.endpoint(),
            enabled: entry.enabled,
            policy: entry.policy(defaults)?,
        })
    }

    pub fn validate(&self) -> StateResult<()> {
        if self.id.trim().is_empty() {
            return Err(StateError::EmptyId);
        }
        self.policy
            .check()
            .map_err(|reason| StateError::InvalidPolicy {
                id: self.id.clone(),
                reason,
            })
    }
}

// ── Runtime ───────────────────────────────────────────────────────

/// Recovery phase of a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Counting failures; recovery may fire at the threshold.
    #[default]
    Healthy,
    /// A recovery attempt was issued and no successful probe has been seen since.
    Recovering,
    /// The restart budget is exhausted. Needs an operator reset.
    LockedOut,
}

/// Outcome of a single status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Running,
    NotRunning,
    /// The status could not be fetched (transport, non-2xx, decode, timeout).
    ProbeError,
}

impl ProbeOutcome {
    pub fn is_running(self) -> bool {
        self == ProbeOutcome::Running
    }
}

/// Mutable state driven by the recovery state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeState {
    pub consecutive_failures: u32,
    pub restarts_used: u32,
    pub last_recovery_at: Option<Instant>,
    pub phase: Phase,
}

/// Observability fields. Never consulted by the state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub last_probe: Option<ProbeOutcome>,
    /// Unix seconds of the last probe.
    pub last_probe_at: Option<u64>,
    /// Unix seconds of the last recovery attempt.
    pub last_recovery_at: Option<u64>,
    /// Most recent stop/start failure, cleared by the next clean recovery.
    pub last_action_error: Option<String>,
}

/// A watched server: spec, runtime state, and observations.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRecord {
    pub spec: ServerSpec,
    pub runtime: RuntimeState,
    pub observed: Observation,
    /// Bumped whenever runtime state is replaced from outside the watch loop.
    pub revision: u64,
}

impl ServerRecord {
    pub fn new(spec: ServerSpec) -> Self {
        Self {
            spec,
            runtime: RuntimeState::default(),
            observed: Observation::default(),
            revision: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus::from(self)
    }
}

// ── Status ────────────────────────────────────────────────────────

/// Read-only operator view of a server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub id: ServerId,
    pub endpoint: String,
    pub enabled: bool,
    pub policy: Policy,
    pub phase: Phase,
    pub consecutive_failures: u32,
    pub restarts_used: u32,
    pub last_probe: Option<ProbeOutcome>,
    pub last_probe_at: Option<u64>,
    pub last_recovery_at: Option<u64>,
    pub last_action_error: Option<String>,
}

impl From<&ServerRecord> for ServerStatus {
    fn from(record: &ServerRecord) -> Self {
        Self {
            id: record.spec.id.clone(),
            endpoint: record.spec.endpoint.to_string(),
            enabled: record.spec.enabled,
            policy: record.spec.policy,
            phase: record.runtime.phase,
            consecutive_failures: record.runtime.consecutive_failures,
            restarts_used: record.runtime.restarts_used,
            last_probe: record.observed.last_probe,
            last_probe_at: record.observed.last_probe_at,
            last_recovery_at: record.observed.last_recovery_at,
            last_action_error: record.observed.last_action_error.clone(),
        }
    }
}

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
