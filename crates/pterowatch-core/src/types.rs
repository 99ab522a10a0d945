//! Shared types used across pterowatch crates.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::duration::format_duration;

/// Default seconds between probes.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);
/// Default consecutive failed probes before recovery.
pub const DEFAULT_MAX_FAILURES: u32 = 10;
/// Default recovery budget per process lifetime.
pub const DEFAULT_MAX_RESTARTS: u32 = 2;
/// Default minimum gap between recovery attempts.
pub const DEFAULT_RESTART_COOLDOWN: Duration = Duration::from_secs(120);

/// Network address of a game server. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Recovery policy for a single server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Policy {
    /// Time between consecutive probes. Always positive.
    #[serde(serialize_with = "serialize_duration")]
    pub scan_interval: Duration,
    /// Consecutive failed probes that count as "down". Always positive.
    pub max_failures: u32,
    /// Recovery attempts allowed before the server is locked out.
    pub max_restarts: u32,
    /// Minimum time after a recovery attempt before another may fire.
    #[serde(serialize_with = "serialize_duration")]
    pub restart_cooldown: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            max_failures: DEFAULT_MAX_FAILURES,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_cooldown: DEFAULT_RESTART_COOLDOWN,
        }
    }
}

impl Policy {
    /// Check the positivity constraints. Returns the reason on failure.
    pub fn check(&self) -> Result<(), String> {
        if self.scan_interval.is_zero() {
            return Err("scan_interval must be positive".to_string());
        }
        if self.max_failures == 0 {
            return Err("max_failures must be positive".to_string());
        }
        Ok(())
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_duration(*d))
}
