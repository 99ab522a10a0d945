//! pterowatch-health: status probing and self-healing for game servers.
//!
//! Runs one independent watch loop per enabled server. Each tick probes the
//! server's container state, feeds the outcome to the pure recovery state
//! machine, stores the resulting runtime state in the registry, and issues
//! the forced stop + start pair when the machine asks for one.
//!
//! # Architecture
//!
//! ```text
//! Watchdog (registry mutation + status queries)
//!   └── WatchScheduler
//!       ├── Per-server background task
//!       │   ├── StatusProbe::probe() → ProbeOutcome   (bounded by timeout)
//!       │   ├── machine::step() → Decision            (pure)
//!       │   ├── Registry::apply()
//!       │   └── RecoveryActuator: kill, then start     (bounded by timeout)
//!       └── Shared shutdown signal
//! ```
//!
//! # Recovery policy
//!
//! `max_failures` consecutive failed probes trigger a recovery attempt.
//! After an attempt, further attempts are suppressed until
//! `restart_cooldown` has elapsed; failures are still counted. Once
//! `max_restarts` attempts have been spent, the next threshold hit locks the
//! server out until an operator resets it. A probe error counts exactly like
//! a stopped container.

pub mod collaborator;
pub mod machine;
pub mod watchdog;
pub mod watcher;

pub use collaborator::{DiscoveredServer, RecoveryActuator, ServerDiscovery, StatusProbe};
pub use machine::{step, Command, Decision};
pub use watchdog::Watchdog;
pub use watcher::WatchScheduler;
