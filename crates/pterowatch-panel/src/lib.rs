//! pterowatch-panel: talks to a Pterodactyl panel's client API.
//!
//! [`PanelClient`] implements the three seams the watcher needs:
//!
//! | Trait | Request |
//! |---|---|
//! | `StatusProbe` | `GET /api/client/servers/{id}/resources` |
//! | `RecoveryActuator` | `POST /api/client/servers/{id}/power` with `kill` / `start` |
//! | `ServerDiscovery` | `GET /api/client?page=N` |
//!
//! Every request carries the bearer token and is bounded by the client's
//! request timeout.

pub mod client;
pub mod error;
pub mod types;

pub use client::PanelClient;
pub use error::{PanelError, PanelResult};
pub use types::PowerSignal;
