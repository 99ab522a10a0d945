//! pterowatch-state: in-memory registry of watched game servers.
//!
//! Every watched server is a [`ServerRecord`]: the operator-supplied
//! [`ServerSpec`] plus the [`RuntimeState`] owned by the recovery state
//! machine and a few observability fields.
//!
//! # Architecture
//!
//! The [`Registry`] is `Clone` + `Send` + `Sync` (backed by
//! `Arc<RwLock<HashMap>>`) and is created once at startup and shared by the
//! watch loops, the operator API, and discovery. Only map-level operations
//! take the lock; a single record's runtime state is written exclusively by
//! the watch loop that owns that server.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{StateError, StateResult};
pub use registry::{Registry, Snapshot};
pub use types::*;
