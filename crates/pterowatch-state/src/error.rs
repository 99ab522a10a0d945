//! Error types for the server registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("server id must not be empty")]
    EmptyId,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid policy for {id}: {reason}")]
    InvalidPolicy { id: String, reason: String },

    /// The record was reset or replaced while a probe was in flight.
    #[error("stale update for {0}")]
    Stale(String),
}
