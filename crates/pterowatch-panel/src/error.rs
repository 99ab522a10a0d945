//! Panel client error types.

use thiserror::Error;

/// Result type alias for panel requests.
pub type PanelResult<T> = Result<T, PanelError>;

/// Errors that can occur while talking to the panel.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("panel returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected panel response: {0}")]
    Decode(String),

    #[error("failed to build panel client: {0}")]
    Client(String),
}
