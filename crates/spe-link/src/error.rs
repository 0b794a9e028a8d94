//! Error types for the link layer

use thiserror::Error;

/// Errors that end or prevent a session
#[derive(Debug, Error)]
pub enum LinkError {
    /// Transport read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session task is no longer running
    #[error("session closed")]
    SessionClosed,

    /// Configuration rejected before the session started
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
