//! Error types for the session manager.
//!
//! Socket-level failures never escape a session: they are absorbed into
//! state transitions. These errors cover the caller-facing surface only.

use thiserror::Error;

/// Errors surfaced to callers of the session manager.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint url: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("websocket connect failed: {0}")]
    Connect(String),

    #[error(transparent)]
    Protocol(#[from] webterm_protocol::ProtocolError),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} is closed")]
    SessionClosed(String),
}
