//! Shared error type across relaycast crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and hub.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed wire payload.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Envelope failed structural validation (missing sender, bad type).
    #[error("invalid envelope: {0}")]
    Validation(String),
    /// Non-hello traffic on an unauthenticated connection.
    #[error("not authenticated")]
    Unauthenticated,
    /// A command named an execution target that is not connected.
    #[error("target not connected: {0}")]
    TargetNotConnected(String),
    /// A peer's outbound queue rejected a send.
    #[error("outbound queue full: {0}")]
    QueueFull(String),
    /// Configuration could not be loaded or validated.
    #[error("config error: {0}")]
    Config(String),
    /// Message store failure (best-effort; never fatal to delivery).
    #[error("store error: {0}")]
    Store(String),
    /// Lookup miss on the control surface.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Numeric code carried in error replies to peers (stable API).
    pub fn client_code(&self) -> u16 {
        match self {
            RelayError::Decode(_) | RelayError::Validation(_) => 400,
            RelayError::Unauthenticated => 401,
            RelayError::NotFound(_) => 404,
            RelayError::TargetNotConnected(_) => 500,
            RelayError::QueueFull(_) => 503,
            RelayError::Config(_) | RelayError::Store(_) | RelayError::Internal(_) => 500,
        }
    }
}
