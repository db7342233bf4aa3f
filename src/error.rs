use thiserror::Error;

/// Failures surfaced by the session, tracker, proof engine and bridge.
///
/// "Finality pending" is deliberately absent: an unfinalized block is
/// reported as `false` / `None`, not as an error.
#[derive(Debug, Error)]
pub enum DaError {
    /// Network unreachable, malformed seed, or a transport-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// A data-plane call was made before `connect` (or after `disconnect`).
    #[error("session is not connected")]
    NotConnected,

    /// Broadcast rejected, subscription lost, or inclusion timed out.
    #[error("submission failed: {0}")]
    Submission(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Settlement bridge relay or lookup failed.
    #[error("bridge error: {0}")]
    Bridge(String),
}

impl DaError {
    pub fn connection(msg: impl Into<String>) -> Self {
        DaError::Connection(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        DaError::Submission(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DaError::NotFound(msg.into())
    }
}

pub type DaResult<T> = Result<T, DaError>;
