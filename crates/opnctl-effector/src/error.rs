use thiserror::Error;

#[derive(Debug, Error)]
pub enum EffectorError {
    #[error("effector call failed: {0}")]
    CallFailed(String),

    /// Connection reset, timeout, 5xx — safe to retry with backoff.
    #[error("transient effector error: {0}")]
    Transient(String),

    /// The device rejected the request due to a concurrent external change
    /// (e.g. someone edited the same rule in the OPNsense UI).
    #[error("conflict applying to device: {0}")]
    Conflict(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("resource not found on device: {0}")]
    NotFound(String),

    #[error("internal effector error: {0}")]
    Internal(String),
}

impl EffectorError {
    /// Whether the engine's retry loop should attempt this call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, EffectorError::Transient(_))
    }
}
