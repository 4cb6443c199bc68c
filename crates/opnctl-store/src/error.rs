use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("stale write: deployment '{name}' is at version {actual}, write expected {expected}")]
    StaleWrite {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// Returned when a lease is already held by another holder and has not expired.
    #[error("lease conflict: deployment '{name}' is held by '{holder}' until {expires_at}")]
    LeaseConflict {
        name: String,
        holder: String,
        expires_at: String,
    },

    #[error("lease not held by '{holder}' for deployment '{name}'")]
    LeaseNotHeld { name: String, holder: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
