use thiserror::Error;

use opnctl_domain::DeploymentName;
use opnctl_effector::EffectorError;
use opnctl_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("effector error: {0}")]
    Effector(#[from] EffectorError),

    #[error("plan for '{deployment}' is stale: based on version {expected}, deployment is now at {actual}")]
    StalePlan { deployment: DeploymentName, expected: u64, actual: u64 },

    #[error("plan for '{deployment}' carries a risk above Medium severity; re-run with force to proceed")]
    RiskGated { deployment: DeploymentName },
}
