use thiserror::Error;

use opnctl_domain::{DomainError, ResourceId};
use opnctl_graph::GraphError;
use opnctl_store::StoreError;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("validation error: {0}")]
    Validation(#[from] DomainError),

    #[error("dependency graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("critical risk: deleting '{resource}' would break dependent '{dependent}'")]
    CriticalDelete { resource: ResourceId, dependent: ResourceId },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
