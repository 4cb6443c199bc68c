use thiserror::Error;

use opnctl_domain::ResourceId;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("resource '{resource}' depends on unknown resource '{depends_on}'")]
    DanglingDependency {
        resource: ResourceId,
        depends_on: ResourceId,
    },

    #[error("resource '{0}' depends on itself")]
    SelfDependency(ResourceId),

    #[error("cycle detected in resource dependency graph: {0:?}")]
    CycleDetected(Vec<ResourceId>),

    #[error("multiple errors")]
    Multiple(Vec<GraphError>),
}
