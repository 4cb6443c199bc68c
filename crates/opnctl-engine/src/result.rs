use opnctl_domain::ResourceId;
use serde::Serialize;

/// Outcome of [`crate::engine::ExecutionEngine::execute`].
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub applied: Vec<ResourceId>,
    pub failed: Vec<(ResourceId, String)>,
    pub rollback_performed: bool,
    /// Rollback-step failures, present only when the rollback itself could
    /// not fully undo the journal. A non-empty value means the deployment's
    /// stored resource map was left untouched and the affected resources
    /// must be reconciled by hand — `success` is always `false` alongside it.
    pub partial_rollback: Option<Vec<(ResourceId, String)>>,
    /// `true` when no effector call was made; `applied` then lists the
    /// resource ids that would have been touched, in wave order.
    pub dry_run: bool,
}

impl ExecutionResult {
    pub fn committed(applied: Vec<ResourceId>) -> Self {
        ExecutionResult {
            success: true,
            applied,
            failed: Vec::new(),
            rollback_performed: false,
            partial_rollback: None,
            dry_run: false,
        }
    }

    pub fn dry_run(applied: Vec<ResourceId>) -> Self {
        ExecutionResult { dry_run: true, ..Self::committed(applied) }
    }

    pub fn rolled_back(applied: Vec<ResourceId>, failed: Vec<(ResourceId, String)>) -> Self {
        ExecutionResult {
            success: false,
            applied,
            failed,
            rollback_performed: true,
            partial_rollback: None,
            dry_run: false,
        }
    }

    pub fn partially_rolled_back(
        applied: Vec<ResourceId>,
        failed: Vec<(ResourceId, String)>,
        rollback_failures: Vec<(ResourceId, String)>,
    ) -> Self {
        ExecutionResult {
            success: false,
            applied,
            failed,
            rollback_performed: true,
            partial_rollback: Some(rollback_failures),
            dry_run: false,
        }
    }

    /// `continueOnError` ran to completion despite one or more task
    /// failures; no rollback was attempted (destroy's default).
    pub fn completed_with_failures(applied: Vec<ResourceId>, failed: Vec<(ResourceId, String)>) -> Self {
        ExecutionResult {
            success: false,
            applied,
            failed,
            rollback_performed: false,
            partial_rollback: None,
            dry_run: false,
        }
    }
}
