use opnctl_domain::{ResourceId, ResourceInstance};
use opnctl_effector::{with_retry, Effector, RetryConfig};
use serde_json::Value;
use tracing::warn;

/// One inverse operation, recorded as soon as its forward operation succeeds.
/// Applying the full journal in reverse order restores pre-apply state.
///
/// Grounded on the snapshot-then-reverse-apply shape of a row-level rollback
/// log: capture what undoes this step before moving to the next one, then
/// walk the log backwards on failure.
#[derive(Debug, Clone)]
pub enum RollbackEntry {
    /// A create succeeded; undo by deleting what was created.
    UndoCreate { resource_id: ResourceId, instance: ResourceInstance, canonical_key: Value },
    /// A delete succeeded; undo by recreating the prior instance. The device
    /// may assign a new canonical key; callers should not depend on it
    /// matching the original.
    UndoDelete { resource_id: ResourceId, instance: ResourceInstance },
    /// An update succeeded; undo by writing the prior properties back.
    UndoUpdate { resource_id: ResourceId, before: ResourceInstance, canonical_key: Value },
    /// Only the delete-half of a replace has run so far; undo by recreating
    /// the prior instance. Mirrors `UndoDelete` — kept distinct so intent is
    /// legible in logs.
    UndoReplaceDeleteHalf { resource_id: ResourceId, before: ResourceInstance },
    /// Both halves of a replace succeeded; undo by deleting the new instance
    /// and recreating the old one.
    UndoReplaceComplete { resource_id: ResourceId, before: ResourceInstance, new_canonical_key: Value },
}

impl RollbackEntry {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            RollbackEntry::UndoCreate { resource_id, .. }
            | RollbackEntry::UndoDelete { resource_id, .. }
            | RollbackEntry::UndoUpdate { resource_id, .. }
            | RollbackEntry::UndoReplaceDeleteHalf { resource_id, .. }
            | RollbackEntry::UndoReplaceComplete { resource_id, .. } => resource_id,
        }
    }
}

/// Apply a rollback journal in reverse order. Every entry is attempted
/// regardless of earlier failures — rollback errors are logged, not
/// propagated, so one bad inverse operation never strands the rest of the
/// journal unwound. Returns every entry whose inverse operation failed; an
/// empty result means the rollback fully succeeded. The caller marks the
/// deployment quarantined (partial rollback) when this is non-empty.
pub async fn rollback(
    effector: &dyn Effector,
    retry_config: &RetryConfig,
    entries: &[RollbackEntry],
) -> Vec<(ResourceId, String)> {
    let mut failures = Vec::new();
    for entry in entries.iter().rev() {
        let outcome = match entry {
            RollbackEntry::UndoCreate { instance, canonical_key, .. } => {
                with_retry(retry_config, || effector.delete(instance, canonical_key)).await
            }
            RollbackEntry::UndoDelete { instance, .. }
            | RollbackEntry::UndoReplaceDeleteHalf { before: instance, .. } => {
                with_retry(retry_config, || effector.create(instance)).await.map(|_| ())
            }
            RollbackEntry::UndoUpdate { before, canonical_key, .. } => {
                with_retry(retry_config, || effector.update(before, canonical_key)).await.map(|_| ())
            }
            RollbackEntry::UndoReplaceComplete { before, new_canonical_key, .. } => {
                let delete = with_retry(retry_config, || effector.delete(before, new_canonical_key)).await;
                match delete {
                    Ok(()) => with_retry(retry_config, || effector.create(before)).await.map(|_| ()),
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = outcome {
            warn!(resource = %entry.resource_id(), error = %e, "rollback step failed");
            failures.push((entry.resource_id().clone(), e.to_string()));
        }
    }
    failures
}
