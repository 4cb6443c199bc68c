use std::collections::BTreeMap;
use std::sync::Arc;

use opnctl_domain::{ResourceId, ResourceInstance, ResourceState};
use opnctl_effector::{with_retry, Effector, EffectorError, RetryConfig};
use serde_json::Value;
use tokio::sync::Mutex;

use opnctl_planner::{Change, ChangeOp};

use crate::journal::RollbackEntry;
use crate::template::resolve_instance;

/// What a single successful change leaves behind in the deployment's
/// resource map.
pub enum Applied {
    Upserted(ResourceInstance),
    Removed,
}

/// Apply one change, pushing a [`RollbackEntry`] onto `journal` for every
/// sub-step that actually mutates device state, in the order it happens.
/// A `replace`'s delete-half is journaled even if its create-half then
/// fails, so the overall rollback can still undo the delete alone.
///
/// `resources` is the output table as committed through the end of the
/// previous wave; property templates in `change.after` are resolved against
/// it before the effector is ever called, per the task-start resolution
/// rule (not at plan time).
pub async fn apply_change(
    effector: &dyn Effector,
    retry_config: &RetryConfig,
    journal: &Mutex<Vec<RollbackEntry>>,
    change: &Change,
    resources: &BTreeMap<ResourceId, ResourceInstance>,
) -> Result<Applied, String> {
    match change.op {
        ChangeOp::Create => {
            let raw_after = change.after.as_ref().expect("create change carries `after`");
            let after = &resolve_instance(raw_after, resources)?;
            match with_retry(retry_config, || effector.create(after)).await {
                Ok(result) => {
                    let mut instance = after.clone();
                    instance.state = ResourceState::Created;
                    instance.canonical_key = Some(result.canonical_key.clone());
                    instance.outputs = result.outputs;
                    journal.lock().await.push(RollbackEntry::UndoCreate {
                        resource_id: change.resource_id.clone(),
                        instance: instance.clone(),
                        canonical_key: result.canonical_key,
                    });
                    Ok(Applied::Upserted(instance))
                }
                // Already present on the device: treat as success per the
                // idempotent-apply contract rather than failing the wave.
                Err(EffectorError::Conflict(_)) => match effector.read(after, &Value::Null).await {
                    Ok(observed) if observed.exists => {
                        let mut instance = after.clone();
                        instance.state = ResourceState::Created;
                        instance.outputs = observed.outputs;
                        Ok(Applied::Upserted(instance))
                    }
                    _ => Err("create conflicted and resource is not actually present".to_string()),
                },
                Err(e) => Err(e.to_string()),
            }
        }
        ChangeOp::Update => {
            let before = change.before.as_ref().expect("update change carries `before`");
            let raw_after = change.after.as_ref().expect("update change carries `after`");
            let after = &resolve_instance(raw_after, resources)?;
            let canonical_key = before.canonical_key.clone().unwrap_or(Value::Null);
            match with_retry(retry_config, || effector.update(after, &canonical_key)).await {
                Ok(result) => {
                    let mut instance = after.clone();
                    instance.state = ResourceState::Updated;
                    instance.canonical_key = Some(result.canonical_key);
                    instance.outputs = result.outputs;
                    journal.lock().await.push(RollbackEntry::UndoUpdate {
                        resource_id: change.resource_id.clone(),
                        before: before.clone(),
                        canonical_key,
                    });
                    Ok(Applied::Upserted(instance))
                }
                Err(e) => Err(e.to_string()),
            }
        }
        ChangeOp::Delete => {
            let before = change.before.as_ref().expect("delete change carries `before`");
            let canonical_key = before.canonical_key.clone().unwrap_or(Value::Null);
            match with_retry(retry_config, || effector.delete(before, &canonical_key)).await {
                Ok(()) => {
                    journal.lock().await.push(RollbackEntry::UndoDelete {
                        resource_id: change.resource_id.clone(),
                        instance: before.clone(),
                    });
                    Ok(Applied::Removed)
                }
                // Already gone from the device: idempotent success.
                Err(EffectorError::NotFound(_)) => Ok(Applied::Removed),
                Err(e) => Err(e.to_string()),
            }
        }
        ChangeOp::Replace => {
            let before = change.before.as_ref().expect("replace change carries `before`");
            let raw_after = change.after.as_ref().expect("replace change carries `after`");
            let after = &resolve_instance(raw_after, resources)?;
            let canonical_key = before.canonical_key.clone().unwrap_or(Value::Null);

            let delete_result = with_retry(retry_config, || effector.delete(before, &canonical_key)).await;
            match delete_result {
                Ok(()) => {}
                Err(EffectorError::NotFound(_)) => {}
                Err(e) => return Err(format!("replace delete-half failed: {e}")),
            }
            journal.lock().await.push(RollbackEntry::UndoReplaceDeleteHalf {
                resource_id: change.resource_id.clone(),
                before: before.clone(),
            });

            match with_retry(retry_config, || effector.create(after)).await {
                Ok(result) => {
                    let mut instance = after.clone();
                    instance.state = ResourceState::Created;
                    instance.canonical_key = Some(result.canonical_key.clone());
                    instance.outputs = result.outputs;
                    {
                        let mut guard = journal.lock().await;
                        guard.pop();
                        guard.push(RollbackEntry::UndoReplaceComplete {
                            resource_id: change.resource_id.clone(),
                            before: before.clone(),
                            new_canonical_key: result.canonical_key,
                        });
                    }
                    Ok(Applied::Upserted(instance))
                }
                Err(e) => Err(format!("replace create-half failed: {e}")),
            }
        }
    }
}

pub(crate) fn semaphore(max_concurrency: usize) -> Arc<tokio::sync::Semaphore> {
    Arc::new(tokio::sync::Semaphore::new(max_concurrency.max(1)))
}
