use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use opnctl_domain::{DeploymentName, ResourceId};
use opnctl_effector::{Effector, EngineEvent, EventBus, RetryConfig};
use opnctl_planner::{ChangeOp, Plan, RiskSeverity};
use opnctl_store::{DeploymentRecord, StateStore, StoredEvent};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::apply::{apply_change, semaphore, Applied};
use crate::error::EngineError;
use crate::journal::{rollback, RollbackEntry};
use crate::options::ExecuteOptions;
use crate::result::ExecutionResult;

/// Default lease TTL for an `execute()` run. Renewed implicitly by holding
/// the lock object is out of scope here; a single run is expected to finish
/// well within this window, per the size of `max_concurrency` and per-wave
/// retry budgets.
const DEFAULT_LEASE_TTL_SECS: i64 = 300;

pub struct ExecutionEngine {
    store: Arc<dyn StateStore>,
    effector: Arc<dyn Effector>,
    event_bus: Arc<dyn EventBus>,
    max_concurrency: usize,
    retry_config: RetryConfig,
    holder: String,
}

impl ExecutionEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        effector: Arc<dyn Effector>,
        event_bus: Arc<dyn EventBus>,
        max_concurrency: usize,
        holder: impl Into<String>,
    ) -> Self {
        ExecutionEngine {
            store,
            effector,
            event_bus,
            max_concurrency,
            retry_config: RetryConfig::default(),
            holder: holder.into(),
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Execute a plan per `options`. Default (apply) semantics: acquire the
    /// deployment's single-writer lease, run each wave with bounded
    /// concurrency, and roll back the whole journal on the first wave that
    /// contains a failure. `options.continue_on_error` (destroy's default)
    /// keeps tearing through the remaining waves instead, reporting every
    /// failure without rolling back what already succeeded. A plan carrying
    /// a risk above Medium severity is refused unless `options.force` is
    /// set. `options.dry_run` never touches the lease, the store, or the
    /// effector — it only reports what would be applied.
    pub async fn execute(&self, plan: &Plan, options: &ExecuteOptions) -> Result<ExecutionResult, EngineError> {
        let deployment_name = plan.deployment_name.clone();

        if !options.force && plan.risks.iter().any(|r| r.severity != RiskSeverity::Medium) {
            return Err(EngineError::RiskGated { deployment: deployment_name });
        }

        if options.dry_run {
            return self.dry_run(plan).await;
        }

        let _lease = self
            .store
            .acquire_lease(&deployment_name, &self.holder, DEFAULT_LEASE_TTL_SECS, Utc::now())
            .await?;

        let record = self.store.get_deployment(&deployment_name).await?;
        let current_version = record.as_ref().map(|r| r.version).unwrap_or(0);
        if current_version != plan.base_version {
            self.store.release_lease(&deployment_name, &self.holder).await.ok();
            return Err(EngineError::StalePlan {
                deployment: deployment_name,
                expected: plan.base_version,
                actual: current_version,
            });
        }

        let mut resources: BTreeMap<ResourceId, opnctl_domain::ResourceInstance> =
            record.map(|r| r.resources).unwrap_or_default();

        let journal: Mutex<Vec<RollbackEntry>> = Mutex::new(Vec::new());
        let mut applied_ids = Vec::new();
        let mut failures: Vec<(ResourceId, String)> = Vec::new();
        let max_concurrency = options.max_concurrency.unwrap_or(self.max_concurrency);
        let permits = semaphore(max_concurrency);

        'waves: for wave in &plan.waves {
            self.event_bus
                .publish(EngineEvent::WaveStarted {
                    deployment: deployment_name.clone(),
                    wave_index: wave.index,
                    resource_count: wave.changes.len(),
                })
                .await;

            let journal_ref = &journal;
            let resources_ref = &resources;
            let tasks = wave.changes.iter().map(|change| {
                let permits = Arc::clone(&permits);
                let effector = Arc::clone(&self.effector);
                let retry_config = self.retry_config.clone();
                async move {
                    let _permit = permits.acquire().await.expect("semaphore never closed");
                    let outcome =
                        apply_change(effector.as_ref(), &retry_config, journal_ref, change, resources_ref).await;
                    (change.resource_id.clone(), change.op, outcome)
                }
            });
            let results = join_all(tasks).await;

            let mut wave_failed = false;
            for (resource_id, op, outcome) in results {
                match outcome {
                    Ok(Applied::Upserted(instance)) => {
                        resources.insert(resource_id.clone(), instance);
                        applied_ids.push(resource_id.clone());
                        self.event_bus
                            .publish(EngineEvent::ResourceApplied {
                                deployment: deployment_name.clone(),
                                resource: resource_id,
                            })
                            .await;
                    }
                    Ok(Applied::Removed) => {
                        resources.remove(&resource_id);
                        applied_ids.push(resource_id.clone());
                        self.event_bus
                            .publish(EngineEvent::ResourceApplied {
                                deployment: deployment_name.clone(),
                                resource: resource_id,
                            })
                            .await;
                    }
                    Err(message) => {
                        warn!(resource = %resource_id, op = %op, error = %message, "change failed");
                        self.event_bus
                            .publish(EngineEvent::ResourceFailed {
                                deployment: deployment_name.clone(),
                                resource: resource_id.clone(),
                                message: message.clone(),
                            })
                            .await;
                        failures.push((resource_id, message));
                        wave_failed = true;
                    }
                }
            }

            self.event_bus
                .publish(EngineEvent::WaveCompleted {
                    deployment: deployment_name.clone(),
                    wave_index: wave.index,
                })
                .await;

            if wave_failed && !options.continue_on_error {
                break 'waves;
            }
        }

        if !failures.is_empty() && options.continue_on_error {
            let now = Utc::now();
            let mut record = DeploymentRecord::new(deployment_name.clone(), now);
            record.resources = resources;
            record.updated_at = now;
            self.store.put_deployment(record, Some(plan.base_version)).await?;

            self.store
                .append_event(&StoredEvent {
                    id: Uuid::new_v4(),
                    deployment_name: deployment_name.clone(),
                    at: now,
                    kind: "plan_applied_with_failures".to_string(),
                    detail: serde_json::json!({ "plan_id": plan.id, "failed": failures.len() }),
                })
                .await?;
            self.store.release_lease(&deployment_name, &self.holder).await.ok();

            warn!(deployment = %deployment_name, failed = failures.len(), "continue-on-error run finished with failures");
            return Ok(ExecutionResult::completed_with_failures(applied_ids, failures));
        }

        if !failures.is_empty() {
            let reason = failures[0].1.clone();
            self.event_bus
                .publish(EngineEvent::RollbackStarted { deployment: deployment_name.clone(), reason })
                .await;

            let entries = journal.into_inner();
            let rollback_failures = rollback(self.effector.as_ref(), &self.retry_config, &entries).await;

            self.store
                .append_event(&StoredEvent {
                    id: Uuid::new_v4(),
                    deployment_name: deployment_name.clone(),
                    at: Utc::now(),
                    kind: "rollback_completed".to_string(),
                    detail: serde_json::json!({
                        "plan_id": plan.id,
                        "failed_resource": failures[0].0.as_str(),
                        "partial": !rollback_failures.is_empty(),
                    }),
                })
                .await?;
            self.store.release_lease(&deployment_name, &self.holder).await.ok();

            self.event_bus
                .publish(EngineEvent::RollbackCompleted { deployment: deployment_name })
                .await;

            return Ok(if rollback_failures.is_empty() {
                ExecutionResult::rolled_back(applied_ids, failures)
            } else {
                ExecutionResult::partially_rolled_back(applied_ids, failures, rollback_failures)
            });
        }

        let now = Utc::now();
        let mut record = DeploymentRecord::new(deployment_name.clone(), now);
        record.resources = resources;
        record.updated_at = now;
        self.store
            .put_deployment(record, Some(plan.base_version))
            .await?;

        self.store
            .append_event(&StoredEvent {
                id: Uuid::new_v4(),
                deployment_name: deployment_name.clone(),
                at: now,
                kind: "plan_applied".to_string(),
                detail: serde_json::json!({ "plan_id": plan.id, "changes": plan.total_changes() }),
            })
            .await?;
        self.store.release_lease(&deployment_name, &self.holder).await.ok();

        info!(deployment = %deployment_name, changes = plan.total_changes(), "plan applied");
        Ok(ExecutionResult::committed(applied_ids))
    }

    /// Version-check only, with no lease and no effector calls. `applied`
    /// lists the resource ids that would be touched, in wave order.
    async fn dry_run(&self, plan: &Plan) -> Result<ExecutionResult, EngineError> {
        let deployment_name = plan.deployment_name.clone();
        let record = self.store.get_deployment(&deployment_name).await?;
        let current_version = record.map(|r| r.version).unwrap_or(0);
        if current_version != plan.base_version {
            return Err(EngineError::StalePlan {
                deployment: deployment_name,
                expected: plan.base_version,
                actual: current_version,
            });
        }

        let applied_ids = plan
            .waves
            .iter()
            .flat_map(|w| w.changes.iter().map(|c| c.resource_id.clone()))
            .collect();
        Ok(ExecutionResult::dry_run(applied_ids))
    }

    /// Explicit, caller-invoked drift check: read every resource's current
    /// device state and report mismatches against stored properties. Never
    /// runs in the background and never mutates state.
    pub async fn refresh_deployment(
        &self,
        deployment_name: &DeploymentName,
    ) -> Result<Vec<(ResourceId, bool)>, EngineError> {
        let Some(record) = self.store.get_deployment(deployment_name).await? else {
            return Ok(Vec::new());
        };
        let mut drift = Vec::with_capacity(record.resources.len());
        for (id, instance) in &record.resources {
            let canonical_key = instance.canonical_key.clone().unwrap_or(serde_json::Value::Null);
            let observed = self.effector.read(instance, &canonical_key).await?;
            let matches = observed.exists && observed.properties == instance.properties;
            drift.push((id.clone(), !matches));
        }
        Ok(drift)
    }
}
