use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opnctl_domain::DeploymentName;
use uuid::Uuid;

use crate::error::StoreError;
use crate::state::{DeploymentRecord, Lease, PlanRecord, StoredEvent};

#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    async fn get_deployment(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<DeploymentRecord>, StoreError>;

    async fn list_deployments(&self) -> Result<Vec<DeploymentName>, StoreError>;

    /// Write a deployment record. `expected_version` is the version the
    /// caller last read; `None` means "create, must not already exist".
    /// On success the stored version is `expected_version + 1` (or `1` for
    /// a fresh deployment). Returns [`StoreError::StaleWrite`] on mismatch.
    async fn put_deployment(
        &self,
        record: DeploymentRecord,
        expected_version: Option<u64>,
    ) -> Result<DeploymentRecord, StoreError>;

    async fn delete_deployment(&self, name: &DeploymentName) -> Result<(), StoreError>;

    async fn save_plan(&self, plan: &PlanRecord) -> Result<(), StoreError>;

    async fn get_plan(&self, id: Uuid) -> Result<Option<PlanRecord>, StoreError>;

    async fn list_plans(&self, deployment_name: &DeploymentName) -> Result<Vec<PlanRecord>, StoreError>;

    /// Acquire a lease if none is held, or if the held lease has expired.
    /// Re-acquiring with the same `holder` before expiry renews the TTL.
    async fn acquire_lease(
        &self,
        name: &DeploymentName,
        holder: &str,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Lease, StoreError>;

    async fn release_lease(&self, name: &DeploymentName, holder: &str) -> Result<(), StoreError>;

    async fn get_lease(&self, name: &DeploymentName) -> Result<Option<Lease>, StoreError>;

    /// Startup recovery: drop every expired lease. Callers are expected to
    /// additionally promote any resource left in a transient `*-ing` state
    /// to `Failed` (done at the domain/engine layer, since the store does
    /// not interpret resource state).
    async fn reap_expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<DeploymentName>, StoreError>;

    async fn append_event(&self, event: &StoredEvent) -> Result<(), StoreError>;

    async fn list_events(
        &self,
        deployment_name: Option<&DeploymentName>,
        limit: u32,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// Startup recovery, invoked once at process/CLI startup: reap expired
    /// leases, then promote any resource left in a transient `*-ing` state
    /// (interrupted mid-apply by a crash or restart) to `Failed` across
    /// every deployment, not only the ones whose lease had expired. Returns
    /// the names of deployments whose resource map was rewritten.
    async fn recover(&self, now: DateTime<Utc>) -> Result<Vec<DeploymentName>, StoreError> {
        self.reap_expired_leases(now).await?;

        let mut recovered = Vec::new();
        for name in self.list_deployments().await? {
            let Some(mut record) = self.get_deployment(&name).await? else { continue };
            let mut changed = false;
            for instance in record.resources.values_mut() {
                if instance.state.is_transient() {
                    instance.state = opnctl_domain::ResourceState::Failed;
                    changed = true;
                }
            }
            if changed {
                let expected_version = record.version;
                record.updated_at = now;
                self.put_deployment(record, Some(expected_version)).await?;
                recovered.push(name);
            }
        }
        Ok(recovered)
    }
}
