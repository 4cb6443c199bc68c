use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opnctl_domain::DeploymentName;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::state::{DeploymentRecord, Lease, PlanRecord, StoredEvent};
use crate::store::StateStore;

#[derive(Debug, Default)]
struct Inner {
    deployments: HashMap<DeploymentName, DeploymentRecord>,
    plans: HashMap<Uuid, PlanRecord>,
    leases: HashMap<DeploymentName, Lease>,
    events: Vec<StoredEvent>,
}

/// In-memory implementation of [`StateStore`].
///
/// All data is lost on process exit. Suitable for tests and the local driver.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_deployment(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.deployments.get(name).cloned())
    }

    async fn list_deployments(&self) -> Result<Vec<DeploymentName>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.deployments.keys().cloned().collect())
    }

    async fn put_deployment(
        &self,
        mut record: DeploymentRecord,
        expected_version: Option<u64>,
    ) -> Result<DeploymentRecord, StoreError> {
        let mut guard = self.inner.write().await;
        let actual = guard.deployments.get(&record.name).map(|d| d.version);
        match (expected_version, actual) {
            (None, None) => {}
            (Some(exp), Some(act)) if exp == act => {}
            (expected, actual) => {
                return Err(StoreError::StaleWrite {
                    name: record.name.to_string(),
                    expected: expected.unwrap_or(0),
                    actual: actual.unwrap_or(0),
                });
            }
        }
        record.version = actual.map(|v| v + 1).unwrap_or(1);
        guard.deployments.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn delete_deployment(&self, name: &DeploymentName) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.deployments.remove(name);
        Ok(())
    }

    async fn save_plan(&self, plan: &PlanRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<PlanRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.plans.get(&id).cloned())
    }

    async fn list_plans(&self, deployment_name: &DeploymentName) -> Result<Vec<PlanRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .plans
            .values()
            .filter(|p| &p.deployment_name == deployment_name)
            .cloned()
            .collect())
    }

    async fn acquire_lease(
        &self,
        name: &DeploymentName,
        holder: &str,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Lease, StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.leases.get(name) {
            if !existing.is_expired(now) && existing.holder != holder {
                return Err(StoreError::LeaseConflict {
                    name: name.to_string(),
                    holder: existing.holder.clone(),
                    expires_at: existing.expires_at.to_rfc3339(),
                });
            }
        }
        let lease = Lease {
            deployment_name: name.clone(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        };
        guard.leases.insert(name.clone(), lease.clone());
        Ok(lease)
    }

    async fn release_lease(&self, name: &DeploymentName, holder: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        match guard.leases.get(name) {
            Some(existing) if existing.holder == holder => {
                guard.leases.remove(name);
                Ok(())
            }
            Some(_) => Err(StoreError::LeaseNotHeld {
                name: name.to_string(),
                holder: holder.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn get_lease(&self, name: &DeploymentName) -> Result<Option<Lease>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.leases.get(name).cloned())
    }

    async fn reap_expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<DeploymentName>, StoreError> {
        let mut guard = self.inner.write().await;
        let expired: Vec<DeploymentName> = guard
            .leases
            .iter()
            .filter(|(_, lease)| lease.is_expired(now))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &expired {
            guard.leases.remove(name);
        }
        Ok(expired)
    }

    async fn append_event(&self, event: &StoredEvent) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.events.push(event.clone());
        Ok(())
    }

    async fn list_events(
        &self,
        deployment_name: Option<&DeploymentName>,
        limit: u32,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let guard = self.inner.read().await;
        let filtered: Vec<StoredEvent> = guard
            .events
            .iter()
            .filter(|ev| deployment_name.map_or(true, |name| &ev.deployment_name == name))
            .cloned()
            .collect();
        let start = filtered.len().saturating_sub(limit as usize);
        Ok(filtered[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DeploymentName {
        DeploymentName::new(s)
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = MemoryStore::new();
        let record = DeploymentRecord::new(name("lan"), Utc::now());
        let saved = store.put_deployment(record, None).await.unwrap();
        assert_eq!(saved.version, 1);

        let got = store.get_deployment(&name("lan")).await.unwrap().unwrap();
        assert_eq!(got.version, 1);
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let store = MemoryStore::new();
        let record = DeploymentRecord::new(name("lan"), Utc::now());
        store.put_deployment(record.clone(), None).await.unwrap();

        let err = store.put_deployment(record, None).await.unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
    }

    #[tokio::test]
    async fn concurrent_lease_acquire_conflicts() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.acquire_lease(&name("lan"), "agent-a", 60, now).await.unwrap();

        let err = store
            .acquire_lease(&name("lan"), "agent-b", 60, now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LeaseConflict { .. }));
    }

    #[tokio::test]
    async fn expired_lease_can_be_reacquired_by_another_holder() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.acquire_lease(&name("lan"), "agent-a", 1, now).await.unwrap();

        let later = now + chrono::Duration::seconds(2);
        let lease = store
            .acquire_lease(&name("lan"), "agent-b", 60, later)
            .await
            .unwrap();
        assert_eq!(lease.holder, "agent-b");
    }

    #[tokio::test]
    async fn reap_expired_leases_clears_them() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.acquire_lease(&name("lan"), "agent-a", 1, now).await.unwrap();

        let later = now + chrono::Duration::seconds(5);
        let reaped = store.reap_expired_leases(later).await.unwrap();
        assert_eq!(reaped, vec![name("lan")]);
        assert!(store.get_lease(&name("lan")).await.unwrap().is_none());
    }
}
