use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opnctl_domain::DeploymentName;
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::StoreError;
use crate::state::{DeploymentRecord, Lease, PlanRecord, StoredEvent};
use crate::store::StateStore;

const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");
const PLANS: TableDefinition<&str, &[u8]> = TableDefinition::new("plans");
const LEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("leases");
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

fn internal<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Internal(e.to_string())
}

/// Persistent state store backed by a redb database file.
///
/// Deployments, plans, leases and the event log all survive process
/// restarts. Suitable for driving the engine across CLI invocations or
/// behind the RPC facade.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(internal)?;
        }
        let db = Database::create(path).map_err(internal)?;
        {
            let wtxn = db.begin_write().map_err(internal)?;
            wtxn.open_table(DEPLOYMENTS).map_err(internal)?;
            wtxn.open_table(PLANS).map_err(internal)?;
            wtxn.open_table(LEASES).map_err(internal)?;
            wtxn.open_table(EVENTS).map_err(internal)?;
            wtxn.open_table(META).map_err(internal)?;
            wtxn.commit().map_err(internal)?;
        }
        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl StateStore for RedbStore {
    async fn get_deployment(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(DEPLOYMENTS).map_err(internal)?;
        match table.get(name.as_str()).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn list_deployments(&self) -> Result<Vec<DeploymentName>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(DEPLOYMENTS).map_err(internal)?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (k, _v) = entry.map_err(internal)?;
            names.push(DeploymentName::new(k.value().to_string()));
        }
        Ok(names)
    }

    async fn put_deployment(
        &self,
        mut record: DeploymentRecord,
        expected_version: Option<u64>,
    ) -> Result<DeploymentRecord, StoreError> {
        let existing = self.get_deployment(&record.name).await?;
        let actual = existing.map(|d| d.version);
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
        let bytes = serde_json::to_vec(&record)?;
        let key = record.name.as_str().to_string();
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(DEPLOYMENTS).map_err(internal)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(record)
    }

    async fn delete_deployment(&self, name: &DeploymentName) -> Result<(), StoreError> {
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(DEPLOYMENTS).map_err(internal)?;
            table.remove(name.as_str()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    async fn save_plan(&self, plan: &PlanRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(plan)?;
        let key = plan.id.to_string();
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(PLANS).map_err(internal)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<PlanRecord>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(PLANS).map_err(internal)?;
        match table.get(id.to_string().as_str()).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn list_plans(&self, deployment_name: &DeploymentName) -> Result<Vec<PlanRecord>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(PLANS).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let plan: PlanRecord = serde_json::from_slice(v.value())?;
            if &plan.deployment_name == deployment_name {
                out.push(plan);
            }
        }
        Ok(out)
    }

    async fn acquire_lease(
        &self,
        name: &DeploymentName,
        holder: &str,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Lease, StoreError> {
        let existing = self.get_lease(name).await?;
        if let Some(lease) = &existing {
            if !lease.is_expired(now) && lease.holder != holder {
                return Err(StoreError::LeaseConflict {
                    name: name.to_string(),
                    holder: lease.holder.clone(),
                    expires_at: lease.expires_at.to_rfc3339(),
                });
            }
        }
        let lease = Lease {
            deployment_name: name.clone(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        };
        let bytes = serde_json::to_vec(&lease)?;
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(LEASES).map_err(internal)?;
            table.insert(name.as_str(), bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(lease)
    }

    async fn release_lease(&self, name: &DeploymentName, holder: &str) -> Result<(), StoreError> {
        match self.get_lease(name).await? {
            Some(lease) if lease.holder == holder => {
                let wtxn = self.db.begin_write().map_err(internal)?;
                {
                    let mut table = wtxn.open_table(LEASES).map_err(internal)?;
                    table.remove(name.as_str()).map_err(internal)?;
                }
                wtxn.commit().map_err(internal)?;
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
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(LEASES).map_err(internal)?;
        match table.get(name.as_str()).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn reap_expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<DeploymentName>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(LEASES).map_err(internal)?;
        let mut expired = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (k, v) = entry.map_err(internal)?;
            let lease: Lease = serde_json::from_slice(v.value())?;
            if lease.is_expired(now) {
                expired.push(DeploymentName::new(k.value().to_string()));
            }
        }
        drop(table);
        drop(rtxn);

        if !expired.is_empty() {
            let wtxn = self.db.begin_write().map_err(internal)?;
            {
                let mut table = wtxn.open_table(LEASES).map_err(internal)?;
                for name in &expired {
                    table.remove(name.as_str()).map_err(internal)?;
                }
            }
            wtxn.commit().map_err(internal)?;
        }
        Ok(expired)
    }

    async fn append_event(&self, event: &StoredEvent) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(event)?;
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut meta = wtxn.open_table(META).map_err(internal)?;
            let seq = meta
                .get("event_seq")
                .map_err(internal)?
                .map(|g| g.value())
                .unwrap_or(0);
            let new_seq = seq + 1;
            meta.insert("event_seq", new_seq).map_err(internal)?;

            let mut events = wtxn.open_table(EVENTS).map_err(internal)?;
            events.insert(new_seq, bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    async fn list_events(
        &self,
        deployment_name: Option<&DeploymentName>,
        limit: u32,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(EVENTS).map_err(internal)?;
        let mut all = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let event: StoredEvent = serde_json::from_slice(v.value())?;
            if deployment_name.map_or(true, |name| &event.deployment_name == name) {
                all.push(event);
            }
        }
        let start = all.len().saturating_sub(limit as usize);
        Ok(all[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn name(s: &str) -> DeploymentName {
        DeploymentName::new(s)
    }

    fn open_store(dir: &TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("state.redb")).unwrap()
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            let record = DeploymentRecord::new(name("lan"), Utc::now());
            store.put_deployment(record, None).await.unwrap();
        }
        {
            let store = RedbStore::open(&path).unwrap();
            let got = store.get_deployment(&name("lan")).await.unwrap();
            assert!(got.is_some());
        }
    }

    #[tokio::test]
    async fn stale_write_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let record = DeploymentRecord::new(name("lan"), Utc::now());
        store.put_deployment(record.clone(), None).await.unwrap();
        let err = store.put_deployment(record, None).await.unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
    }

    #[tokio::test]
    async fn lease_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let now = Utc::now();
        store.acquire_lease(&name("lan"), "agent-a", 60, now).await.unwrap();
        let err = store
            .acquire_lease(&name("lan"), "agent-b", 60, now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LeaseConflict { .. }));
        store.release_lease(&name("lan"), "agent-a").await.unwrap();
        assert!(store.get_lease(&name("lan")).await.unwrap().is_none());
    }
}
