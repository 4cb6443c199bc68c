use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use opnctl_domain::{DeploymentName, ResourceId, ResourceInstance};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Serialize `value` to canonical JSON (object keys sorted) and return its
/// SHA-256 hex digest. Used by the Planner to detect config drift without
/// diffing the full desired-state struct.
pub fn compute_desired_hash<T: Serialize>(value: &T) -> String {
    let v = serde_json::to_value(value).unwrap_or(Value::Null);
    let canonical = sort_json_keys(v);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("{:x}", digest)
}

fn sort_json_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_json_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json_keys).collect()),
        other => other,
    }
}

/// The persisted record of a deployment: its resources and an optimistic
/// concurrency version bumped on every successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: DeploymentName,
    pub version: u64,
    pub resources: BTreeMap<ResourceId, ResourceInstance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(name: DeploymentName, now: DateTime<Utc>) -> Self {
        DeploymentRecord {
            name,
            version: 0,
            resources: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Applied,
    /// The deployment's version advanced past `base_version` before apply ran.
    Stale,
    Aborted,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Applied => "applied",
            PlanStatus::Stale => "stale",
            PlanStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// A persisted plan. The store treats the plan body as an opaque,
/// already-serialized blob; only the Planner and Engine crates know its
/// shape, which keeps the store crate free of a dependency on the Planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: Uuid,
    pub deployment_name: DeploymentName,
    /// The deployment version this plan was computed against.
    pub base_version: u64,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub body: Value,
}

/// A single-writer lease over a deployment name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub deployment_name: DeploymentName,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An append-only record in the engine's execution log. Distinct from the
/// out-of-core-scope event bus (`opnctl-effector::EventBus`): this is the
/// durable audit trail the state store owns; the event bus is the
/// best-effort notification fan-out other subsystems subscribe to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub deployment_name: DeploymentName,
    pub at: DateTime<Utc>,
    pub kind: String,
    pub detail: Value,
}
