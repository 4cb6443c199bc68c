use chrono::{DateTime, Utc};
use opnctl_domain::{DeploymentName, ResourceId, ResourceInstance};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// Ordered so `(op, resourceId)` tie-breaks waves deterministically:
    /// delete before update before create, matching step 6 of the planning
    /// algorithm.
    Delete,
    Update,
    Create,
    Replace,
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
            ChangeOp::Replace => "replace",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub op: ChangeOp,
    pub resource_id: ResourceId,
    pub before: Option<ResourceInstance>,
    pub after: Option<ResourceInstance>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Medium,
    High,
    /// A critical risk aborts plan creation; it never reaches a persisted plan.
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub resource_id: ResourceId,
    pub severity: RiskSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub index: usize,
    pub changes: Vec<Change>,
    pub estimated_seconds: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub replace: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub deployment_name: DeploymentName,
    pub created_at: DateTime<Utc>,
    pub summary: PlanSummary,
    pub waves: Vec<Wave>,
    pub risks: Vec<Risk>,
    /// The deployment version this plan was computed against; apply refuses
    /// if the store has advanced past this (optimistic concurrency).
    pub base_version: u64,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.waves.iter().all(|w| w.changes.is_empty())
    }

    pub fn total_changes(&self) -> usize {
        self.waves.iter().map(|w| w.changes.len()).sum()
    }
}
