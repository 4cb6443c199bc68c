use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use opnctl_domain::{DeploymentName, Registry, ResourceId, ResourceInstance};
use opnctl_graph::DependencyEdge;
use opnctl_store::StateStore;
use uuid::Uuid;

use crate::diff::diff;
use crate::error::PlannerError;
use crate::model::{Change, ChangeOp, Plan, PlanSummary, Wave};
use crate::risk::analyze;

/// Fixed per-operation cost estimates in seconds, used for step 8 of the
/// planning algorithm. A real cost model would consult effector history;
/// these are the same conservative constants regardless of resource type.
fn op_cost_seconds(op: ChangeOp) -> u64 {
    match op {
        ChangeOp::Create => 5,
        ChangeOp::Update => 3,
        ChangeOp::Delete => 2,
        ChangeOp::Replace => 7,
    }
}

/// Compute a deployment plan: diff `desired` against the deployment's
/// current state, order the resulting changes into dependency-respecting
/// waves, and annotate risks. Returns [`PlannerError::CriticalDelete`]
/// without persisting anything if deleting a resource would orphan a
/// dependent that stays in the desired set.
///
/// Implements the algorithm in full:
/// index desired vs. actual, build the dependency graph (forward edges for
/// create/update/replace, inverted edges for delete, drawn from both
/// explicit `dependencies` and implicit ones induced by output-templated
/// properties), detect cycles, wave partition with an
/// `(op priority, resourceId)` tie-break, analyze risk, and estimate cost.
pub async fn plan(
    store: &dyn StateStore,
    registry: &Registry,
    deployment_name: DeploymentName,
    desired: Vec<ResourceInstance>,
) -> Result<Plan, PlannerError> {
    let record = store.get_deployment(&deployment_name).await?;
    let (actual, base_version) = match record {
        Some(r) => (r.resources, r.version),
        None => (BTreeMap::new(), 0),
    };

    let changes = diff(registry, &actual, &desired)?;
    let risks = analyze(&actual, &changes)?;
    let waves = order_into_waves(&changes)?;

    let mut summary = PlanSummary::default();
    for change in &changes {
        match change.op {
            ChangeOp::Create => summary.create += 1,
            ChangeOp::Update => summary.update += 1,
            ChangeOp::Delete => summary.delete += 1,
            ChangeOp::Replace => summary.replace += 1,
        }
    }

    Ok(Plan {
        id: Uuid::new_v4(),
        deployment_name,
        created_at: Utc::now(),
        summary,
        waves,
        risks,
        base_version,
    })
}

/// Plan a full teardown of a deployment: every current resource becomes a
/// delete, ordered leaf-first.
pub async fn plan_destruction(
    store: &dyn StateStore,
    registry: &Registry,
    deployment_name: DeploymentName,
) -> Result<Plan, PlannerError> {
    plan(store, registry, deployment_name, Vec::new()).await
}

fn order_into_waves(changes: &[Change]) -> Result<Vec<Wave>, PlannerError> {
    if changes.is_empty() {
        return Ok(Vec::new());
    }

    let changed_ids: HashSet<ResourceId> =
        changes.iter().map(|c| c.resource_id.clone()).collect();
    let by_id: BTreeMap<&ResourceId, &Change> =
        changes.iter().map(|c| (&c.resource_id, c)).collect();

    // Dependents of each resource, restricted to the change set: needed to
    // invert edges for deletes (a delete must wait on deletes of anything
    // that still depends on it within this same plan).
    let mut dependents_in_plan: BTreeMap<ResourceId, HashSet<ResourceId>> = BTreeMap::new();
    for change in changes {
        let Some(instance) = change.after.as_ref().or(change.before.as_ref()) else {
            continue;
        };
        for dep in instance.effective_dependencies() {
            if changed_ids.contains(&dep) {
                dependents_in_plan
                    .entry(dep)
                    .or_default()
                    .insert(change.resource_id.clone());
            }
        }
    }
    let empty = HashSet::new();

    let mut depends_on_storage: BTreeMap<ResourceId, HashSet<ResourceId>> = BTreeMap::new();
    for change in changes {
        let set = match change.op {
            ChangeOp::Create | ChangeOp::Update | ChangeOp::Replace => {
                let instance = change.after.as_ref().expect("create/update/replace carries `after`");
                instance
                    .effective_dependencies()
                    .into_iter()
                    .filter(|d| changed_ids.contains(d))
                    .collect()
            }
            ChangeOp::Delete => dependents_in_plan
                .get(&change.resource_id)
                .cloned()
                .unwrap_or_default(),
        };
        depends_on_storage.insert(change.resource_id.clone(), set);
    }

    let edges = changes.iter().map(|c| DependencyEdge {
        id: &c.resource_id,
        depends_on: depends_on_storage.get(&c.resource_id).unwrap_or(&empty),
    });
    let resolved = opnctl_graph::resolve(edges)?;

    let mut waves = Vec::with_capacity(resolved.waves.len());
    for (index, resource_ids) in resolved.waves.into_iter().enumerate() {
        let mut wave_changes: Vec<Change> = resource_ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
            .collect();
        // Tie-break within a wave: delete before update before create before
        // replace, then lexicographic by resource id.
        wave_changes.sort_by(|a, b| (a.op, &a.resource_id).cmp(&(b.op, &b.resource_id)));

        let estimated_seconds = wave_changes
            .iter()
            .map(|c| op_cost_seconds(c.op))
            .max()
            .unwrap_or(0);
        waves.push(Wave { index, changes: wave_changes, estimated_seconds });
    }

    Ok(waves)
}
