use std::collections::{BTreeMap, BTreeSet};

use opnctl_domain::{ResourceId, ResourceInstance, TypeName};
use serde_json::Value;

use crate::error::PlannerError;
use crate::model::{Change, ChangeOp, Risk, RiskSeverity};

/// Analyze a change set for the four risk categories. Returns the
/// non-critical risks; escalates a delete-referenced-elsewhere finding to a
/// [`PlannerError::CriticalDelete`] instead of returning it, since that
/// condition aborts plan creation rather than merely annotating it.
pub fn analyze(
    actual: &BTreeMap<ResourceId, ResourceInstance>,
    changes: &[Change],
) -> Result<Vec<Risk>, PlannerError> {
    let mut risks = Vec::new();

    let deleting: BTreeSet<&ResourceId> = changes
        .iter()
        .filter(|c| c.op == ChangeOp::Delete)
        .map(|c| &c.resource_id)
        .collect();
    let replacing: BTreeSet<&ResourceId> = changes
        .iter()
        .filter(|c| c.op == ChangeOp::Replace)
        .map(|c| &c.resource_id)
        .collect();
    let creating_types: BTreeSet<&TypeName> = changes
        .iter()
        .filter(|c| c.op == ChangeOp::Create || c.op == ChangeOp::Replace)
        .filter_map(|c| c.after.as_ref().map(|a| &a.type_name))
        .collect();

    // Anyone still depending on a resource being deleted, who is themselves
    // staying put, blocks the plan outright.
    for (id, instance) in actual {
        if deleting.contains(id) {
            continue;
        }
        for dep in instance.effective_dependencies() {
            if deleting.contains(&dep) {
                return Err(PlannerError::CriticalDelete { resource: dep, dependent: id.clone() });
            }
        }
    }

    // Replacing a resource that other live resources depend on is risky:
    // the canonical key may change out from under them mid-wave.
    for resource_id in &replacing {
        let dependents: Vec<&ResourceId> = actual
            .iter()
            .filter(|(id, instance)| {
                id != resource_id && instance.effective_dependencies().contains(*resource_id)
            })
            .map(|(id, _)| id)
            .collect();
        if !dependents.is_empty() {
            risks.push(Risk {
                resource_id: (*resource_id).clone(),
                severity: RiskSeverity::High,
                message: format!(
                    "replacing '{}' while {} dependent resource(s) reference it",
                    resource_id,
                    dependents.len()
                ),
            });
        }
    }

    for change in changes {
        if let Some(after) = &change.after {
            if is_any_to_any_pass(after) {
                risks.push(Risk {
                    resource_id: change.resource_id.clone(),
                    severity: RiskSeverity::Medium,
                    message: "firewall rule passes any protocol from any source to any destination"
                        .to_string(),
                });
            }
        }
    }

    for change in changes {
        if change.op != ChangeOp::Delete {
            continue;
        }
        if let Some(before) = &change.before {
            if !creating_types.contains(&before.type_name) {
                risks.push(Risk {
                    resource_id: change.resource_id.clone(),
                    severity: RiskSeverity::Medium,
                    message: format!(
                        "deleting '{}' with no replacement of type '{}' declared in this plan",
                        change.resource_id, before.type_name
                    ),
                });
            }
        }
    }

    Ok(risks)
}

fn is_any_to_any_pass(instance: &ResourceInstance) -> bool {
    if instance.type_name.as_str() != "firewall.rule" {
        return false;
    }
    let is_any = |key: &str| {
        matches!(
            instance.properties.get(key),
            Some(Value::String(s)) if s == "any"
        )
    };
    let is_pass = matches!(
        instance.properties.get("action"),
        Some(Value::String(s)) if s == "pass"
    );
    is_pass && is_any("protocol") && is_any("source") && is_any("destination")
}
