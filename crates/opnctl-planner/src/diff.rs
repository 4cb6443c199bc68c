use std::collections::BTreeMap;

use opnctl_domain::{Registry, ResourceId, ResourceInstance};

use crate::error::PlannerError;
use crate::model::{Change, ChangeOp};

/// Diff desired state against actual state. A resource present in both with
/// no changed fields is omitted entirely; it generates no [`Change`] and
/// does not appear in any wave.
pub fn diff(
    registry: &Registry,
    actual: &BTreeMap<ResourceId, ResourceInstance>,
    desired: &[ResourceInstance],
) -> Result<Vec<Change>, PlannerError> {
    let mut changes = Vec::new();
    let desired_ids: std::collections::BTreeSet<ResourceId> =
        desired.iter().map(|d| d.id.clone()).collect();

    for after in desired {
        match actual.get(&after.id) {
            None => changes.push(Change {
                op: ChangeOp::Create,
                resource_id: after.id.clone(),
                before: None,
                after: Some(after.clone()),
                reason: "not present in current state".to_string(),
            }),
            Some(before) if before.type_name != after.type_name => {
                changes.push(Change {
                    op: ChangeOp::Replace,
                    resource_id: after.id.clone(),
                    before: Some(before.clone()),
                    after: Some(after.clone()),
                    reason: format!(
                        "type changed from '{}' to '{}'",
                        before.type_name, after.type_name
                    ),
                });
            }
            Some(before) => {
                let property_diff =
                    registry.diff_properties(&after.type_name, &before.properties, &after.properties)?;
                if property_diff.replace_required {
                    changes.push(Change {
                        op: ChangeOp::Replace,
                        resource_id: after.id.clone(),
                        before: Some(before.clone()),
                        after: Some(after.clone()),
                        reason: format!(
                            "field(s) {:?} require replacement",
                            property_diff.changed
                        ),
                    });
                } else if !property_diff.changed.is_empty()
                    || before.dependencies != after.dependencies
                {
                    changes.push(Change {
                        op: ChangeOp::Update,
                        resource_id: after.id.clone(),
                        before: Some(before.clone()),
                        after: Some(after.clone()),
                        reason: format!("field(s) {:?} changed", property_diff.changed),
                    });
                }
                // Identical: no Change emitted.
            }
        }
    }

    for (id, before) in actual {
        if !desired_ids.contains(id) {
            changes.push(Change {
                op: ChangeOp::Delete,
                resource_id: id.clone(),
                before: Some(before.clone()),
                after: None,
                reason: "no longer present in desired state".to_string(),
            });
        }
    }

    Ok(changes)
}
