use std::collections::BTreeSet;

use chrono::Utc;
use opnctl_domain::catalog::with_builtin_types;
use opnctl_domain::{DeploymentName, PropertyMap, ResourceId, TypeName};
use opnctl_planner::{plan, ChangeOp, RiskSeverity};
use opnctl_store::{DeploymentRecord, MemoryStore, StateStore};
use serde_json::Value;

fn vlan_props(tag: i64, description: &str) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("device".into(), Value::String("igc3".into()));
    props.insert("tag".into(), Value::Number(tag.into()));
    props.insert("description".into(), Value::String(description.into()));
    props
}

#[tokio::test]
async fn s1_create_vlan_from_empty() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let desired = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();

    let result = plan(&store, &registry, deployment, vec![desired]).await.unwrap();
    assert_eq!(result.waves.len(), 1);
    assert_eq!(result.total_changes(), 1);
    assert_eq!(result.waves[0].changes[0].op, ChangeOp::Create);
    assert_eq!(result.summary.create, 1);
}

#[tokio::test]
async fn s2_no_op_when_desired_matches_actual() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let instance = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();

    let mut record = DeploymentRecord::new(deployment.clone(), Utc::now());
    record.resources.insert(instance.id.clone(), instance.clone());
    store.put_deployment(record, None).await.unwrap();

    let result = plan(&store, &registry, deployment, vec![instance]).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(result.waves.len(), 0);
}

#[tokio::test]
async fn s3_in_place_update_on_non_replace_field() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let before = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();
    let mut record = DeploymentRecord::new(deployment.clone(), Utc::now());
    record.resources.insert(before.id.clone(), before.clone());
    store.put_deployment(record, None).await.unwrap();

    let after = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz-prod"),
            BTreeSet::new(),
        )
        .unwrap();

    let result = plan(&store, &registry, deployment, vec![after]).await.unwrap();
    assert_eq!(result.total_changes(), 1);
    assert_eq!(result.waves[0].changes[0].op, ChangeOp::Update);
    assert_eq!(result.summary.update, 1);
}

#[tokio::test]
async fn s4_replace_on_tag_change() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let before = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();
    let mut record = DeploymentRecord::new(deployment.clone(), Utc::now());
    record.resources.insert(before.id.clone(), before.clone());
    store.put_deployment(record, None).await.unwrap();

    let after = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(130, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();

    let result = plan(&store, &registry, deployment, vec![after]).await.unwrap();
    assert_eq!(result.total_changes(), 1);
    assert_eq!(result.waves[0].changes[0].op, ChangeOp::Replace);
    assert_eq!(result.summary.replace, 1);
}

#[tokio::test]
async fn s5_dependent_resource_scheduled_into_its_own_wave() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let vlan = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();

    let mut rule_props = PropertyMap::new();
    rule_props.insert("interface".into(), Value::String("igc3_vlan120".into()));
    rule_props.insert("action".into(), Value::String("pass".into()));
    rule_props.insert("protocol".into(), Value::String("tcp".into()));
    rule_props.insert("source".into(), Value::String("10.0.0.0/24".into()));
    rule_props.insert("destination".into(), Value::String("any".into()));
    rule_props.insert("port".into(), Value::Number(443.into()));
    let mut deps = BTreeSet::new();
    deps.insert(ResourceId::new("v"));
    let rule = registry
        .create(TypeName::new("firewall.rule"), ResourceId::new("r"), "r", rule_props, deps)
        .unwrap();

    let result = plan(&store, &registry, deployment, vec![vlan, rule]).await.unwrap();
    assert_eq!(result.waves.len(), 2);
    assert_eq!(result.waves[0].changes[0].resource_id, ResourceId::new("v"));
    assert_eq!(result.waves[1].changes[0].resource_id, ResourceId::new("r"));
}

#[tokio::test]
async fn deleting_a_resource_still_referenced_elsewhere_is_rejected() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let vlan = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();

    let mut rule_props = PropertyMap::new();
    rule_props.insert("interface".into(), Value::String("igc3_vlan120".into()));
    rule_props.insert("action".into(), Value::String("pass".into()));
    rule_props.insert("protocol".into(), Value::String("tcp".into()));
    rule_props.insert("source".into(), Value::String("10.0.0.0/24".into()));
    rule_props.insert("destination".into(), Value::String("any".into()));
    rule_props.insert("port".into(), Value::Number(443.into()));
    let mut deps = BTreeSet::new();
    deps.insert(ResourceId::new("v"));
    let rule = registry
        .create(TypeName::new("firewall.rule"), ResourceId::new("r"), "r", rule_props, deps)
        .unwrap();

    let mut record = DeploymentRecord::new(deployment.clone(), Utc::now());
    record.resources.insert(vlan.id.clone(), vlan.clone());
    record.resources.insert(rule.id.clone(), rule.clone());
    store.put_deployment(record, None).await.unwrap();

    // Desired drops the VLAN but keeps the rule that depends on it.
    let err = plan(&store, &registry, deployment, vec![rule]).await.unwrap_err();
    assert!(matches!(err, opnctl_planner::PlannerError::CriticalDelete { .. }));
}

#[tokio::test]
async fn any_to_any_pass_rule_is_flagged_medium_risk() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let mut rule_props = PropertyMap::new();
    rule_props.insert("interface".into(), Value::String("wan".into()));
    rule_props.insert("action".into(), Value::String("pass".into()));
    rule_props.insert("protocol".into(), Value::String("any".into()));
    rule_props.insert("source".into(), Value::String("any".into()));
    rule_props.insert("destination".into(), Value::String("any".into()));
    let rule = registry
        .create(
            TypeName::new("firewall.rule"),
            ResourceId::new("r"),
            "wide-open",
            rule_props,
            BTreeSet::new(),
        )
        .unwrap();

    let result = plan(&store, &registry, deployment, vec![rule]).await.unwrap();
    assert_eq!(result.risks.len(), 1);
    assert_eq!(result.risks[0].severity, RiskSeverity::Medium);
}

#[tokio::test]
async fn plan_determinism_same_inputs_yield_identical_waves() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let vlan = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("v"),
            "v",
            vlan_props(120, "dmz"),
            BTreeSet::new(),
        )
        .unwrap();
    let vlan2 = registry
        .create(
            TypeName::new("network.vlan"),
            ResourceId::new("w"),
            "w",
            vlan_props(121, "guest"),
            BTreeSet::new(),
        )
        .unwrap();

    let first = plan(&store, &registry, deployment.clone(), vec![vlan.clone(), vlan2.clone()])
        .await
        .unwrap();
    let second = plan(&store, &registry, deployment, vec![vlan, vlan2]).await.unwrap();

    let ids = |p: &opnctl_planner::Plan| -> Vec<ResourceId> {
        p.waves.iter().flat_map(|w| w.changes.iter().map(|c| c.resource_id.clone())).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.waves.len(), second.waves.len());
}

fn nat_props(port: i64) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("interface".into(), Value::String("wan".into()));
    props.insert("protocol".into(), Value::String("tcp".into()));
    props.insert("external_port".into(), Value::Number(port.into()));
    props.insert("internal_ip".into(), Value::String("10.0.0.5".into()));
    props.insert("internal_port".into(), Value::Number(port.into()));
    props
}

fn wave_of(plan: &opnctl_planner::Plan, id: &ResourceId) -> usize {
    plan.waves
        .iter()
        .find(|w| w.changes.iter().any(|c| &c.resource_id == id))
        .map(|w| w.index)
        .expect("resource id present in some wave")
}

/// Property 2: for a three-level create chain `v -> r -> n`, each resource's
/// wave index strictly increases along the dependency edge.
#[tokio::test]
async fn wave_soundness_holds_across_a_three_level_create_chain() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let v = registry
        .create(TypeName::new("network.vlan"), ResourceId::new("v"), "v", vlan_props(120, "dmz"), BTreeSet::new())
        .unwrap();

    let mut rule_props = PropertyMap::new();
    rule_props.insert("interface".into(), Value::String("igc3_vlan120".into()));
    rule_props.insert("action".into(), Value::String("pass".into()));
    rule_props.insert("protocol".into(), Value::String("tcp".into()));
    rule_props.insert("source".into(), Value::String("10.0.0.0/24".into()));
    rule_props.insert("destination".into(), Value::String("any".into()));
    rule_props.insert("port".into(), Value::Number(443.into()));
    let mut r_deps = BTreeSet::new();
    r_deps.insert(ResourceId::new("v"));
    let r = registry
        .create(TypeName::new("firewall.rule"), ResourceId::new("r"), "r", rule_props, r_deps)
        .unwrap();

    let mut n_deps = BTreeSet::new();
    n_deps.insert(ResourceId::new("r"));
    let n = registry
        .create(TypeName::new("firewall.nat"), ResourceId::new("n"), "n", nat_props(443), n_deps)
        .unwrap();

    let result = plan(&store, &registry, deployment, vec![v, r, n]).await.unwrap();

    let wave_v = wave_of(&result, &ResourceId::new("v"));
    let wave_r = wave_of(&result, &ResourceId::new("r"));
    let wave_n = wave_of(&result, &ResourceId::new("n"));
    assert!(wave_v < wave_r, "v must be created before its dependent r");
    assert!(wave_r < wave_n, "r must be created before its dependent n");
}

/// Property 2's delete-direction half: deleting the same three-level chain
/// reverses the ordering, since each dependent must be torn down before the
/// resource it depends on.
#[tokio::test]
async fn wave_soundness_holds_across_a_three_level_delete_chain() {
    let registry = with_builtin_types();
    let store = MemoryStore::new();
    let deployment = DeploymentName::new("lan");

    let v = registry
        .create(TypeName::new("network.vlan"), ResourceId::new("v"), "v", vlan_props(120, "dmz"), BTreeSet::new())
        .unwrap();

    let mut rule_props = PropertyMap::new();
    rule_props.insert("interface".into(), Value::String("igc3_vlan120".into()));
    rule_props.insert("action".into(), Value::String("pass".into()));
    rule_props.insert("protocol".into(), Value::String("tcp".into()));
    rule_props.insert("source".into(), Value::String("10.0.0.0/24".into()));
    rule_props.insert("destination".into(), Value::String("any".into()));
    rule_props.insert("port".into(), Value::Number(443.into()));
    let mut r_deps = BTreeSet::new();
    r_deps.insert(ResourceId::new("v"));
    let r = registry
        .create(TypeName::new("firewall.rule"), ResourceId::new("r"), "r", rule_props, r_deps)
        .unwrap();

    let mut n_deps = BTreeSet::new();
    n_deps.insert(ResourceId::new("r"));
    let n = registry
        .create(TypeName::new("firewall.nat"), ResourceId::new("n"), "n", nat_props(443), n_deps)
        .unwrap();

    let mut record = DeploymentRecord::new(deployment.clone(), Utc::now());
    record.resources.insert(v.id.clone(), v);
    record.resources.insert(r.id.clone(), r);
    record.resources.insert(n.id.clone(), n);
    store.put_deployment(record, None).await.unwrap();

    // Desired is empty: every resource becomes a delete.
    let result = plan(&store, &registry, deployment, Vec::new()).await.unwrap();

    let wave_v = wave_of(&result, &ResourceId::new("v"));
    let wave_r = wave_of(&result, &ResourceId::new("r"));
    let wave_n = wave_of(&result, &ResourceId::new("n"));
    assert!(wave_n < wave_r, "n must be deleted before the r it depends on");
    assert!(wave_r < wave_v, "r must be deleted before the v it depends on");
}
