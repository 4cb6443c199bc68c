use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use opnctl_domain::{ResourceId, ResourceInstance};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::effector::{Effector, EffectorResult, ObservedResource};
use crate::error::EffectorError;

/// A stub effector that simulates an OPNsense device locally.
///
/// Produces synthetic canonical keys and never touches a real device.
/// Suitable for tests and for driving the engine without network access.
#[derive(Debug, Default, Clone)]
pub struct LocalEffector {
    applied: Arc<RwLock<BTreeMap<ResourceId, ResourceInstance>>>,
}

impl LocalEffector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_applied(&self, id: &ResourceId) -> bool {
        self.applied.read().await.contains_key(id)
    }
}

/// Synthesize the output fields a real OPNsense device would hand back on
/// create. Only `network.vlan` produces one today: the interface key other
/// resources reference via output templating (`${v.device_key}`).
fn synthetic_outputs(instance: &ResourceInstance) -> BTreeMap<String, serde_json::Value> {
    let mut outputs = BTreeMap::new();
    if instance.type_name.as_str() == "network.vlan" {
        if let (Some(device), Some(tag)) = (
            instance.properties.get("device").and_then(|v| v.as_str()),
            instance.properties.get("tag").and_then(|v| v.as_i64()),
        ) {
            outputs.insert("device_key".to_string(), json!(format!("{device}_vlan{tag}")));
        }
    }
    outputs
}

#[async_trait]
impl Effector for LocalEffector {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn create(&self, instance: &ResourceInstance) -> Result<EffectorResult, EffectorError> {
        debug!(resource = %instance.id, type_name = %instance.type_name, "LocalEffector: create");
        let canonical_key = json!({
            "effector": "local",
            "type": instance.type_name.as_str(),
            "id": instance.id.as_str(),
        });
        let outputs = synthetic_outputs(instance);
        let mut stored = instance.clone();
        stored.outputs = outputs.clone();
        self.applied.write().await.insert(instance.id.clone(), stored);
        Ok(EffectorResult { canonical_key, outputs })
    }

    async fn update(
        &self,
        instance: &ResourceInstance,
        canonical_key: &serde_json::Value,
    ) -> Result<EffectorResult, EffectorError> {
        debug!(resource = %instance.id, "LocalEffector: update");
        self.applied
            .write()
            .await
            .insert(instance.id.clone(), instance.clone());
        Ok(EffectorResult { canonical_key: canonical_key.clone(), outputs: BTreeMap::new() })
    }

    async fn delete(
        &self,
        instance: &ResourceInstance,
        _canonical_key: &serde_json::Value,
    ) -> Result<(), EffectorError> {
        debug!(resource = %instance.id, "LocalEffector: delete");
        self.applied.write().await.remove(&instance.id);
        Ok(())
    }

    async fn read(
        &self,
        instance: &ResourceInstance,
        _canonical_key: &serde_json::Value,
    ) -> Result<ObservedResource, EffectorError> {
        let guard = self.applied.read().await;
        match guard.get(&instance.id) {
            Some(applied) => Ok(ObservedResource {
                exists: true,
                properties: applied.properties.clone(),
                outputs: applied
                    .outputs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            }),
            None => Ok(ObservedResource {
                exists: false,
                properties: Default::default(),
                outputs: Default::default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opnctl_domain::TypeName;
    use std::collections::BTreeSet;

    fn instance(id: &str) -> ResourceInstance {
        ResourceInstance::new(
            ResourceId::new(id),
            TypeName::new("network.vlan"),
            "dmz",
            Default::default(),
            BTreeSet::new(),
        )
    }

    #[tokio::test]
    async fn create_then_read_reports_existence() {
        let effector = LocalEffector::new();
        let instance = instance("v1");
        effector.create(&instance).await.unwrap();
        let observed = effector.read(&instance, &json!({})).await.unwrap();
        assert!(observed.exists);
    }

    #[tokio::test]
    async fn delete_then_read_reports_absence() {
        let effector = LocalEffector::new();
        let instance = instance("v1");
        effector.create(&instance).await.unwrap();
        effector.delete(&instance, &json!({})).await.unwrap();
        let observed = effector.read(&instance, &json!({})).await.unwrap();
        assert!(!observed.exists);
    }
}
