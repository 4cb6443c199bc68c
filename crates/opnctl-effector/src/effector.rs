use std::collections::BTreeMap;

use async_trait::async_trait;
use opnctl_domain::{PropertyMap, ResourceInstance};
use serde_json::Value;

use crate::error::EffectorError;

/// Result of a successful create or update call.
#[derive(Debug, Clone)]
pub struct EffectorResult {
    /// The canonical key the device uses to address this resource from now on
    /// (e.g. OPNsense's internal rule UUID).
    pub canonical_key: Value,
    /// Key/value outputs the resource produced (e.g. an assigned interface name).
    pub outputs: BTreeMap<String, Value>,
}

/// A point-in-time read of a resource's actual state on the device.
#[derive(Debug, Clone)]
pub struct ObservedResource {
    pub exists: bool,
    pub properties: PropertyMap,
    pub outputs: BTreeMap<String, Value>,
}

/// The boundary between the engine and the OPNsense device (REST+SSH).
///
/// Resource-specific call bodies are intentionally opaque here: this trait
/// is the full contract the Planner and Engine rely on, and every concrete
/// per-type adapter (VLAN, firewall rule, NAT, ...) is just another
/// implementation detail behind it.
#[async_trait]
pub trait Effector: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn create(&self, instance: &ResourceInstance) -> Result<EffectorResult, EffectorError>;

    async fn update(
        &self,
        instance: &ResourceInstance,
        canonical_key: &Value,
    ) -> Result<EffectorResult, EffectorError>;

    async fn delete(&self, instance: &ResourceInstance, canonical_key: &Value) -> Result<(), EffectorError>;

    /// Read current device state for conflict detection and explicit refresh.
    /// Never mutates device state.
    async fn read(
        &self,
        instance: &ResourceInstance,
        canonical_key: &Value,
    ) -> Result<ObservedResource, EffectorError>;
}
