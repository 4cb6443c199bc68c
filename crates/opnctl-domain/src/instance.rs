use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ResourceId, TypeName};

/// An open property bag. Keys are field names; values are normalized
/// `serde_json::Value`s after [`crate::registry::Registry::create`] has run.
pub type PropertyMap = BTreeMap<String, Value>;

/// Lifecycle state of a [`ResourceInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Pending,
    Creating,
    Created,
    Updating,
    Updated,
    Deleting,
    Deleted,
    Failed,
}

impl ResourceState {
    /// `true` for `*-ing` states that must never survive a store crash.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResourceState::Creating | ResourceState::Updating | ResourceState::Deleting
        )
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceState::Pending => "pending",
            ResourceState::Creating => "creating",
            ResourceState::Created => "created",
            ResourceState::Updating => "updating",
            ResourceState::Updated => "updated",
            ResourceState::Deleting => "deleting",
            ResourceState::Deleted => "deleted",
            ResourceState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A typed resource instance within a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: ResourceId,
    #[serde(rename = "type")]
    pub type_name: TypeName,
    pub name: String,
    pub properties: PropertyMap,
    pub dependencies: BTreeSet<ResourceId>,
    pub state: ResourceState,
    /// Effector-returned fields; the only legitimate source of cross-resource
    /// references. Written exactly once per successful create.
    pub outputs: BTreeMap<String, Value>,
    /// The canonical key the effector uses to address this resource for
    /// subsequent update/delete/read calls. `None` until first successfully
    /// created.
    pub canonical_key: Option<Value>,
}

impl ResourceInstance {
    pub fn new(
        id: ResourceId,
        type_name: TypeName,
        name: impl Into<String>,
        properties: PropertyMap,
        dependencies: BTreeSet<ResourceId>,
    ) -> Self {
        ResourceInstance {
            id,
            type_name,
            name: name.into(),
            properties,
            dependencies,
            state: ResourceState::Pending,
            outputs: BTreeMap::new(),
            canonical_key: None,
        }
    }

    /// `dependencies` plus every resource id referenced via output
    /// templating in `properties`. This is the full edge set the planner
    /// and risk analysis order and gate against.
    pub fn effective_dependencies(&self) -> BTreeSet<ResourceId> {
        let mut deps = self.dependencies.clone();
        deps.extend(crate::template::referenced_resource_ids(&self.properties));
        deps
    }
}
