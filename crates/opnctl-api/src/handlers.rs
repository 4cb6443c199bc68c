use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use opnctl_domain::{DeploymentName, PropertyMap, ResourceId, ResourceInstance, TypeName};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Caller-supplied desired resource, before schema normalization and
/// validation (both performed by [`opnctl_domain::Registry::create`]).
#[derive(Debug, Deserialize)]
pub struct ResourceInput {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

pub fn into_instance(registry: &opnctl_domain::Registry, input: ResourceInput) -> Result<ResourceInstance, ApiError> {
    let deps: BTreeSet<ResourceId> = input.dependencies.into_iter().map(ResourceId::new).collect();
    Ok(registry.create(
        TypeName::new(input.type_name),
        ResourceId::new(input.id),
        input.name,
        input.properties,
        deps,
    )?)
}

// ── planDeployment ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlanDeploymentBody {
    pub resources: Vec<ResourceInput>,
}

pub async fn plan_deployment(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<PlanDeploymentBody>,
) -> Result<Json<Value>, ApiError> {
    let resources = body
        .resources
        .into_iter()
        .map(|r| into_instance(&state.controller.registry, r))
        .collect::<Result<Vec<_>, _>>()?;
    let plan = state.controller.plan_deployment(DeploymentName::new(name), resources).await?;
    Ok(Json(json!(plan)))
}

// ── applyDeployment ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ApplyDeploymentBody {
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn apply_deployment(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
    Query(body): Query<ApplyDeploymentBody>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .controller
        .apply_deployment(plan_id, body.auto_approve, body.dry_run)
        .await?;
    Ok(Json(json!(result)))
}

// ── destroyDeployment ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct DestroyDeploymentBody {
    #[serde(default)]
    pub force: bool,
}

pub async fn destroy_deployment(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(body): Query<DestroyDeploymentBody>,
) -> Result<Json<Value>, ApiError> {
    let result = state.controller.destroy_deployment(DeploymentName::new(name), body.force).await?;
    Ok(Json(json!(result)))
}

// ── listResourceTypes ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListTypesQuery {
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn list_resource_types(
    State(state): State<AppState>,
    Query(q): Query<ListTypesQuery>,
) -> Json<Value> {
    let types = state.controller.list_resource_types(q.category.as_deref());
    Json(json!(types))
}

// ── describeResourceType ─────────────────────────────────────────────────────

pub async fn describe_resource_type(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let described = state.controller.describe_resource_type(&TypeName::new(type_name))?;
    Ok(Json(described))
}

// ── getDeploymentState ───────────────────────────────────────────────────────

pub async fn get_deployment_state(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = state.controller.get_deployment_state(&DeploymentName::new(name)).await?;
    Ok(Json(json!(record)))
}

// ── listDeployments ──────────────────────────────────────────────────────────

pub async fn list_deployments(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let summaries = state.controller.list_deployments().await?;
    Ok(Json(json!(summaries)))
}

// ── refreshDeployment (explicit drift check; not in spec.md's table but not excluded either) ──

pub async fn refresh_deployment(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let drift = state.controller.refresh_deployment(&DeploymentName::new(name)).await?;
    let rows: Vec<Value> = drift
        .into_iter()
        .map(|(id, drifted)| json!({ "resource_id": id, "drifted": drifted }))
        .collect();
    Ok(Json(json!(rows)))
}
