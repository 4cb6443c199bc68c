use std::sync::Arc;

use chrono::{DateTime, Utc};
use opnctl_domain::{DeploymentName, Registry, ResourceInstance, TypeName};
use opnctl_engine::{ExecuteOptions, ExecutionEngine};
use opnctl_planner::Plan;
use opnctl_store::{DeploymentRecord, PlanRecord, PlanStatus, StateStore};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;

/// Summary row for `listDeployments`.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentSummary {
    pub name: DeploymentName,
    pub version: u64,
    pub resource_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// The seven caller operations of spec.md §6, implemented once and exposed
/// by both `opnctl-api`'s HTTP router and `opnctl-cli`'s subcommands.
///
/// This is the facade mentioned by the ambient caller-interface design: it
/// holds no business logic of its own beyond wiring the four core crates
/// together and translating their errors into [`ApiError`].
#[derive(Clone)]
pub struct Controller {
    pub store: Arc<dyn StateStore>,
    pub engine: Arc<ExecutionEngine>,
    pub registry: Arc<Registry>,
}

impl Controller {
    pub fn new(store: Arc<dyn StateStore>, engine: Arc<ExecutionEngine>, registry: Arc<Registry>) -> Self {
        Controller { store, engine, registry }
    }

    pub async fn plan_deployment(
        &self,
        name: DeploymentName,
        resources: Vec<ResourceInstance>,
    ) -> Result<Plan, ApiError> {
        let plan = opnctl_planner::plan(self.store.as_ref(), &self.registry, name.clone(), resources).await?;
        self.store
            .save_plan(&PlanRecord {
                id: plan.id,
                deployment_name: name,
                base_version: plan.base_version,
                status: PlanStatus::Pending,
                created_at: plan.created_at,
                body: serde_json::to_value(&plan).map_err(|e| ApiError::internal(e.to_string()))?,
            })
            .await?;
        Ok(plan)
    }

    /// `autoApprove` is required to apply a plan carrying a High or Critical
    /// risk annotation (Medium risks are informational only). Critical
    /// risks never reach a persisted plan in the first place — they abort
    /// planning — so this only ever gates High-risk plans in practice. The
    /// gate itself lives in the engine (`ExecuteOptions::force`); this just
    /// translates `autoApprove` into it.
    pub async fn apply_deployment(
        &self,
        plan_id: Uuid,
        auto_approve: bool,
        dry_run: bool,
    ) -> Result<opnctl_engine::ExecutionResult, ApiError> {
        let record = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("plan '{plan_id}' not found")))?;
        let plan: Plan = serde_json::from_value(record.body.clone())
            .map_err(|e| ApiError::internal(format!("corrupt plan body: {e}")))?;

        let options = ExecuteOptions::apply(auto_approve).with_dry_run(dry_run);
        self.execute_plan(record, &plan, options).await
    }

    /// Plan and immediately apply a full teardown of `name`. `force` bypasses
    /// the `autoApprove` gate the same way it would for a regular apply.
    /// Unlike a regular apply, a destroy keeps tearing down the rest of the
    /// plan if one delete fails, rather than recreating everything that
    /// already succeeded — `ExecuteOptions::destroy` carries that default.
    pub async fn destroy_deployment(
        &self,
        name: DeploymentName,
        force: bool,
    ) -> Result<opnctl_engine::ExecutionResult, ApiError> {
        let plan = opnctl_planner::plan_destruction(self.store.as_ref(), &self.registry, name.clone()).await?;
        let record = PlanRecord {
            id: plan.id,
            deployment_name: name,
            base_version: plan.base_version,
            status: PlanStatus::Pending,
            created_at: plan.created_at,
            body: serde_json::to_value(&plan).map_err(|e| ApiError::internal(e.to_string()))?,
        };
        self.store.save_plan(&record).await?;

        self.execute_plan(record, &plan, ExecuteOptions::destroy(force)).await
    }

    async fn execute_plan(
        &self,
        record: PlanRecord,
        plan: &Plan,
        options: ExecuteOptions,
    ) -> Result<opnctl_engine::ExecutionResult, ApiError> {
        let dry_run = options.dry_run;
        let result = self.engine.execute(plan, &options).await?;

        // A dry run never touches the deployment's resources; leave the
        // plan's status as-is rather than marking it applied.
        if !dry_run {
            let status = if result.success { PlanStatus::Applied } else { PlanStatus::Aborted };
            self.store.save_plan(&PlanRecord { status, ..record }).await?;
        }

        Ok(result)
    }

    pub fn list_resource_types(&self, category: Option<&str>) -> Vec<TypeName> {
        self.registry.list_types(category)
    }

    pub fn describe_resource_type(&self, type_name: &TypeName) -> Result<Value, ApiError> {
        let def = self.registry.type_def(type_name)?;
        let fields: Vec<Value> = def
            .fields
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "type": field_type_name(&f.field_type),
                    "required": f.required,
                    "range": f.range,
                })
            })
            .collect();
        Ok(json!({
            "type": def.name,
            "fields": fields,
            "idempotency_key": def.idempotency_key,
            "replace_on_change": def.replace_on_change,
        }))
    }

    pub async fn get_deployment_state(&self, name: &DeploymentName) -> Result<DeploymentRecord, ApiError> {
        self.store
            .get_deployment(name)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("deployment '{name}' not found")))
    }

    pub async fn list_deployments(&self) -> Result<Vec<DeploymentSummary>, ApiError> {
        let names = self.store.list_deployments().await?;
        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            if let Some(record) = self.store.get_deployment(&name).await? {
                summaries.push(DeploymentSummary {
                    name: record.name,
                    version: record.version,
                    resource_count: record.resources.len(),
                    updated_at: record.updated_at,
                });
            }
        }
        Ok(summaries)
    }

    /// Explicit drift refresh (spec.md's third Open Question): reads every
    /// resource's current device state and reports which ones have drifted.
    /// Not wired to a schedule or background task anywhere in this crate.
    pub async fn refresh_deployment(
        &self,
        name: &DeploymentName,
    ) -> Result<Vec<(opnctl_domain::ResourceId, bool)>, ApiError> {
        Ok(self.engine.refresh_deployment(name).await?)
    }
}

fn field_type_name(ft: &opnctl_domain::FieldType) -> Value {
    match ft {
        opnctl_domain::FieldType::String => json!("string"),
        opnctl_domain::FieldType::Int => json!("int"),
        opnctl_domain::FieldType::Bool => json!("bool"),
        opnctl_domain::FieldType::Enum(values) => json!({ "enum": values }),
        opnctl_domain::FieldType::StringList => json!("string_list"),
    }
}
