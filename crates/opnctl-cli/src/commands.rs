use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use opnctl_api::handlers::{into_instance, ResourceInput};
use opnctl_api::Controller;
use opnctl_config::EngineSettings;
use opnctl_domain::{catalog, DeploymentName, TypeName};
use opnctl_effector::{BroadcastEventBus, LocalEffector};
use opnctl_engine::ExecutionEngine;
use opnctl_store::{RedbStore, StateStore};
use uuid::Uuid;

use crate::output;

/// Wire up a [`Controller`] from settings on disk. The effector is always
/// [`LocalEffector`]: resource-specific REST+SSH adapter bodies are out of
/// scope here (see §1), so the CLI drives the engine against the same
/// in-memory simulation the test suite uses. Runs store recovery once
/// before handing the store to the engine, so a prior crash never leaves a
/// lease or a transient-state resource stranded across CLI invocations.
async fn build_controller(config_path: &Path) -> Result<Controller> {
    let settings = EngineSettings::load(config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    let store: Arc<dyn StateStore> = Arc::new(
        RedbStore::open(&PathBuf::from(&settings.store_path))
            .with_context(|| format!("failed to open store at {}", settings.store_path))?,
    );
    store.recover(Utc::now()).await.context("store recovery failed")?;
    let effector = Arc::new(LocalEffector::new());
    let bus = Arc::new(BroadcastEventBus::new(64));
    let engine = Arc::new(ExecutionEngine::new(
        store.clone(),
        effector,
        bus,
        settings.default_max_concurrency,
        "opnctl-cli",
    ));
    let registry = Arc::new(catalog::with_builtin_types());
    Ok(Controller::new(store, engine, registry))
}

pub async fn plan(config_path: PathBuf, deployment: String, resources_path: PathBuf) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let raw = std::fs::read_to_string(&resources_path)
        .with_context(|| format!("failed to read {}", resources_path.display()))?;
    let inputs: Vec<ResourceInput> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {} as a JSON resource array", resources_path.display()))?;
    let resources = inputs
        .into_iter()
        .map(|r| into_instance(&controller.registry, r))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!(e.message))?;

    let plan = controller
        .plan_deployment(DeploymentName::new(deployment), resources)
        .await
        .map_err(|e| anyhow::anyhow!(e.message))?;
    println!("{}", output::render_plan(&plan));
    Ok(())
}

pub async fn apply(config_path: PathBuf, plan_id: Uuid, auto_approve: bool, dry_run: bool) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let result = controller
        .apply_deployment(plan_id, auto_approve, dry_run)
        .await
        .map_err(|e| anyhow::anyhow!(e.message))?;
    if result.dry_run {
        println!("Dry run: would apply {} resource(s).", result.applied.len());
        for resource in &result.applied {
            println!("  {}", resource);
        }
    } else if result.success {
        println!("Applied. {} resource(s) changed.", result.applied.len());
    } else {
        for (resource, message) in &result.failed {
            println!("Apply failed on '{}': {}", resource, message);
        }
        println!("Rollback performed: {}", result.rollback_performed);
        if let Some(rollback_failures) = &result.partial_rollback {
            println!("Rollback was partial; these resources could not be undone:");
            for (resource, message) in rollback_failures {
                println!("  {}: {}", resource, message);
            }
        }
    }
    Ok(())
}

pub async fn destroy(config_path: PathBuf, deployment: String, force: bool) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let result = controller
        .destroy_deployment(DeploymentName::new(deployment), force)
        .await
        .map_err(|e| anyhow::anyhow!(e.message))?;
    println!("Destroyed {} resource(s). Success: {}", result.applied.len(), result.success);
    for (resource, message) in &result.failed {
        println!("  failed: {} ({})", resource, message);
    }
    Ok(())
}

pub async fn show(config_path: PathBuf, deployment: String) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let record = controller
        .get_deployment_state(&DeploymentName::new(deployment))
        .await
        .map_err(|e| anyhow::anyhow!(e.message))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub async fn list_types(config_path: PathBuf, category: Option<String>) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    for type_name in controller.list_resource_types(category.as_deref()) {
        println!("{}", type_name);
    }
    Ok(())
}

pub async fn describe_type(config_path: PathBuf, type_name: String) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let described = controller
        .describe_resource_type(&TypeName::new(type_name))
        .map_err(|e| anyhow::anyhow!(e.message))?;
    println!("{}", serde_json::to_string_pretty(&described)?);
    Ok(())
}

pub async fn list_deployments(config_path: PathBuf) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let summaries = controller.list_deployments().await.map_err(|e| anyhow::anyhow!(e.message))?;
    for s in summaries {
        println!("{}\tversion={}\tresources={}\tupdated_at={}", s.name, s.version, s.resource_count, s.updated_at);
    }
    Ok(())
}

pub async fn refresh(config_path: PathBuf, deployment: String) -> Result<()> {
    let controller = build_controller(&config_path).await?;
    let drift = controller
        .refresh_deployment(&DeploymentName::new(deployment))
        .await
        .map_err(|e| anyhow::anyhow!(e.message))?;
    for (id, drifted) in drift {
        println!("{}\tdrifted={}", id, drifted);
    }
    Ok(())
}
