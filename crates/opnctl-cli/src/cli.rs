use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "opnctl", about = "Infrastructure-as-code control plane for OPNsense", version)]
pub struct Cli {
    /// Path to the engine's TOML settings file.
    #[arg(long, env = "OPNCTL_CONFIG", default_value = "opnctl.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Diff desired state against a deployment's current state and print the plan.
    Plan {
        deployment: String,
        /// Path to a JSON file containing the desired resource array.
        resources: PathBuf,
    },

    /// Apply a previously computed plan by id.
    Apply {
        plan_id: uuid::Uuid,
        /// Required to apply a plan carrying a High or Critical risk.
        #[arg(long)]
        auto_approve: bool,
        /// Report the changes that would be made without calling the effector.
        #[arg(long)]
        dry_run: bool,
    },

    /// Plan and apply a full teardown of a deployment.
    Destroy {
        deployment: String,
        /// Bypass the auto-approve gate for high-risk destroys.
        #[arg(long)]
        force: bool,
    },

    /// Show a deployment's current resource state.
    Show { deployment: String },

    /// List registered resource type names.
    ListTypes {
        #[arg(long)]
        category: Option<String>,
    },

    /// Show a resource type's schema.
    DescribeType { type_name: String },

    /// List all known deployments with a summary.
    ListDeployments,

    /// Read every resource's live device state and report drift.
    Refresh { deployment: String },
}
