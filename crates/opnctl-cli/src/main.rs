mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Plan { deployment, resources } => commands::plan(cli.config, deployment, resources).await,
        Command::Apply { plan_id, auto_approve, dry_run } => {
            commands::apply(cli.config, plan_id, auto_approve, dry_run).await
        }
        Command::Destroy { deployment, force } => commands::destroy(cli.config, deployment, force).await,
        Command::Show { deployment } => commands::show(cli.config, deployment).await,
        Command::ListTypes { category } => commands::list_types(cli.config, category).await,
        Command::DescribeType { type_name } => commands::describe_type(cli.config, type_name).await,
        Command::ListDeployments => commands::list_deployments(cli.config).await,
        Command::Refresh { deployment } => commands::refresh(cli.config, deployment).await,
    }
}
