//! project-sync - inspect and manage workspace projects through the agent.
//!
//! # Usage
//!
//! ```bash
//! # List the projects of every configured workspace, refreshed from the agent
//! project-sync list --refresh
//!
//! # Show one project
//! project-sync details workspace42 /console
//!
//! # Check a project against a type
//! project-sync estimate workspace42 /console maven
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use project_sync::bus::BroadcastEventBus;
use project_sync::config::SyncConfig;
use project_sync::http::HttpProjectService;
use project_sync::logging::init_logging;
use project_sync::registry::StaticWorkspaceRegistry;
use project_sync::{ProjectSynchronizer, SyncOptions, WorkspaceId};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "project-sync")]
#[command(about = "Keep workspace projects in sync with the workspace agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PROJECT_SYNC_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `project_sync=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Commands {
    /// List projects
    List {
        /// Only this workspace
        #[arg(short, long)]
        workspace: Option<String>,

        /// Refresh listings from the agent before printing
        #[arg(short, long)]
        refresh: bool,
    },

    /// Show the full record of a project
    Details { workspace: String, path: String },

    /// Check whether a project matches a project type
    Estimate {
        workspace: String,
        path: String,
        project_type: String,
    },

    /// Suggest project types for a project
    Resolve { workspace: String, path: String },

    /// Rename a project
    Rename {
        workspace: String,
        path: String,
        new_name: String,
    },

    /// Delete a project
    Remove { workspace: String, path: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

async fn load_config(path: Option<PathBuf>) -> Result<SyncConfig> {
    let Some(path) = path else {
        return Ok(SyncConfig::load().await?);
    };
    let mut config = SyncConfig::load_from_path(&path).await?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config)
        .await
        .context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    let service = Arc::new(HttpProjectService::with_config(&config.agent)?);
    let bus = Arc::new(BroadcastEventBus::new(config.events.channel_capacity));
    let synchronizer =
        ProjectSynchronizer::with_options(service, bus, SyncOptions::from_config(&config));

    let registry = StaticWorkspaceRegistry::new(config.workspaces.clone());
    let _follower = synchronizer.follow_registry(&registry);

    match cli.command {
        Commands::List { workspace, refresh } => {
            let workspace = workspace.map(WorkspaceId::from);
            if refresh {
                let targets: Vec<WorkspaceId> = match &workspace {
                    Some(id) => vec![id.clone()],
                    None => synchronizer
                        .tracked_workspaces()
                        .into_iter()
                        .map(|w| w.id)
                        .collect(),
                };
                for id in targets {
                    let outcome = synchronizer.fetch_projects_for_workspace_id(&id).await;
                    info!("Refresh of {}: {:?}", id, outcome);
                }
            }

            match workspace {
                Some(id) => print_json(&synchronizer.get_projects(&id).unwrap_or_default())?,
                None => print_json(&synchronizer.all_projects())?,
            }
        }

        Commands::Details { workspace, path } => {
            let details = synchronizer
                .fetch_project_details(&workspace.into(), &path)
                .await?;
            print_json(&details)?;
        }

        Commands::Estimate {
            workspace,
            path,
            project_type,
        } => {
            let estimate = synchronizer
                .fetch_estimate(&workspace.into(), &path, &project_type)
                .await?;
            print_json(&estimate)?;
        }

        Commands::Resolve { workspace, path } => {
            let candidates = synchronizer
                .fetch_resolve(&workspace.into(), &path)
                .await?;
            print_json(&candidates)?;
        }

        Commands::Rename {
            workspace,
            path,
            new_name,
        } => {
            let renamed = synchronizer
                .rename(&workspace.into(), &path, &new_name)
                .await?;
            print_json(&renamed)?;
        }

        Commands::Remove { workspace, path } => {
            synchronizer.remove(&workspace.into(), &path).await?;
            info!("Removed {}", path);
        }
    }

    synchronizer.shutdown();
    Ok(())
}
