use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use tasksync::auth::OAuthClient;
use tasksync::config::Config;
use tasksync::constants::{ERROR_NO_CLIENT_ID, MSTODO_SOURCE};
use tasksync::coordinator::{PassMode, SyncCoordinator};
use tasksync::logger;
use tasksync::provider::MsTodoClient;
use tasksync::storage::LocalStorage;
use tasksync::sync::{SyncOptions, SyncService, SyncStores};

#[derive(Parser, Debug)]
#[command(name = "tasksync", version, about = "Sync local tasks with Microsoft To Do")]
struct Cli {
    /// Configuration file to use instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync pass for a user.
    Sync {
        user: i64,
        /// Only pull remote changes
        #[arg(long, conflicts_with = "export")]
        import: bool,
        /// Only push local changes
        #[arg(long)]
        export: bool,
        /// Overwrite local tasks with remote content even when unchanged
        #[arg(long)]
        force: bool,
    },

    /// Store the tokens obtained from an authorization code.
    Connect { user: i64, code: String },

    /// Sync all connected users on the configured interval.
    Daemon,

    /// Write a default configuration file.
    InitConfig { path: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        let path = match path {
            Some(path) => path.clone(),
            None => Config::get_default_config_path()?,
        };
        return Config::generate_default_config(path);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    logger::init(&config.logging)?;

    let oauth = match config.provider.oauth_config() {
        Ok(oauth) => oauth,
        Err(e) => {
            eprintln!("{ERROR_NO_CLIENT_ID}");
            eprintln!("   {e:#}");
            return Ok(());
        }
    };

    let database_url = config.storage.resolved_database_url()?;
    let storage = LocalStorage::new(&database_url).await?;
    let provider = Arc::new(
        MsTodoClient::new(&config.provider.api_base_url, config.provider.request_timeout())
            .context("Failed to build provider client")?,
    );
    let tokens = Arc::new(OAuthClient::new(oauth).context("Failed to build OAuth client")?);

    let service = SyncService::new(provider, SyncStores::local(&storage), SyncOptions::from(&config.sync));
    let coordinator = SyncCoordinator::new(
        service,
        tokens,
        Arc::new(storage.clone()),
        MSTODO_SOURCE,
        config.sync.refresh_skew(),
        config.sync.max_concurrent_passes,
    );

    match cli.command {
        Commands::Sync {
            user,
            import,
            export,
            force,
        } => {
            let mode = match (import, export) {
                (true, _) => PassMode::Import,
                (_, true) => PassMode::Export,
                _ => PassMode::Bidirectional,
            };
            let result = coordinator.sync_user(user, mode, force).await?;
            println!("{}", result.summary());
            for failure in &result.failures {
                println!("  {:?}: {}", failure.kind, failure.message);
            }
        }
        Commands::Connect { user, code } => {
            coordinator.connect(user, &code).await?;
            println!("✅ User {user} connected");
        }
        Commands::Daemon => {
            let Some(interval) = config.sync.auto_sync_interval() else {
                anyhow::bail!("auto_sync_interval_minutes is 0; nothing to schedule");
            };
            info!("Daemon started, syncing every {} minutes", config.sync.auto_sync_interval_minutes);
            coordinator
                .run(interval, PassMode::Bidirectional, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
