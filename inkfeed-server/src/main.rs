//! inkfeed-server - Classroom feedback service
//!
//! Teachers submit two photos per student from a phone; the service composes
//! them with a caption, pushes the result to the parents' group chat and
//! keeps a browsable archive with stats and CSV export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use inkfeed_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use inkfeed_server::config::CliOverrides;
use inkfeed_server::{AppState, ServiceConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for inkfeed-server
#[derive(Parser, Debug)]
#[command(name = "inkfeed-server")]
#[command(about = "Classroom feedback service: photo composites, group-chat push and archives")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "INKFEED_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "INKFEED_HOST")]
    host: Option<String>,

    /// Data root holding uploads/ and records.json
    #[arg(short, long, env = "INKFEED_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "INKFEED_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is normal
    let dotenv = dotenvy::dotenv().ok();

    let args = Args::parse();
    let toml = TomlConfig::load_or_default(args.config.as_deref());

    init_tracing(toml.logging.level.as_deref());

    info!(
        "Starting inkfeed-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Step 1: Resolve root folder
    let root_folder = RootFolderResolver::new("inkfeed-server")
        .with_cli_arg(args.root_folder)
        .with_toml(&toml)
        .resolve();

    // Step 2: Create root folder layout if missing
    let initializer = RootFolderInitializer::new(root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root().display());
    if !initializer.records_exist() {
        info!("No records yet at {}", initializer.records_path().display());
    }

    // Step 3: Resolve service configuration
    let config = ServiceConfig::resolve(
        CliOverrides {
            host: args.host,
            port: args.port,
            root_folder,
        },
        &toml,
    );
    let bind_addr = format!("{}:{}", config.host, config.port);
    let public_base_url = config.public_base_url.clone();

    // Step 4: Build collaborators and router
    let state = AppState::from_config(config).context("Failed to build HTTP clients")?;
    let app = inkfeed_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    info!("Listening on http://{}", bind_addr);
    info!("Upload page: {}/upload", public_base_url);
    info!("Stats page: {}/stats", public_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the TOML level, which wins over the compiled default
fn init_tracing(toml_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| toml_level.and_then(|level| EnvFilter::try_new(level).ok()))
        .unwrap_or_else(|| {
            let level = CompiledDefaults::for_current_platform().log_level;
            EnvFilter::new(format!(
                "inkfeed_server={level},inkfeed_common={level},tower_http={level}"
            ))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
