//! ptrack-api - Progress tracking service with voice journal enrichment
//!
//! Serves the voice journal, activity and suggestion endpoints. Uploaded
//! journals are transcribed and analyzed in the background when a
//! collaborator credential is configured.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptrack_api::collaborators::{Collaborators, OpenAiClient};
use ptrack_api::config::{resolve_api_key, ServiceSettings};
use ptrack_api::services::AudioStore;
use ptrack_api::AppState;
use ptrack_common::config::{self as bootstrap, RootFolder, StorageBackend, TomlConfig};
use ptrack_common::{MemoryStorage, SqliteStorage, Storage};

/// How long shutdown waits for in-flight enrichment runs
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line arguments for ptrack-api
#[derive(Parser, Debug)]
#[command(name = "ptrack-api")]
#[command(about = "Progress tracking service with voice journal enrichment")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML `port`)
    #[arg(short, long, env = "PTRACK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "PTRACK_BIND")]
    bind: IpAddr,

    /// Root folder holding the database and uploaded audio
    #[arg(short, long, env = "PTRACK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: <config dir>/ptrack/config.toml)
    #[arg(short, long, env = "PTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Storage backend: sqlite or memory
    #[arg(long, env = "PTRACK_STORAGE")]
    storage: Option<StorageBackend>,
}

fn load_config(path: Option<&PathBuf>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let path = path.cloned().or_else(bootstrap::default_config_path);
    let config = match &path {
        Some(p) => bootstrap::load_toml_config(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => TomlConfig::default(),
    };
    Ok((config, path))
}

async fn open_storage(backend: StorageBackend, root: &RootFolder) -> Result<Arc<dyn Storage>> {
    Ok(match backend {
        StorageBackend::Sqlite => {
            let db_path = root.database_path();
            info!("Database: {}", db_path.display());
            let storage = SqliteStorage::open(&db_path)
                .await
                .context("Failed to open database")?;
            Arc::new(storage)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on exit");
            Arc::new(MemoryStorage::new())
        }
    })
}

fn build_collaborators(config: &TomlConfig) -> Option<Collaborators> {
    let api_key = resolve_api_key(&config.collaborator)?;
    match OpenAiClient::new(&config.collaborator, api_key) {
        Ok(client) => {
            info!(
                base_url = %config.collaborator.base_url,
                transcription_model = %config.collaborator.transcription_model,
                chat_model = %config.collaborator.chat_model,
                "Collaborator client configured"
            );
            Some(Collaborators::openai(client))
        }
        Err(e) => {
            warn!(error = %e, "Collaborator client unavailable; running degraded");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (toml_config, config_path) = load_config(args.config.as_ref())?;

    // Initialize tracing (RUST_LOG wins over the TOML level)
    let level = &toml_config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ptrack_api={0},ptrack_common={0},tower_http={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting ptrack-api v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    // Root folder: CLI → ENV → TOML → OS default
    let root = RootFolder::new(bootstrap::resolve_root_folder(
        args.root_folder.as_deref(),
        &toml_config,
    ));
    root.ensure_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", root.path().display());

    let backend = args.storage.unwrap_or_else(|| toml_config.storage());
    let storage = open_storage(backend, &root).await?;

    let audio = AudioStore::new(root.uploads_dir());
    audio
        .ensure_dir()
        .await
        .context("Failed to create uploads directory")?;

    let collaborators = build_collaborators(&toml_config);
    let settings = ServiceSettings::from_toml(&toml_config, backend);
    let state = AppState::new(
        storage,
        audio,
        collaborators,
        settings,
        toml_config.enrichment.max_concurrent,
    );
    let dispatcher = state.enrichment.clone();

    let app = ptrack_api::build_router(state);

    let port = args.port.unwrap_or_else(|| toml_config.port());
    let addr = SocketAddr::new(args.bind, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let pending = dispatcher.in_flight();
    if pending > 0 {
        info!(pending, "Waiting for in-flight enrichment runs");
        if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher.drain())
            .await
            .is_err()
        {
            warn!(
                pending = dispatcher.in_flight(),
                "Enrichment runs still in flight at shutdown; abandoning them"
            );
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
