//! MSR Gateway (msr-gateway)
//!
//! Single-process service hosting the reading orchestrator, device fan-out,
//! retrieval store, and content sync surface over HTTP and WebSocket.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use msr_common::config::{self, ApiKeys};
use msr_gateway::api::quota::QuotaConfig;
use msr_gateway::{build_router, spawn_background_tasks, AppState, GatewayOptions};

/// MSR Gateway - multi-sensory reading orchestrator service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root folder path (overrides environment variable and config file)
    #[arg(short, long, value_name = "PATH")]
    root_folder: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "msr_gateway={},msr_core={},msr_common={}",
                    log_level, log_level, log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("MSR Gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    // Resolve root folder
    let root_folder = config::resolve_root_folder(
        args.root_folder.as_deref().and_then(|p| p.to_str()),
        "MSR_ROOT_FOLDER",
    )?;
    std::fs::create_dir_all(&root_folder)?;
    info!("Root folder: {}", root_folder.display());

    // Initialize database
    let db_path = root_folder.join("msr.db");
    let db = msr_common::db::init_database(&db_path).await?;

    // Authentication and sync configuration from the environment
    let api_keys = ApiKeys::from_env();
    if api_keys.enabled() {
        info!("API authentication enabled ({} keys)", api_keys.len());
    } else {
        info!("API authentication disabled (no keys configured)");
    }
    let sync_whitelist = config::sync_whitelist_from_env();

    let state = AppState::build(GatewayOptions {
        db,
        root_folder,
        sync_whitelist,
        api_keys,
        quota: QuotaConfig::default(),
        seed_builtin_devices: true,
    })
    .await?;

    spawn_background_tasks(&state);

    let host = args.host.unwrap_or_else(|| config::DEFAULT_HOST.to_string());
    let port = args.port.unwrap_or(config::DEFAULT_PORT);
    let bind_addr = format!("{}:{}", host, port);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP server listening on {}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
