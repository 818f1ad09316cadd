//! keybed-sf - instrument storefront service
//!
//! Serves the catalog, product details, the comparison subsystem and the
//! admin surface over HTTP (default port 5730).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use keybed_common::config::{resolve_root_folder, RootFolder, TomlConfig};
use keybed_common::db::init_database;
use keybed_common::events::EventBus;
use keybed_sf::api::buildinfo::BuildInfo;
use keybed_sf::catalog::SqliteCatalog;
use keybed_sf::compare::{CompareState, JsonFileStorage};
use keybed_sf::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Event bus capacity; slow SSE clients drop the oldest events beyond this
const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for keybed-sf
#[derive(Parser, Debug)]
#[command(name = "keybed-sf")]
#[command(about = "Instrument storefront with side-by-side comparison")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "KEYBED_PORT")]
    port: Option<u16>,

    /// Root folder for the catalog database and the compare record
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (default: platform config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Admin token (overrides the config file)
    #[arg(long, env = "KEYBED_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_origin) = TomlConfig::load_or_default(args.config.as_deref());

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!("Starting Keybed Storefront: {}", BuildInfo::current());
    config_origin.log();

    let root = RootFolder::new(resolve_root_folder(args.root_folder.as_deref(), &config));
    root.ensure_exists()?;
    info!("Root folder: {}", root.path().display());

    let pool = init_database(&root.database_path())
        .await
        .context("Failed to open catalog database")?;

    let events = EventBus::new(EVENT_BUS_CAPACITY);
    let compare = CompareState::new(
        Box::new(JsonFileStorage::new(root.compare_record_path())),
        config.compare.route_policy,
        config.compare.prune_dangling,
        events.clone(),
    );
    info!(
        "Comparison: {} item(s) restored, route policy {:?}, prune dangling {}",
        compare.store.len(),
        config.compare.route_policy,
        config.compare.prune_dangling
    );

    let admin_token = args.admin_token.or(config.admin_token);
    if admin_token.is_none() {
        info!("No admin token configured; admin API disabled");
    }

    let state = AppState::new(SqliteCatalog::new(pool), compare, events, admin_token);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("keybed-sf listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
