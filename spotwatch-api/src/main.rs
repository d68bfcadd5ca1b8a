//! spotwatch-api - parking occupancy service
//!
//! Serves the sensor/spot/plate API and runs the occupancy reconciler in the
//! same process.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spotwatch_api::{build_router, AppState};
use spotwatch_common::auth::PresenceAuthenticator;
use spotwatch_common::config::{load_config, SpotwatchConfig, StoreBackend};
use spotwatch_common::credentials::{CredentialCache, SqliteCredentialCache};
use spotwatch_common::reconciler::Reconciler;
use spotwatch_common::store::{self, Store};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "spotwatch-api")]
#[command(about = "Parking spot occupancy service")]
#[command(version)]
struct Args {
    /// Configuration file (falls back to SPOTWATCH_CONFIG, then the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, keeping the configured host
    #[arg(short, long, env = "SPOTWATCH_PORT")]
    port: Option<u16>,

    /// Realtime database URL; selects the rtdb store backend
    #[arg(long, env = "SPOTWATCH_STORE_URL")]
    store_url: Option<String>,

    /// Realtime database auth token
    #[arg(long, env = "SPOTWATCH_STORE_TOKEN", hide_env_values = true)]
    store_token: Option<String>,

    /// Seconds between reconciliation passes
    #[arg(long, env = "SPOTWATCH_RECONCILE_SECS")]
    interval: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut SpotwatchConfig) -> Result<()> {
        if let Some(port) = self.port {
            let mut addr: SocketAddr = config
                .bind_addr
                .parse()
                .with_context(|| format!("Invalid bind_addr '{}'", config.bind_addr))?;
            addr.set_port(port);
            config.bind_addr = addr.to_string();
        }
        if let Some(url) = &self.store_url {
            config.store.backend = StoreBackend::Rtdb;
            config.store.url = Some(url.clone());
        }
        if let Some(token) = &self.store_token {
            config.store.auth_token = Some(token.clone());
        }
        if let Some(secs) = self.interval {
            config.reconciler.interval_secs = secs;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "spotwatch_api=info,spotwatch_common=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting spotwatch-api v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    let store = store::open(&config.store).context("Failed to open store")?;
    info!("Store backend: {}", store.backend());
    if store.backend() == "memory" {
        warn!("Using the in-memory store; data is lost on shutdown");
    }

    let credentials: Arc<dyn CredentialCache> = match config.credentials_path() {
        Some(path) => {
            info!("Credential cache: {}", path.display());
            Arc::new(
                SqliteCredentialCache::open(&path)
                    .await
                    .context("Failed to open credential cache")?,
            )
        }
        None => {
            info!("Credential cache: in-memory");
            Arc::new(
                SqliteCredentialCache::in_memory()
                    .await
                    .context("Failed to open credential cache")?,
            )
        }
    };

    let mut state = AppState::new(store.clone(), Arc::new(PresenceAuthenticator))
        .with_credential_cache(credentials);

    let reconciler_task = if config.reconciler.enabled {
        let reconciler = Arc::new(Reconciler::new(store, Arc::new(config.occupancy.clone())));
        state = state.with_reconciler(reconciler.clone());
        let period = Duration::from_secs(config.reconciler.interval_secs);
        Some(reconciler.spawn(period))
    } else {
        info!("Reconciler disabled");
        None
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(task) = reconciler_task {
        task.abort();
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
