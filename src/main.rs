//! Warden Proxy Pool Manager - Entry Point
//!
//! Starts the pool manager with its background health monitor and graceful
//! shutdown support.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod health;
mod models;
mod pool;
mod reputation;
mod selection;
mod store;
mod vault;

use config::{Config, StoreBackend};
use health::{HealthMonitor, HealthMonitorHandle};
use pool::ProxyPool;
use store::{MemoryStore, PostgresStore, ProxyStore};
use vault::DevVault;

#[tokio::main]
async fn main() -> error::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("warden={}", config.log.level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Warden Proxy Pool Manager");

    // Construct the store backend
    let store: Arc<dyn ProxyStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let store =
                PostgresStore::connect(&config.database_url(), config.store.max_connections)
                    .await?;
            info!("Connected to database");
            Arc::new(store)
        }
    };

    // Load operation policies
    let policies = config.load_policies()?;
    info!(entries = policies.len(), "Operation policies loaded");

    // Assemble the pool. DevVault is base64 obfuscation only; deployments
    // with real secrets inject a proper vault here.
    let pool = Arc::new(ProxyPool::with_config(
        store,
        Arc::new(DevVault),
        config.selector_config(),
        policies,
    ));
    if let Some(strategy) = config.selection.strategy {
        pool.set_strategy(strategy);
    }

    // Start health monitor
    let (health_handle, health_task) = if config.health.enabled {
        let (handle, shutdown_rx) = HealthMonitorHandle::new();
        let monitor = HealthMonitor::new(pool.clone(), config.health_monitor_config());
        let task = tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        });
        (Some(handle), Some(task))
    } else {
        info!("Health monitor disabled");
        (None, None)
    };

    match pool.snapshot().await {
        Ok(snapshot) => info!(
            total = snapshot.total,
            active = snapshot.active,
            "Pool ready"
        ),
        Err(e) => error!(error = %e, "Failed to read initial pool snapshot"),
    }

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    if let Some(handle) = health_handle {
        handle.shutdown();
    }
    if let Some(task) = health_task {
        let _ = task.await;
    }

    info!("Warden stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
