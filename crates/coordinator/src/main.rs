//! QGate Coordinator Registry - Main Entry Point
//!
//! Loads the registered coordinators from the durable store and keeps the
//! registry available until shutdown.

use anyhow::Context;
use qgate_common::{GatewayConfig, METRICS};
use qgate_coordinator::{HttpLivenessProbe, RegistryFacade, SqliteCoordinatorStore};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("QGATE_CONFIG") {
        Ok(path) => GatewayConfig::from_file(&path),
        Err(_) => {
            let default_path = "configs/gateway.yaml";
            if std::path::Path::new(default_path).exists() {
                GatewayConfig::from_file(default_path)
            } else {
                GatewayConfig::from_env()
            }
        }
    }
    .context("Failed to load configuration")?;

    init_tracing(&config);

    info!(
        "Starting QGate coordinator registry: store={}",
        config.store.path.display()
    );

    let store = SqliteCoordinatorStore::open(&config.store.path)
        .context("Failed to open coordinator store")?;
    let probe = HttpLivenessProbe::new(&config.probe).context("Failed to build liveness probe")?;
    info!(timeout_ms = probe.timeout().as_millis() as u64, "Liveness probe ready");

    let facade = Arc::new(RegistryFacade::new(Arc::new(probe), Arc::new(store)));

    let count = facade.reload().await.context("Initial coordinator reload failed")?;
    if count == 0 {
        warn!("No active coordinators registered; selections will fail until one is added");
    }

    for coordinator in facade.coordinators().iter() {
        info!(coordinator = %coordinator, "Registered coordinator");
    }

    info!("QGate coordinator registry running");

    signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    if config.observability.enable_metrics {
        info!("Final metrics:\n{}", METRICS.gather());
    }

    info!("QGate coordinator registry shutdown complete");
    Ok(())
}

fn init_tracing(config: &GatewayConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "qgate_coordinator={level},qgate_common={level}",
            level = config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.structured_logging {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
