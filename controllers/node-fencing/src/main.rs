//! Node Fencing Controller
//!
//! Isolates cluster nodes that stopped reporting health before workloads rely
//! on them being gone.
//!
//! This controller watches `Node`s whose `Ready` condition turned `Unknown`
//! (`NodeStatusUnknown`) and, for nodes annotated `fencing/enabled=true`,
//! runs an operator-supplied remediation Job built from a `PodTemplate`.

mod annotations;
mod backoff;
mod conditions;
mod config;
mod controller;
mod error;
mod job;
mod metrics;
mod probes;
mod reconciler;
mod scheduler;
mod state;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Node Fencing Controller");

    // Load configuration from environment variables
    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Debounce: {}s", config.debounce.as_secs());
    info!("  Watch jobs: {}", config.watch_jobs);
    info!("  Probe address: {}", config.probe_addr);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
