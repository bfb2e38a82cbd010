//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the reconciler,
//! the Node watcher and the probe server together for the Node Fencing
//! Controller.

use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::probes::{self, ProbeState};
use crate::reconciler::{Reconciler, SystemClock};
use crate::watcher::Watcher;
use fencing_client::KubeClusterClient;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for node fencing.
#[derive(Debug)]
pub struct Controller {
    node_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Node Fencing Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;
        let cluster_client = KubeClusterClient::new(kube_client.clone());

        let metrics = Metrics::new()?;
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(cluster_client),
            config.namespace.clone(),
            Arc::new(SystemClock),
            metrics.clone(),
        ));

        let node_api: Api<Node> = Api::all(kube_client.clone());
        let job_api: Option<Api<Job>> = config
            .watch_jobs
            .then(|| Api::namespaced(kube_client, &config.namespace));

        // Raised by the watcher once the initial node list has synced
        let ready = Arc::new(AtomicBool::new(false));
        let watcher = Watcher::new(reconciler, node_api, job_api, Arc::clone(&ready), &config);

        let probe_state = ProbeState::new(ready, metrics);
        let probe_server = tokio::spawn(probes::serve(config.probe_addr, probe_state));

        let node_watcher = tokio::spawn(async move { watcher.watch_nodes().await });

        Ok(Self {
            node_watcher,
            probe_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Node Fencing Controller running");

        // The node watcher returns on shutdown signal; the probe server only on failure
        tokio::select! {
            result = &mut self.node_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Node watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Node watcher error: {}", e)))?;
            }
            result = &mut self.probe_server => {
                result
                    .map_err(|e| ControllerError::Watch(format!("Probe server panicked: {}", e)))??;
            }
        }

        self.probe_server.abort();
        info!("Node Fencing Controller stopped");
        Ok(())
    }
}
