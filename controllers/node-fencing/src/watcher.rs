//! Kubernetes resource watchers.
//!
//! This module watches Nodes (and optionally remediation Jobs) and feeds
//! node names to the reconciler through `kube_runtime::Controller`, which
//! serializes work per node and bounds concurrency across nodes.

use crate::annotations::{FENCING_LABEL, FENCING_LABEL_VALUE, NODE_LABEL};
use crate::backoff::RetryBackoff;
use crate::config::Config;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use futures::{Stream, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconciliation.
#[derive(Debug)]
pub struct Context {
    reconciler: Arc<Reconciler>,
    backoff: RetryBackoff,
}

async fn reconcile(node: Arc<Node>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let name = node.name_any();
    ctx.reconciler.reconcile_node(&name).await?;
    ctx.backoff.reset(&name);
    Ok(Action::await_change())
}

fn error_policy(node: Arc<Node>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let name = node.name_any();
    let delay = ctx.backoff.next_for(&name);
    error!(
        "Reconciliation failed for node {}: {} (retrying in {}s)",
        name,
        error,
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Maps a remediation Job back to the node it fences.
fn job_to_node(job: Job) -> Option<ObjectRef<Node>> {
    job.labels().get(NODE_LABEL).map(|name| ObjectRef::new(name))
}

/// Sets `ready` once the controller stream yields its first result.
///
/// The first result only arrives after the initial node list has synced.
fn report_readiness<S: Stream>(
    stream: S,
    ready: Arc<AtomicBool>,
) -> impl Stream<Item = S::Item> {
    stream.inspect(move |_| {
        if !ready.swap(true, Ordering::SeqCst) {
            info!("Node watcher is ready");
        }
    })
}

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    ctx: Arc<Context>,
    ready: Arc<AtomicBool>,
    node_api: Api<Node>,
    job_api: Option<Api<Job>>,
    concurrency: u16,
    debounce: Duration,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("watch_jobs", &self.job_api.is_some())
            .field("concurrency", &self.concurrency)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    ///
    /// `job_api` is `None` when job events should not re-trigger nodes.
    /// `ready` is raised once the watch is serving and lowered when it stops.
    pub fn new(
        reconciler: Arc<Reconciler>,
        node_api: Api<Node>,
        job_api: Option<Api<Job>>,
        ready: Arc<AtomicBool>,
        config: &Config,
    ) -> Self {
        Self {
            ctx: Arc::new(Context {
                reconciler,
                backoff: RetryBackoff::new(config.retry_min_minutes, config.retry_max_minutes),
            }),
            ready,
            node_api,
            job_api,
            concurrency: config.concurrency,
            debounce: config.debounce,
        }
    }

    /// Watches Nodes until the stream ends or a shutdown signal arrives.
    pub async fn watch_nodes(&self) -> Result<(), ControllerError> {
        info!("Starting Node watcher");

        let controller_config = ControllerConfig::default()
            .debounce(self.debounce)
            .concurrency(self.concurrency);

        let mut controller = Controller::new(self.node_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal();

        if let Some(job_api) = &self.job_api {
            info!("Also watching remediation Jobs");
            let selector = format!("{}={}", FENCING_LABEL, FENCING_LABEL_VALUE);
            controller = controller.watches(
                job_api.clone(),
                watcher::Config::default().labels(&selector),
                job_to_node,
            );
        }

        let results = controller.run(reconcile, error_policy, Arc::clone(&self.ctx));
        report_readiness(results, Arc::clone(&self.ready))
            .for_each(|res| async move {
                match res {
                    Ok((node, _)) => debug!("Reconciled node {}", node.name),
                    Err(e) => warn!("Node controller error: {}", e),
                }
            })
            .await;

        self.ready.store(false, Ordering::SeqCst);
        info!("Node watcher stopped");
        Ok(())
    }
}
