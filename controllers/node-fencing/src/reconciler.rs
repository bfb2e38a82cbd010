//! Reconciliation logic for node fencing.
//!
//! Each pass looks at one node's readiness condition and its persisted
//! fencing annotations, decides the next step of the state machine and
//! issues the side effects for it:
//!
//! ```text
//! none --(unreachable)--> pending --(timeout elapsed)--> started
//! started --(job finished)--> started (job recreated)
//! pending | fenced --(ready)--> recovered --(cleanup)--> none
//! ```
//!
//! `fenced` is written only by operators or the remediation job's after-hook;
//! the reconciler stands down once it sees it. Passes for one node are
//! serialized by the watch queue, so no locking is done here.

use crate::annotations::{
    DEFAULT_TEMPLATE, DEFAULT_TIMEOUT, ENABLED, JOB_COMPLETE, JOB_FAILED, NODE_READY,
    NODE_STATUS_UNKNOWN, TEMPLATE, TIMEOUT,
};
use crate::conditions::{job_condition, node_condition};
use crate::error::{ControllerError, ErrorPolicy};
use crate::job::build_job;
use crate::metrics::Metrics;
use crate::scheduler::RecheckScheduler;
use crate::state::{FencingRecord, FencingState};
use fencing_client::{ClientError, ClusterClient};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::PodTemplate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Reconciles the fencing state of nodes.
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    namespace: String,
    scheduler: RecheckScheduler,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("namespace", &self.namespace)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler operating on jobs and templates in `namespace`.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespace: String,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        let scheduler = RecheckScheduler::new(Arc::clone(&client));
        Self {
            client,
            namespace,
            scheduler,
            clock,
            metrics,
        }
    }

    /// Pending grace-period timers.
    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> &RecheckScheduler {
        &self.scheduler
    }

    /// Reconciles the node called `name`.
    ///
    /// An `Err` means the pass should be retried; every benign stop returns `Ok`.
    pub async fn reconcile_node(&self, name: &str) -> Result<(), ControllerError> {
        let result = self.reconcile(name).await;
        self.metrics
            .reconciled(if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn reconcile(&self, name: &str) -> Result<(), ControllerError> {
        let Some(node) = self.client.get_node(name).await? else {
            debug!("Node {} not found, nothing to do", name);
            return Ok(());
        };

        let Some(ready) = node_condition(&node, NODE_READY) else {
            debug!("Node {} has no {} condition yet", name, NODE_READY);
            return Ok(());
        };

        let annotations = node.metadata.annotations.clone().unwrap_or_default();
        let record = FencingRecord::decode(Some(&annotations));
        let mut state = record.state;

        if ready.status == "True" && record.clears_on_recovery() {
            info!("Node {} recovered", name);
            self.scheduler.cancel(name);
            let patch = record.transition(FencingState::Recovered, None);
            let cleared = ErrorPolicy::BestEffort.apply(
                self.client.patch_node_annotations(name, &patch).await,
                "clear fencing annotations",
            )?;
            if cleared.is_some() {
                self.metrics.recovered();
            }
            state = FencingState::Recovered;
        }

        if state == FencingState::Fenced {
            debug!("Node {} is already fenced", name);
            return Ok(());
        }

        if state != FencingState::Recovered
            && ready.reason.as_deref() != Some(NODE_STATUS_UNKNOWN)
        {
            debug!("Node {} is reachable ({:?}), skipping", name, ready.reason);
            return Ok(());
        }

        let template_name = annotations
            .get(TEMPLATE)
            .map_or(DEFAULT_TEMPLATE, String::as_str);
        let Some(template) = self
            .client
            .get_pod_template(template_name, &self.namespace)
            .await?
        else {
            error!(
                "Failed to find PodTemplate {}/{} for node {}",
                self.namespace, template_name, name
            );
            return Ok(());
        };

        let job = build_job(&node, &template, &self.namespace);
        let job_name = job.metadata.name.clone().unwrap_or_default();

        if state == FencingState::Recovered {
            self.remove_job(&job_name).await?;
            return Ok(());
        }

        if annotations.get(ENABLED).map(String::as_str) != Some("true") {
            debug!("Fencing is not enabled for node {}", name);
            return Ok(());
        }

        if state != FencingState::Started {
            return self.arm(name, record, &annotations, &template).await;
        }

        self.execute(name, &job, &job_name).await
    }

    /// Waits out the grace period, then moves the node to `started`.
    async fn arm(
        &self,
        name: &str,
        mut record: FencingRecord,
        annotations: &BTreeMap<String, String>,
        template: &PodTemplate,
    ) -> Result<(), ControllerError> {
        let raw_timeout = annotations
            .get(TIMEOUT)
            .or_else(|| {
                template
                    .metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(TIMEOUT))
            })
            .map_or(DEFAULT_TIMEOUT, String::as_str);
        let timeout = match raw_timeout.trim().parse::<i64>() {
            Ok(t) => t,
            Err(e) => {
                error!(
                    "Failed to parse timeout {:?} for node {}: {}",
                    raw_timeout, name, e
                );
                return Ok(());
            }
        };

        // Zero or negative means no grace period
        if timeout <= 0 {
            return self.start(name, &record).await;
        }

        let now = self.clock.now();
        if record.state == FencingState::None && record.timestamp.is_none() {
            let patch = record.transition(FencingState::Pending, Some(now));
            ErrorPolicy::Retry.apply(
                self.client.patch_node_annotations(name, &patch).await,
                "record first sighting",
            )?;
            self.metrics.transitioned("pending");
            info!("Node {} is unreachable, fencing in {} seconds", name, timeout);

            let mut patched = annotations.clone();
            patch.apply_to(&mut patched);
            record = FencingRecord::decode(Some(&patched));
        }

        let since = record.timestamp.unwrap_or(0);
        let remaining = timeout.saturating_sub(now.saturating_sub(since));
        if remaining > 0 {
            let delay = Duration::from_secs(u64::try_from(remaining).unwrap_or(0));
            self.scheduler.arm(name, since.saturating_add(timeout), delay);
            return Ok(());
        }

        info!("Timeout for node {} elapsed", name);
        self.start(name, &record).await
    }

    async fn start(&self, name: &str, record: &FencingRecord) -> Result<(), ControllerError> {
        self.scheduler.cancel(name);
        let patch = record.transition(FencingState::Started, None);
        if patch.is_empty() {
            return Ok(());
        }
        ErrorPolicy::Retry.apply(
            self.client.patch_node_annotations(name, &patch).await,
            "start fencing",
        )?;
        self.metrics.transitioned("started");
        info!("Fencing of node {} started", name);
        Ok(())
    }

    /// Keeps exactly one remediation job running for a started node.
    async fn execute(&self, name: &str, job: &Job, job_name: &str) -> Result<(), ControllerError> {
        match self.client.get_job(job_name, &self.namespace).await? {
            None => info!("Starting fencing {}", name),
            Some(found) => {
                info!("Continue fencing {}", name);

                let finished = job_condition(&found, JOB_COMPLETE)
                    .or_else(|| job_condition(&found, JOB_FAILED));
                if finished.is_none() {
                    info!("Job {} is still running", job_name);
                    return Ok(());
                }

                info!("Deleting previous job {}", job_name);
                match self.client.delete_job(job_name, &self.namespace).await {
                    Err(ClientError::NotFound(_)) => {
                        debug!("Job {} already gone", job_name);
                    }
                    result => {
                        ErrorPolicy::Retry.apply(result, "delete finished remediation job")?;
                        self.metrics.job_deleted();
                    }
                }
            }
        }

        info!("Creating a new job {}", job_name);
        let created = self.client.create_job(job).await;
        if let Err(ClientError::AlreadyExists(_)) = &created {
            info!("Previous job {} is still terminating", job_name);
        }
        ErrorPolicy::Retry.apply(created, "create remediation job")?;
        self.metrics.job_created();
        Ok(())
    }

    /// Removes a leftover remediation job after recovery.
    async fn remove_job(&self, job_name: &str) -> Result<(), ControllerError> {
        let existing = ErrorPolicy::BestEffort
            .apply(
                self.client.get_job(job_name, &self.namespace).await,
                "look up remediation job",
            )?
            .flatten();
        if existing.is_none() {
            return Ok(());
        }

        info!("Deleting job {}", job_name);
        let deleted = ErrorPolicy::BestEffort.apply(
            self.client.delete_job(job_name, &self.namespace).await,
            "delete remediation job",
        )?;
        if deleted.is_some() {
            self.metrics.job_deleted();
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
