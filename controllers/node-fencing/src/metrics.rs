//! Prometheus metrics for the fencing controller.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::ControllerError;

/// Counters describing what the reconciler did.
#[derive(Clone, Debug)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    transitions: IntCounterVec,
    jobs_created: IntCounter,
    jobs_deleted: IntCounter,
    recoveries: IntCounter,
}

impl Metrics {
    /// Creates the counters and registers them with a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric fails to register.
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new("fencing_reconciliations_total", "Node reconciliation passes by outcome"),
            &["outcome"],
        )?;
        let transitions = IntCounterVec::new(
            Opts::new(
                "fencing_transitions_total",
                "Fencing state transitions written, by target state",
            ),
            &["state"],
        )?;
        let jobs_created =
            IntCounter::new("fencing_jobs_created_total", "Remediation jobs created")?;
        let jobs_deleted =
            IntCounter::new("fencing_jobs_deleted_total", "Remediation jobs deleted")?;
        let recoveries = IntCounter::new(
            "fencing_recoveries_total",
            "Nodes that recovered while pending or fenced",
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(jobs_created.clone()))?;
        registry.register(Box::new(jobs_deleted.clone()))?;
        registry.register(Box::new(recoveries.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            transitions,
            jobs_created,
            jobs_deleted,
            recoveries,
        })
    }

    /// Records a finished pass, `success` or `error`.
    pub fn reconciled(&self, outcome: &str) {
        self.reconciliations.with_label_values(&[outcome]).inc();
    }

    /// Records a persisted transition to `state`.
    pub fn transitioned(&self, state: &str) {
        self.transitions.with_label_values(&[state]).inc();
    }

    /// Counts a created remediation job.
    pub fn job_created(&self) {
        self.jobs_created.inc();
    }

    /// Counts a deleted remediation job.
    pub fn job_deleted(&self) {
        self.jobs_deleted.inc();
    }

    /// Counts a node whose fencing annotations were cleared on recovery.
    pub fn recovered(&self) {
        self.recoveries.inc();
    }

    /// Renders all metrics in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode_text(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    #[cfg(test)]
    pub fn jobs_created_count(&self) -> u64 {
        self.jobs_created.get()
    }

    #[cfg(test)]
    pub fn transition_count(&self, state: &str) -> u64 {
        self.transitions.with_label_values(&[state]).get()
    }
}
