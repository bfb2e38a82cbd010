//! Controller-specific error types.
//!
//! This module defines error types specific to the Node Fencing Controller
//! that are not covered by upstream library errors, and the per-operation
//! policy that decides whether a failure is retried or only logged.

use fencing_client::ClientError;
use kube::Error as KubeError;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in the Node Fencing Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Cluster API call failed
    #[error("Cluster API error: {0}")]
    Client(#[from] ClientError),

    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe server failed
    #[error("Probe server error: {0}")]
    Probe(#[from] std::io::Error),
}

/// What to do when a side effect fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Propagate so the node is requeued
    Retry,
    /// Log and carry on
    BestEffort,
}

impl ErrorPolicy {
    /// Applies the policy to the outcome of `operation`.
    pub fn apply<T>(
        self,
        result: Result<T, ClientError>,
        operation: &str,
    ) -> Result<Option<T>, ControllerError> {
        match (result, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), ErrorPolicy::Retry) => Err(ControllerError::Client(e)),
            (Err(e), ErrorPolicy::BestEffort) => {
                warn!("{} failed (ignored): {}", operation, e);
                Ok(None)
            }
        }
    }
}
