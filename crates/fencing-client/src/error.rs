//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster API
#[derive(Debug, Error)]
pub enum ClientError {
    /// Kubernetes API request/response error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A create collided with an object of the same name
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The request could not be issued or was rejected
    #[error("API error: {0}")]
    Api(String),
}
