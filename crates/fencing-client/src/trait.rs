//! ClusterClient trait for mocking
//!
//! This trait abstracts the cluster API to enable mocking in unit tests.
//! `KubeClusterClient` implements it against a live API server, and tests use
//! `MockClusterClient`.

use crate::error::ClientError;
use crate::models::AnnotationPatch;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Node, PodTemplate};

/// Trait for the cluster operations used by the fencing controller
///
/// Lookups return `Ok(None)` when the object does not exist so callers can
/// tell "absent" apart from a failed request.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    // Nodes
    /// Fetches a cluster-scoped node.
    async fn get_node(&self, name: &str) -> Result<Option<Node>, ClientError>;
    /// Applies a merge patch to a node's annotations.
    async fn patch_node_annotations(
        &self,
        name: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), ClientError>;

    // Pod templates
    /// Fetches a namespaced pod template.
    async fn get_pod_template(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PodTemplate>, ClientError>;

    // Jobs
    /// Fetches a namespaced job.
    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, ClientError>;
    /// Creates a job in its own namespace; `AlreadyExists` on a name collision.
    async fn create_job(&self, job: &Job) -> Result<(), ClientError>;
    /// Deletes a job and its pods; `NotFound` when it is already gone.
    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClientError>;
}
