//! Mock ClusterClient for unit testing
//!
//! This module provides an in-memory implementation of `ClusterClient` that can
//! be used in unit tests without a running API server. Writes are applied to
//! the in-memory store and recorded so tests can assert on side effects.

use crate::cluster_trait::ClusterClient;
use crate::error::ClientError;
use crate::models::AnnotationPatch;
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::api::core::v1::{Node, PodTemplate};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `get_node`
    GetNode,
    /// `patch_node_annotations`
    PatchNode,
    /// `get_pod_template`
    GetPodTemplate,
    /// `get_job`
    GetJob,
    /// `create_job`
    CreateJob,
    /// `delete_job`
    DeleteJob,
}

/// A write issued against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// Annotation patch applied to a node
    PatchNode {
        /// Node name
        name: String,
        /// Patch as issued
        patch: AnnotationPatch,
    },
    /// Job created
    CreateJob {
        /// Job namespace
        namespace: String,
        /// Job name
        name: String,
    },
    /// Job deletion accepted
    DeleteJob {
        /// Job namespace
        namespace: String,
        /// Job name
        name: String,
    },
}

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    nodes: Arc<Mutex<HashMap<String, Node>>>,
    pod_templates: Arc<Mutex<HashMap<(String, String), PodTemplate>>>,
    jobs: Arc<Mutex<HashMap<(String, String), Job>>>,
    failures: Arc<Mutex<HashSet<MockOperation>>>,
    terminating: Arc<Mutex<HashSet<(String, String)>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl std::fmt::Debug for MockClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterClient")
            .field("calls", &self.calls.lock().unwrap().len())
            .finish_non_exhaustive()
    }
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

impl MockClusterClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node (for test setup)
    pub fn add_node(&self, node: Node) {
        let name = node.metadata.name.clone().unwrap_or_default();
        self.nodes.lock().unwrap().insert(name, node);
    }

    /// Remove a node (for test setup)
    pub fn remove_node(&self, name: &str) {
        self.nodes.lock().unwrap().remove(name);
    }

    /// Current copy of a node
    pub fn node(&self, name: &str) -> Option<Node> {
        self.nodes.lock().unwrap().get(name).cloned()
    }

    /// Current annotations of a node (empty when absent)
    pub fn annotations(&self, name: &str) -> BTreeMap<String, String> {
        self.node(name)
            .and_then(|n| n.metadata.annotations)
            .unwrap_or_default()
    }

    /// Add a pod template (for test setup)
    pub fn add_pod_template(&self, template: PodTemplate) {
        let namespace = template.metadata.namespace.clone().unwrap_or_default();
        let name = template.metadata.name.clone().unwrap_or_default();
        self.pod_templates.lock().unwrap().insert((namespace, name), template);
    }

    /// Add a job directly, bypassing the call log (for test setup)
    pub fn add_job(&self, job: Job) {
        let namespace = job.metadata.namespace.clone().unwrap_or_default();
        let name = job.metadata.name.clone().unwrap_or_default();
        self.jobs.lock().unwrap().insert((namespace, name), job);
    }

    /// Current copy of a job
    pub fn job(&self, name: &str, namespace: &str) -> Option<Job> {
        self.jobs.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Number of stored jobs
    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Append a `True` condition of the given type to a stored job's status
    pub fn set_job_condition(&self, name: &str, namespace: &str, condition_type: &str) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&key(namespace, name)) {
            let status = job.status.get_or_insert_with(JobStatus::default);
            status
                .conditions
                .get_or_insert_with(Vec::new)
                .push(JobCondition {
                    type_: condition_type.to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                });
        }
    }

    /// Keep a job in the store after its deletion is accepted, as if it were
    /// still terminating
    pub fn keep_terminating(&self, name: &str, namespace: &str) {
        self.terminating.lock().unwrap().insert(key(namespace, name));
    }

    /// Make every call of `operation` fail until cleared
    pub fn fail_on(&self, operation: MockOperation) {
        self.failures.lock().unwrap().insert(operation);
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// All writes issued so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget the recorded writes
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn check(&self, operation: MockOperation) -> Result<(), ClientError> {
        if self.failures.lock().unwrap().contains(&operation) {
            return Err(ClientError::Api(format!("injected failure for {:?}", operation)));
        }
        Ok(())
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockClusterClient {
    async fn get_node(&self, name: &str) -> Result<Option<Node>, ClientError> {
        self.check(MockOperation::GetNode)?;
        Ok(self.node(name))
    }

    async fn patch_node_annotations(
        &self,
        name: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), ClientError> {
        self.check(MockOperation::PatchNode)?;
        {
            let mut nodes = self.nodes.lock().unwrap();
            let node = nodes
                .get_mut(name)
                .ok_or_else(|| ClientError::NotFound(format!("Node {}", name)))?;
            let annotations = node.metadata.annotations.get_or_insert_with(BTreeMap::new);
            patch.apply_to(annotations);
        }
        self.record(MockCall::PatchNode {
            name: name.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }

    async fn get_pod_template(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PodTemplate>, ClientError> {
        self.check(MockOperation::GetPodTemplate)?;
        Ok(self.pod_templates.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, ClientError> {
        self.check(MockOperation::GetJob)?;
        Ok(self.job(name, namespace))
    }

    async fn create_job(&self, job: &Job) -> Result<(), ClientError> {
        self.check(MockOperation::CreateJob)?;
        let namespace = job
            .metadata
            .namespace
            .clone()
            .ok_or_else(|| ClientError::Api("Job is missing a namespace".to_string()))?;
        let name = job
            .metadata
            .name
            .clone()
            .ok_or_else(|| ClientError::Api("Job is missing a name".to_string()))?;
        {
            let mut jobs = self.jobs.lock().unwrap();
            let slot = (namespace.clone(), name.clone());
            if jobs.contains_key(&slot) {
                return Err(ClientError::AlreadyExists(format!("Job {}/{}", namespace, name)));
            }
            jobs.insert(slot, job.clone());
        }
        self.record(MockCall::CreateJob { namespace, name });
        Ok(())
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClientError> {
        self.check(MockOperation::DeleteJob)?;
        let slot = key(namespace, name);
        {
            let mut jobs = self.jobs.lock().unwrap();
            if !jobs.contains_key(&slot) {
                return Err(ClientError::NotFound(format!("Job {}/{}", namespace, name)));
            }
            if !self.terminating.lock().unwrap().contains(&slot) {
                jobs.remove(&slot);
            }
        }
        self.record(MockCall::DeleteJob {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn job(name: &str) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("fencing".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_names() {
        let mock = MockClusterClient::new();
        mock.create_job(&job("fence-a")).await.unwrap();

        let second = mock.create_job(&job("fence-a")).await;
        assert!(
            matches!(second, Err(ClientError::AlreadyExists(_))),
            "Second create with the same name should fail"
        );
        assert_eq!(mock.job_count(), 1);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_terminating_job_survives_delete() {
        let mock = MockClusterClient::new();
        mock.create_job(&job("fence-a")).await.unwrap();
        mock.keep_terminating("fence-a", "fencing");

        mock.delete_job("fence-a", "fencing").await.unwrap();
        assert_eq!(mock.job_count(), 1);
        assert!(matches!(
            mock.create_job(&job("fence-a")).await,
            Err(ClientError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_patch_missing_node_is_not_found() {
        let mock = MockClusterClient::new();
        let result = mock
            .patch_node_annotations("ghost", &AnnotationPatch::new().remove("fencing/state"))
            .await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures_until_cleared() {
        let mock = MockClusterClient::new();
        mock.fail_on(MockOperation::GetJob);
        assert!(mock.get_job("fence-a", "fencing").await.is_err());

        mock.clear_failures();
        assert!(mock.get_job("fence-a", "fencing").await.unwrap().is_none());
    }
}
