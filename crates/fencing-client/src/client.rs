//! Kubernetes-backed cluster client

use crate::cluster_trait::ClusterClient;
use crate::error::ClientError;
use crate::models::AnnotationPatch;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Node, PodTemplate};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// Cluster client talking to the Kubernetes API server through kube-rs.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wraps an existing kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn pod_templates(&self, namespace: &str) -> Api<PodTemplate> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_node(&self, name: &str) -> Result<Option<Node>, ClientError> {
        Ok(self.nodes().get_opt(name).await?)
    }

    async fn patch_node_annotations(
        &self,
        name: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), ClientError> {
        let body = patch.to_merge_patch();
        debug!("Patching node {} annotations: {}", name, body);
        self.nodes()
            .patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }

    async fn get_pod_template(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PodTemplate>, ClientError> {
        Ok(self.pod_templates(namespace).get_opt(name).await?)
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, ClientError> {
        Ok(self.jobs(namespace).get_opt(name).await?)
    }

    async fn create_job(&self, job: &Job) -> Result<(), ClientError> {
        let namespace = job
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| ClientError::Api("Job is missing a namespace".to_string()))?;
        match self.jobs(namespace).create(&PostParams::default(), job).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 409 => {
                Err(ClientError::AlreadyExists(format!(
                    "Job {}/{}",
                    namespace,
                    job.metadata.name.as_deref().unwrap_or_default()
                )))
            }
            Err(e) => Err(ClientError::Kube(e)),
        }
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClientError> {
        // Background propagation removes the job's pods along with it
        match self.jobs(namespace).delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 404 => Err(ClientError::NotFound(
                format!("Job {}/{}", namespace, name),
            )),
            Err(e) => Err(ClientError::Kube(e)),
        }
    }
}
