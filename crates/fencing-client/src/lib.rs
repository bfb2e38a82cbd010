//! Cluster API Client for the node fencing controller
//!
//! Thin, mockable access to the handful of Kubernetes operations the fencing
//! controller needs: reading and annotation-patching `Node`s, reading
//! `PodTemplate`s, and supervising remediation `Job`s.
//!
//! # Example
//!
//! ```no_run
//! use fencing_client::{AnnotationPatch, ClusterClient, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::new(kube::Client::try_default().await?);
//!
//! if let Some(node) = client.get_node("worker-1").await? {
//!     println!("found {:?}", node.metadata.name);
//! }
//!
//! let patch = AnnotationPatch::new().remove("fencing/timestamp");
//! client.patch_node_annotations("worker-1", &patch).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClient;
pub use error::ClientError;
pub use models::AnnotationPatch;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockClusterClient, MockOperation};
