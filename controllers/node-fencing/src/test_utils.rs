//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::metrics::Metrics;
use crate::reconciler::{Clock, Reconciler};
use fencing_client::MockClusterClient;
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus, PodTemplate, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Namespace used by reconciler tests
pub const TEST_NAMESPACE: &str = "fencing-system";

fn to_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Helper to create a test Node with a Ready condition
pub fn create_test_node(
    name: &str,
    annotations: &[(&str, &str)],
    ready_status: &str,
    ready_reason: &str,
) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(format!("uid-{}", name)),
            annotations: Some(to_map(annotations)),
            ..Default::default()
        },
        spec: None,
        status: Some(NodeStatus {
            conditions: Some(vec![
                NodeCondition {
                    type_: "MemoryPressure".to_string(),
                    status: "False".to_string(),
                    ..Default::default()
                },
                NodeCondition {
                    type_: "Ready".to_string(),
                    status: ready_status.to_string(),
                    reason: Some(ready_reason.to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
    }
}

/// Helper to create a node the node controller can no longer reach
pub fn create_unreachable_node(name: &str, annotations: &[(&str, &str)]) -> Node {
    create_test_node(name, annotations, "Unknown", "NodeStatusUnknown")
}

/// Helper to create a healthy node
pub fn create_ready_node(name: &str, annotations: &[(&str, &str)]) -> Node {
    create_test_node(name, annotations, "True", "KubeletReady")
}

/// Helper to create a test PodTemplate
pub fn create_test_pod_template(
    name: &str,
    namespace: &str,
    annotations: &[(&str, &str)],
    pod_name: Option<&str>,
) -> PodTemplate {
    PodTemplate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(to_map(annotations)),
            ..Default::default()
        },
        template: Some(PodTemplateSpec {
            metadata: Some(ObjectMeta {
                name: pod_name.map(str::to_string),
                ..Default::default()
            }),
            spec: None,
        }),
    }
}

/// Clock whose time only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Helper to create a reconciler backed by a mock client and a manual clock
pub fn create_test_reconciler(mock: &MockClusterClient, clock: Arc<ManualClock>) -> Reconciler {
    Reconciler::new(
        Arc::new(mock.clone()),
        TEST_NAMESPACE.to_string(),
        clock,
        Metrics::new().unwrap(),
    )
}
