//! Remediation Job construction.
//!
//! Builds the Job that fences a node from the node itself and the PodTemplate
//! it references. The result depends only on its inputs, so rebuilding it on
//! every pass always yields the same name and spec.

use crate::annotations::{
    AFTER_HOOK, DEFAULT_JOB_PREFIX, DEFAULT_MODE, DEFAULT_TEMPLATE, DEFAULT_TIMEOUT, FENCING_LABEL,
    FENCING_LABEL_VALUE, ID, MODE, NODE, NODE_LABEL, TEMPLATE, TIMEOUT,
};
use k8s_openapi::Resource;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Node, PodTemplate};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Keys that fall back to a literal and can be overridden by template and node.
const OVERRIDABLE: [(&str, &str); 3] = [
    (MODE, DEFAULT_MODE),
    (TEMPLATE, DEFAULT_TEMPLATE),
    (TIMEOUT, DEFAULT_TIMEOUT),
];

type Annotations = BTreeMap<String, String>;

fn first_of<'a>(sources: &[&'a Annotations], key: &str) -> Option<&'a String> {
    sources.iter().find_map(|source| source.get(key))
}

/// Resolves the annotations stamped onto the remediation job and its pod.
///
/// Layers, later wins:
/// 1. literal defaults for the overridable keys
/// 2. template annotations for those keys
/// 3. node annotations for those keys
/// 4. every annotation on the template's pod spec
///
/// Then forced: `fencing/node`, `fencing/id` (node, template, node name) and
/// `fencing/after-hook` where the template beats the node.
pub fn resolve_annotations(
    node_name: &str,
    node_annotations: &Annotations,
    template_annotations: &Annotations,
    pod_annotations: &Annotations,
) -> Annotations {
    let mut resolved: Annotations = OVERRIDABLE
        .iter()
        .map(|(key, default)| ((*key).to_string(), (*default).to_string()))
        .collect();

    for source in [template_annotations, node_annotations] {
        for (key, _) in OVERRIDABLE {
            if let Some(value) = source.get(key) {
                resolved.insert(key.to_string(), value.clone());
            }
        }
    }

    resolved.extend(pod_annotations.iter().map(|(k, v)| (k.clone(), v.clone())));

    resolved.insert(NODE.to_string(), node_name.to_string());

    let id = first_of(&[node_annotations, template_annotations], ID)
        .cloned()
        .unwrap_or_else(|| node_name.to_string());
    resolved.insert(ID.to_string(), id);

    if let Some(hook) = first_of(&[template_annotations, node_annotations], AFTER_HOOK) {
        resolved.insert(AFTER_HOOK.to_string(), hook.clone());
    }

    resolved
}

/// Builds the remediation job for `node` from `template` in `namespace`.
pub fn build_job(node: &Node, template: &PodTemplate, namespace: &str) -> Job {
    let empty = Annotations::new();
    let node_name = node.metadata.name.clone().unwrap_or_default();
    let node_annotations = node.metadata.annotations.as_ref().unwrap_or(&empty);
    let template_annotations = template.metadata.annotations.as_ref().unwrap_or(&empty);

    let mut pod = template.template.clone().unwrap_or_default();
    let pod_meta = pod.metadata.get_or_insert_with(ObjectMeta::default);
    let pod_annotations = pod_meta.annotations.clone().unwrap_or_default();

    let annotations = resolve_annotations(
        &node_name,
        node_annotations,
        template_annotations,
        &pod_annotations,
    );
    pod_meta.annotations = Some(annotations.clone());

    let prefix = pod_meta
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_JOB_PREFIX);
    let name = format!("{}-{}", prefix, node_name);

    let labels = BTreeMap::from([
        (NODE_LABEL.to_string(), node_name.clone()),
        (FENCING_LABEL.to_string(), FENCING_LABEL_VALUE.to_string()),
    ]);

    let owner = OwnerReference {
        api_version: Node::API_VERSION.to_string(),
        kind: Node::KIND.to_string(),
        name: node_name,
        uid: node.metadata.uid.clone().unwrap_or_default(),
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: pod,
            ..Default::default()
        }),
        status: None,
    }
}
