//! Status condition lookup shared by nodes and jobs.

use k8s_openapi::api::batch::v1::{Job, JobCondition};
use k8s_openapi::api::core::v1::{Node, NodeCondition};

/// A status condition with a type discriminator.
pub trait Condition {
    /// The condition's `type` field.
    fn condition_type(&self) -> &str;
}

impl Condition for NodeCondition {
    fn condition_type(&self) -> &str {
        &self.type_
    }
}

impl Condition for JobCondition {
    fn condition_type(&self) -> &str {
        &self.type_
    }
}

/// Returns the first condition of `condition_type` and its index.
pub fn find_condition<'a, C: Condition>(
    conditions: &'a [C],
    condition_type: &str,
) -> Option<(usize, &'a C)> {
    conditions
        .iter()
        .enumerate()
        .find(|(_, c)| c.condition_type() == condition_type)
}

/// Looks up a condition on a node's status.
pub fn node_condition<'a>(node: &'a Node, condition_type: &str) -> Option<&'a NodeCondition> {
    let conditions = node.status.as_ref()?.conditions.as_deref()?;
    find_condition(conditions, condition_type).map(|(_, c)| c)
}

/// Looks up a condition on a job's status.
pub fn job_condition<'a>(job: &'a Job, condition_type: &str) -> Option<&'a JobCondition> {
    let conditions = job.status.as_ref()?.conditions.as_deref()?;
    find_condition(conditions, condition_type).map(|(_, c)| c)
}
