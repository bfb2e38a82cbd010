//! Annotation keys and literal values shared with operators and remediation jobs.

/// Persisted fencing state of a node
pub const STATE: &str = "fencing/state";
/// Unix seconds of the first sighting while pending
pub const TIMESTAMP: &str = "fencing/timestamp";
/// Opt-in switch; only `"true"` enables remediation
pub const ENABLED: &str = "fencing/enabled";
/// Name of the PodTemplate used to build the remediation job
pub const TEMPLATE: &str = "fencing/template";
/// Grace period in seconds before remediation starts
pub const TIMEOUT: &str = "fencing/timeout";
/// Remediation mode passed through to the job
pub const MODE: &str = "fencing/mode";
/// Identifier passed through to the job
pub const ID: &str = "fencing/id";
/// Node name stamped onto the job
pub const NODE: &str = "fencing/node";
/// Action the job runs once remediation is done
pub const AFTER_HOOK: &str = "fencing/after-hook";

/// Template used when a node does not name one
pub const DEFAULT_TEMPLATE: &str = "fencing";
/// Mode used when neither template nor node set one
pub const DEFAULT_MODE: &str = "flush";
/// Timeout used when neither template nor node set one
pub const DEFAULT_TIMEOUT: &str = "0";
/// Job name prefix when the template pod has no name
pub const DEFAULT_JOB_PREFIX: &str = "fence";

/// Label carrying the node name on remediation jobs
pub const NODE_LABEL: &str = "node";
/// Label marking remediation jobs
pub const FENCING_LABEL: &str = "fencing";
/// Value of [`FENCING_LABEL`]
pub const FENCING_LABEL_VALUE: &str = "fence";

/// Node readiness condition type
pub const NODE_READY: &str = "Ready";
/// Readiness reason set when the node controller lost contact with the kubelet
pub const NODE_STATUS_UNKNOWN: &str = "NodeStatusUnknown";
/// Job condition type of a job that ran to completion
pub const JOB_COMPLETE: &str = "Complete";
/// Job condition type of a job that gave up
pub const JOB_FAILED: &str = "Failed";
