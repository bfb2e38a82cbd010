//! Deferred re-check of pending nodes.
//!
//! While a node waits out its grace period, an armed task drops the node's
//! `fencing/timestamp` once the period has elapsed. The annotation change
//! re-triggers the node through the watch, and the next pass moves it on to
//! `started`. Tasks live only in memory: after a restart the next event
//! re-derives the remaining time from the persisted timestamp.

use crate::state::timestamp_removal;
use fencing_client::ClusterClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct ArmedRecheck {
    generation: u64,
    deadline: i64,
    handle: JoinHandle<()>,
}

/// One cancellable timer per node, keyed by node name and arming generation.
pub struct RecheckScheduler {
    client: Arc<dyn ClusterClient>,
    armed: Arc<Mutex<HashMap<String, ArmedRecheck>>>,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for RecheckScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecheckScheduler")
            .field("armed", &self.armed_count())
            .finish_non_exhaustive()
    }
}

impl RecheckScheduler {
    /// Creates a scheduler that patches nodes through `client`.
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            armed: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Arms a re-check for `node` firing after `delay`, for the grace period
    /// ending at `deadline` (Unix seconds).
    ///
    /// Re-arming for the same deadline keeps the existing task; a different
    /// deadline replaces it. Returns true when a new task was spawned.
    pub fn arm(&self, node: &str, deadline: i64, delay: Duration) -> bool {
        let Ok(mut armed) = self.armed.lock() else {
            warn!("Recheck registry poisoned, not arming {}", node);
            return false;
        };

        if let Some(existing) = armed.get(node) {
            if existing.deadline == deadline && !existing.handle.is_finished() {
                debug!("Recheck for {} already armed (generation {})", node, existing.generation);
                return false;
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.armed);
        let node_name = node.to_string();

        info!("Waiting {} seconds, if {} comes back online", delay.as_secs(), node);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            debug!("Grace period for {} elapsed, dropping timestamp", node_name);
            if let Err(e) = client
                .patch_node_annotations(&node_name, &timestamp_removal())
                .await
            {
                warn!("Failed to drop fencing timestamp on {}: {}", node_name, e);
            }

            if let Ok(mut armed) = registry.lock() {
                if armed.get(&node_name).is_some_and(|a| a.generation == generation) {
                    armed.remove(&node_name);
                }
            }
        });

        if let Some(previous) = armed.insert(
            node.to_string(),
            ArmedRecheck {
                generation,
                deadline,
                handle,
            },
        ) {
            previous.handle.abort();
        }
        true
    }

    /// Cancels any re-check armed for `node`.
    pub fn cancel(&self, node: &str) {
        if let Ok(mut armed) = self.armed.lock() {
            if let Some(previous) = armed.remove(node) {
                debug!("Cancelled recheck for {} (generation {})", node, previous.generation);
                previous.handle.abort();
            }
        }
    }

    /// True when a re-check is pending for `node`.
    #[cfg(test)]
    pub fn is_armed(&self, node: &str) -> bool {
        self.armed
            .lock()
            .map(|armed| armed.get(node).is_some_and(|a| !a.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Number of armed re-checks.
    pub fn armed_count(&self) -> usize {
        self.armed.lock().map(|armed| armed.len()).unwrap_or(0)
    }
}

impl Drop for RecheckScheduler {
    fn drop(&mut self) {
        if let Ok(mut armed) = self.armed.lock() {
            for (_, recheck) in armed.drain() {
                recheck.handle.abort();
            }
        }
    }
}
