//! # Retry Backoff
//!
//! Fibonacci backoff for nodes whose reconciliation failed and must be retried.
//! The sequence grows more slowly than exponential backoff, so a flapping API
//! server is retried promptly without being hammered.
//!
//! Calculations are in minutes: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in minutes (for reset)
    min_minutes: u64,
    /// Previous backoff value in minutes
    prev_minutes: u64,
    /// Current backoff value in minutes
    current_minutes: u64,
    /// Maximum backoff value in minutes
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with minimum and maximum values in minutes
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_minutes.saturating_mul(60));

        let next_minutes = self.prev_minutes.saturating_add(self.current_minutes);
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

/// Per-node backoff state, keyed by node name.
#[derive(Debug)]
pub struct RetryBackoff {
    min_minutes: u64,
    max_minutes: u64,
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl RetryBackoff {
    /// Creates a tracker whose sequences run from `min_minutes` to `max_minutes`.
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Next requeue delay for `node`, advancing its sequence.
    pub fn next_for(&self, node: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => states
                .entry(node.to_string())
                .or_insert_with(|| FibonacciBackoff::new(self.min_minutes, self.max_minutes))
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using default backoff", e);
                Duration::from_secs(self.min_minutes.saturating_mul(60))
            }
        }
    }

    /// Forget the sequence for `node` after a successful pass.
    pub fn reset(&self, node: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(node);
        }
    }
}
