//! Fencing state codec.
//!
//! The fencing state machine is persisted as two node annotations,
//! `fencing/state` and `fencing/timestamp`. This module decodes them into a
//! [`FencingRecord`] and encodes transitions back into minimal merge patches.

use crate::annotations::{STATE, TIMESTAMP};
use fencing_client::AnnotationPatch;
use std::collections::BTreeMap;
use std::fmt;

/// Position of a node in the fencing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FencingState {
    /// No fencing annotation
    None,
    /// Unreachable, waiting out the grace period
    Pending,
    /// Remediation is running and will be repeated
    Started,
    /// Set externally once remediation is confirmed; the controller stands down
    Fenced,
    /// Became ready during this pass; never persisted
    Recovered,
}

impl FencingState {
    /// Annotation value written for this state, `None` when the key is absent.
    pub fn wire_value(self) -> Option<&'static str> {
        match self {
            FencingState::Pending => Some("pending"),
            FencingState::Started => Some("started"),
            FencingState::Fenced => Some("fenced"),
            FencingState::None | FencingState::Recovered => None,
        }
    }

    /// Decodes a persisted value, ignoring ASCII case.
    ///
    /// Returns `None` for values the controller does not write.
    fn from_wire(value: &str) -> Option<Self> {
        if value.is_empty() {
            return Some(FencingState::None);
        }
        [
            FencingState::Pending,
            FencingState::Started,
            FencingState::Fenced,
        ]
        .into_iter()
        .find(|state| {
            state
                .wire_value()
                .is_some_and(|wire| wire.eq_ignore_ascii_case(value.trim()))
        })
    }
}

impl fmt::Display for FencingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FencingState::None => "none",
            FencingState::Pending => "pending",
            FencingState::Started => "started",
            FencingState::Fenced => "fenced",
            FencingState::Recovered => "recovered",
        };
        f.write_str(name)
    }
}

/// The persisted fencing state of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencingRecord {
    /// Decoded state
    pub state: FencingState,
    /// First-sighting time in Unix seconds; `None` when absent or unparsable
    pub timestamp: Option<i64>,
    /// False when `fencing/state` holds a value the controller does not write
    pub recognized: bool,
    raw_state: Option<String>,
    raw_timestamp: Option<String>,
}

impl FencingRecord {
    /// Decodes the record from a node's annotations.
    pub fn decode(annotations: Option<&BTreeMap<String, String>>) -> Self {
        let raw_state = annotations.and_then(|a| a.get(STATE)).cloned();
        let raw_timestamp = annotations.and_then(|a| a.get(TIMESTAMP)).cloned();

        // Unrecognised values still block a first sighting and age out like a
        // pending record without a timestamp.
        let decoded = raw_state
            .as_deref()
            .map_or(Some(FencingState::None), FencingState::from_wire);
        let recognized = decoded.is_some();
        let state = decoded.unwrap_or(FencingState::Pending);
        let timestamp = raw_timestamp
            .as_deref()
            .and_then(|t| t.trim().parse::<i64>().ok())
            .filter(|t| *t != 0);

        Self {
            state,
            timestamp,
            recognized,
            raw_state,
            raw_timestamp,
        }
    }

    /// True when a ready node should have this record cleared.
    pub fn clears_on_recovery(&self) -> bool {
        self.recognized && matches!(self.state, FencingState::Pending | FencingState::Fenced)
    }

    /// Builds the minimal patch that moves this record to `next`.
    ///
    /// `timestamp` is only written for [`FencingState::Pending`]; every other
    /// target clears it.
    pub fn transition(&self, next: FencingState, timestamp: Option<i64>) -> AnnotationPatch {
        let mut patch = AnnotationPatch::new();

        match (next.wire_value(), self.raw_state.as_deref()) {
            (Some(want), Some(have)) if want == have => {}
            (Some(want), _) => patch = patch.set(STATE, want),
            (None, Some(_)) => patch = patch.remove(STATE),
            (None, None) => {}
        }

        let want_timestamp = timestamp
            .filter(|_| next == FencingState::Pending)
            .map(|t| t.to_string());
        match (want_timestamp, self.raw_timestamp.as_deref()) {
            (Some(want), Some(have)) if want == have => {}
            (Some(want), _) => patch = patch.set(TIMESTAMP, want),
            (None, Some(_)) => patch = patch.remove(TIMESTAMP),
            (None, None) => {}
        }

        patch
    }
}

/// Patch dropping only the timestamp, used once a grace period elapses.
pub fn timestamp_removal() -> AnnotationPatch {
    AnnotationPatch::new().remove(TIMESTAMP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_decode_absent() {
        let record = FencingRecord::decode(None);
        assert_eq!(record.state, FencingState::None);
        assert_eq!(record.timestamp, None);
    }

    #[test]
    fn test_decode_pending_with_timestamp() {
        let a = annotations(&[(STATE, "pending"), (TIMESTAMP, "1700000000")]);
        let record = FencingRecord::decode(Some(&a));
        assert_eq!(record.state, FencingState::Pending);
        assert_eq!(record.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn test_decode_bad_timestamp_is_absent() {
        let a = annotations(&[(STATE, "pending"), (TIMESTAMP, "yesterday")]);
        assert_eq!(FencingRecord::decode(Some(&a)).timestamp, None);
    }

    #[test]
    fn test_decode_unknown_state_as_pending() {
        let a = annotations(&[(STATE, "delayed")]);
        let record = FencingRecord::decode(Some(&a));
        assert_eq!(record.state, FencingState::Pending);
        assert!(!record.recognized);
        assert!(!record.clears_on_recovery());
    }

    #[test]
    fn test_decode_ignores_case() {
        for (raw, want) in [
            ("Fenced", FencingState::Fenced),
            ("FENCED", FencingState::Fenced),
            ("Started", FencingState::Started),
            ("Pending", FencingState::Pending),
        ] {
            let a = annotations(&[(STATE, raw)]);
            let record = FencingRecord::decode(Some(&a));
            assert_eq!(record.state, want, "decoding {raw}");
            assert!(record.recognized);
        }
    }

    #[test]
    fn test_only_owned_states_clear_on_recovery() {
        let fenced = annotations(&[(STATE, "Fenced")]);
        assert!(FencingRecord::decode(Some(&fenced)).clears_on_recovery());
        let started = annotations(&[(STATE, "started")]);
        assert!(!FencingRecord::decode(Some(&started)).clears_on_recovery());
        assert!(!FencingRecord::decode(None).clears_on_recovery());
    }

    #[test]
    fn test_first_sighting_patch() {
        let record = FencingRecord::decode(None);
        let patch = record.transition(FencingState::Pending, Some(42));
        assert_eq!(patch.get(STATE), Some(Some("pending")));
        assert_eq!(patch.get(TIMESTAMP), Some(Some("42")));
    }

    #[test]
    fn test_start_clears_timestamp() {
        let a = annotations(&[(STATE, "pending"), (TIMESTAMP, "42")]);
        let patch = FencingRecord::decode(Some(&a)).transition(FencingState::Started, Some(42));
        assert_eq!(patch.get(STATE), Some(Some("started")));
        assert_eq!(patch.get(TIMESTAMP), Some(None));
    }

    #[test]
    fn test_start_without_timestamp_only_touches_state() {
        let patch = FencingRecord::decode(None).transition(FencingState::Started, None);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get(STATE), Some(Some("started")));
    }

    #[test]
    fn test_recovery_removes_present_keys() {
        let a = annotations(&[(STATE, "fenced"), (TIMESTAMP, "42")]);
        let patch = FencingRecord::decode(Some(&a)).transition(FencingState::Recovered, None);
        assert_eq!(patch.get(STATE), Some(None));
        assert_eq!(patch.get(TIMESTAMP), Some(None));
    }

    #[test]
    fn test_unchanged_state_yields_empty_patch() {
        let a = annotations(&[(STATE, "started")]);
        let patch = FencingRecord::decode(Some(&a)).transition(FencingState::Started, None);
        assert!(patch.is_empty());
    }
}
