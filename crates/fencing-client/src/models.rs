//! Wire-level request models

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// A partial update of a node's annotations with JSON merge-patch semantics.
///
/// Keys set to a value are written, keys marked for removal are deleted, and
/// keys that are not mentioned are left untouched on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationPatch {
    changes: BTreeMap<String, Option<String>>,
}

impl AnnotationPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `key=value`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.changes.insert(key.into(), Some(value.into()));
        self
    }

    /// Deletes `key`.
    #[must_use]
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.changes.insert(key.into(), None);
        self
    }

    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of keys touched by the patch.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The change recorded for `key`: `Some(Some(v))` for a write,
    /// `Some(None)` for a removal, `None` when the key is untouched.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.changes.get(key).map(Option::as_deref)
    }

    /// Renders the patch as a merge patch body against object metadata.
    pub fn to_merge_patch(&self) -> Value {
        let annotations: Map<String, Value> = self
            .changes
            .iter()
            .map(|(k, v)| {
                let value = v.as_ref().map_or(Value::Null, |s| Value::String(s.clone()));
                (k.clone(), value)
            })
            .collect();

        json!({
            "metadata": {
                "annotations": annotations
            }
        })
    }

    /// Applies the patch to a local annotation map the way the API server would.
    pub fn apply_to(&self, annotations: &mut BTreeMap<String, String>) {
        for (key, value) in &self.changes {
            match value {
                Some(v) => {
                    annotations.insert(key.clone(), v.clone());
                }
                None => {
                    annotations.remove(key);
                }
            }
        }
    }
}
