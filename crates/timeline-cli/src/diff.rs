//! Payload diff: compare a snapshot with the live document.
//!
//! Both sides are JSON objects. The snapshot is the old state and the
//! document the new one, so `Added` keys exist only in the document and
//! `Removed` keys only in the snapshot. History keys and the editor's
//! transient keys are skipped.

use serde::Serialize;
use serde_json::{Map, Value};

use timeline_history::HistoryConfig;

/// The result of comparing two payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PayloadDiff {
    pub changes: Vec<PayloadChange>,
}

impl PayloadDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, PayloadChange::Added { .. }))
            .count()
    }

    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, PayloadChange::Removed { .. }))
            .count()
    }

    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, PayloadChange::Modified { .. }))
            .count()
    }
}

/// A single top-level key that differs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum PayloadChange {
    Added { key: String, value: Value },
    Removed { key: String, value: Value },
    Modified { key: String, old: Value, new: Value },
}

/// Keys never compared: the history itself plus `config.diff_ignore`.
fn ignored(key: &str, config: &HistoryConfig) -> bool {
    key == config.tree_key
        || key == config.legacy_key
        || config.diff_ignore.iter().any(|k| k == key)
}

/// Diff two top-level objects, in key order.
pub fn diff_payloads(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    config: &HistoryConfig,
) -> PayloadDiff {
    let mut changes = Vec::new();

    for (key, old_val) in old.iter().filter(|(k, _)| !ignored(k, config)) {
        match new.get(key) {
            Some(new_val) if new_val != old_val => changes.push(PayloadChange::Modified {
                key: key.clone(),
                old: old_val.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => changes.push(PayloadChange::Removed {
                key: key.clone(),
                value: old_val.clone(),
            }),
        }
    }

    for (key, new_val) in new.iter().filter(|(k, _)| !ignored(k, config)) {
        if !old.contains_key(key) {
            changes.push(PayloadChange::Added {
                key: key.clone(),
                value: new_val.clone(),
            });
        }
    }

    PayloadDiff { changes }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn identical_payloads_no_diff() {
        let state = obj(json!({"seed": 1, "prompt": "cat"}));
        assert!(diff_payloads(&state, &state, &HistoryConfig::default()).is_empty());
    }

    #[test]
    fn mixed_changes() {
        let old = obj(json!({"keep": true, "seed": 1, "gone": "x"}));
        let new = obj(json!({"keep": true, "seed": 2, "fresh": [1, 2]}));

        let diff = diff_payloads(&old, &new, &HistoryConfig::default());
        assert_eq!(diff.len(), 3);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.removals(), 1);
        assert_eq!(diff.modifications(), 1);

        match &diff.changes[0] {
            PayloadChange::Removed { key, value } => {
                assert_eq!(key, "gone");
                assert_eq!(*value, json!("x"));
            }
            other => panic!("expected Removed, got {other:?}"),
        }
    }

    #[test]
    fn history_and_transient_keys_are_skipped() {
        let old = obj(json!({"seed": 1, "batch_data": [1]}));
        let new = obj(json!({
            "seed": 1,
            "history_tree": {},
            "prompt_history": [],
            "batch_data": [2],
            "ui_reset_token": 9
        }));
        assert!(diff_payloads(&old, &new, &HistoryConfig::default()).is_empty());
    }

    #[test]
    fn change_serializes_with_tag() {
        let change = PayloadChange::Modified {
            key: "seed".into(),
            old: json!(1),
            new: json!(2),
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"change": "modified", "key": "seed", "old": 1, "new": 2})
        );
    }
}
