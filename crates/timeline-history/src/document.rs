//! Embedding a history tree in the editor's JSON document.
//!
//! The editor keeps the portable tree under one key of its document object
//! (`history_tree` by default). Documents written before the tree existed
//! carry a flat, newest-first list under another key (`prompt_history`),
//! which is imported the first time such a document is loaded. Once the tree
//! key has been written, even with no snapshots in it, the legacy list is
//! never read again.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use timeline_types::Clock;

use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::store::SnapshotStore;

/// Loads and saves the history tree held inside a host document.
pub struct HistoryDocument;

impl HistoryDocument {
    /// Build the store for `doc`, importing the legacy list if the tree is missing.
    pub fn load(doc: &Value, config: &HistoryConfig) -> HistoryResult<SnapshotStore> {
        Self::load_inner(doc, config, None)
    }

    /// Like [`load`](Self::load), stamping imported and future snapshots with `clock`.
    pub fn load_with_clock(
        doc: &Value,
        config: &HistoryConfig,
        clock: Arc<dyn Clock>,
    ) -> HistoryResult<SnapshotStore> {
        Self::load_inner(doc, config, Some(clock))
    }

    fn load_inner(
        doc: &Value,
        config: &HistoryConfig,
        clock: Option<Arc<dyn Clock>>,
    ) -> HistoryResult<SnapshotStore> {
        let fields = doc.as_object().ok_or_else(|| {
            HistoryError::InvalidDocument(format!("expected a JSON object, got {}", kind_of(doc)))
        })?;

        let tree = fields.get(&config.tree_key).unwrap_or(&Value::Null);
        let mut store = SnapshotStore::from_value_with_config(tree, config.clone())?;
        if let Some(clock) = clock {
            store = store.with_clock(clock);
        }

        if tree.is_null() {
            if let Some(Value::Array(items)) = fields.get(&config.legacy_key) {
                store.migrate_legacy(items)?;
            }
        }

        debug!(
            snapshots = store.len(),
            branches = store.branches().len(),
            "loaded history from document"
        );
        Ok(store)
    }

    /// Returns `true` if `doc` already holds a tree, empty or not.
    pub fn has_tree(doc: &Value, config: &HistoryConfig) -> bool {
        doc.get(&config.tree_key).is_some_and(|tree| !tree.is_null())
    }

    /// Write the store's portable form under the tree key of `doc`.
    ///
    /// Every other key, the legacy list included, is left untouched.
    pub fn store_into(
        store: &SnapshotStore,
        doc: &mut Value,
        config: &HistoryConfig,
    ) -> HistoryResult<()> {
        let kind = kind_of(doc);
        let fields = doc.as_object_mut().ok_or_else(|| {
            HistoryError::InvalidDocument(format!("expected a JSON object, got {kind}"))
        })?;
        fields.insert(config.tree_key.clone(), store.to_value()?);
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use timeline_types::SnapshotId;

    use super::*;

    #[test]
    fn document_without_history_loads_empty() {
        let doc = json!({"seed": 1, "camera": "static"});
        let store = HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.branches().tip("main"), Some(None));
    }

    #[test]
    fn legacy_list_is_imported_when_tree_is_missing() {
        let doc = json!({
            "seed": 1,
            "prompt_history": [
                {"current_prompt": "b", "note": "second"},
                {"current_prompt": "a", "note": "first"}
            ]
        });
        let store = HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.current().unwrap().note, "second");
    }

    #[test]
    fn legacy_list_ignored_when_tree_has_snapshots() {
        let mut seed = SnapshotStore::new();
        seed.commit(json!({"x": 1}), "tree").unwrap();
        let doc = json!({
            "history_tree": seed.to_value().unwrap(),
            "prompt_history": [{"note": "legacy"}]
        });
        let store = HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.current().unwrap().note, "tree");
    }

    #[test]
    fn legacy_list_is_not_reimported_after_deleting_everything() {
        let config = HistoryConfig::default();
        let mut doc = json!({"prompt_history": [{"note": "new"}, {"note": "old"}]});
        assert!(!HistoryDocument::has_tree(&doc, &config));

        let mut store = HistoryDocument::load(&doc, &config).unwrap();
        let ids: Vec<SnapshotId> = store.iter().map(|n| n.id.clone()).collect();
        for id in &ids {
            assert!(store.delete(id));
        }
        HistoryDocument::store_into(&store, &mut doc, &config).unwrap();
        assert!(HistoryDocument::has_tree(&doc, &config));

        let reloaded = HistoryDocument::load(&doc, &config).unwrap();
        assert_eq!(reloaded.len(), 0);
        assert!(reloaded.branches().is_empty());
        assert_eq!(reloaded.head(), None);
    }

    #[test]
    fn null_tree_still_imports_legacy() {
        let doc = json!({"history_tree": null, "prompt_history": [{"note": "x"}]});
        let store = HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_into_keeps_other_keys() {
        let mut doc = json!({"seed": 7, "prompt_history": [{"note": "old"}]});
        let mut store = HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap();
        store.commit(json!({"seed": 7}), "new").unwrap();

        HistoryDocument::store_into(&store, &mut doc, &HistoryConfig::default()).unwrap();
        assert_eq!(doc["seed"], json!(7));
        assert_eq!(doc["prompt_history"], json!([{"note": "old"}]));

        let reloaded = HistoryDocument::load(&doc, &HistoryConfig::default()).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn custom_keys_are_honored() {
        let config = HistoryConfig {
            tree_key: "timeline".into(),
            legacy_key: "snapshots".into(),
            ..HistoryConfig::default()
        };
        let mut doc = json!({"snapshots": [{"note": "only"}]});
        let store = HistoryDocument::load(&doc, &config).unwrap();
        assert_eq!(store.len(), 1);

        HistoryDocument::store_into(&store, &mut doc, &config).unwrap();
        assert!(doc.get("timeline").is_some());
        assert!(doc.get("history_tree").is_none());
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let err = HistoryDocument::load(&json!([1, 2]), &HistoryConfig::default()).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidDocument(_)));

        let mut doc = json!("text");
        let err = HistoryDocument::store_into(&SnapshotStore::new(), &mut doc, &HistoryConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("a string"));
    }
}
