//! Import of the flat, most-recent-first history list older documents carry.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{info, warn};

use timeline_types::SnapshotId;

use crate::error::{HistoryError, HistoryResult};
use crate::node::SnapshotNode;
use crate::store::SnapshotStore;

/// Note stored on an imported item: its own string `"note"` if it has one.
fn legacy_note(item: &Value, fallback: &str) -> String {
    item.get("note")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

impl SnapshotStore {
    /// Turn a legacy history list into one linear chain on the default branch.
    ///
    /// `items` is newest first, so the chain is built from the back: the last
    /// item becomes the root and the first item becomes the tip. The default
    /// branch and HEAD both end up on that tip. Returns how many snapshots
    /// were created.
    ///
    /// An empty list is a no-op, and so is a store that already holds
    /// snapshots: the import only ever seeds an empty history.
    pub fn migrate_legacy(&mut self, items: &[Value]) -> HistoryResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        if !self.is_empty() {
            warn!(
                existing = self.len(),
                legacy = items.len(),
                "history already populated, skipping legacy import"
            );
            return Ok(0);
        }

        self.import_chain(items, SnapshotId::generate)
    }

    /// Build the whole chain, check every id, then insert it in one go.
    ///
    /// On a duplicate id the store is left exactly as it was.
    fn import_chain(
        &mut self,
        items: &[Value],
        mut next_id: impl FnMut() -> SnapshotId,
    ) -> HistoryResult<usize> {
        let mut chain: Vec<SnapshotNode> = Vec::with_capacity(items.len());
        let mut taken: HashSet<SnapshotId> = HashSet::with_capacity(items.len());
        let mut parent: Option<SnapshotId> = None;
        for item in items.iter().rev() {
            let id = next_id();
            if self.contains(&id) || !taken.insert(id.clone()) {
                return Err(HistoryError::DuplicateId(id));
            }
            let note = legacy_note(item, &self.config.legacy_note);
            chain.push(SnapshotNode::new(
                id.clone(),
                parent.replace(id),
                self.next_timestamp(),
                item.clone(),
                note,
            ));
        }

        for node in chain {
            self.insert_node(node)?;
        }

        let branch = self.config.default_branch.clone();
        self.branches.set_tip(&branch, parent.clone());
        self.head = parent;

        info!(
            imported = items.len(),
            %branch,
            head = ?self.head.as_ref().map(SnapshotId::short),
            "migrated legacy history"
        );
        Ok(items.len())
    }
}
