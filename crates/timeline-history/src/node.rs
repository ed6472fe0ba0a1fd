//! The commit node stored for every snapshot.
//!
//! A [`SnapshotNode`] pairs an opaque payload with its parent and metadata.
//! Nodes are never modified after creation except for their note, so the
//! history is append-only: revising an old state means committing a new node
//! whose parent is the old one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use timeline_types::{SnapshotId, Timestamp};

/// A single snapshot in the history tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Identifier of this snapshot.
    pub id: SnapshotId,
    /// The snapshot this one was committed on top of (`None` for roots).
    pub parent: Option<SnapshotId>,
    /// Creation time, for ordering and display only.
    pub timestamp: Timestamp,
    /// The caller's document at commit time. Never interpreted.
    #[serde(rename = "data", default)]
    pub payload: Value,
    /// Human-readable label; the only field that may change.
    #[serde(default)]
    pub note: String,
}

impl SnapshotNode {
    /// Create a node.
    pub fn new(
        id: SnapshotId,
        parent: Option<SnapshotId>,
        timestamp: Timestamp,
        payload: Value,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parent,
            timestamp,
            payload,
            note: note.into(),
        }
    }

    /// Returns `true` if this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// One-line description: note and short id.
    pub fn summary(&self) -> String {
        format!("{} ({})", self.note, self.id.short())
    }
}
