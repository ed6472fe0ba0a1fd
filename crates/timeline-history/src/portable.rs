//! The plain, persisted form of a history tree.
//!
//! ```text
//! {
//!   "nodes":    { "<id>": { "id", "parent", "timestamp", "data", "note" }, ... },
//!   "branches": { "<name>": "<id>" | null, ... },
//!   "head_id":  "<id>" | null
//! }
//! ```
//!
//! Any of the three keys may be missing; loading substitutes the empty-store
//! value for each.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use timeline_types::SnapshotId;

use crate::branches::BranchTable;
use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::node::SnapshotNode;
use crate::store::SnapshotStore;

/// Wire shape of a [`SnapshotStore`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableHistory {
    /// Snapshots keyed by id.
    #[serde(default)]
    pub nodes: BTreeMap<SnapshotId, SnapshotNode>,
    /// Branch tips. `None` means the key was absent.
    #[serde(default)]
    pub branches: Option<BTreeMap<String, Option<SnapshotId>>>,
    /// The checked-out snapshot.
    #[serde(default)]
    pub head_id: Option<SnapshotId>,
}

impl SnapshotStore {
    /// Export the store in its persisted shape.
    pub fn to_portable(&self) -> PortableHistory {
        PortableHistory {
            nodes: self.nodes.clone(),
            branches: Some(self.branches.as_map().clone()),
            head_id: self.head.clone(),
        }
    }

    /// Rebuild a store with the default config.
    pub fn from_portable(portable: PortableHistory) -> Self {
        Self::from_portable_with_config(portable, HistoryConfig::default())
    }

    /// Rebuild a store; a missing branch table becomes `{default_branch: null}`.
    ///
    /// Nothing is validated here. Loaded data that breaks the store's
    /// invariants is kept as-is and reported by
    /// [`validate`](SnapshotStore::validate).
    pub fn from_portable_with_config(portable: PortableHistory, config: HistoryConfig) -> Self {
        let branches = match portable.branches {
            Some(map) => BranchTable::from_map(map),
            None => BranchTable::with_default(&config.default_branch),
        };
        Self::from_parts(portable.nodes, branches, portable.head_id, config)
    }

    /// Export the store as a JSON value.
    pub fn to_value(&self) -> HistoryResult<Value> {
        serde_json::to_value(self.to_portable())
            .map_err(|e| HistoryError::Serialization(e.to_string()))
    }

    /// Read a store from a JSON value with the default config.
    pub fn from_value(value: &Value) -> HistoryResult<Self> {
        Self::from_value_with_config(value, HistoryConfig::default())
    }

    /// Read a store from a JSON value.
    ///
    /// `null` reads as an empty store. Fails only when a present key holds
    /// the wrong type.
    pub fn from_value_with_config(value: &Value, config: HistoryConfig) -> HistoryResult<Self> {
        let portable = match value {
            Value::Null => PortableHistory::default(),
            other => PortableHistory::deserialize(other)
                .map_err(|e| HistoryError::Serialization(e.to_string()))?,
        };
        Ok(Self::from_portable_with_config(portable, config))
    }
}
