//! Branch table and HEAD state.
//!
//! A branch is a named pointer to the latest snapshot of one line of work.
//! The table is kept in name order; when several branches share a tip, the
//! first one in that order is the one a commit advances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use timeline_types::SnapshotId;

/// Mapping from branch name to tip snapshot (`None` until the first commit).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchTable {
    tips: BTreeMap<String, Option<SnapshotId>>,
}

impl BranchTable {
    /// A table holding a single, still-empty branch.
    pub fn with_default(name: &str) -> Self {
        let mut tips = BTreeMap::new();
        tips.insert(name.to_string(), None);
        Self { tips }
    }

    /// Build a table from raw entries.
    pub fn from_map(tips: BTreeMap<String, Option<SnapshotId>>) -> Self {
        Self { tips }
    }

    /// The raw entries.
    pub fn as_map(&self) -> &BTreeMap<String, Option<SnapshotId>> {
        &self.tips
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.tips.len()
    }

    /// Returns `true` if no branch exists.
    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    /// Returns `true` if a branch with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tips.contains_key(name)
    }

    /// Tip of the named branch. `None` if the branch is missing; `Some(None)`
    /// if it exists but has no commits yet.
    pub fn tip(&self, name: &str) -> Option<Option<&SnapshotId>> {
        self.tips.get(name).map(Option::as_ref)
    }

    /// First branch whose tip equals `tip`.
    ///
    /// An empty tip matches an empty `tip`, which is how the default branch
    /// receives the first commit of a fresh store.
    pub fn branch_at(&self, tip: Option<&SnapshotId>) -> Option<&str> {
        self.tips
            .iter()
            .find(|&(_, t)| t.as_ref() == tip)
            .map(|(name, _)| name.as_str())
    }

    /// Point `name` at `tip`, creating the branch if needed.
    pub fn set_tip(&mut self, name: &str, tip: Option<SnapshotId>) {
        self.tips.insert(name.to_string(), tip);
    }

    /// Remove every branch pointing at `id`, returning the removed names.
    pub fn prune_tip(&mut self, id: &SnapshotId) -> Vec<String> {
        let doomed: Vec<String> = self
            .tips
            .iter()
            .filter(|&(_, t)| t.as_ref() == Some(id))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &doomed {
            self.tips.remove(name);
        }
        doomed
    }

    /// `<prefix>_<n>` for the smallest positive `n` not already taken.
    pub fn next_fork_name(&self, prefix: &str) -> String {
        (1u64..)
            .map(|n| format!("{prefix}_{n}"))
            .find(|name| !self.tips.contains_key(name))
            .unwrap_or_else(|| format!("{prefix}_{}", self.tips.len() + 1))
    }

    /// Iterate `(name, tip)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&SnapshotId>)> {
        self.tips.iter().map(|(name, tip)| (name.as_str(), tip.as_ref()))
    }
}

/// Where HEAD currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadState {
    /// The store holds no snapshot to point at.
    Empty,
    /// HEAD is the tip of the named branch; a commit extends it.
    OnTip(String),
    /// HEAD is a historical snapshot; a commit forks a new branch.
    Detached(SnapshotId),
}

impl HeadState {
    /// Returns `true` if a commit from here would fork.
    pub fn is_detached(&self) -> bool {
        matches!(self, HeadState::Detached(_))
    }
}
