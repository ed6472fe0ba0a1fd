//! The snapshot store: commits, branches, and HEAD.
//!
//! [`SnapshotStore`] keeps every snapshot in a [`BTreeMap`] keyed by id,
//! alongside the [`BranchTable`] and the HEAD pointer. It never touches
//! storage; callers load it from and save it to their own documents through
//! the portable form.
//!
//! # Invariants
//!
//! - Every parent, branch tip, and HEAD created by the store resolves to an
//!   existing snapshot. Only [`delete`] can break a parent link, leaving the
//!   children of the deleted snapshot orphaned.
//! - Snapshot ids are unique; an insert with a taken id is rejected.
//! - Snapshots are append-only; only the note can change.
//! - Timestamps handed out by the store never decrease.
//!
//! [`delete`]: SnapshotStore::delete

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use timeline_types::{Clock, SnapshotId, SystemClock, Timestamp};

use crate::branches::{BranchTable, HeadState};
use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::node::SnapshotNode;

/// A branchable, append-only history of document snapshots.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    pub(crate) nodes: BTreeMap<SnapshotId, SnapshotNode>,
    pub(crate) branches: BranchTable,
    pub(crate) head: Option<SnapshotId>,
    pub(crate) config: HistoryConfig,
    clock: Arc<dyn Clock>,
    /// Greatest timestamp ever held; new snapshots are never stamped earlier.
    high_water: Timestamp,
}

impl SnapshotStore {
    /// An empty store with the default config and the system clock.
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    /// An empty store using `config`.
    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            nodes: BTreeMap::new(),
            branches: BranchTable::with_default(&config.default_branch),
            head: None,
            config,
            clock: Arc::new(SystemClock),
            high_water: Timestamp::zero(),
        }
    }

    /// Replace the clock used to stamp new snapshots.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Assemble a store from already-loaded parts.
    pub(crate) fn from_parts(
        nodes: BTreeMap<SnapshotId, SnapshotNode>,
        branches: BranchTable,
        head: Option<SnapshotId>,
        config: HistoryConfig,
    ) -> Self {
        let high_water = nodes
            .values()
            .map(|n| n.timestamp)
            .max()
            .unwrap_or_else(Timestamp::zero);
        Self {
            nodes,
            branches,
            head,
            config,
            clock: Arc::new(SystemClock),
            high_water,
        }
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Record `payload` as a new snapshot on top of HEAD and return its id.
    ///
    /// If HEAD is the tip of a branch, that branch advances to the new
    /// snapshot. Otherwise HEAD is historical and a new `<fork_prefix>_<n>`
    /// branch is created for the new snapshot; no existing branch moves.
    /// HEAD always ends up on the new snapshot.
    pub fn commit(&mut self, payload: Value, note: impl Into<String>) -> HistoryResult<SnapshotId> {
        self.commit_as(SnapshotId::generate(), payload, note.into())
    }

    fn commit_as(
        &mut self,
        id: SnapshotId,
        payload: Value,
        note: String,
    ) -> HistoryResult<SnapshotId> {
        if self.nodes.contains_key(&id) {
            return Err(HistoryError::DuplicateId(id));
        }

        let active = self.branches.branch_at(self.head.as_ref()).map(str::to_owned);
        let parent = self.head.clone().filter(|h| self.nodes.contains_key(h));
        let timestamp = self.next_timestamp();
        self.insert_node(SnapshotNode::new(id.clone(), parent, timestamp, payload, note))?;

        match active {
            Some(branch) => {
                self.branches.set_tip(&branch, Some(id.clone()));
                debug!(snapshot = %id.short(), %branch, "advanced branch");
            }
            None => {
                let branch = self.branches.next_fork_name(&self.config.fork_prefix);
                self.branches.set_tip(&branch, Some(id.clone()));
                debug!(
                    snapshot = %id.short(),
                    from = ?self.head.as_ref().map(SnapshotId::short),
                    %branch,
                    "forked new branch"
                );
            }
        }

        self.head = Some(id.clone());
        Ok(id)
    }

    /// Move HEAD to `id` and return its payload.
    ///
    /// Returns `None` and leaves the store untouched if `id` is unknown.
    /// Branches never move on checkout.
    pub fn checkout(&mut self, id: &SnapshotId) -> Option<&Value> {
        let node = self.nodes.get(id)?;
        self.head = Some(id.clone());
        debug!(snapshot = %id.short(), "checked out");
        Some(&node.payload)
    }

    /// Replace the note of `id`. Returns `false` if `id` is unknown.
    pub fn rename(&mut self, id: &SnapshotId, note: impl Into<String>) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.note = note.into();
                debug!(snapshot = %id.short(), note = %node.note, "renamed");
                true
            }
            None => false,
        }
    }

    /// Remove `id` from the store. Returns `false` if `id` is unknown.
    ///
    /// Branches whose tip is `id` are removed outright rather than rolled
    /// back to the parent. If `id` was HEAD, HEAD moves to the most recent
    /// remaining snapshot, or to nothing. Children of `id` keep their parent
    /// link and become an orphaned subtree.
    pub fn delete(&mut self, id: &SnapshotId) -> bool {
        if self.nodes.remove(id).is_none() {
            return false;
        }

        let pruned = self.branches.prune_tip(id);
        if self.head.as_ref() == Some(id) {
            self.head = self.latest().map(|n| n.id.clone());
        }

        debug!(
            snapshot = %id.short(),
            ?pruned,
            head = ?self.head.as_ref().map(SnapshotId::short),
            "deleted"
        );
        true
    }

    /// Add a fully formed node, rejecting duplicate ids.
    pub(crate) fn insert_node(&mut self, node: SnapshotNode) -> HistoryResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(HistoryError::DuplicateId(node.id));
        }
        self.high_water = self.high_water.max(node.timestamp);
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub(crate) fn next_timestamp(&self) -> Timestamp {
        self.clock.now().max(self.high_water)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the store holds no snapshot.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a snapshot.
    pub fn get(&self, id: &SnapshotId) -> Option<&SnapshotNode> {
        self.nodes.get(id)
    }

    /// Returns `true` if `id` names a snapshot in the store.
    pub fn contains(&self, id: &SnapshotId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The checked-out snapshot id.
    pub fn head(&self) -> Option<&SnapshotId> {
        self.head.as_ref()
    }

    /// The checked-out snapshot.
    pub fn current(&self) -> Option<&SnapshotNode> {
        self.head.as_ref().and_then(|id| self.nodes.get(id))
    }

    /// The branch table (read-only).
    pub fn branches(&self) -> &BranchTable {
        &self.branches
    }

    /// All snapshots in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotNode> {
        self.nodes.values()
    }

    /// Whether HEAD is empty, on a branch tip, or detached.
    pub fn head_state(&self) -> HeadState {
        match &self.head {
            None => HeadState::Empty,
            Some(id) => match self.branches.branch_at(Some(id)) {
                Some(branch) => HeadState::OnTip(branch.to_string()),
                None => HeadState::Detached(id.clone()),
            },
        }
    }

    /// The first branch (in name order) whose tip is `id`.
    pub fn tip_branch(&self, id: &SnapshotId) -> Option<&str> {
        self.branches.branch_at(Some(id))
    }

    /// The chain from `id` back to its root, starting with `id` itself.
    ///
    /// Stops early at a missing parent. Empty if `id` is unknown.
    pub fn lineage(&self, id: &SnapshotId) -> Vec<&SnapshotNode> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.nodes.get(id);
        while let Some(node) = cursor {
            if !seen.insert(&node.id) {
                break;
            }
            chain.push(node);
            cursor = node.parent.as_ref().and_then(|p| self.nodes.get(p));
        }
        chain
    }

    /// Snapshots committed directly on top of `id`, oldest first.
    pub fn children(&self, id: &SnapshotId) -> Vec<&SnapshotNode> {
        let mut kids: Vec<&SnapshotNode> = self
            .nodes
            .values()
            .filter(|n| n.parent.as_ref() == Some(id))
            .collect();
        kids.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        kids
    }

    /// Snapshots with no parent, oldest first.
    pub fn roots(&self) -> Vec<&SnapshotNode> {
        let mut roots: Vec<&SnapshotNode> = self.nodes.values().filter(|n| n.is_root()).collect();
        roots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        roots
    }

    /// Every snapshot, oldest first (ties by id).
    pub fn nodes_by_time(&self) -> Vec<&SnapshotNode> {
        let mut all: Vec<&SnapshotNode> = self.nodes.values().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Every snapshot, newest first.
    pub fn nodes_newest_first(&self) -> Vec<&SnapshotNode> {
        let mut all = self.nodes_by_time();
        all.reverse();
        all
    }

    /// The most recent snapshot (ties broken by the greatest id).
    pub fn latest(&self) -> Option<&SnapshotNode> {
        self.nodes
            .values()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
    }

    /// Ids that equal `prefix` or start with it.
    ///
    /// An exact match wins outright and is returned alone.
    pub fn resolve_prefix(&self, prefix: &str) -> Vec<&SnapshotId> {
        if let Some((id, _)) = self.nodes.get_key_value(prefix) {
            return vec![id];
        }
        self.nodes
            .keys()
            .filter(|id| id.matches_prefix(prefix))
            .collect()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Two stores are equal when they hold the same snapshots, branches and HEAD.
impl PartialEq for SnapshotStore {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.branches == other.branches && self.head == other.head
    }
}
