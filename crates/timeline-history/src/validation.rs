use std::collections::{BTreeSet, HashSet};

use timeline_types::SnapshotId;

use crate::store::SnapshotStore;

/// Result of checking a store against its structural invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub snapshot_count: usize,
    pub branch_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations of one kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

/// A specific broken invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Snapshot id or branch name the violation is about.
    pub subject: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    DanglingParent,
    DanglingBranchTip,
    DanglingHead,
    IdMismatch,
    MalformedId,
    ParentCycle,
}

impl SnapshotStore {
    /// Check every invariant and list what is broken. Never repairs anything.
    ///
    /// Orphans left behind by [`delete`](SnapshotStore::delete) are reported
    /// as dangling parents.
    pub fn validate(&self) -> ValidationReport {
        let mut violations = Vec::new();

        for (key, node) in &self.nodes {
            if *key != node.id {
                violations.push(Violation {
                    kind: ViolationKind::IdMismatch,
                    subject: key.to_string(),
                    description: format!("stored under {key} but names itself {}", node.id),
                });
            }
            if let Some(parent) = &node.parent {
                if !self.nodes.contains_key(parent) {
                    violations.push(Violation {
                        kind: ViolationKind::DanglingParent,
                        subject: key.to_string(),
                        description: format!("parent {parent} does not exist"),
                    });
                }
            }
        }

        for (name, tip) in self.branches.iter() {
            if let Some(tip) = tip {
                if !self.nodes.contains_key(tip) {
                    violations.push(Violation {
                        kind: ViolationKind::DanglingBranchTip,
                        subject: name.to_string(),
                        description: format!("tip {tip} does not exist"),
                    });
                }
            }
        }

        if let Some(head) = &self.head {
            if !self.nodes.contains_key(head) {
                violations.push(Violation {
                    kind: ViolationKind::DanglingHead,
                    subject: head.to_string(),
                    description: "HEAD points at a missing snapshot".into(),
                });
            }
        }

        for id in self.referenced_ids() {
            if !id.is_well_formed() {
                violations.push(Violation {
                    kind: ViolationKind::MalformedId,
                    subject: id.to_string(),
                    description: format!("{:?} is empty or contains whitespace", id.as_str()),
                });
            }
        }

        for entry in self.cycle_entries() {
            violations.push(Violation {
                kind: ViolationKind::ParentCycle,
                subject: entry.to_string(),
                description: "parent links loop back to this snapshot".into(),
            });
        }

        ValidationReport {
            snapshot_count: self.nodes.len(),
            branch_count: self.branches.len(),
            violations,
        }
    }

    /// Every distinct id the store mentions: keys, node ids, parents, tips, HEAD.
    fn referenced_ids(&self) -> BTreeSet<&SnapshotId> {
        let mut ids: BTreeSet<&SnapshotId> = BTreeSet::new();
        for (key, node) in &self.nodes {
            ids.insert(key);
            ids.insert(&node.id);
            ids.extend(node.parent.as_ref());
        }
        ids.extend(self.branches.iter().filter_map(|(_, tip)| tip));
        ids.extend(self.head.as_ref());
        ids
    }

    /// One snapshot per parent-link cycle: the first node revisited on a walk.
    fn cycle_entries(&self) -> Vec<&SnapshotId> {
        let mut cleared: HashSet<&SnapshotId> = HashSet::new();
        let mut entries: Vec<&SnapshotId> = Vec::new();

        for start in self.nodes.keys() {
            let mut path: Vec<&SnapshotId> = Vec::new();
            let mut on_path: HashSet<&SnapshotId> = HashSet::new();
            let mut cursor = Some(start);

            while let Some(id) = cursor {
                if cleared.contains(id) {
                    break;
                }
                if !on_path.insert(id) {
                    entries.push(id);
                    break;
                }
                path.push(id);
                cursor = self
                    .nodes
                    .get(id)
                    .and_then(|n| n.parent.as_ref())
                    .filter(|p| self.nodes.contains_key(*p));
            }
            cleared.extend(path);
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn committed_history_is_valid() {
        let mut store = SnapshotStore::new();
        let n1 = store.commit(json!(1), "a").unwrap();
        store.commit(json!(2), "b").unwrap();
        store.checkout(&n1);
        store.commit(json!(3), "c").unwrap();

        let report = store.validate();
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.snapshot_count, 3);
        assert_eq!(report.branch_count, 2);
    }

    #[test]
    fn delete_leaves_orphans_that_validation_reports() {
        let mut store = SnapshotStore::new();
        let n1 = store.commit(json!(1), "a").unwrap();
        let n2 = store.commit(json!(2), "b").unwrap();
        store.delete(&n1);

        let report = store.validate();
        let dangling: Vec<&Violation> = report.of_kind(ViolationKind::DanglingParent).collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].subject, n2.as_str());
    }

    #[test]
    fn loaded_garbage_is_reported() {
        let value = json!({
            "nodes": {
                "a": {"id": "a", "parent": "b", "timestamp": 1, "data": null, "note": ""},
                "b": {"id": "b", "parent": "a", "timestamp": 2, "data": null, "note": ""},
                "c": {"id": "zzz", "parent": null, "timestamp": 3, "data": null, "note": ""}
            },
            "branches": {"main": "gone"},
            "head_id": "missing"
        });
        let store = SnapshotStore::from_value(&value).unwrap();
        let report = store.validate();

        assert!(!report.is_valid());
        assert_eq!(report.of_kind(ViolationKind::IdMismatch).count(), 1);
        assert_eq!(report.of_kind(ViolationKind::DanglingBranchTip).count(), 1);
        assert_eq!(report.of_kind(ViolationKind::DanglingHead).count(), 1);
        assert_eq!(report.of_kind(ViolationKind::ParentCycle).count(), 1);
        assert_eq!(report.of_kind(ViolationKind::DanglingParent).count(), 0);
    }

    #[test]
    fn malformed_ids_are_reported() {
        let value = json!({
            "nodes": {
                "": {"id": "", "parent": null, "timestamp": 1, "data": null, "note": ""},
                "ok": {"id": "ok", "parent": "", "timestamp": 2, "data": null, "note": ""}
            },
            "branches": {"main": "ok", "side": "a b"},
            "head_id": "ok"
        });
        let store = SnapshotStore::from_value(&value).unwrap();
        let report = store.validate();

        let subjects: Vec<&str> = report
            .of_kind(ViolationKind::MalformedId)
            .map(|v| v.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["", "a b"]);
    }

    #[test]
    fn lineage_terminates_on_cycles() {
        let value = json!({
            "nodes": {
                "a": {"id": "a", "parent": "b", "timestamp": 1, "data": null, "note": ""},
                "b": {"id": "b", "parent": "a", "timestamp": 2, "data": null, "note": ""}
            }
        });
        let store = SnapshotStore::from_value(&value).unwrap();
        let a = SnapshotId::parse("a").unwrap();
        assert_eq!(store.lineage(&a).len(), 2);
    }
}
