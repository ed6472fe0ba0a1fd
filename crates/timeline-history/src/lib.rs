//! Versioned snapshot tree for Timeline.
//!
//! A [`SnapshotStore`] records immutable snapshots of an evolving document,
//! lets the caller check out any earlier snapshot, and forks a new branch
//! automatically when a commit is made from a snapshot that is not the tip of
//! any branch. The store does no I/O: callers persist its portable form
//! inside their own documents.
//!
//! # Modules
//!
//! - [`error`] — Error types for history operations
//! - [`config`] — [`HistoryConfig`]: branch names, labels and document keys
//! - [`node`] — [`SnapshotNode`], one commit in the tree
//! - [`branches`] — [`BranchTable`] and [`HeadState`]
//! - [`store`] — [`SnapshotStore`]: commit, checkout, rename, delete, queries
//! - [`legacy`] — Import of the flat history list older documents carry
//! - [`portable`] — [`PortableHistory`], the persisted shape
//! - [`document`] — [`HistoryDocument`], embedding in the editor's JSON document
//! - [`validation`] — Invariant checks on loaded data

pub mod branches;
pub mod config;
pub mod document;
pub mod error;
pub mod legacy;
pub mod node;
pub mod portable;
pub mod store;
pub mod validation;

pub use branches::{BranchTable, HeadState};
pub use config::HistoryConfig;
pub use document::HistoryDocument;
pub use error::{HistoryError, HistoryResult};
pub use node::SnapshotNode;
pub use portable::PortableHistory;
pub use store::SnapshotStore;
pub use validation::{ValidationReport, Violation, ViolationKind};

pub use timeline_types::{Clock, ManualClock, SnapshotId, SystemClock, Timestamp};
