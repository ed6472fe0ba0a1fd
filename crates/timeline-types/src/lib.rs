//! Foundation types for Timeline.
//!
//! This crate provides the leaf types every other Timeline crate builds on:
//! identifiers for snapshots and the time source used to stamp them.
//!
//! # Key Types
//!
//! - [`SnapshotId`] — Opaque snapshot identifier (128-bit random for new snapshots)
//! - [`Timestamp`] — Seconds since the UNIX epoch, as persisted by host documents
//! - [`Clock`] — Injectable time source ([`SystemClock`], [`ManualClock`])

pub mod error;
pub mod id;
pub mod temporal;

pub use error::TypeError;
pub use id::SnapshotId;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
