use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Opaque identifier of a snapshot in the history tree.
///
/// Freshly generated ids are full-width random UUIDs rendered as 32 lowercase
/// hex characters. Ids read back from persisted documents are kept verbatim,
/// whatever their length, so histories written by older editors (which used
/// 8-character ids) keep resolving.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Number of characters shown by [`short`](Self::short).
    pub const SHORT_LEN: usize = 8;

    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing identifier, rejecting empty or whitespace-bearing input.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if !Self::well_formed(s) {
            return Err(TypeError::InvalidId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns `false` for ids [`parse`](Self::parse) would reject.
    ///
    /// Deserialization keeps ids verbatim, so loaded ids may fail this.
    pub fn is_well_formed(&self) -> bool {
        Self::well_formed(&self.0)
    }

    fn well_formed(s: &str) -> bool {
        !s.is_empty() && !s.chars().any(char::is_whitespace)
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display prefix (first 8 characters, or the whole id if shorter).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(Self::SHORT_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }

    /// Returns `true` if this id starts with `prefix`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(prefix)
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.short())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SnapshotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SnapshotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for SnapshotId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
