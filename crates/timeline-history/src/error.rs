//! Error types for history operations.

use thiserror::Error;
use timeline_types::SnapshotId;

/// Errors that can occur while building, loading, or saving a history tree.
///
/// Unknown ids are not errors: lookups return `None` or `false` instead.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// A snapshot with this id already exists; the store was left unchanged.
    #[error("duplicate snapshot id: {0}")]
    DuplicateId(SnapshotId),

    /// The portable form could not be read or written.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The host document does not have the expected shape.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The configuration could not be parsed or is unusable.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for history operations.
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;
