use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid snapshot id: {0:?}")]
    InvalidId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
