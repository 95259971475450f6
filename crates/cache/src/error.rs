//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A statement failed to prepare or execute.
    #[display("database error")]
    Database,
    /// The database file could not be opened or created.
    #[display("cannot open database: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// The connection has already been closed.
    #[display("database connection closed")]
    Closed,
    /// A write was attempted on a store opened read-only.
    #[display("database is read-only")]
    ReadOnly,
    /// Persisted data does not have the expected shape.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}
