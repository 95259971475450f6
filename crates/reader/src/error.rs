//! Reader Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the source, model and
//! cache crates are kept as child frames of the kinds below.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A reader error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source or cache file cannot be opened.
    #[display("cannot open: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// The header or a block definition cannot be parsed.
    #[display("invalid VFK data: {_0}")]
    Format(#[error(not(source))] String),
    /// A database given as the source is not a cache this crate can read.
    #[display("not a valid VFK cache: {}", _0.display())]
    CacheSchemaInvalid(#[error(not(source))] PathBuf),
    /// A statement against the cache failed.
    #[display("cache store failure")]
    Store,
    /// The reader failed to initialise and cannot serve data.
    #[display("reader is not usable")]
    Unusable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Open(_) | Self::Store)
    }
}
