//! Model Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The line does not follow the `&<tag><name>;...` record grammar.
    #[display("malformed record: {_0}")]
    MalformedRecord(#[error(not(source))] String),
    /// A property definition (`NAME TYPE`) could not be parsed.
    #[display("invalid property definition: {_0}")]
    InvalidProperty(#[error(not(source))] String),
    /// A data record does not match the shape of its block definition.
    #[display("block {block} expects {expected} fields, found {found}")]
    FieldCount {
        /// Name of the block the record belongs to.
        block: String,
        /// Number of properties in the block definition.
        expected: usize,
        /// Number of fields found in the record.
        found: usize,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The input is either well-formed or it isn't.
        false
    }
}
