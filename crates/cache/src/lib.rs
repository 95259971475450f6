//! SQLite cache for parsed VFK files.
//!
//! The cache is never the source of truth: the VFK file is. A cache that is
//! older than its source, or whose manifest has an unexpected shape, is
//! deleted and rebuilt by the reader rather than migrated.
//!
//! # Architecture
//! - [`Store`]: the synchronous primitives the cache needs (execute, count,
//!   query, prepared bulk inserts, indices, schema introspection).
//! - [`SqliteStore`]: the `sqlx` binding of those primitives.
//! - [`Repository`]: maps blocks, features and header metadata onto the
//!   tables described in [`schema`].

pub mod error;
mod models;
mod repo;
pub mod schema;
mod sqlite;
mod store;

pub use crate::models::ManifestRow;
pub use crate::repo::Repository;
pub use crate::sqlite::SqliteStore;
pub use crate::store::{IndexSpec, Statement, Store};
