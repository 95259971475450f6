//! In-memory model of a VFK exchange file.
//!
//! A VFK file is a sequence of typed data blocks. Each [`DataBlock`] has a
//! fixed list of [`PropertyDefn`]s (declared by a `&B` line) and owns the
//! [`Feature`]s decoded from its `&D` lines. Some blocks describe spatial
//! objects; their [`GeometryKind`] tells the reader how to rebuild a
//! [`Geometry`] once every block has been read.
//!
//! [`Record`] implements the grammar of a single line; it knows nothing about
//! files, encodings or line continuation (see `vfk-source` for that).

mod block;
pub mod error;
mod geometry;
mod property;
mod record;
mod value;

pub use crate::block::{DEFINITION_SEPARATOR, DataBlock, Feature, GeometryKind};
pub use crate::geometry::{Geometry, Point, ring_area};
pub use crate::property::{PropertyDefn, PropertyType};
pub use crate::record::{Record, split_fields};
pub use crate::value::Value;
