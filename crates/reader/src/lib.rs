//! Readers for VFK cadastral exchange files.
//!
//! Both readers expose the same three-phase surface through [`Reader`]:
//!
//! 1. [`Reader::read_data_blocks`] discovers the header and block schemas.
//! 2. [`Reader::read_data_records`] fills blocks with features.
//! 3. [`Reader::load_geometry`] builds points, links, lines and polygons.
//!
//! [`MemoryReader`] re-parses the source and keeps everything in memory.
//! [`CachedReader`] persists the parsed data to an SQLite file next to the
//! source and serves later sessions from it while it remains fresh.
//!
//! ```no_run
//! use vfk_reader::{CachedReader, Reader, ReaderOptions};
//!
//! # fn example() -> vfk_reader::error::Result<()> {
//! let options = ReaderOptions::default().with_delete_on_close(true);
//! let mut reader = CachedReader::open("export.vfk", &options)?;
//! reader.load_geometry()?;
//! for block in reader.core().blocks() {
//!     println!("{}: {} features", block.name(), block.feature_count());
//! }
//! # Ok(())
//! # }
//! ```

mod cached;
mod core;
pub mod error;
#[cfg(test)]
mod fixture;
mod geometry;
mod memory;
mod parse;
mod reader;

pub use crate::cached::{CacheState, CachedReader, MAX_CACHE_PATH, cache_path_for};
pub use crate::core::{Blocks, Core, HeaderInfo};
pub use crate::memory::MemoryReader;
pub use crate::reader::Reader;
pub use vfk_config::ReaderOptions;
