use crate::core::Core;
use crate::error::Result;
use vfk_model::DataBlock;
use vfk_source::SourceInfo;

/// The uniform query surface over a VFK file.
///
/// Data is read in three phases, each idempotent: block schemas, then
/// records, then geometry. Later phases run the earlier ones on demand.
pub trait Reader {
    fn core(&self) -> &Core;

    /// Discover the block schemas and the header. Returns the block count.
    fn read_data_blocks(&mut self) -> Result<usize>;

    /// Populate the features of one block, or of every block when `block` is
    /// `None`. Blocks already populated are skipped, so a repeated call
    /// returns `0`. An unknown block name also returns `0`.
    fn read_data_records(&mut self, block: Option<&str>) -> Result<usize>;

    /// Attach geometry to the features of spatial blocks, reading all records
    /// first. Returns the number of features carrying geometry.
    fn load_geometry(&mut self) -> Result<usize>;

    /// Whether rebuilt geometry is persisted.
    fn is_spatial(&self) -> bool;

    /// Whether data is served from a cache filled by an earlier session.
    fn is_pre_processed(&self) -> bool;

    /// Whether the reader can serve data at all.
    fn is_valid(&self) -> bool;

    fn block_count(&self) -> usize {
        self.core().blocks().len()
    }

    fn block(&self, index: usize) -> Option<&DataBlock> {
        self.core().blocks().get(index)
    }

    fn block_by_name(&self, name: &str) -> Option<&DataBlock> {
        self.core().blocks().by_name(name)
    }

    /// Header value for a key, e.g. `info("VERZE")`.
    fn info(&self, key: &str) -> Option<&str> {
        self.core().header().get(key)
    }

    fn source(&self) -> &SourceInfo {
        self.core().source()
    }
}
