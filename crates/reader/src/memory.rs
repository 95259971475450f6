use crate::core::Core;
use crate::error::{ErrorKind, Result};
use crate::reader::Reader;
use crate::{geometry, parse};
use exn::ResultExt;
use std::path::Path;
use tracing::instrument;

/// Reader that parses the source on every phase and keeps everything in
/// memory.
#[derive(Debug)]
pub struct MemoryReader {
    core: Core,
}
impl MemoryReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = vfk_source::SourceInfo::open(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        Ok(Self { core: Core::new(source) })
    }
}
impl Reader for MemoryReader {
    fn core(&self) -> &Core {
        &self.core
    }

    #[instrument(skip_all, fields(path = %self.core.source().path().display()))]
    fn read_data_blocks(&mut self) -> Result<usize> {
        if !self.core.blocks().is_empty() {
            return Ok(self.core.blocks().len());
        }
        let (header, blocks) = parse::read_schema(self.core.source())?;
        self.core.set_schema(header, blocks);
        Ok(self.core.blocks().len())
    }

    #[instrument(skip(self), fields(path = %self.core.source().path().display()))]
    fn read_data_records(&mut self, block: Option<&str>) -> Result<usize> {
        self.read_data_blocks()?;
        let Some(targets) = self.core.pending_blocks(block) else {
            tracing::warn!(block, "Unknown block");
            return Ok(0);
        };
        if targets.is_empty() {
            return Ok(0);
        }
        let (source, blocks) = self.core.parts_mut();
        parse::read_records(source, blocks, &targets)
    }

    #[instrument(skip_all, fields(path = %self.core.source().path().display()))]
    fn load_geometry(&mut self) -> Result<usize> {
        self.read_data_records(None)?;
        geometry::load(self.core.blocks_mut());
        Ok(self.core.geometry_count())
    }

    fn is_spatial(&self) -> bool {
        false
    }

    fn is_pre_processed(&self) -> bool {
        false
    }

    fn is_valid(&self) -> bool {
        true
    }
}
