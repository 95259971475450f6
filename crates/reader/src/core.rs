//! State shared by every reader: the source, its header and its blocks.

use std::collections::{HashMap, HashSet};
use vfk_model::DataBlock;
use vfk_source::SourceInfo;

/// Insertion-ordered header metadata (`&H` lines).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    entries: Vec<(String, String)>,
}
impl HeaderInfo {
    /// Insert or replace an entry. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
impl FromIterator<(String, String)> for HeaderInfo {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut header = Self::default();
        for (key, value) in iter {
            header.insert(key, value);
        }
        header
    }
}

/// Blocks in file order, addressable by position and by name.
#[derive(Clone, Debug, Default)]
pub struct Blocks {
    blocks: Vec<DataBlock>,
    names: HashMap<String, usize>,
}
impl Blocks {
    /// Add a block. A second block with an already known name is ignored.
    pub fn insert(&mut self, block: DataBlock) -> bool {
        if self.names.contains_key(block.name()) {
            tracing::warn!(block = block.name(), "Duplicate block definition ignored");
            return false;
        }
        self.names.insert(block.name().to_string(), self.blocks.len());
        self.blocks.push(block);
        true
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DataBlock> {
        self.blocks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DataBlock> {
        self.blocks.get_mut(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&DataBlock> {
        self.index_of(name).and_then(|index| self.blocks.get(index))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut DataBlock> {
        self.index_of(name).and_then(|index| self.blocks.get_mut(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataBlock> {
        self.blocks.iter()
    }
}
impl FromIterator<DataBlock> for Blocks {
    fn from_iter<I: IntoIterator<Item = DataBlock>>(iter: I) -> Self {
        let mut blocks = Self::default();
        for block in iter {
            blocks.insert(block);
        }
        blocks
    }
}
impl<'a> IntoIterator for &'a Blocks {
    type Item = &'a DataBlock;
    type IntoIter = std::slice::Iter<'a, DataBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The data model both readers populate, whatever produced it.
#[derive(Debug)]
pub struct Core {
    source: SourceInfo,
    header: HeaderInfo,
    blocks: Blocks,
}
impl Core {
    pub(crate) fn new(source: SourceInfo) -> Self {
        Self { source, header: HeaderInfo::default(), blocks: Blocks::default() }
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    pub fn header(&self) -> &HeaderInfo {
        &self.header
    }

    pub fn blocks(&self) -> &Blocks {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Blocks {
        &mut self.blocks
    }

    pub(crate) fn parts_mut(&mut self) -> (&SourceInfo, &mut Blocks) {
        (&self.source, &mut self.blocks)
    }

    /// Names of the blocks a record read should fill, `None` for an unknown
    /// block name.
    pub(crate) fn pending_blocks(&self, block: Option<&str>) -> Option<HashSet<String>> {
        let candidates = match block {
            Some(name) => vec![self.blocks.by_name(name)?],
            None => self.blocks.iter().collect(),
        };
        Some(
            candidates
                .into_iter()
                .filter(|block| !block.records_loaded())
                .map(|block| block.name().to_string())
                .collect(),
        )
    }

    pub(crate) fn set_schema(&mut self, header: HeaderInfo, blocks: Blocks) {
        self.header = header;
        self.blocks = blocks;
    }

    /// Features carrying geometry, across all spatial blocks.
    pub fn geometry_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.geometry_kind().is_spatial())
            .map(DataBlock::geometry_count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_replaces_in_place() {
        let mut header = HeaderInfo::default();
        header.insert("VERZE", "3.1");
        header.insert("SKUPINA", "A");
        header.insert("VERZE", "3.2");
        assert_eq!(header.get("VERZE"), Some("3.2"));
        assert_eq!(header.entries()[0].0, "VERZE");
        assert_eq!(header.len(), 2);
        assert_eq!(header.get("MISSING"), None);
    }

    #[test]
    fn test_duplicate_block_ignored() {
        let mut blocks = Blocks::default();
        assert!(blocks.insert(DataBlock::from_definition("PAR", "ID N30").unwrap()));
        assert!(!blocks.insert(DataBlock::from_definition("PAR", "ID N30;NAZEV T20").unwrap()));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks.by_name("PAR").unwrap().property_count(), 1);
        assert_eq!(blocks.index_of("PAR"), Some(0));
        assert!(blocks.by_name("SOBR").is_none());
    }
}
