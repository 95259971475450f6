//! Sequential passes over a VFK source shared by both readers.

use crate::core::{Blocks, HeaderInfo};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashSet;
use tracing::instrument;
use vfk_model::{DataBlock, Record};
use vfk_source::{CODEPAGE_KEY, Encoding, SourceInfo};

const HEADER_PREFIX: &str = "&H";
const DATA_PREFIX: &str = "&D";
const END_PREFIX: &str = "&K";

/// Read the header and every block definition, skipping data lines.
///
/// The first non-blank line must be a header entry and every `&B` line must
/// parse; anything else malformed is logged and skipped.
#[instrument(skip_all, fields(path = %source.path().display()))]
pub(crate) fn read_schema(source: &SourceInfo) -> Result<(HeaderInfo, Blocks)> {
    let invalid = |message: &str| ErrorKind::Format(format!("{}: {message}", source.file_name()));
    let mut lines = source.lines().or_raise(|| invalid("cannot read source"))?;
    let mut header = HeaderInfo::default();
    let mut blocks = Blocks::default();
    let mut started = false;
    while let Some(line) = lines.next() {
        let line = line.or_raise(|| invalid("cannot read source"))?;
        if line.trim().is_empty() {
            continue;
        }
        if !started {
            if !line.starts_with(HEADER_PREFIX) {
                exn::bail!(invalid("first line is not a header entry"));
            }
            started = true;
        }
        if line.starts_with(DATA_PREFIX) {
            continue;
        }
        let record = match Record::parse(&line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(line = lines.line_number(), error = ?err, "Skipping malformed line");
                continue;
            },
        };
        match record {
            Record::Header { key, value } => {
                if key == CODEPAGE_KEY {
                    lines.set_encoding(Encoding::from_codepage(&value));
                }
                header.insert(key, value);
            },
            Record::Block { name, definition } => {
                let block = DataBlock::from_definition(name, definition)
                    .or_raise(|| invalid(&format!("invalid definition of block {name}")))?;
                blocks.insert(block);
            },
            Record::Data { .. } => {},
            Record::End => break,
        }
    }
    if !started {
        exn::bail!(invalid("empty source"));
    }
    tracing::debug!(header = header.len(), blocks = blocks.len(), "Read block definitions");
    Ok((header, blocks))
}

/// Append the data lines of the named blocks in a single pass and mark those
/// blocks as loaded. Returns the number of features added.
///
/// Target blocks are emptied first, so features left by a pass that failed
/// partway through are not duplicated. A line whose field count does not
/// match its block is skipped.
#[instrument(skip_all, fields(path = %source.path().display(), blocks = targets.len()))]
pub(crate) fn read_records(source: &SourceInfo, blocks: &mut Blocks, targets: &HashSet<String>) -> Result<usize> {
    let mut lines = source.lines().or_raise(|| ErrorKind::Open(source.path().to_path_buf()))?;
    for name in targets {
        if let Some(block) = blocks.by_name_mut(name) {
            block.clear_features();
        }
    }
    let mut added = 0;
    while let Some(line) = lines.next() {
        let line = line.or_raise(|| ErrorKind::Open(source.path().to_path_buf()))?;
        if line.starts_with(END_PREFIX) {
            break;
        }
        if !line.starts_with(DATA_PREFIX) {
            continue;
        }
        match Record::parse(&line) {
            Ok(Some(Record::Data { block, fields })) if targets.contains(block) => {
                let Some(target) = blocks.by_name_mut(block) else {
                    continue;
                };
                if let Err(err) = target.add_record(fields.as_slice()) {
                    tracing::warn!(line = lines.line_number(), error = ?err, "Skipping record");
                    continue;
                }
                added += 1;
            },
            Ok(_) => {},
            Err(err) => tracing::warn!(line = lines.line_number(), error = ?err, "Skipping malformed line"),
        }
    }
    for name in targets {
        if let Some(block) = blocks.by_name_mut(name) {
            block.set_records_loaded(true);
        }
    }
    tracing::debug!(records = added, "Read data records");
    Ok(added)
}
