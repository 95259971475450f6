//! Sequential, decoded, continuation-joined line reads.

use crate::encoding::Encoding;
use crate::error::{ErrorKind, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Byte marking that a logical line continues on the next physical line.
///
/// It is `¤` in both supported encodings.
pub const CONTINUATION: u8 = 0xA4;

/// Iterator over the logical lines of a source file.
///
/// Physical lines ending in [`CONTINUATION`] are joined with the next one
/// (the marker itself is dropped), line terminators are stripped and the
/// bytes are decoded with the source encoding.
pub struct Lines {
    reader: BufReader<File>,
    path: PathBuf,
    encoding: Encoding,
    buffer: Vec<u8>,
    line_number: usize,
}
impl Lines {
    pub(crate) fn new(file: File, path: PathBuf, encoding: Encoding) -> Self {
        Self {
            reader: BufReader::new(file),
            path,
            encoding,
            buffer: Vec::new(),
            line_number: 0,
        }
    }

    /// Physical line number of the last line consumed (1-based).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Change the decoding of all following lines.
    ///
    /// The encoding is announced by a header line, so it can only be known
    /// once part of the file has been read.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    fn read_physical(&mut self) -> Result<bool> {
        let read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|e| ErrorKind::from_io(e, &self.path))?;
        if read == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        while matches!(self.buffer.last(), Some(b'\n' | b'\r')) {
            self.buffer.pop();
        }
        Ok(true)
    }

    fn read_logical(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        if !self.read_physical()? {
            return Ok(None);
        }
        while self.buffer.last() == Some(&CONTINUATION) {
            self.buffer.pop();
            if !self.read_physical()? {
                tracing::warn!(path = %self.path.display(), line = self.line_number, "Continuation marker on last line");
                break;
            }
        }
        Ok(Some(self.encoding.decode(&self.buffer)))
    }
}
impl Iterator for Lines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_logical().transpose()
    }
}
