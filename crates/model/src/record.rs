//! Grammar of a single logical VFK line.
//!
//! ```text
//! &HVERZE;"3.1"                      header entry
//! &BPAR;ID N30;NAZEV T20             block definition
//! &DPAR;1;"Louka"                    data record
//! &K                                 end of data
//! ```

use crate::error::{ErrorKind, Result};
use exn::OptionExt;

const FIELD_SEPARATOR: char = ';';
const QUOTE: char = '"';

/// One parsed line of a VFK file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record<'a> {
    Header { key: &'a str, value: String },
    Block { name: &'a str, definition: &'a str },
    Data { block: &'a str, fields: Vec<String> },
    End,
}
impl<'a> Record<'a> {
    /// Parse one logical (continuation-joined, decoded) line.
    ///
    /// Returns `Ok(None)` for blank lines.
    pub fn parse(line: &'a str) -> Result<Option<Self>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        let malformed = || ErrorKind::MalformedRecord(truncated(line));
        let body = line.strip_prefix('&').ok_or_raise(malformed)?;
        let mut chars = body.chars();
        let tag = chars.next().ok_or_raise(malformed)?;
        let rest = chars.as_str();
        if tag == 'K' {
            return Ok(Some(Self::End));
        }
        let (name, tail) = rest.split_once(FIELD_SEPARATOR).unwrap_or((rest, ""));
        if name.is_empty() {
            exn::bail!(malformed());
        }
        let record = match tag {
            'H' => {
                let fields = split_fields(tail);
                let value = match fields.as_slice() {
                    [single] => single.clone(),
                    _ => tail.to_string(),
                };
                Self::Header { key: name, value }
            },
            'B' => Self::Block { name, definition: tail },
            'D' => Self::Data { block: name, fields: split_fields(tail) },
            _ => exn::bail!(malformed()),
        };
        Ok(Some(record))
    }
}

/// Split the field part of a line on `;`, honouring double-quoted text.
///
/// Inside quotes `;` is literal and `""` stands for one quote character. The
/// quotes themselves are removed.
pub fn split_fields(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            QUOTE if quoted && chars.peek() == Some(&QUOTE) => {
                current.push(QUOTE);
                chars.next();
            },
            QUOTE => quoted = !quoted,
            FIELD_SEPARATOR if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn truncated(line: &str) -> String {
    line.chars().take(40).collect()
}
