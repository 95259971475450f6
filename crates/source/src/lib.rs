//! Source accessor for VFK files.
//!
//! Provides the file-level facts the readers need before and while parsing:
//!
//! - **Metadata**: size and modification time, used to decide whether a
//!   persisted cache is still fresh ([`SourceInfo`]).
//! - **Signature sniffing**: a source may itself be an SQLite cache rather
//!   than VFK text ([`SourceKind::from_magic_bytes`]).
//! - **Decoded lines**: sequential reads joining `¤` continuation lines and
//!   decoding Windows-1250 or ISO-8859-2 ([`Lines`], [`Encoding`]).

mod encoding;
pub mod error;
mod info;
mod kind;
mod lines;

pub use crate::encoding::Encoding;
pub use crate::info::{AMENDMENT_KEY, CODEPAGE_KEY, SourceInfo};
pub use crate::kind::{SIGNATURE_LENGTH, SQLITE_SIGNATURE, SourceKind};
pub use crate::lines::{CONTINUATION, Lines};
