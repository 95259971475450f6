/// Header of every SQLite 3 database file, NUL terminator included.
pub const SQLITE_SIGNATURE: [u8; 16] = *b"SQLite format 3\0";
/// Number of leading bytes needed to tell the kinds apart.
pub const SIGNATURE_LENGTH: usize = SQLITE_SIGNATURE.len();

/// What kind of file a reader was pointed at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A VFK text file.
    #[default]
    Vfk,
    /// An SQLite database, assumed to be an already populated cache.
    Sqlite,
}
impl SourceKind {
    /// Detect the source kind from the first bytes of a file.
    ///
    /// Inputs shorter than the signature are always VFK text.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.len() >= SIGNATURE_LENGTH && bytes.starts_with(&SQLITE_SIGNATURE) {
            return Self::Sqlite;
        }
        Self::Vfk
    }

    pub fn is_database(&self) -> bool {
        matches!(self, Self::Sqlite)
    }
}
impl From<&[u8]> for SourceKind {
    fn from(value: &[u8]) -> Self {
        Self::from_magic_bytes(value)
    }
}
