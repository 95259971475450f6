use crate::encoding::Encoding;
use crate::error::{ErrorKind, Result};
use crate::kind::{SIGNATURE_LENGTH, SourceKind};
use crate::lines::Lines;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::instrument;
use vfk_model::Record;

/// Header key announcing the character encoding.
pub const CODEPAGE_KEY: &str = "CODEPAGE";
/// Header key flagging an amendment (incremental update) file.
pub const AMENDMENT_KEY: &str = "ZMENY";

/// Immutable description of a source file.
///
/// Built once by [`SourceInfo::open`], which stats the file, sniffs its
/// signature and, for VFK text, reads just enough of the header to learn the
/// encoding and whether the file is an amendment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    path: PathBuf,
    size: u64,
    modified: OffsetDateTime,
    kind: SourceKind,
    encoding: Encoding,
    amendment: bool,
}
impl SourceInfo {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| ErrorKind::from_io(e, &path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotAFile(path));
        }
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        let kind = SourceKind::from_magic_bytes(&Self::read_signature(&path)?);
        let mut info = Self {
            path,
            size: metadata.len(),
            modified,
            kind,
            encoding: Encoding::default(),
            amendment: false,
        };
        if kind == SourceKind::Vfk {
            info.sniff_header()?;
        }
        tracing::debug!(
            kind = ?info.kind,
            size = info.size,
            encoding = %info.encoding,
            amendment = info.amendment,
            "Opened source"
        );
        Ok(info)
    }

    fn read_signature(path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path).map_err(|e| ErrorKind::from_io(e, path))?;
        let mut head = Vec::with_capacity(SIGNATURE_LENGTH);
        file.take(SIGNATURE_LENGTH as u64)
            .read_to_end(&mut head)
            .map_err(|e| ErrorKind::from_io(e, path))?;
        Ok(head)
    }

    /// Scan the leading `&H` lines for the encoding and amendment flag.
    ///
    /// Stops at the first non-header line. Lines that don't parse are left
    /// for the reader to report.
    fn sniff_header(&mut self) -> Result<()> {
        for line in self.lines()? {
            let line = line?;
            match Record::parse(&line) {
                Ok(None) => continue,
                Ok(Some(Record::Header { key, value })) => match key {
                    CODEPAGE_KEY => self.encoding = Encoding::from_codepage(&value),
                    AMENDMENT_KEY => self.amendment = value.trim() == "1",
                    _ => {},
                },
                _ => break,
            }
        }
        Ok(())
    }

    /// Open a fresh sequential reader over the logical lines of the file.
    pub fn lines(&self) -> Result<Lines> {
        let file = File::open(&self.path).map_err(|e| ErrorKind::from_io(e, &self.path))?;
        Ok(Lines::new(file, self.path.clone(), self.encoding))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, as recorded in the cache manifest.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> OffsetDateTime {
        self.modified
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_latin2(&self) -> bool {
        self.encoding.is_latin2()
    }

    /// Whether the file is an incremental update rather than a base dataset.
    pub fn is_amendment(&self) -> bool {
        self.amendment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_open_vfk() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sample.vfk", b"&HVERZE;\"3.1\"\r\n&HCODEPAGE;\"WE8ISO8859P2\"\r\n&BPAR;ID N30\r\n&K\r\n");
        let info = SourceInfo::open(&path).unwrap();
        assert_eq!(info.kind(), SourceKind::Vfk);
        assert_eq!(info.encoding(), Encoding::Latin2);
        assert!(!info.is_amendment());
        assert_eq!(info.file_name(), "sample.vfk");
        assert_eq!(info.size(), std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_open_amendment() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "change.vfk", b"&HVERZE;\"3.1\"\n&HZMENY;1\n&BPAR;ID N30\n");
        let info = SourceInfo::open(&path).unwrap();
        assert!(info.is_amendment());
        assert_eq!(info.encoding(), Encoding::Windows1250);
    }

    #[test]
    fn test_open_sqlite_signature() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"SQLite format 3\0".to_vec();
        bytes.extend_from_slice(&[0u8; 84]);
        let path = write(&dir, "cache.db", &bytes);
        let info = SourceInfo::open(&path).unwrap();
        assert_eq!(info.kind(), SourceKind::Sqlite);
    }

    #[test]
    fn test_open_missing() {
        let dir = TempDir::new().unwrap();
        let err = SourceInfo::open(dir.path().join("missing.vfk")).unwrap_err();
        assert!(matches!(*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_open_directory() {
        let dir = TempDir::new().unwrap();
        let err = SourceInfo::open(dir.path()).unwrap_err();
        assert!(matches!(*err, ErrorKind::NotAFile(_)));
    }

    #[test]
    fn test_lines_join_continuations_and_decode() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"&HCODEPAGE;\"WE8ISO8859P2\"\r\n&DOPSUB;1;\"Dlouh\xe1 \xa4\r\n\xb9\xedpka\"\r\n".to_vec();
        bytes.extend_from_slice(b"&K");
        let path = write(&dir, "continued.vfk", &bytes);
        let info = SourceInfo::open(&path).unwrap();
        let lines = info.lines().unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(
            lines,
            vec![
                "&HCODEPAGE;\"WE8ISO8859P2\"".to_string(),
                "&DOPSUB;1;\"Dlouh\u{e1} \u{161}\u{ed}pka\"".to_string(),
                "&K".to_string(),
            ]
        );
    }

    #[test]
    fn test_line_numbers_count_physical_lines() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "numbers.vfk", b"&HA;1\n&DX;\xa4\n2\n&K\n");
        let info = SourceInfo::open(&path).unwrap();
        let mut lines = info.lines().unwrap();
        lines.next().unwrap().unwrap();
        assert_eq!(lines.next().unwrap().unwrap(), "&DX;2");
        assert_eq!(lines.line_number(), 3);
    }
}
