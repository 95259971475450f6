//! Reader backed by a persistent SQLite cache.
//!
//! The first session on a source parses it and persists blocks, rows and
//! (optionally) geometry. Later sessions serve the same data from the cache
//! without touching the source, as long as the cache is still valid:
//!
//! | Situation                                          | State                            |
//! |----------------------------------------------------|----------------------------------|
//! | source is itself a cache with a valid manifest     | `DbSourceValid`                  |
//! | source is a database without a valid manifest      | `DbSourceInvalid`                |
//! | no cache yet, or overwrite requested               | `FreshBuild`                     |
//! | cache older than the source                        | `ReusedStale`, then `FreshBuild` |
//! | cache present with a manifest listing blocks       | `ReusedValid`                    |
//! | cache present with an unexpected or empty manifest | rebuilt, `FreshBuild`            |
//! | cache location is the source file                  | `Failed`                         |
//! | cache cannot be opened or created                  | `Failed`                         |

use crate::core::{Blocks, Core, HeaderInfo};
use crate::error::{Error, ErrorKind, Result};
use crate::reader::Reader;
use crate::{geometry, parse};
use exn::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::instrument;
use vfk_cache::schema::MANIFEST_COLUMNS;
use vfk_cache::{Repository, SqliteStore};
use vfk_config::ReaderOptions;
use vfk_model::DataBlock;
use vfk_source::SourceInfo;

/// Longest cache path derived or accepted, in characters.
pub const MAX_CACHE_PATH: usize = 2048;

/// Validity of the cache behind a [`CachedReader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    /// The source is a cache and its manifest is readable.
    DbSourceValid,
    /// The source is a database but not a readable cache. Terminal.
    DbSourceInvalid,
    /// A new, empty cache was created for this session.
    FreshBuild,
    /// An existing cache is being served.
    ReusedValid,
    /// An existing cache was older than its source and is being replaced.
    ReusedStale,
    /// The cache could not be opened or created. Terminal.
    Failed,
}
impl CacheState {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::DbSourceValid | Self::FreshBuild | Self::ReusedValid)
    }
}

/// Cache location for a source: the override when given, otherwise the
/// source path with a `db` extension.
pub fn cache_path_for(source: &Path, db_name: Option<&Path>) -> PathBuf {
    let path = match db_name {
        Some(path) => path.to_path_buf(),
        None => {
            let derived = source.with_extension(SqliteStore::EXTENSION);
            if derived == source {
                PathBuf::from(format!("{}.{}", source.display(), SqliteStore::EXTENSION))
            } else {
                derived
            }
        },
    };
    let text = path.to_string_lossy();
    if text.chars().count() > MAX_CACHE_PATH {
        PathBuf::from(text.chars().take(MAX_CACHE_PATH).collect::<String>())
    } else {
        path
    }
}

/// Whether two paths name the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Reader serving data from, and filling, a persistent cache.
///
/// Construction never fails because of the cache: if it cannot be opened or
/// validated the reader is returned unusable, with the cause available from
/// [`CachedReader::error`]. Every phase operation then fails with
/// [`ErrorKind::Unusable`].
pub struct CachedReader {
    core: Core,
    options: ReaderOptions,
    cache_path: PathBuf,
    repo: Option<Repository<SqliteStore>>,
    state: CacheState,
    db_source: bool,
    error: Option<Error>,
}
impl CachedReader {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, options: &ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let source = SourceInfo::open(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        let db_source = source.kind().is_database();
        let cache_path = if db_source {
            source.path().to_path_buf()
        } else {
            cache_path_for(source.path(), options.db_name.as_deref())
        };
        let mut reader = Self {
            core: Core::new(source),
            options: options.clone(),
            cache_path,
            repo: None,
            state: CacheState::Uninitialized,
            db_source,
            error: None,
        };
        let initialized = if db_source { reader.open_db_source() } else { reader.open_cache() };
        match initialized {
            Ok(state) => reader.state = state,
            Err(err) => {
                reader.state = match *err {
                    ErrorKind::CacheSchemaInvalid(_) => CacheState::DbSourceInvalid,
                    _ => CacheState::Failed,
                };
                tracing::error!(cache = %reader.cache_path.display(), error = ?err, "Cache is unusable");
                reader.error = Some(err);
            },
        }
        tracing::debug!(state = ?reader.state, cache = %reader.cache_path.display(), "Opened cached reader");
        Ok(reader)
    }

    /// Validate a database given as the source. It is never modified.
    fn open_db_source(&mut self) -> Result<CacheState> {
        let invalid = || ErrorKind::CacheSchemaInvalid(self.cache_path.clone());
        let store = SqliteStore::open_read_only(&self.cache_path).or_raise(invalid)?;
        let mut repo = Repository::new(store);
        if !repo.manifest_exists().or_raise(invalid)? {
            exn::bail!(invalid());
        }
        let columns = repo.manifest_column_count().or_raise(invalid)?;
        if columns != MANIFEST_COLUMNS {
            tracing::debug!(columns, "Manifest of database source has an unexpected shape");
            exn::bail!(invalid());
        }
        if repo.manifest().or_raise(invalid)?.is_empty() {
            tracing::debug!("Manifest of database source lists no blocks");
            exn::bail!(invalid());
        }
        self.repo = Some(repo);
        Ok(CacheState::DbSourceValid)
    }

    /// Reuse, replace or create the cache derived from the source.
    fn open_cache(&mut self) -> Result<CacheState> {
        let path = self.cache_path.clone();
        if same_file(&path, self.core.source().path()) {
            tracing::error!(cache = %path.display(), "Cache location is the source file");
            exn::bail!(ErrorKind::Open(path));
        }
        let mut state = CacheState::FreshBuild;
        if path.exists() {
            if self.options.overwrite {
                tracing::debug!(cache = %path.display(), "Overwriting existing cache");
                Self::remove(&path)?;
            } else if self.options.db_name.is_none() && self.is_stale(&path) {
                self.state = CacheState::ReusedStale;
                tracing::debug!(cache = %path.display(), "Cache is older than its source, rebuilding");
                Self::remove(&path)?;
            } else {
                state = CacheState::ReusedValid;
            }
        }
        if state == CacheState::ReusedValid {
            match Self::reuse(&path) {
                Some(repo) => {
                    self.repo = Some(repo);
                    return Ok(state);
                },
                None => {
                    tracing::debug!(cache = %path.display(), "Cache is not reusable, rebuilding");
                    Self::remove(&path)?;
                },
            }
        }
        let store = SqliteStore::open(&path).or_raise(|| ErrorKind::Open(path.clone()))?;
        let mut repo = Repository::new(store);
        repo.create_schema().or_raise(|| ErrorKind::Store)?;
        self.repo = Some(repo);
        Ok(CacheState::FreshBuild)
    }

    /// Open an existing cache if its manifest can be read, has the expected
    /// shape and lists at least one block.
    fn reuse(path: &Path) -> Option<Repository<SqliteStore>> {
        let mut repo = Repository::new(SqliteStore::open(path).ok()?);
        let columns = repo.manifest_column_count().ok()?;
        let listed = columns == MANIFEST_COLUMNS && !repo.manifest().ok()?.is_empty();
        if !listed {
            tracing::debug!(columns, "Manifest has an unexpected shape or no blocks");
            if let Err(err) = repo.into_inner().close() {
                tracing::warn!(error = ?err, "Failed to close cache");
            }
            return None;
        }
        Some(repo)
    }

    fn is_stale(&self, path: &Path) -> bool {
        let modified = std::fs::metadata(path).and_then(|metadata| metadata.modified());
        match modified {
            Ok(modified) => OffsetDateTime::from(modified) < self.core.source().modified(),
            Err(err) => {
                tracing::debug!(error = %err, "Cannot read cache modification time");
                true
            },
        }
    }

    fn remove(path: &Path) -> Result<()> {
        std::fs::remove_file(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Whether the source itself is a cache database.
    pub fn is_db_source(&self) -> bool {
        self.db_source
    }

    /// Why the reader is unusable, if it is.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn ensure_usable(&self) -> Result<()> {
        if !self.state.is_usable() {
            exn::bail!(ErrorKind::Unusable);
        }
        Ok(())
    }

    fn repo(&mut self) -> Result<&mut Repository<SqliteStore>> {
        self.ensure_usable()?;
        self.repo.as_mut().ok_or_raise(|| ErrorKind::Unusable)
    }

    fn serves_existing(&self) -> bool {
        matches!(self.state, CacheState::DbSourceValid | CacheState::ReusedValid)
    }

    /// Rebuild the schema from the manifest.
    fn schema_from_cache(&mut self) -> Result<(HeaderInfo, Blocks)> {
        let repo = self.repo()?;
        let manifest = repo.manifest().or_raise(|| ErrorKind::Store)?;
        let header = repo.load_header().or_raise(|| ErrorKind::Store)?.into_iter().collect();
        let blocks = manifest
            .iter()
            .map(|row| {
                DataBlock::from_definition(&row.table_name, &row.table_defn)
                    .or_raise(|| ErrorKind::Format(format!("invalid definition of cached block {}", row.table_name)))
            })
            .collect::<Result<Blocks>>()?;
        Ok((header, blocks))
    }

    fn schema_from_source(&mut self) -> Result<(HeaderInfo, Blocks)> {
        let (header, blocks) = parse::read_schema(self.core.source())?;
        let file_name = self.core.source().file_name();
        let file_size = self.core.source().size();
        let repo = self.repo()?;
        repo.store_header(header.entries()).or_raise(|| ErrorKind::Store)?;
        for block in &blocks {
            repo.register_block(block, &file_name, file_size).or_raise(|| ErrorKind::Store)?;
        }
        Ok((header, blocks))
    }
}
impl Reader for CachedReader {
    fn core(&self) -> &Core {
        &self.core
    }

    #[instrument(skip_all, fields(cache = %self.cache_path.display()))]
    fn read_data_blocks(&mut self) -> Result<usize> {
        self.ensure_usable()?;
        if !self.core.blocks().is_empty() {
            return Ok(self.core.blocks().len());
        }
        let (header, blocks) = if self.serves_existing() {
            self.schema_from_cache()?
        } else {
            self.schema_from_source()?
        };
        self.core.set_schema(header, blocks);
        tracing::debug!(blocks = self.core.blocks().len(), "Read data blocks");
        Ok(self.core.blocks().len())
    }

    #[instrument(skip(self), fields(cache = %self.cache_path.display()))]
    fn read_data_records(&mut self, block: Option<&str>) -> Result<usize> {
        self.read_data_blocks()?;
        let Some(targets) = self.core.pending_blocks(block) else {
            tracing::warn!(block, "Unknown block");
            return Ok(0);
        };
        if targets.is_empty() {
            return Ok(0);
        }
        let amendment = self.core.source().is_amendment();
        let db_source = self.db_source;
        let Self { core, repo, .. } = self;
        let repo = repo.as_mut().ok_or_raise(|| ErrorKind::Unusable)?;
        let (source, blocks) = core.parts_mut();

        let mut loaded = 0;
        let mut unparsed = HashSet::new();
        for name in &targets {
            let Some(block) = blocks.by_name_mut(name) else {
                continue;
            };
            match repo.manifest_row(name).or_raise(|| ErrorKind::Store)? {
                Some(row) if row.records_persisted() => {
                    loaded += repo.load_features(block).or_raise(|| ErrorKind::Store)?;
                    block.set_geometry_loaded(row.geometry_persisted());
                },
                _ if db_source => {
                    tracing::warn!(block = name.as_str(), "Database source has no rows for block");
                    block.set_records_loaded(true);
                },
                // Not persisted: start the table afresh in case an earlier
                // session stopped partway through filling it.
                _ => {
                    repo.register_block(block, &source.file_name(), source.size())
                        .or_raise(|| ErrorKind::Store)?;
                    unparsed.insert(name.clone());
                },
            }
        }
        if !unparsed.is_empty() {
            loaded += parse::read_records(source, blocks, &unparsed)?;
            for name in &unparsed {
                if let Some(block) = blocks.by_name(name) {
                    repo.store_features(block, amendment).or_raise(|| ErrorKind::Store)?;
                }
            }
        }
        Ok(loaded)
    }

    #[instrument(skip_all, fields(cache = %self.cache_path.display()))]
    fn load_geometry(&mut self) -> Result<usize> {
        self.read_data_records(None)?;
        let built = geometry::load(self.core.blocks_mut());
        let persist = self.options.spatial;
        let Self { core, repo, .. } = self;
        if persist
            && let Some(repo) = repo.as_mut()
            && !repo.is_read_only()
        {
            for index in built {
                if let Some(block) = core.blocks().get(index) {
                    repo.store_geometry(block).or_raise(|| ErrorKind::Store)?;
                }
            }
        }
        Ok(core.geometry_count())
    }

    fn is_spatial(&self) -> bool {
        self.options.spatial
    }

    fn is_pre_processed(&self) -> bool {
        self.serves_existing()
    }

    fn is_valid(&self) -> bool {
        self.state.is_usable()
    }
}
impl Drop for CachedReader {
    fn drop(&mut self) {
        let Some(repo) = self.repo.take() else {
            return;
        };
        if let Err(err) = repo.into_inner().close() {
            tracing::warn!(cache = %self.cache_path.display(), error = ?err, "Failed to close cache");
        }
        if self.options.delete_on_close && !self.db_source && self.cache_path.exists() {
            match std::fs::remove_file(&self.cache_path) {
                Ok(()) => tracing::debug!(cache = %self.cache_path.display(), "Deleted cache"),
                Err(err) => tracing::warn!(cache = %self.cache_path.display(), error = %err, "Failed to delete cache"),
            }
        }
    }
}
impl std::fmt::Debug for CachedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedReader")
            .field("source", self.core.source())
            .field("cache_path", &self.cache_path)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryReader;
    use crate::fixture::{self, BLOCKS, GEOMETRIES, RECORDS};
    use rstest::rstest;
    use std::time::Duration;
    use tempfile::TempDir;
    use vfk_cache::Store;
    use vfk_source::Encoding;

    const HOUR: Duration = Duration::from_secs(3600);

    /// Run every phase, asserting the full sample comes back.
    fn read_all(reader: &mut CachedReader) {
        assert_eq!(reader.read_data_blocks().unwrap(), BLOCKS);
        assert_eq!(reader.read_data_records(None).unwrap(), RECORDS);
        assert_eq!(reader.load_geometry().unwrap(), GEOMETRIES);
    }

    fn manifest(path: &Path) -> Vec<vfk_cache::ManifestRow> {
        let mut repo = Repository::new(SqliteStore::open_read_only(path).unwrap());
        repo.manifest().unwrap()
    }

    #[rstest]
    #[case("/data/export.vfk", None, "/data/export.db")]
    #[case("/data/export", None, "/data/export.db")]
    #[case("/data/export.db", None, "/data/export.db.db")]
    #[case("/data/export.vfk", Some("/tmp/cache.sqlite"), "/tmp/cache.sqlite")]
    fn test_cache_path_for(#[case] source: &str, #[case] db_name: Option<&str>, #[case] expected: &str) {
        assert_eq!(cache_path_for(Path::new(source), db_name.map(Path::new)), PathBuf::from(expected));
    }

    #[test]
    fn test_cache_path_truncated() {
        let long = format!("/{}", "a".repeat(3000));
        let path = cache_path_for(Path::new(&long), None);
        assert_eq!(path.to_string_lossy().chars().count(), MAX_CACHE_PATH);
    }

    #[rstest]
    #[case(CacheState::DbSourceValid, true)]
    #[case(CacheState::FreshBuild, true)]
    #[case(CacheState::ReusedValid, true)]
    #[case(CacheState::Uninitialized, false)]
    #[case(CacheState::ReusedStale, false)]
    #[case(CacheState::DbSourceInvalid, false)]
    #[case(CacheState::Failed, false)]
    fn test_usable_states(#[case] state: CacheState, #[case] usable: bool) {
        assert_eq!(state.is_usable(), usable);
    }

    #[test]
    fn test_fresh_build_then_reuse() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default();
        {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            assert_eq!(reader.state(), CacheState::FreshBuild);
            assert_eq!(reader.cache_path(), dir.path().join("sample.db"));
            assert!(reader.is_valid());
            assert!(reader.is_spatial());
            assert!(!reader.is_pre_processed());
            assert!(!reader.is_db_source());
            assert!(reader.error().is_none());
            read_all(&mut reader);
        }
        let mut memory = MemoryReader::open(&source).unwrap();
        memory.load_geometry().unwrap();

        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::ReusedValid);
        assert!(reader.is_pre_processed());
        read_all(&mut reader);
        assert_eq!(reader.info("VERZE"), Some("3.2"));
        assert_eq!(reader.core().header(), memory.core().header());
        for (cached, parsed) in reader.core().blocks().iter().zip(memory.core().blocks()) {
            assert_eq!(cached.name(), parsed.name());
            assert_eq!(cached.definition(), parsed.definition());
            assert_eq!(cached.features(), parsed.features());
        }
    }

    #[test]
    fn test_phases_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
        read_all(&mut reader);
        assert_eq!(reader.read_data_blocks().unwrap(), BLOCKS);
        assert_eq!(reader.read_data_records(None).unwrap(), 0);
        assert_eq!(reader.read_data_records(Some("PAR")).unwrap(), 0);
        assert_eq!(reader.read_data_records(Some("NOPE")).unwrap(), 0);
        assert_eq!(reader.load_geometry().unwrap(), GEOMETRIES);
    }

    #[test]
    fn test_manifest_matches_tables() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let cache = {
            let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
            read_all(&mut reader);
            reader.cache_path().to_path_buf()
        };
        let rows = manifest(&cache);
        let names = rows.iter().map(|row| row.table_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["SOBR", "SBP", "HP", "PAR", "OPSUB"]);

        let mut repo = Repository::new(SqliteStore::open_read_only(&cache).unwrap());
        for row in &rows {
            assert_eq!(row.file_name, "sample.vfk");
            assert_eq!(row.num_records, repo.row_count(&row.table_name).unwrap());
        }
        let opsub = rows.iter().find(|row| row.table_name == "OPSUB").unwrap();
        assert_eq!(opsub.num_records, 3);
        assert!(!opsub.geometry_persisted());
        let par = rows.iter().find(|row| row.table_name == "PAR").unwrap();
        assert_eq!(par.num_geometries, 1);
    }

    #[test]
    fn test_geometry_not_persisted_without_spatial() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default().with_spatial(false);
        let cache = {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            assert!(!reader.is_spatial());
            read_all(&mut reader);
            reader.cache_path().to_path_buf()
        };
        assert!(manifest(&cache).iter().all(|row| row.num_geometries == 0));

        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::ReusedValid);
        read_all(&mut reader);
    }

    #[test]
    fn test_sessions_fill_cache_incrementally() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default();
        {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            assert_eq!(reader.read_data_blocks().unwrap(), BLOCKS);
        }
        let cache = dir.path().join("sample.db");
        assert!(manifest(&cache).iter().all(|row| !row.records_persisted()));
        {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            assert_eq!(reader.state(), CacheState::ReusedValid);
            assert_eq!(reader.read_data_records(Some("PAR")).unwrap(), 2);
            assert_eq!(reader.read_data_records(None).unwrap(), RECORDS - 2);
            assert_eq!(reader.load_geometry().unwrap(), GEOMETRIES);
        }
        let names = manifest(&cache).into_iter().map(|row| row.table_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["SOBR", "SBP", "HP", "PAR", "OPSUB"]);

        // Nothing is left to parse, so the source no longer matters.
        fixture::write_encoded(&source, "garbage", Encoding::Windows1250);
        fixture::age(&source, HOUR);
        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::ReusedValid);
        read_all(&mut reader);
        assert_eq!(reader.info("CODEPAGE"), Some("EE8MSWIN1250"));
    }

    #[test]
    fn test_stale_cache_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default();
        let cache = {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            reader.read_data_blocks().unwrap();
            reader.cache_path().to_path_buf()
        };
        fixture::age(&cache, HOUR);

        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::FreshBuild);
        assert!(!reader.is_pre_processed());
        assert!(manifest(&cache).is_empty());
        read_all(&mut reader);
        let mut repo = Repository::new(SqliteStore::open_read_only(&cache).unwrap());
        for row in repo.manifest().unwrap() {
            assert_eq!(row.num_records, repo.row_count(&row.table_name).unwrap());
        }
    }

    #[test]
    fn test_override_path_is_never_stale() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default().with_db_name(dir.path().join("custom.sqlite"));
        {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            assert_eq!(reader.cache_path(), dir.path().join("custom.sqlite"));
            read_all(&mut reader);
        }
        assert!(!dir.path().join("sample.db").exists());
        fixture::age(&dir.path().join("custom.sqlite"), HOUR);

        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::ReusedValid);
        read_all(&mut reader);
    }

    #[test]
    fn test_overwrite_rebuilds() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        {
            let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
            read_all(&mut reader);
        }
        let mut reader = CachedReader::open(&source, &ReaderOptions::default().with_overwrite(true)).unwrap();
        assert_eq!(reader.state(), CacheState::FreshBuild);
        read_all(&mut reader);
    }

    #[test]
    fn test_unexpected_manifest_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let cache = {
            let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
            read_all(&mut reader);
            reader.cache_path().to_path_buf()
        };
        let mut store = SqliteStore::open(&cache).unwrap();
        store
            .execute_all(&[
                "DROP TABLE vfk_blocks",
                "CREATE TABLE vfk_blocks (file_name text, file_size integer, table_name text, num_records integer, table_defn text)",
            ])
            .unwrap();
        assert_eq!(store.column_count("vfk_blocks").unwrap(), 5);
        store.close().unwrap();

        let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
        assert_eq!(reader.state(), CacheState::FreshBuild);
        assert!(!reader.is_pre_processed());
        read_all(&mut reader);
        let mut repo = Repository::new(SqliteStore::open_read_only(&cache).unwrap());
        assert_eq!(repo.manifest_column_count().unwrap(), MANIFEST_COLUMNS);
    }

    #[test]
    fn test_empty_manifest_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default();
        let cache = {
            let reader = CachedReader::open(&source, &options).unwrap();
            assert_eq!(reader.state(), CacheState::FreshBuild);
            reader.cache_path().to_path_buf()
        };
        assert!(manifest(&cache).is_empty());

        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::FreshBuild);
        assert!(!reader.is_pre_processed());
        read_all(&mut reader);
        assert_eq!(manifest(&cache).len(), BLOCKS);
    }

    #[test]
    fn test_override_path_equal_to_source() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let original = std::fs::read(&source).unwrap();
        let options = ReaderOptions::default().with_db_name(&source).with_delete_on_close(true);
        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::Failed);
        assert!(!reader.is_valid());
        assert!(matches!(reader.error().map(|err| &**err), Some(ErrorKind::Open(_))));
        let err = reader.read_data_blocks().unwrap_err();
        assert!(matches!(*err, ErrorKind::Unusable));
        drop(reader);
        assert_eq!(std::fs::read(&source).unwrap(), original);

        // A different spelling of the same file is caught too.
        let options = ReaderOptions::default().with_db_name(dir.path().join(".").join("sample.vfk"));
        let reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::Failed);
        drop(reader);
        assert_eq!(std::fs::read(&source).unwrap(), original);
    }

    #[test]
    fn test_delete_on_close() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default().with_delete_on_close(true);
        let cache = {
            let mut reader = CachedReader::open(&source, &options).unwrap();
            read_all(&mut reader);
            reader.cache_path().to_path_buf()
        };
        assert!(!cache.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_cache_as_source() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let cache = {
            let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
            read_all(&mut reader);
            reader.cache_path().to_path_buf()
        };
        let options = ReaderOptions::default().with_delete_on_close(true);
        {
            let mut reader = CachedReader::open(&cache, &options).unwrap();
            assert_eq!(reader.state(), CacheState::DbSourceValid);
            assert!(reader.is_db_source());
            assert!(reader.is_pre_processed());
            assert_eq!(reader.cache_path(), cache);
            read_all(&mut reader);
            assert_eq!(reader.info("VERZE"), Some("3.2"));
        }
        assert!(cache.exists());
    }

    #[test]
    fn test_foreign_database_as_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.db");
        let mut store = SqliteStore::open(&path).unwrap();
        store.execute("CREATE TABLE things (id integer)").unwrap();
        store.close().unwrap();

        let mut reader = CachedReader::open(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(reader.state(), CacheState::DbSourceInvalid);
        assert!(!reader.is_valid());
        assert!(matches!(reader.error().map(|err| &**err), Some(ErrorKind::CacheSchemaInvalid(_))));
        let err = reader.read_data_blocks().unwrap_err();
        assert!(matches!(*err, ErrorKind::Unusable));
        let err = reader.load_geometry().unwrap_err();
        assert!(matches!(*err, ErrorKind::Unusable));
        drop(reader);
        assert!(path.exists());
    }

    #[test]
    fn test_database_source_with_unexpected_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.db");
        let mut store = SqliteStore::open(&path).unwrap();
        store
            .execute(
                "CREATE TABLE vfk_blocks (file_name text, file_size integer, table_name text, num_records integer, table_defn text)",
            )
            .unwrap();
        store.close().unwrap();

        let mut reader = CachedReader::open(&path, &ReaderOptions::default().with_delete_on_close(true)).unwrap();
        assert_eq!(reader.state(), CacheState::DbSourceInvalid);
        assert!(!reader.is_valid());
        assert!(matches!(reader.error().map(|err| &**err), Some(ErrorKind::CacheSchemaInvalid(_))));
        let err = reader.read_data_blocks().unwrap_err();
        assert!(matches!(*err, ErrorKind::Unusable));
        let err = reader.load_geometry().unwrap_err();
        assert!(matches!(*err, ErrorKind::Unusable));
        drop(reader);
        assert!(path.exists());
        let mut store = SqliteStore::open_read_only(&path).unwrap();
        assert_eq!(store.column_count("vfk_blocks").unwrap(), 5);
    }

    #[test]
    fn test_database_source_with_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.db");
        let mut repo = Repository::new(SqliteStore::open(&path).unwrap());
        repo.create_schema().unwrap();
        repo.into_inner().close().unwrap();

        let reader = CachedReader::open(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(reader.state(), CacheState::DbSourceInvalid);
        assert!(!reader.is_valid());
        assert!(matches!(reader.error().map(|err| &**err), Some(ErrorKind::CacheSchemaInvalid(_))));
        drop(reader);
        assert!(manifest(&path).is_empty());
    }

    #[test]
    fn test_unwritable_cache_location() {
        let dir = TempDir::new().unwrap();
        let source = fixture::sample(dir.path(), "sample.vfk");
        let options = ReaderOptions::default().with_db_name(dir.path().join("missing").join("cache.db"));
        let mut reader = CachedReader::open(&source, &options).unwrap();
        assert_eq!(reader.state(), CacheState::Failed);
        assert!(!reader.is_valid());
        assert!(reader.error().is_some());
        let err = reader.read_data_records(None).unwrap_err();
        assert!(matches!(*err, ErrorKind::Unusable));
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = CachedReader::open(dir.path().join("missing.vfk"), &ReaderOptions::default()).unwrap_err();
        assert!(matches!(*err, ErrorKind::Open(_)));
    }

    #[test]
    fn test_amendment_keeps_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("change.vfk");
        fixture::write_encoded(
            &source,
            "&HZMENY;1\n&BPAR;ID N30;STAV_DAT N2\n&DPAR;7;2\n&DPAR;7;3\n&K\n",
            Encoding::Windows1250,
        );
        let mut reader = CachedReader::open(&source, &ReaderOptions::default()).unwrap();
        assert!(reader.source().is_amendment());
        assert_eq!(reader.read_data_records(None).unwrap(), 2);
        assert_eq!(manifest(reader.cache_path())[0].num_records, 2);
    }
}
