//! SQLite binding of [`Store`], built on `sqlx`.

use crate::error::{ErrorKind, Result};
use crate::store::{Statement, Store};
use exn::{OptionExt, ResultExt};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow, SqliteSynchronous,
};
use sqlx::{Connection, Executor, Row, Sqlite, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::instrument;
use vfk_model::Value;

const IN_MEMORY: &str = ":memory:";

/// A single SQLite connection driven to completion on a private
/// current-thread runtime.
///
/// The readers are synchronous, so every operation blocks on the future
/// returned by `sqlx`. A store must therefore not be used (or dropped) from
/// inside another Tokio runtime.
pub struct SqliteStore {
    runtime: Runtime,
    conn: Option<SqliteConnection>,
    path: PathBuf,
    read_only: bool,
}
impl SqliteStore {
    /// Extension of cache files derived from a source path.
    pub const EXTENSION: &'static str = "db";

    /// Open a database file for reading and writing, creating it if missing.
    ///
    /// Durability is traded for speed (`PRAGMA synchronous = OFF`): a cache
    /// that is damaged by a crash is detected and rebuilt from the source.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        Self::connect(options, path.to_path_buf(), false)
    }

    /// Open an existing database file without write access.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).read_only(true);
        Self::connect(options, path.to_path_buf(), true)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(IN_MEMORY);
        Self::connect(options, PathBuf::from(IN_MEMORY), false)
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .synchronous(SqliteSynchronous::Off)
            .foreign_keys(false)
    }

    fn connect(options: SqliteConnectOptions, path: PathBuf, read_only: bool) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .or_raise(|| ErrorKind::Open(path.clone()))?;
        let conn = runtime
            .block_on(SqliteConnection::connect_with(&options))
            .or_raise(|| ErrorKind::Open(path.clone()))?;
        tracing::debug!(path = %path.display(), read_only, "Opened SQLite store");
        Ok(Self { runtime, conn: Some(conn), path, read_only })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the connection, flushing anything SQLite still holds.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => self.runtime.block_on(conn.close()).or_raise(|| ErrorKind::Database),
            None => Ok(()),
        }
    }

    fn parts(&mut self) -> Result<(&Runtime, &mut SqliteConnection)> {
        let conn = self.conn.as_mut().ok_or_raise(|| ErrorKind::Closed)?;
        Ok((&self.runtime, conn))
    }

    fn writable(&mut self) -> Result<(&Runtime, &mut SqliteConnection)> {
        if self.read_only {
            exn::bail!(ErrorKind::ReadOnly);
        }
        self.parts()
    }
}
impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(err) = self.runtime.block_on(conn.close())
        {
            tracing::warn!(path = %self.path.display(), error = %err, "Failed to close SQLite store");
        }
    }
}
impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl Store for SqliteStore {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        let (runtime, conn) = self.writable()?;
        let done = runtime.block_on(sqlx::query(sql).execute(&mut *conn)).or_raise(|| ErrorKind::Database)?;
        Ok(done.rows_affected())
    }

    fn execute_all<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<Vec<u64>> {
        let (runtime, conn) = self.writable()?;
        runtime
            .block_on(async {
                let mut tx = conn.begin().await?;
                let mut affected = Vec::with_capacity(statements.len());
                for sql in statements {
                    affected.push(sqlx::query(sql.as_ref()).execute(&mut *tx).await?.rows_affected());
                }
                tx.commit().await?;
                Ok::<_, sqlx::Error>(affected)
            })
            .or_raise(|| ErrorKind::Database)
    }

    fn count(&mut self, sql: &str, params: &[Value]) -> Result<i64> {
        let (runtime, conn) = self.parts()?;
        let row = runtime
            .block_on(bind_values(sqlx::query(sql), params).fetch_one(&mut *conn))
            .or_raise(|| ErrorKind::Database)?;
        row.try_get::<i64, _>(0).or_raise(|| ErrorKind::InvalidData("count"))
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        let (runtime, conn) = self.parts()?;
        let rows = runtime
            .block_on(bind_values(sqlx::query(sql), params).fetch_all(&mut *conn))
            .or_raise(|| ErrorKind::Database)?;
        rows.iter()
            .map(decode_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .or_raise(|| ErrorKind::InvalidData("row"))
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let (runtime, conn) = self.parts()?;
        // Prepared statements are cached per connection, so later executions
        // of the same SQL reuse the compiled form.
        runtime.block_on(conn.prepare(sql)).or_raise(|| ErrorKind::Database)?;
        Ok(Statement::new(sql))
    }

    fn execute_prepared(&mut self, statement: &Statement, params: &[Value]) -> Result<u64> {
        let (runtime, conn) = self.writable()?;
        let done = runtime
            .block_on(bind_values(sqlx::query(statement.sql()), params).execute(&mut *conn))
            .or_raise(|| ErrorKind::Database)?;
        Ok(done.rows_affected())
    }

    fn insert_many<I>(&mut self, statement: &Statement, rows: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: AsRef<[Value]>,
    {
        let (runtime, conn) = self.writable()?;
        runtime
            .block_on(async {
                let mut tx = conn.begin().await?;
                let mut affected = 0;
                for row in rows {
                    let query = bind_values(sqlx::query(statement.sql()), row.as_ref());
                    affected += query.execute(&mut *tx).await?.rows_affected();
                }
                tx.commit().await?;
                Ok::<_, sqlx::Error>(affected)
            })
            .or_raise(|| ErrorKind::Database)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(i) => query.bind(*i),
            Value::Real(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> sqlx::Result<Vec<Value>> {
    (0..row.len()).map(|index| decode_column(row, index)).collect()
}

/// Decode a column by the storage class of the stored value rather than the
/// declared column type, which SQLite does not enforce.
fn decode_column(row: &SqliteRow, index: usize) -> sqlx::Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    Ok(match storage.as_str() {
        "INTEGER" | "BIGINT" | "INT8" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => Value::Real(row.try_get_unchecked::<f64, _>(index)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    })
}
