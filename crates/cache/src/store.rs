//! The primitive operations the cache needs from an embedded SQL store.

use crate::error::Result;
use crate::schema::quote_ident;
use vfk_model::Value;

/// A statement validated by [`Store::prepare`], ready to be executed
/// repeatedly with different parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    sql: String,
}
impl Statement {
    pub(crate) fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Description of a secondary index. Unique unless [`IndexSpec::non_unique`]
/// is called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    name: String,
    table: String,
    columns: Vec<String>,
    unique: bool,
}
impl IndexSpec {
    pub fn new(name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: true,
        }
    }

    pub fn non_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn to_sql(&self) -> String {
        let columns = self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({columns})",
            if self.unique { "UNIQUE " } else { "" },
            quote_ident(&self.name),
            quote_ident(&self.table),
        )
    }
}

/// Synchronous access to an embedded SQL database.
///
/// Every call blocks until the database has answered. Multi-statement
/// operations ([`Store::execute_all`], [`Store::insert_many`]) run inside a
/// single transaction and either apply completely or not at all.
pub trait Store {
    /// Run one write or DDL statement and report the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run several statements in one transaction, reporting the affected rows
    /// of each.
    fn execute_all<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<Vec<u64>>;

    /// Run a query returning a single integer, such as `SELECT COUNT(*)`.
    fn count(&mut self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Run a query and return every row.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;

    /// Compile a statement for repeated execution.
    fn prepare(&mut self, sql: &str) -> Result<Statement>;

    fn execute_prepared(&mut self, statement: &Statement, params: &[Value]) -> Result<u64>;

    /// Execute a prepared statement once per row inside a single transaction.
    fn insert_many<I>(&mut self, statement: &Statement, rows: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: AsRef<[Value]>;

    /// Whether writes are rejected.
    fn is_read_only(&self) -> bool;

    fn create_index(&mut self, index: &IndexSpec) -> Result<()> {
        tracing::debug!(index = index.name(), unique = index.is_unique(), "Creating index");
        self.execute(&index.to_sql()).map(drop)
    }

    /// Number of columns of a table, zero if it does not exist.
    fn column_count(&mut self, table: &str) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM pragma_table_info(?1)", &[table.into()])
    }

    /// Whether exactly one table of that name is registered in the schema.
    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let found = self.count(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[table.into()],
        )?;
        Ok(found == 1)
    }
}
