//! Database Connection Abstractions
//!
//! The schema builder and migrator only need a handful of operations from a
//! live connection: run a statement, fetch rows, report the driver name and
//! scope a transaction. These traits keep the rest of the crate independent
//! of the concrete driver.

pub mod any;

pub use any::AnyDatabaseConnection;

use async_trait::async_trait;
use crate::error::{SchemaError, SchemaResult};

/// Abstract database connection trait
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute a statement and return affected rows count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> SchemaResult<u64>;

    /// Execute a query and return the result rows
    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> SchemaResult<Vec<DatabaseRow>>;

    /// Execute a query and return the first result row
    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> SchemaResult<Option<DatabaseRow>>;

    /// Name of the driver behind this connection (e.g. "PostgreSQL")
    fn driver_name(&self) -> &str;

    /// Begin a transaction
    async fn begin_transaction(&mut self) -> SchemaResult<()> {
        self.execute("BEGIN", &[]).await.map(|_| ())
    }

    /// Commit the current transaction
    async fn commit(&mut self) -> SchemaResult<()> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    /// Rollback the current transaction
    async fn rollback(&mut self) -> SchemaResult<()> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }
}

/// Database value enumeration for parameter binding and row decoding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl DatabaseValue {
    /// Read the value as an integer, parsing text representations
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Bool(b) => Some(*b as i64),
            DatabaseValue::Float64(f) if f.fract() == 0.0 => Some(*f as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read the value as text; byte strings must be valid UTF-8
    pub fn as_string(&self) -> Option<String> {
        match self {
            DatabaseValue::String(s) => Some(s.clone()),
            DatabaseValue::Bytes(b) => String::from_utf8(b.clone()).ok(),
            DatabaseValue::Int32(i) => Some(i.to_string()),
            DatabaseValue::Int64(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A fetched row: column names in select order with their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new(columns: Vec<String>, values: Vec<DatabaseValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> SchemaResult<&DatabaseValue> {
        self.values
            .get(index)
            .ok_or_else(|| SchemaError::Database(format!("Column index {} out of range", index)))
    }

    /// Get a column value by name (case-insensitive, drivers disagree on label case)
    pub fn get_by_name(&self, name: &str) -> SchemaResult<&DatabaseValue> {
        let index = self
            .columns
            .iter()
            .position(|col| col.eq_ignore_ascii_case(name))
            .ok_or_else(|| SchemaError::Database(format!("Column '{}' not found", name)))?;

        self.get_by_index(index)
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Resolve a dialect from a connection's driver name, ignoring case
    pub fn from_driver_name(driver: &str) -> Option<Self> {
        match driver.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pgsql" => Some(SqlDialect::PostgreSQL),
            "mysql" | "mariadb" => Some(SqlDialect::MySQL),
            "sqlite" | "sqlite3" => Some(SqlDialect::SQLite),
            _ => None,
        }
    }

    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => '"',
            SqlDialect::MySQL => '`',
        }
    }

    /// Whether DDL statements take part in transactions
    pub fn supports_transactional_ddl(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => true,
            SqlDialect::MySQL => false,
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_driver_name() {
        assert_eq!(SqlDialect::from_driver_name("PostgreSQL"), Some(SqlDialect::PostgreSQL));
        assert_eq!(SqlDialect::from_driver_name("MySQL"), Some(SqlDialect::MySQL));
        assert_eq!(SqlDialect::from_driver_name("SQLite"), Some(SqlDialect::SQLite));
        assert_eq!(SqlDialect::from_driver_name("mssql"), None);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(1), "$2");
        assert_eq!(SqlDialect::MySQL.parameter_placeholder(1), "?");
    }

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let row = DatabaseRow::from_pairs([("COLUMN_NAME", "email"), ("batch", "3")]);

        assert_eq!(row.get_by_name("column_name").unwrap().as_string().as_deref(), Some("email"));
        assert_eq!(row.get_by_name("batch").unwrap().as_i64(), Some(3));
        assert!(row.get_by_name("missing").is_err());
    }
}
