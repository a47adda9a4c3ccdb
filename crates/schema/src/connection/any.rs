//! sqlx-backed connection
//!
//! Wraps a single `sqlx::AnyConnection` so one code path serves PostgreSQL,
//! MySQL and SQLite. Migrations need a single physical connection: the
//! transaction a migration opens must be the one its statements run on.

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Column, Connection, Executor, Row, ValueRef};

use super::{DatabaseConnection, DatabaseRow, DatabaseValue};
use crate::error::{SchemaError, SchemaResult};

/// Database connection over the sqlx `Any` driver
pub struct AnyDatabaseConnection {
    conn: AnyConnection,
    driver: String,
}

impl AnyDatabaseConnection {
    /// Connect using a database URL (`postgres://`, `mysql://`, `sqlite:`)
    pub async fn connect(database_url: &str) -> SchemaResult<Self> {
        sqlx::any::install_default_drivers();

        let conn = AnyConnection::connect(database_url)
            .await
            .map_err(|e| SchemaError::Database(format!("Failed to connect to database: {}", e)))?;
        let driver = conn.backend_name().to_string();

        tracing::debug!("Connected to {} database", driver);
        Ok(Self { conn, driver })
    }

    /// Close the connection
    pub async fn close(self) -> SchemaResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnection for AnyDatabaseConnection {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> SchemaResult<u64> {
        let result = if params.is_empty() {
            // plain text protocol, DDL and transaction control are not always preparable
            self.conn.execute(sql).await?
        } else {
            bind_all(sqlx::query(sql), params).execute(&mut self.conn).await?
        };

        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> SchemaResult<Vec<DatabaseRow>> {
        let rows = if params.is_empty() {
            self.conn.fetch_all(sql).await?
        } else {
            bind_all(sqlx::query(sql), params).fetch_all(&mut self.conn).await?
        };

        rows.iter().map(convert_row).collect()
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> SchemaResult<Option<DatabaseRow>> {
        let row = if params.is_empty() {
            self.conn.fetch_optional(sql).await?
        } else {
            bind_all(sqlx::query(sql), params).fetch_optional(&mut self.conn).await?
        };

        row.as_ref().map(convert_row).transpose()
    }

    fn driver_name(&self) -> &str {
        &self.driver
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &[DatabaseValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Bool(b) => query.bind(*b),
            DatabaseValue::Int32(i) => query.bind(*i),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::Float64(f) => query.bind(*f),
            DatabaseValue::String(s) => query.bind(s.clone()),
            DatabaseValue::Bytes(b) => query.bind(b.clone()),
        };
    }
    query
}

fn convert_row(row: &AnyRow) -> SchemaResult<DatabaseRow> {
    let columns: Vec<String> = row.columns().iter().map(|col| col.name().to_string()).collect();
    let values = (0..columns.len())
        .map(|index| convert_value(row, index))
        .collect::<SchemaResult<Vec<_>>>()?;

    Ok(DatabaseRow::new(columns, values))
}

fn convert_value(row: &AnyRow, index: usize) -> SchemaResult<DatabaseValue> {
    // SQLite types NULL results (e.g. MAX over no rows) as NULL, which no typed decode accepts
    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }
    if let Ok(Some(value)) = row.try_get::<Option<i64>, _>(index) {
        return Ok(DatabaseValue::Int64(value));
    }
    if let Ok(Some(value)) = row.try_get::<Option<String>, _>(index) {
        return Ok(DatabaseValue::String(value));
    }
    if let Ok(Some(value)) = row.try_get::<Option<f64>, _>(index) {
        return Ok(DatabaseValue::Float64(value));
    }
    if let Ok(Some(value)) = row.try_get::<Option<bool>, _>(index) {
        return Ok(DatabaseValue::Bool(value));
    }
    if let Ok(Some(value)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(DatabaseValue::Bytes(value));
    }

    Err(SchemaError::Database(format!(
        "Unsupported value type in column {}",
        index
    )))
}
