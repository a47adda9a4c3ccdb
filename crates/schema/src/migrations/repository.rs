//! Migration Repository - access to the migration log table
//!
//! The log table holds one row per applied migration (`id`, `batch`). It is
//! created through the schema builder like any other table.

use crate::connection::{DatabaseConnection, DatabaseRow, DatabaseValue, SqlDialect};
use crate::error::{SchemaError, SchemaResult};
use crate::schema::{grammar_for, SchemaBuilder};

use super::definitions::MigrationRecord;

/// Log table access for an explicit table name
#[derive(Debug, Clone)]
pub struct MigrationRepository {
    table: String,
}

impl MigrationRepository {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the log table exists
    pub async fn exists(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<bool> {
        SchemaBuilder::new(connection).has_table(&self.table).await
    }

    /// Create the log table
    pub async fn create_repository(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<()> {
        tracing::info!("Creating migration table {}", self.table);

        SchemaBuilder::new(connection)
            .create(&self.table, |table| {
                table.string("id", 255).primary();
                table.big_integer("batch");
            })
            .await
    }

    /// Create the log table unless it already exists
    pub async fn ensure_repository(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<()> {
        if !self.exists(connection).await? {
            self.create_repository(connection).await?;
        }
        Ok(())
    }

    /// Ids of applied migrations in apply order
    pub async fn get_ran(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<Vec<String>> {
        Ok(self
            .get_records(connection)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    /// All log rows in apply order (batch, then id)
    pub async fn get_records(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT id, batch FROM {} ORDER BY batch ASC, id ASC",
            self.wrapped_table(connection)?
        );
        self.fetch_records(connection, &sql, &[]).await
    }

    /// The last `steps` applied migrations, most recent first
    pub async fn get_migrations(
        &self,
        connection: &mut dyn DatabaseConnection,
        steps: usize,
    ) -> SchemaResult<Vec<MigrationRecord>> {
        if steps == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, batch FROM {} ORDER BY batch DESC, id DESC LIMIT {}",
            self.wrapped_table(connection)?,
            steps
        );
        self.fetch_records(connection, &sql, &[]).await
    }

    /// Migrations of the latest batch, most recent first
    pub async fn get_last_batch(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<Vec<MigrationRecord>> {
        let batch = self.get_last_batch_number(connection).await?;
        if batch == 0 {
            return Ok(Vec::new());
        }

        let dialect = self.dialect(connection)?;
        let sql = format!(
            "SELECT id, batch FROM {} WHERE batch = {} ORDER BY id DESC",
            self.wrapped_table(connection)?,
            dialect.parameter_placeholder(0)
        );
        self.fetch_records(connection, &sql, &[batch.into()]).await
    }

    /// Highest batch number, 0 when nothing has run
    pub async fn get_last_batch_number(&self, connection: &mut dyn DatabaseConnection) -> SchemaResult<i64> {
        let sql = format!("SELECT MAX(batch) AS batch FROM {}", self.wrapped_table(connection)?);
        let row = connection.fetch_optional(&sql, &[]).await?;

        Ok(row
            .as_ref()
            .and_then(|row| row.get_by_index(0).ok())
            .and_then(DatabaseValue::as_i64)
            .unwrap_or(0))
    }

    /// Record a migration as applied
    pub async fn log(&self, connection: &mut dyn DatabaseConnection, id: &str, batch: i64) -> SchemaResult<()> {
        let dialect = self.dialect(connection)?;
        let sql = format!(
            "INSERT INTO {} (id, batch) VALUES ({}, {})",
            self.wrapped_table(connection)?,
            dialect.parameter_placeholder(0),
            dialect.parameter_placeholder(1)
        );

        connection
            .execute(&sql, &[id.into(), batch.into()])
            .await
            .map_err(|e| SchemaError::execution(sql.as_str(), e))?;
        Ok(())
    }

    /// Remove a migration record
    pub async fn delete(&self, connection: &mut dyn DatabaseConnection, id: &str) -> SchemaResult<()> {
        let dialect = self.dialect(connection)?;
        let sql = format!(
            "DELETE FROM {} WHERE id = {}",
            self.wrapped_table(connection)?,
            dialect.parameter_placeholder(0)
        );

        connection
            .execute(&sql, &[id.into()])
            .await
            .map_err(|e| SchemaError::execution(sql.as_str(), e))?;
        Ok(())
    }

    fn dialect(&self, connection: &dyn DatabaseConnection) -> SchemaResult<SqlDialect> {
        SqlDialect::from_driver_name(connection.driver_name())
            .ok_or_else(|| SchemaError::UnsupportedDialect(connection.driver_name().to_string()))
    }

    fn wrapped_table(&self, connection: &dyn DatabaseConnection) -> SchemaResult<String> {
        Ok(grammar_for(self.dialect(connection)?).wrap_table(&self.table))
    }

    async fn fetch_records(
        &self,
        connection: &mut dyn DatabaseConnection,
        sql: &str,
        params: &[DatabaseValue],
    ) -> SchemaResult<Vec<MigrationRecord>> {
        let rows = connection.fetch_all(sql, params).await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &DatabaseRow) -> SchemaResult<MigrationRecord> {
    let id = row
        .get_by_name("id")?
        .as_string()
        .ok_or_else(|| SchemaError::Migration("Migration log row has no id".to_string()))?;
    let batch = row
        .get_by_name("batch")?
        .as_i64()
        .ok_or_else(|| SchemaError::Migration(format!("Migration log row {} has no batch", id)))?;

    Ok(MigrationRecord { id, batch })
}
