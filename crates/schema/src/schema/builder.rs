//! Schema Builder - runs table lifecycle operations against a connection
//!
//! Every mutating call compiles a [`Blueprint`] (or a single table statement)
//! with the grammar matching the connection's driver and executes the
//! statements one by one, in order. Introspection queries degrade to
//! "absent" when the driver has no grammar.

use super::blueprint::Blueprint;
use super::grammar::{grammar_for, grammar_for_driver, Grammar};
use crate::connection::{DatabaseConnection, SqlDialect};
use crate::error::{SchemaError, SchemaResult};

/// Schema operations bound to one live connection
pub struct SchemaBuilder<'c> {
    connection: &'c mut dyn DatabaseConnection,
}

impl<'c> SchemaBuilder<'c> {
    pub fn new(connection: &'c mut dyn DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Dialect of the underlying connection, if it is a supported one
    pub fn dialect(&self) -> Option<SqlDialect> {
        SqlDialect::from_driver_name(self.connection.driver_name())
    }

    /// Grammar for the underlying connection
    pub fn grammar(&self) -> SchemaResult<Box<dyn Grammar>> {
        grammar_for_driver(self.connection.driver_name())
    }

    /// Direct access to the connection, for raw queries
    pub fn connection(&mut self) -> &mut dyn DatabaseConnection {
        &mut *self.connection
    }

    /// Compile a blueprint and execute its statements in order
    pub async fn build(&mut self, blueprint: Blueprint) -> SchemaResult<()> {
        let grammar = self.grammar()?;
        let statements = blueprint.to_sql(grammar.as_ref())?;

        for sql in &statements {
            self.statement(sql).await?;
        }
        Ok(())
    }

    /// Create a new table
    pub async fn create<F>(&mut self, table: &str, callback: F) -> SchemaResult<()>
    where
        F: FnOnce(&mut Blueprint) + Send,
    {
        let mut blueprint = Blueprint::create(table);
        callback(&mut blueprint);
        self.build(blueprint).await
    }

    /// Modify an existing table
    pub async fn table<F>(&mut self, table: &str, callback: F) -> SchemaResult<()>
    where
        F: FnOnce(&mut Blueprint) + Send,
    {
        let mut blueprint = Blueprint::table(table);
        callback(&mut blueprint);
        self.build(blueprint).await
    }

    pub async fn drop(&mut self, table: &str) -> SchemaResult<()> {
        let sql = self.grammar()?.compile_drop(table);
        self.statement(&sql).await
    }

    /// Drop a table if it exists
    ///
    /// Checks with [`has_table`](Self::has_table) first instead of relying on
    /// `DROP TABLE IF EXISTS`.
    pub async fn drop_if_exists(&mut self, table: &str) -> SchemaResult<()> {
        if self.has_table(table).await? {
            self.drop(table).await?;
        }
        Ok(())
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> SchemaResult<()> {
        let sql = self.grammar()?.compile_rename(from, to);
        self.statement(&sql).await
    }

    pub async fn has_table(&mut self, table: &str) -> SchemaResult<bool> {
        let Some(dialect) = self.dialect() else {
            return Ok(false);
        };

        let (sql, params) = grammar_for(dialect).compile_table_exists(table);
        let row = self.connection.fetch_optional(&sql, &params).await?;
        Ok(row.is_some())
    }

    /// Column names of a table in declaration order
    pub async fn get_column_listing(&mut self, table: &str) -> SchemaResult<Vec<String>> {
        let Some(dialect) = self.dialect() else {
            return Ok(Vec::new());
        };

        let (sql, params) = grammar_for(dialect).compile_column_listing(table);
        let rows = self.connection.fetch_all(&sql, &params).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_by_index(0).ok().and_then(|value| value.as_string()))
            .collect())
    }

    /// Whether a table has a column, ignoring case
    pub async fn has_column(&mut self, table: &str, column: &str) -> SchemaResult<bool> {
        let listing = self.get_column_listing(table).await?;
        Ok(listing.iter().any(|name| name.eq_ignore_ascii_case(column)))
    }

    /// Whether a table has every one of the given columns
    pub async fn has_columns(&mut self, table: &str, columns: &[&str]) -> SchemaResult<bool> {
        let listing = self.get_column_listing(table).await?;
        Ok(columns
            .iter()
            .all(|column| listing.iter().any(|name| name.eq_ignore_ascii_case(column))))
    }

    /// Names of all user tables
    pub async fn get_all_tables(&mut self) -> SchemaResult<Vec<String>> {
        let Some(dialect) = self.dialect() else {
            return Ok(Vec::new());
        };

        let sql = grammar_for(dialect).compile_all_tables();
        let rows = self.connection.fetch_all(&sql, &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_by_index(0).ok().and_then(|value| value.as_string()))
            .collect())
    }

    /// Drop every user table, ignoring foreign key order
    pub async fn drop_all_tables(&mut self) -> SchemaResult<()> {
        let grammar = self.grammar()?;
        let tables = self.get_all_tables().await?;

        for sql in grammar.compile_drop_all_tables(&tables) {
            self.statement(&sql).await?;
        }
        Ok(())
    }

    /// Execute one raw statement
    pub async fn statement(&mut self, sql: &str) -> SchemaResult<()> {
        tracing::debug!(statement = sql, "Executing schema statement");

        self.connection
            .execute(sql, &[])
            .await
            .map(|_| ())
            .map_err(|e| SchemaError::execution(sql, e))
    }
}
