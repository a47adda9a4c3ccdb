//! Schema Grammars - dialect-specific DDL compilers
//!
//! A [`Grammar`] turns a [`Blueprint`] into the literal SQL statements for one
//! database dialect. The compile algorithm is shared (see
//! [`Grammar::compile_blueprint`]); dialects supply type mapping, column
//! modifiers and one method per command. A command method a dialect does not
//! override compiles to nothing, so unsupported commands are skipped rather
//! than failing the whole blueprint.
//!
//! This is the only place where SQL text is assembled, so identifier quoting
//! and literal escaping live here too.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;

use super::blueprint::Blueprint;
use super::column::{ColumnDefinition, DefaultValue};
use super::command::Command;
use super::foreign::ForeignKeyDefinition;
use crate::connection::{DatabaseValue, SqlDialect};
use crate::error::{SchemaError, SchemaResult};

/// Grammar for the given dialect
pub fn grammar_for(dialect: SqlDialect) -> Box<dyn Grammar> {
    match dialect {
        SqlDialect::MySQL => Box::new(MySqlGrammar),
        SqlDialect::SQLite => Box::new(SqliteGrammar),
        SqlDialect::PostgreSQL => Box::new(PostgresGrammar),
    }
}

/// Grammar for a connection's driver name
pub fn grammar_for_driver(driver: &str) -> SchemaResult<Box<dyn Grammar>> {
    SqlDialect::from_driver_name(driver)
        .map(grammar_for)
        .ok_or_else(|| SchemaError::UnsupportedDialect(driver.to_string()))
}

/// Dialect-specific DDL compiler
pub trait Grammar: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Native type for a column
    fn type_sql(&self, column: &ColumnDefinition) -> SchemaResult<String>;

    /// Full column clause: quoted name, type and modifiers in dialect order
    fn column_sql(&self, blueprint: &Blueprint, column: &ColumnDefinition) -> SchemaResult<String>;

    /// Token for a boolean literal
    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Single `CREATE TABLE` plus any statements it needs right after
    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>>;

    /// Statements adding the blueprint's new columns to an existing table
    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>>;

    /// Statements modifying `change()` columns
    fn compile_change(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        match blueprint.changed_columns().next() {
            Some(column) => Err(SchemaError::Compile(format!(
                "{} grammar cannot modify column '{}' in place",
                self.dialect(),
                column.name()
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// Compile a blueprint into the ordered statements to execute
    ///
    /// Creates emit the table statement first, alters emit added and changed
    /// columns first; every command follows in declaration order, implied
    /// column indexes ahead of explicit commands.
    fn compile_blueprint(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let mut statements = if blueprint.is_creating() {
            self.compile_create(blueprint)?
        } else {
            let mut statements = self.compile_add(blueprint)?;
            statements.extend(self.compile_change(blueprint)?);
            statements
        };

        for command in blueprint.all_commands() {
            let compiled = self.compile_command(blueprint, &command);
            let inlined = blueprint.is_creating() && self.inlined_on_create(&command);
            if compiled.is_empty() && !inlined {
                tracing::warn!(
                    "{} grammar emits nothing for {} command on {}",
                    self.dialect(),
                    command.kind(),
                    blueprint.table_name()
                );
            }
            statements.extend(compiled);
        }

        Ok(statements)
    }

    /// Whether `compile_create` already declares this command inside the table
    fn inlined_on_create(&self, _command: &Command) -> bool {
        false
    }

    /// Dispatch one command to its compile method
    fn compile_command(&self, blueprint: &Blueprint, command: &Command) -> Vec<String> {
        match command {
            Command::Primary { columns, name } => self.compile_primary(blueprint, columns, name),
            Command::Unique { columns, name } => self.compile_unique(blueprint, columns, name),
            Command::Index { columns, name } => self.compile_index(blueprint, columns, name),
            Command::Fulltext { columns, name } => self.compile_fulltext(blueprint, columns, name),
            Command::Foreign(foreign) => self.compile_foreign(blueprint, foreign),
            Command::DropColumn { columns } => self.compile_drop_column(blueprint, columns),
            Command::DropPrimary => self.compile_drop_primary(blueprint),
            Command::DropUnique { name } => self.compile_drop_unique(blueprint, name),
            Command::DropIndex { name } => self.compile_drop_index(blueprint, name),
            Command::DropForeign { name } => self.compile_drop_foreign(blueprint, name),
            Command::RenameColumn { from, to } => self.compile_rename_column(blueprint, from, to),
        }
    }

    fn compile_primary(&self, _blueprint: &Blueprint, _columns: &[String], _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_unique(&self, _blueprint: &Blueprint, _columns: &[String], _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_index(&self, _blueprint: &Blueprint, _columns: &[String], _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_fulltext(&self, _blueprint: &Blueprint, _columns: &[String], _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_foreign(&self, _blueprint: &Blueprint, _foreign: &ForeignKeyDefinition) -> Vec<String> {
        Vec::new()
    }

    fn compile_drop_column(&self, _blueprint: &Blueprint, _columns: &[String]) -> Vec<String> {
        Vec::new()
    }

    fn compile_drop_primary(&self, _blueprint: &Blueprint) -> Vec<String> {
        Vec::new()
    }

    fn compile_drop_unique(&self, _blueprint: &Blueprint, _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_drop_index(&self, _blueprint: &Blueprint, _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_drop_foreign(&self, _blueprint: &Blueprint, _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn compile_rename_column(&self, blueprint: &Blueprint, from: &str, to: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.wrap_table(blueprint.table_name()),
            self.wrap(from),
            self.wrap(to)
        )]
    }

    // --- table level statements ------------------------------------------

    fn compile_drop(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.wrap_table(table))
    }

    fn compile_rename(&self, from: &str, to: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.wrap_table(from), self.wrap_table(to))
    }

    /// Statements dropping every listed table, ignoring foreign key order
    fn compile_drop_all_tables(&self, tables: &[String]) -> Vec<String>;

    // --- introspection -----------------------------------------------------

    /// Query returning a row when `table` exists
    fn compile_table_exists(&self, table: &str) -> (String, Vec<DatabaseValue>);

    /// Query returning one row per column of `table`, column name first
    fn compile_column_listing(&self, table: &str) -> (String, Vec<DatabaseValue>);

    /// Query returning one row per user table, table name first
    fn compile_all_tables(&self) -> String;

    // --- advisory locking --------------------------------------------------

    /// Non-blocking lock acquisition; the query returns a truthy first column on success
    fn compile_acquire_lock(&self, _name: &str) -> Option<String> {
        None
    }

    fn compile_release_lock(&self, _name: &str) -> Option<String> {
        None
    }

    // --- quoting helpers ---------------------------------------------------

    /// Quote an identifier, keeping `schema.table` segments separate
    fn wrap(&self, value: &str) -> String {
        let quote = self.dialect().identifier_quote();
        value
            .split('.')
            .map(|segment| {
                let escaped = segment.replace(quote, &format!("{quote}{quote}"));
                format!("{quote}{escaped}{quote}")
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn wrap_table(&self, table: &str) -> String {
        self.wrap(table)
    }

    /// Comma separated list of quoted column names
    fn columnize(&self, columns: &[String]) -> String {
        columns.iter().map(|c| self.wrap(c)).collect::<Vec<_>>().join(", ")
    }

    /// Single-quoted string literal with embedded quotes doubled
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Render a default value as a SQL literal
    fn default_literal(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Bool(b) => self.boolean_literal(*b).to_string(),
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::String(s) => self.quote_string(s),
            DefaultValue::Expression(sql) => sql.clone(),
        }
    }

    /// `DEFAULT ...` clause for a column, if any
    fn default_clause(&self, column: &ColumnDefinition) -> Option<String> {
        if let Some(value) = column.default_value() {
            Some(format!(" DEFAULT {}", self.default_literal(value)))
        } else if column.use_current {
            Some(" DEFAULT CURRENT_TIMESTAMP".to_string())
        } else {
            None
        }
    }

    /// `FOREIGN KEY (...) REFERENCES ...` clause shared by inline and alter forms
    fn foreign_clause(&self, foreign: &ForeignKeyDefinition) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.wrap(foreign.column()),
            self.wrap_table(foreign.referenced_table()),
            self.wrap(foreign.referenced_column()),
            foreign.delete_action(),
            foreign.update_action()
        )
    }

    /// Quoted, comma separated enum values
    fn enum_values(&self, column: &ColumnDefinition, allowed: &[String]) -> SchemaResult<String> {
        if allowed.is_empty() {
            return Err(SchemaError::Compile(format!(
                "Enum column '{}' has no allowed values",
                column.name()
            )));
        }
        Ok(allowed.iter().map(|v| self.quote_string(v)).collect::<Vec<_>>().join(", "))
    }
}
