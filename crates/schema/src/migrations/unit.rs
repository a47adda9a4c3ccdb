//! Migration units
//!
//! A unit is anything with an id and an `up` step; `down` is optional. SQL
//! files found on the migration paths become [`SqlMigration`]s, code-defined
//! units implement [`Migration`] directly and are registered on the
//! [`Migrator`](super::Migrator).

use async_trait::async_trait;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Location, Token, Tokenizer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::connection::SqlDialect;
use crate::error::{SchemaError, SchemaResult};
use crate::schema::SchemaBuilder;

/// A reversible (or not) schema change
#[async_trait]
pub trait Migration: Send + Sync {
    /// Sortable identity, `{YYYY_MM_DD_HHMMSS}_{description}`
    fn id(&self) -> &str;

    async fn up(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()>;

    /// Revert `up`; units without a down step are not reversible
    async fn down(&self, _schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        Err(SchemaError::NotReversible(self.id().to_string()))
    }
}

/// Migration read from a `.sql` file with `-- Up migration` / `-- Down migration` sections
#[derive(Debug, Clone, PartialEq)]
pub struct SqlMigration {
    id: String,
    path: Option<PathBuf>,
    up_sql: String,
    down_sql: Option<String>,
}

impl SqlMigration {
    /// Parse migration content; `down_sql` is `None` when there is no down marker
    pub fn parse(id: impl Into<String>, content: &str) -> Self {
        let mut up = Vec::new();
        let mut down: Option<Vec<&str>> = None;

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(comment) = trimmed.strip_prefix("--") {
                let marker = comment.trim().to_lowercase();
                if marker == "down" || marker.starts_with("down migration") {
                    down.get_or_insert_with(Vec::new);
                }
                // markers and comment lines are not part of the script
                continue;
            }

            match down.as_mut() {
                Some(down) => down.push(line),
                None => up.push(line),
            }
        }

        Self {
            id: id.into(),
            path: None,
            up_sql: up.join("\n").trim().to_string(),
            down_sql: down.map(|lines| lines.join("\n").trim().to_string()),
        }
    }

    /// Load a migration file; the id is the file name without extension
    pub fn from_file(path: &Path) -> SchemaResult<Self> {
        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| SchemaError::Migration(format!("Invalid migration filename: {}", path.display())))?;

        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::Migration(format!("Failed to read migration file {}: {}", path.display(), e))
        })?;

        let mut migration = Self::parse(id, &content);
        migration.path = Some(path.to_path_buf());
        Ok(migration)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> Option<&str> {
        self.down_sql.as_deref()
    }

    pub fn is_reversible(&self) -> bool {
        self.down_sql.is_some()
    }

    async fn execute_sql(schema: &mut SchemaBuilder<'_>, sql: &str) -> SchemaResult<()> {
        for statement in split_sql_statements(sql, schema.dialect()) {
            schema.statement(&statement).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn id(&self) -> &str {
        &self.id
    }

    async fn up(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        Self::execute_sql(schema, &self.up_sql).await
    }

    async fn down(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        match &self.down_sql {
            Some(sql) => Self::execute_sql(schema, sql).await,
            None => Err(SchemaError::NotReversible(self.id.clone())),
        }
    }
}

/// Split a script into statements
///
/// Uses the sqlparser tokenizer for the connection's dialect so semicolons
/// inside strings, quoted identifiers and comments are left alone. Statement
/// text is sliced from the input unchanged. Falls back to naive splitting on
/// `;` when the script cannot be tokenized.
pub fn split_sql_statements(sql: &str, dialect: Option<SqlDialect>) -> Vec<String> {
    let parser_dialect: Box<dyn Dialect> = match dialect {
        Some(SqlDialect::PostgreSQL) => Box::new(PostgreSqlDialect {}),
        Some(SqlDialect::MySQL) => Box::new(MySqlDialect {}),
        Some(SqlDialect::SQLite) => Box::new(SQLiteDialect {}),
        None => Box::new(GenericDialect {}),
    };

    let tokens = match Tokenizer::new(parser_dialect.as_ref(), sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("SQL tokenizing failed, using naive semicolon splitting: {}", e);
            return sql
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    };

    let line_starts = line_offsets(sql);
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_content = false;

    for token in &tokens {
        match &token.token {
            Token::SemiColon => {
                let end = byte_offset(sql, &line_starts, &token.location);
                if has_content {
                    statements.push(sql[start..end].trim().to_string());
                }
                start = end + 1;
                has_content = false;
            }
            Token::Whitespace(_) => {}
            _ => has_content = true,
        }
    }

    if has_content && start < sql.len() {
        statements.push(sql[start..].trim().to_string());
    }

    statements
}

/// Byte offset of the first character of every line
fn line_offsets(sql: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Byte offset for a 1-based line/column token location
fn byte_offset(sql: &str, line_starts: &[usize], location: &Location) -> usize {
    let line_start = line_starts
        .get((location.line as usize).saturating_sub(1))
        .copied()
        .unwrap_or(sql.len());
    let column = (location.column as usize).saturating_sub(1);

    sql[line_start..]
        .char_indices()
        .nth(column)
        .map_or(sql.len(), |(offset, _)| line_start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let migration = SqlMigration::parse(
            "2024_01_01_000000_create_users_table",
            "-- Migration: create users table\n\
             -- Up migration\n\
             CREATE TABLE users (id INTEGER);\n\
             \n\
             -- Down migration\n\
             DROP TABLE users;\n",
        );

        assert_eq!(migration.id(), "2024_01_01_000000_create_users_table");
        assert_eq!(migration.up_sql(), "CREATE TABLE users (id INTEGER);");
        assert_eq!(migration.down_sql(), Some("DROP TABLE users;"));
    }

    #[test]
    fn test_missing_down_marker_is_not_reversible() {
        let migration = SqlMigration::parse("2024_01_01_000000_seed", "INSERT INTO t VALUES (1);");

        assert_eq!(migration.up_sql(), "INSERT INTO t VALUES (1);");
        assert!(!migration.is_reversible());
    }

    #[test]
    fn test_split_respects_quoted_semicolons() {
        let sql = "INSERT INTO notes (body) VALUES ('a; b');\n\
                   CREATE TABLE \"x;y\" (id INTEGER);\n\
                   /* trailing; comment */";

        let statements = split_sql_statements(sql, Some(SqlDialect::SQLite));
        assert_eq!(
            statements,
            vec![
                "INSERT INTO notes (body) VALUES ('a; b')",
                "CREATE TABLE \"x;y\" (id INTEGER)",
            ]
        );
    }

    #[test]
    fn test_split_keeps_dialect_syntax_intact() {
        let sql = "CREATE TABLE `users` (`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY);\n\
                   ALTER TABLE `users` ADD COLUMN `bio` TEXT NULL";

        let statements = split_sql_statements(sql, Some(SqlDialect::MySQL));
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("AUTO_INCREMENT PRIMARY KEY)"));
        assert_eq!(statements[1], "ALTER TABLE `users` ADD COLUMN `bio` TEXT NULL");
    }

    #[test]
    fn test_split_handles_multibyte_text() {
        let statements = split_sql_statements("SELECT 'héllo'; SELECT 2;", None);
        assert_eq!(statements, vec!["SELECT 'héllo'", "SELECT 2"]);
    }
}
