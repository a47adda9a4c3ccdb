//! Error types for the schema and migration system
//!
//! Every fallible operation in this crate returns [`SchemaResult`]. The
//! variants follow the failure modes a migration run can hit: compiling a
//! blueprint, executing a statement, picking a grammar, reverting a unit.

use thiserror::Error;

/// Result type alias for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Error types for schema building and migrations
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The active grammar cannot render part of a blueprint
    #[error("Compile error: {0}")]
    Compile(String),

    /// The connection rejected a compiled statement
    #[error("Execution error: {message} (statement: {statement})")]
    Execution { statement: String, message: String },

    /// No grammar is registered for the connection's driver
    #[error("Unsupported database dialect: {0}")]
    UnsupportedDialect(String),

    /// A migration without a down step was asked to revert
    #[error("Migration {0} is not reversible")]
    NotReversible(String),

    /// A migration failed while being applied or reverted
    #[error("Migration {migration} failed: {source}")]
    MigrationFailed {
        migration: String,
        #[source]
        source: Box<SchemaError>,
    },

    /// Raw driver error without statement context
    #[error("Database error: {0}")]
    Database(String),

    /// Migration discovery or bookkeeping error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Another migrator holds the migration lock
    #[error("Migration lock unavailable: {0}")]
    Locked(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    /// Wrap a driver error with the statement that caused it
    pub fn execution(statement: impl Into<String>, err: SchemaError) -> Self {
        let message = match err {
            SchemaError::Database(message) => message,
            SchemaError::Execution { message, .. } => message,
            other => other.to_string(),
        };

        SchemaError::Execution {
            statement: statement.into(),
            message,
        }
    }

    /// Attach the identity of the migration that was running
    pub fn in_migration(self, migration: impl Into<String>) -> Self {
        match self {
            // already carries its identity
            SchemaError::NotReversible(_) | SchemaError::MigrationFailed { .. } => self,
            other => SchemaError::MigrationFailed {
                migration: migration.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, unwrapping migration context
    pub fn root_cause(&self) -> &SchemaError {
        match self {
            SchemaError::MigrationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for SchemaError {
    fn from(err: sqlx::Error) -> Self {
        SchemaError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_keeps_driver_message() {
        let err = SchemaError::execution(
            "CREATE TABLE users",
            SchemaError::Database("table users already exists".to_string()),
        );

        match err {
            SchemaError::Execution { statement, message } => {
                assert_eq!(statement, "CREATE TABLE users");
                assert_eq!(message, "table users already exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_in_migration_wraps_once() {
        let err = SchemaError::Database("boom".to_string())
            .in_migration("2024_01_01_000000_create_users_table")
            .in_migration("ignored");

        assert!(err
            .to_string()
            .starts_with("Migration 2024_01_01_000000_create_users_table failed"));
        assert!(matches!(err.root_cause(), SchemaError::Database(_)));
    }
}
