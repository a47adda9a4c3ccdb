//! Migration configuration
//!
//! Loaded from the environment by the CLI, or embedded in an application's
//! own config file through serde.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{SchemaError, SchemaResult};

/// Default values for migration configuration
pub struct MigrationDefaults;

impl MigrationDefaults {
    pub const TABLE: &'static str = "migrations";
    pub const PATH: &'static str = "database/migrations";
    pub const ADVISORY_LOCK: bool = true;
}

/// Configuration for the migrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Log table recording applied migrations
    pub migrations_table: String,
    /// Directories scanned for `.sql` migration files
    pub migration_paths: Vec<PathBuf>,
    pub database_url: Option<String>,
    /// Hold an engine advisory lock while migrating
    pub advisory_lock: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_table: MigrationDefaults::TABLE.to_string(),
            migration_paths: vec![PathBuf::from(MigrationDefaults::PATH)],
            database_url: None,
            advisory_lock: MigrationDefaults::ADVISORY_LOCK,
        }
    }
}

impl MigrationConfig {
    /// Load from `DATABASE_URL`, `MIGRATIONS_TABLE`, `MIGRATIONS_PATH` and `MIGRATIONS_LOCK`
    pub fn from_env() -> SchemaResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> SchemaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            config.database_url = Some(url);
        }
        if let Some(table) = lookup("MIGRATIONS_TABLE") {
            config.migrations_table = table;
        }
        if let Some(paths) = lookup("MIGRATIONS_PATH") {
            config.migration_paths = env::split_paths(&paths).collect();
        }
        if let Some(lock) = lookup("MIGRATIONS_LOCK") {
            config.advisory_lock = match lock.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(SchemaError::Configuration(format!(
                        "MIGRATIONS_LOCK must be true or false, got '{}'",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// Replace the migration paths
    pub fn with_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.migration_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_advisory_lock(mut self, enabled: bool) -> Self {
        self.advisory_lock = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchemaResult<()> {
        let table = self.migrations_table.trim();
        if table.is_empty() {
            return Err(SchemaError::Configuration(
                "Migrations table name must not be empty".to_string(),
            ));
        }
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(SchemaError::Configuration(format!(
                "Invalid migrations table name '{}'",
                table
            )));
        }
        if self.migration_paths.is_empty() {
            return Err(SchemaError::Configuration(
                "At least one migration path is required".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config, MigrationConfig::default());
        assert_eq!(config.migrations_table, "migrations");
        assert_eq!(config.migration_paths, vec![PathBuf::from("database/migrations")]);
        assert!(config.advisory_lock);
    }

    #[test]
    fn test_environment_overrides() {
        let config = MigrationConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("MIGRATIONS_TABLE", "schema_log"),
            ("MIGRATIONS_PATH", "db/migrations"),
            ("MIGRATIONS_LOCK", "false"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.migrations_table, "schema_log");
        assert_eq!(config.migration_paths, vec![PathBuf::from("db/migrations")]);
        assert!(!config.advisory_lock);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(MigrationConfig::from_lookup(lookup_from(&[("MIGRATIONS_LOCK", "maybe")])).is_err());
        assert!(MigrationConfig::from_lookup(lookup_from(&[("MIGRATIONS_TABLE", "bad name;")])).is_err());
        assert!(MigrationConfig::default().with_paths(Vec::<PathBuf>::new()).validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MigrationConfig = serde_json::from_str(r#"{"migrations_table": "log"}"#).unwrap();

        assert_eq!(config.migrations_table, "log");
        assert!(config.advisory_lock);
    }
}
