//! Migration Manager - file system operations for migrations
//!
//! Discovers `.sql` migration files across the configured paths and creates
//! new ones from a template. Paths are re-read on every call; nothing is
//! cached between runs.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::unit::SqlMigration;
use crate::error::{SchemaError, SchemaResult};

/// `{YYYY_MM_DD_HHMMSS}_{snake_case_description}`
static MIGRATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}_\d{2}_\d{2}_\d{6}_[a-z0-9]+(?:_[a-z0-9]+)*$").expect("valid regex"));

const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H%M%S";

/// Migration manager for creating and loading migration files
#[derive(Debug, Clone)]
pub struct MigrationManager {
    paths: Vec<PathBuf>,
}

impl MigrationManager {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Whether an id follows the migration naming scheme
    pub fn is_valid_id(id: &str) -> bool {
        MIGRATION_NAME.is_match(id)
    }

    /// Check an id, naming the offending source in the error
    pub fn validate_id(id: &str, source: &str) -> SchemaResult<()> {
        if Self::is_valid_id(id) {
            Ok(())
        } else {
            Err(SchemaError::Migration(format!(
                "Invalid migration name '{}' ({}): expected YYYY_MM_DD_HHMMSS_snake_case_description",
                id, source
            )))
        }
    }

    /// All `.sql` files across the paths, sorted by file name
    ///
    /// Missing directories are skipped. Two files with the same name in
    /// different directories are an error.
    pub fn migration_files(&self) -> SchemaResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for dir in &self.paths {
            if !dir.is_dir() {
                tracing::debug!("Skipping missing migration path {}", dir.display());
                continue;
            }

            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() && path.extension().map_or(false, |ext| ext == "sql") {
                    files.push(path);
                }
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut seen = HashSet::new();
        for file in &files {
            let id = migration_id(file)?;
            Self::validate_id(&id, &file.display().to_string())?;
            if !seen.insert(id.clone()) {
                return Err(SchemaError::Migration(format!("Duplicate migration id '{}'", id)));
            }
        }

        Ok(files)
    }

    /// Load every migration file in order
    pub fn load_migrations(&self) -> SchemaResult<Vec<SqlMigration>> {
        self.migration_files()?
            .iter()
            .map(|path| SqlMigration::from_file(path))
            .collect()
    }

    /// Create a new migration file in `dir` stamped with the current time
    pub fn create_migration(dir: &Path, name: &str) -> SchemaResult<PathBuf> {
        Self::create_migration_at(dir, name, Utc::now())
    }

    /// Create a new migration file stamped with `timestamp`
    ///
    /// Refuses to create a second file with the same timestamp prefix, the
    /// prefix being the ordering key.
    pub fn create_migration_at(dir: &Path, name: &str, timestamp: DateTime<Utc>) -> SchemaResult<PathBuf> {
        let description = snake_case(name);
        if description.is_empty() {
            return Err(SchemaError::Migration(format!("Invalid migration name '{}'", name)));
        }

        fs::create_dir_all(dir)?;

        let prefix = timestamp.format(TIMESTAMP_FORMAT).to_string();
        for entry in fs::read_dir(dir)? {
            let existing = entry?.file_name();
            if existing.to_string_lossy().starts_with(&format!("{}_", prefix)) {
                return Err(SchemaError::Migration(format!(
                    "A migration stamped {} already exists ({}), wait a second and retry",
                    prefix,
                    existing.to_string_lossy()
                )));
            }
        }

        let id = format!("{}_{}", prefix, description);
        let path = dir.join(format!("{}.sql", id));
        fs::write(&path, migration_template(&id, timestamp))?;

        tracing::info!("Created migration {}", path.display());
        Ok(path)
    }
}

/// Migration id for a file: the file name without extension
pub fn migration_id(path: &Path) -> SchemaResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| SchemaError::Migration(format!("Invalid migration filename: {}", path.display())))
}

fn snake_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

fn migration_template(id: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "-- Migration: {}\n\
         -- Created: {}\n\n\
         -- Up migration\n\n\n\
         -- Down migration\n\n",
        id,
        timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_name_validation() {
        assert!(MigrationManager::is_valid_id("2024_01_15_093000_create_users_table"));
        assert!(!MigrationManager::is_valid_id("20240115_create_users"));
        assert!(!MigrationManager::is_valid_id("2024_01_15_093000_CreateUsers"));
        assert!(!MigrationManager::is_valid_id("2024_01_15_093000_"));
    }

    #[test]
    fn test_files_sorted_across_paths() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "2024_01_02_000000_create_posts_table.sql", "");
        write(second.path(), "2024_01_01_000000_create_users_table.sql", "");
        write(first.path(), "README.md", "not a migration");

        let manager = MigrationManager::new([
            first.path().to_path_buf(),
            second.path().to_path_buf(),
            first.path().join("missing"),
        ]);
        let ids: Vec<_> = manager
            .migration_files()
            .unwrap()
            .iter()
            .map(|p| migration_id(p).unwrap())
            .collect();

        assert_eq!(
            ids,
            ["2024_01_01_000000_create_users_table", "2024_01_02_000000_create_posts_table"]
        );
    }

    #[test]
    fn test_duplicate_and_invalid_names_are_rejected() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "2024_01_01_000000_create_users_table.sql", "");
        write(second.path(), "2024_01_01_000000_create_users_table.sql", "");

        let manager = MigrationManager::new([first.path(), second.path()]);
        assert!(matches!(manager.migration_files(), Err(SchemaError::Migration(_))));

        let bad = TempDir::new().unwrap();
        write(bad.path(), "create_users.sql", "");
        assert!(MigrationManager::new([bad.path()]).migration_files().is_err());
    }

    #[test]
    fn test_create_migration_refuses_timestamp_collision() {
        let dir = TempDir::new().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let path = MigrationManager::create_migration_at(dir.path(), "Create Users Table", at).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "2024_03_09_140507_create_users_table.sql"
        );

        let loaded = SqlMigration::from_file(&path).unwrap();
        assert!(loaded.is_reversible());
        assert!(loaded.up_sql().is_empty());

        let again = MigrationManager::create_migration_at(dir.path(), "add_email", at);
        assert!(matches!(again, Err(SchemaError::Migration(_))));
    }
}
