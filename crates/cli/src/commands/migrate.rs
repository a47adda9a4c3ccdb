use anyhow::{Context, Result};
use elif_schema::{AnyDatabaseConnection, MigrationConfig, MigrationManager, MigrationStatus, MigrationStatusEntry, Migrator};

use crate::Cli;

/// What a CLI invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrateAction {
    Run,
    Fresh,
    Reset,
    Refresh,
    Rollback(usize),
    RollbackBatch,
    Status,
}

impl MigrateAction {
    /// Returns `None` for `--make`, which needs no database
    pub fn from_cli(cli: &Cli) -> Option<Self> {
        if cli.make.is_some() {
            return None;
        }

        let action = if cli.fresh {
            MigrateAction::Fresh
        } else if cli.reset {
            MigrateAction::Reset
        } else if cli.refresh {
            MigrateAction::Refresh
        } else if let Some(steps) = cli.rollback {
            steps.map_or(MigrateAction::RollbackBatch, MigrateAction::Rollback)
        } else if cli.status {
            MigrateAction::Status
        } else {
            MigrateAction::Run
        };
        Some(action)
    }
}

/// Apply command line overrides on top of the environment configuration
pub fn resolve_config(cli: &Cli, mut config: MigrationConfig) -> Result<MigrationConfig> {
    if !cli.paths.is_empty() {
        config.migration_paths = cli.paths.clone();
    }
    if let Some(url) = &cli.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(table) = &cli.table {
        config.migrations_table = table.clone();
    }
    if cli.no_lock {
        config.advisory_lock = false;
    }

    config.validate()?;
    Ok(config)
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli, MigrationConfig::from_env()?)?;
    let paths = config.migration_paths.clone();

    if let Some(name) = &cli.make {
        let dir = paths.first().context("No migration path configured")?;
        let path = MigrationManager::create_migration(dir, name)?;
        println!("Created migration: {}", path.display());
        return Ok(());
    }
    let action = MigrateAction::from_cli(&cli).context("No migration action selected")?;

    let url = config
        .database_url
        .clone()
        .context("No database URL configured, set DATABASE_URL or pass --database-url")?;
    let connection = AnyDatabaseConnection::connect(&url).await?;
    let mut migrator = Migrator::with_config(connection, config);

    match action {
        MigrateAction::Run => report("Migrated", &migrator.run(&paths).await?, "Nothing to migrate."),
        MigrateAction::Fresh => report("Migrated", &migrator.fresh(&paths).await?, "Nothing to migrate."),
        MigrateAction::Refresh => report("Migrated", &migrator.refresh(&paths).await?, "Nothing to migrate."),
        MigrateAction::Reset => report("Rolled back", &migrator.reset(&paths).await?, "Nothing to reset."),
        MigrateAction::Rollback(steps) => report(
            "Rolled back",
            &migrator.rollback(&paths, steps).await?,
            "Nothing to roll back.",
        ),
        MigrateAction::RollbackBatch => report(
            "Rolled back",
            &migrator.rollback_last_batch(&paths).await?,
            "Nothing to roll back.",
        ),
        MigrateAction::Status => print_status(&migrator.status(&paths).await?, cli.json)?,
    }

    Ok(())
}

fn report(verb: &str, ids: &[String], nothing: &str) {
    if ids.is_empty() {
        println!("{}", nothing);
    }
    for id in ids {
        println!("{}: {}", verb, id);
    }
}

fn print_status(entries: &[MigrationStatusEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No migrations found.");
        return Ok(());
    }

    println!("{:<12} {}", "Status", "Migration");
    for entry in entries {
        let status = match entry.status {
            MigrationStatus::Applied { batch } => format!("Ran [{}]", batch),
            MigrationStatus::Pending => "Pending".to_string(),
        };
        println!("{:<12} {}", status, entry.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("elif-migrate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_action_from_flags() {
        assert_eq!(MigrateAction::from_cli(&parse(&[])), Some(MigrateAction::Run));
        assert_eq!(MigrateAction::from_cli(&parse(&["--fresh"])), Some(MigrateAction::Fresh));
        assert_eq!(MigrateAction::from_cli(&parse(&["--rollback"])), Some(MigrateAction::RollbackBatch));
        assert_eq!(MigrateAction::from_cli(&parse(&["--rollback=3"])), Some(MigrateAction::Rollback(3)));
        assert_eq!(MigrateAction::from_cli(&parse(&["--make", "create users table"])), None);
    }

    #[test]
    fn test_modes_are_exclusive() {
        let result = Cli::try_parse_from(["elif-migrate", "--reset", "--refresh"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = parse(&[
            "--rollback",
            "--path",
            "db/a",
            "--path=db/b",
            "--table",
            "schema_log",
            "--no-lock",
        ]);

        let config = resolve_config(&cli, MigrationConfig::default()).unwrap();
        assert_eq!(config.migration_paths, vec![PathBuf::from("db/a"), PathBuf::from("db/b")]);
        assert_eq!(config.migrations_table, "schema_log");
        assert!(!config.advisory_lock);
        assert_eq!(MigrateAction::from_cli(&cli), Some(MigrateAction::RollbackBatch));
    }

    #[test]
    fn test_make_creates_file_in_first_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = MigrationManager::create_migration(dir.path(), "add email to users").unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_add_email_to_users.sql"));
        assert!(MigrationManager::is_valid_id(name.trim_end_matches(".sql")));
    }
}
