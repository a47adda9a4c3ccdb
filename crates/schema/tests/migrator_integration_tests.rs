//! Integration tests for the migrator
//!
//! Runs migrations against an in-memory SQLite database through the sqlx
//! `Any` driver, with migration files written to temporary directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use elif_schema::{
    async_trait, AnyDatabaseConnection, Blueprint, DatabaseConnection, DatabaseValue, Migration, MigrationRepository,
    MigrationStatus, Migrator, SchemaBuilder, SchemaError, SchemaResult,
};
use tempfile::TempDir;

const CREATE_USERS: &str = "2024_01_01_000000_create_users_table";
const CREATE_POSTS: &str = "2024_01_02_000000_create_posts_table";

async fn migrator() -> Migrator {
    let connection = AnyDatabaseConnection::connect("sqlite::memory:").await.unwrap();
    Migrator::new(connection, "migrations")
}

fn write_migration(dir: &Path, id: &str, up: &str, down: Option<&str>) {
    let mut content = format!("-- Up migration\n{}\n", up);
    if let Some(down) = down {
        content.push_str(&format!("\n-- Down migration\n{}\n", down));
    }
    fs::write(dir.join(format!("{}.sql", id)), content).unwrap();
}

fn users_and_posts() -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    write_migration(
        dir.path(),
        CREATE_USERS,
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255) NOT NULL);",
        Some("DROP TABLE users;"),
    );
    write_migration(
        dir.path(),
        CREATE_POSTS,
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT NOT NULL);\n\
         CREATE INDEX posts_title_index ON posts (title);",
        Some("DROP INDEX posts_title_index;\nDROP TABLE posts;"),
    );
    let paths = vec![dir.path().to_path_buf()];
    (dir, paths)
}

async fn has_table(migrator: &mut Migrator, table: &str) -> bool {
    migrator.schema().has_table(table).await.unwrap()
}

/// Code-defined migration built with a blueprint
struct CreateTeamsTable;

#[async_trait]
impl Migration for CreateTeamsTable {
    fn id(&self) -> &str {
        "2024_01_03_000000_create_teams_table"
    }

    async fn up(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        let mut table = Blueprint::create("teams");
        table.id();
        table.string("name", 120).unique();
        table.boolean("active").default(true);
        table.timestamps();
        schema.build(table).await
    }

    async fn down(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        schema.drop_if_exists("teams").await
    }
}

/// Code-defined migration without a down step
struct SeedTeams;

#[async_trait]
impl Migration for SeedTeams {
    fn id(&self) -> &str {
        "2024_01_04_000000_seed_teams"
    }

    async fn up(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        schema.statement("INSERT INTO teams (name) VALUES ('core')").await
    }
}

/// Creates a table, then stalls on its first run until cancelled
struct StallingCreatePartial {
    stalled: Arc<AtomicBool>,
}

#[async_trait]
impl Migration for StallingCreatePartial {
    fn id(&self) -> &str {
        "2024_01_06_000000_create_partial_table"
    }

    async fn up(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        schema
            .create("partial", |table| {
                table.increments("id");
            })
            .await?;
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(())
    }

    async fn down(&self, schema: &mut SchemaBuilder<'_>) -> SchemaResult<()> {
        schema.drop_if_exists("partial").await
    }
}

#[tokio::test]
async fn test_null_values_decode() {
    let mut connection = AnyDatabaseConnection::connect("sqlite::memory:").await.unwrap();

    let row = connection.fetch_optional("SELECT NULL AS x", &[]).await.unwrap().unwrap();
    assert_eq!(row.get_by_name("x").unwrap(), &DatabaseValue::Null);

    connection
        .execute("CREATE TABLE m (batch BIGINT NOT NULL)", &[])
        .await
        .unwrap();
    let row = connection
        .fetch_optional("SELECT MAX(batch) AS batch FROM m", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get_by_index(0).unwrap(), &DatabaseValue::Null);

    connection
        .execute("INSERT INTO m (batch) VALUES (?)", &[DatabaseValue::Int64(3)])
        .await
        .unwrap();
    let row = connection
        .fetch_optional("SELECT MAX(batch) AS batch FROM m", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get_by_index(0).unwrap().as_i64(), Some(3));
}

#[tokio::test]
async fn test_empty_log_starts_at_batch_zero() {
    let mut connection = AnyDatabaseConnection::connect("sqlite::memory:").await.unwrap();
    let repository = MigrationRepository::new("migrations");

    repository.ensure_repository(&mut connection).await.unwrap();
    assert_eq!(repository.get_last_batch_number(&mut connection).await.unwrap(), 0);

    repository.log(&mut connection, CREATE_USERS, 1).await.unwrap();
    assert_eq!(repository.get_last_batch_number(&mut connection).await.unwrap(), 1);
}

#[tokio::test]
async fn test_cancelled_run_is_rolled_back() {
    let mut migrator = migrator().await;
    migrator.register(StallingCreatePartial {
        stalled: Arc::new(AtomicBool::new(false)),
    });

    let cancelled = tokio::time::timeout(Duration::from_millis(200), migrator.run(&[])).await;
    assert!(cancelled.is_err());

    // the next operation rolls back the abandoned transaction first
    let status = migrator.status(&[]).await.unwrap();
    assert_eq!(status[0].status, MigrationStatus::Pending);
    assert!(!has_table(&mut migrator, "partial").await);

    let applied = migrator.run(&[]).await.unwrap();
    assert_eq!(applied, vec!["2024_01_06_000000_create_partial_table"]);
    assert!(has_table(&mut migrator, "partial").await);
}

#[tokio::test]
async fn test_run_is_idempotent() {
    let (_dir, paths) = users_and_posts();
    let mut migrator = migrator().await;

    let applied = migrator.run(&paths).await.unwrap();
    assert_eq!(applied, vec![CREATE_USERS, CREATE_POSTS]);
    assert!(has_table(&mut migrator, "users").await);
    assert!(has_table(&mut migrator, "posts").await);

    let applied_again = migrator.run(&paths).await.unwrap();
    assert!(applied_again.is_empty());
}

#[tokio::test]
async fn test_batches_and_single_step_rollback() {
    let (dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.run(&paths).await.unwrap();

    write_migration(
        dir.path(),
        "2024_01_05_000000_add_bio_to_users",
        "ALTER TABLE users ADD COLUMN bio TEXT;",
        Some("ALTER TABLE users DROP COLUMN bio;"),
    );
    migrator.run(&paths).await.unwrap();

    let status = migrator.status(&paths).await.unwrap();
    let batches: Vec<_> = status.iter().map(|entry| entry.status).collect();
    assert_eq!(
        batches,
        vec![
            MigrationStatus::Applied { batch: 1 },
            MigrationStatus::Applied { batch: 1 },
            MigrationStatus::Applied { batch: 2 },
        ]
    );

    let reverted = migrator.rollback(&paths, 1).await.unwrap();
    assert_eq!(reverted, vec!["2024_01_05_000000_add_bio_to_users"]);
    assert!(!migrator.schema().has_column("users", "bio").await.unwrap());

    let reverted = migrator.rollback(&paths, 1).await.unwrap();
    assert_eq!(reverted, vec![CREATE_POSTS]);
    assert!(!has_table(&mut migrator, "posts").await);
    assert!(has_table(&mut migrator, "users").await);
}

#[tokio::test]
async fn test_rollback_last_batch_and_reset() {
    let (dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.run(&paths).await.unwrap();

    write_migration(
        dir.path(),
        "2024_01_05_000000_create_tags_table",
        "CREATE TABLE tags (id INTEGER PRIMARY KEY);",
        Some("DROP TABLE tags;"),
    );
    migrator.run(&paths).await.unwrap();

    let reverted = migrator.rollback_last_batch(&paths).await.unwrap();
    assert_eq!(reverted, vec!["2024_01_05_000000_create_tags_table"]);

    let reverted = migrator.reset(&paths).await.unwrap();
    assert_eq!(reverted, vec![CREATE_POSTS, CREATE_USERS]);
    assert!(!has_table(&mut migrator, "users").await);

    let status = migrator.status(&paths).await.unwrap();
    assert!(status.iter().all(|entry| entry.status == MigrationStatus::Pending));
}

#[tokio::test]
async fn test_refresh_reapplies_everything() {
    let (_dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.run(&paths).await.unwrap();

    let applied = migrator.refresh(&paths).await.unwrap();
    assert_eq!(applied, vec![CREATE_USERS, CREATE_POSTS]);

    let status = migrator.status(&paths).await.unwrap();
    assert!(status
        .iter()
        .all(|entry| entry.status == MigrationStatus::Applied { batch: 1 }));
}

#[tokio::test]
async fn test_failed_migration_is_not_logged() {
    let dir = TempDir::new().unwrap();
    write_migration(
        dir.path(),
        CREATE_USERS,
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        Some("DROP TABLE users;"),
    );
    write_migration(
        dir.path(),
        "2024_01_02_000000_broken",
        "CREATE TABLE audit (id INTEGER PRIMARY KEY);\nINSERT INTO missing_table VALUES (1);",
        Some("DROP TABLE audit;"),
    );
    write_migration(
        dir.path(),
        "2024_01_03_000000_never_reached",
        "CREATE TABLE later (id INTEGER PRIMARY KEY);",
        None,
    );
    let paths = vec![dir.path().to_path_buf()];
    let mut migrator = migrator().await;

    let err = migrator.run(&paths).await.unwrap_err();
    match &err {
        SchemaError::MigrationFailed { migration, source } => {
            assert_eq!(migration, "2024_01_02_000000_broken");
            assert!(matches!(**source, SchemaError::Execution { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // SQLite DDL is transactional, the first statement is rolled back too
    assert!(has_table(&mut migrator, "users").await);
    assert!(!has_table(&mut migrator, "audit").await);
    assert!(!has_table(&mut migrator, "later").await);

    let status = migrator.status(&paths).await.unwrap();
    assert_eq!(status[0].status, MigrationStatus::Applied { batch: 1 });
    assert_eq!(status[1].status, MigrationStatus::Pending);
    assert_eq!(status[2].status, MigrationStatus::Pending);
}

#[tokio::test]
async fn test_code_migrations_round_trip() {
    let (_dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.register(CreateTeamsTable);

    let applied = migrator.run(&paths).await.unwrap();
    assert_eq!(applied.last().map(String::as_str), Some("2024_01_03_000000_create_teams_table"));
    assert!(migrator
        .schema()
        .has_columns("teams", &["id", "name", "active", "created_at", "updated_at"])
        .await
        .unwrap());

    migrator.rollback(&paths, 1).await.unwrap();
    assert!(!has_table(&mut migrator, "teams").await);
}

#[tokio::test]
async fn test_not_reversible_stops_rollback() {
    let (_dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.register(CreateTeamsTable).register(SeedTeams);
    migrator.run(&paths).await.unwrap();

    let err = migrator.reset(&paths).await.unwrap_err();
    assert!(matches!(err, SchemaError::NotReversible(id) if id == "2024_01_04_000000_seed_teams"));

    // nothing was reverted, the seed is still logged
    assert!(has_table(&mut migrator, "teams").await);
    let status = migrator.status(&paths).await.unwrap();
    assert!(status.iter().all(|entry| entry.status == MigrationStatus::Applied { batch: 1 }));
}

#[tokio::test]
async fn test_fresh_drops_unknown_tables() {
    let (_dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.run(&paths).await.unwrap();
    migrator
        .schema()
        .create("scratch", |table| {
            table.increments("id");
        })
        .await
        .unwrap();

    let applied = migrator.fresh(&paths).await.unwrap();
    assert_eq!(applied, vec![CREATE_USERS, CREATE_POSTS]);
    assert!(!has_table(&mut migrator, "scratch").await);
    assert!(has_table(&mut migrator, "migrations").await);
}

#[tokio::test]
async fn test_duplicate_ids_are_rejected() {
    let (_dir, paths) = users_and_posts();
    let mut migrator = migrator().await;
    migrator.register(CreateTeamsTable).register(CreateTeamsTable);

    let err = migrator.run(&paths).await.unwrap_err();
    assert!(matches!(err, SchemaError::Migration(message) if message.contains("Duplicate")));
}
