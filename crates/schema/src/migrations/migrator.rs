//! Migrator - applies and reverts migration units against the log table
//!
//! Each migration runs inside its own transaction together with its log
//! insert or delete. A failure rolls back that migration and stops the
//! operation; migrations committed before it stay committed.
//!
//! MySQL commits DDL implicitly, so a failing migration there can leave
//! earlier statements applied. It is still not logged, and the next run
//! retries it from the start.
//!
//! A cancelled operation can leave its migration transaction open on the
//! connection. The next operation on the same migrator rolls it back before
//! doing anything else.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use super::definitions::{MigrationDirection, MigrationRecord, MigrationStatus, MigrationStatusEntry};
use super::manager::MigrationManager;
use super::repository::MigrationRepository;
use super::unit::Migration;
use crate::config::MigrationConfig;
use crate::connection::{DatabaseConnection, SqlDialect};
use crate::error::{SchemaError, SchemaResult};
use crate::schema::{grammar_for_driver, SchemaBuilder};

/// Sequences migration units against one connection
pub struct Migrator {
    connection: Box<dyn DatabaseConnection>,
    repository: MigrationRepository,
    config: MigrationConfig,
    units: Vec<Arc<dyn Migration>>,
    lock_held: bool,
    /// Set between BEGIN and COMMIT/ROLLBACK of a unit
    transaction_open: bool,
}

impl Migrator {
    /// Migrator using `table` as the log table
    pub fn new<C>(connection: C, table: impl Into<String>) -> Self
    where
        C: DatabaseConnection + 'static,
    {
        Self::with_config(connection, MigrationConfig::default().with_table(table))
    }

    pub fn with_config<C>(connection: C, config: MigrationConfig) -> Self
    where
        C: DatabaseConnection + 'static,
    {
        Self {
            connection: Box::new(connection),
            repository: MigrationRepository::new(config.migrations_table.clone()),
            config,
            units: Vec::new(),
            lock_held: false,
            transaction_open: false,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn repository(&self) -> &MigrationRepository {
        &self.repository
    }

    /// Schema builder on the migrator's connection
    ///
    /// Inside a transaction left open by a cancelled operation until the next
    /// migrator operation rolls it back.
    pub fn schema(&mut self) -> SchemaBuilder<'_> {
        SchemaBuilder::new(self.connection.as_mut())
    }

    /// Register a code-defined migration unit
    pub fn register<M>(&mut self, unit: M) -> &mut Self
    where
        M: Migration + 'static,
    {
        self.units.push(Arc::new(unit));
        self
    }

    /// Apply every pending migration in id order, as one batch
    pub async fn run(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        self.acquire_lock().await?;
        let result = self.run_pending(paths).await;
        self.release_lock().await;
        result
    }

    /// Revert the last `steps` migrations, most recent first
    pub async fn rollback(&mut self, paths: &[PathBuf], steps: usize) -> SchemaResult<Vec<String>> {
        self.acquire_lock().await?;
        let result: SchemaResult<Vec<String>> = async {
            let records = if self.repository.exists(self.connection.as_mut()).await? {
                self.repository.get_migrations(self.connection.as_mut(), steps).await?
            } else {
                Vec::new()
            };
            self.revert_records(paths, records).await
        }
        .await;
        self.release_lock().await;
        result
    }

    /// Revert every migration of the latest batch
    pub async fn rollback_last_batch(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        self.acquire_lock().await?;
        let result: SchemaResult<Vec<String>> = async {
            let records = if self.repository.exists(self.connection.as_mut()).await? {
                self.repository.get_last_batch(self.connection.as_mut()).await?
            } else {
                Vec::new()
            };
            self.revert_records(paths, records).await
        }
        .await;
        self.release_lock().await;
        result
    }

    /// Revert every applied migration regardless of batch
    pub async fn reset(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        self.acquire_lock().await?;
        let result = self.reset_all(paths).await;
        self.release_lock().await;
        result
    }

    /// Reset then run
    pub async fn refresh(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        self.acquire_lock().await?;
        let result: SchemaResult<Vec<String>> = async {
            self.reset_all(paths).await?;
            self.run_pending(paths).await
        }
        .await;
        self.release_lock().await;
        result
    }

    /// Drop every table, then run all migrations from scratch
    pub async fn fresh(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        self.acquire_lock().await?;
        let result: SchemaResult<Vec<String>> = async {
            tracing::info!("Dropping all tables");
            self.schema().drop_all_tables().await?;
            self.run_pending(paths).await
        }
        .await;
        self.release_lock().await;
        result
    }

    /// Every known migration with its state, in id order
    pub async fn status(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<MigrationStatusEntry>> {
        self.recover().await?;
        let units = self.resolve_units(paths)?;

        let records = if self.repository.exists(self.connection.as_mut()).await? {
            self.repository.get_records(self.connection.as_mut()).await?
        } else {
            Vec::new()
        };
        let batches: HashMap<_, _> = records.iter().map(|r| (r.id.as_str(), r.batch)).collect();

        let known: HashSet<_> = units.iter().map(|unit| unit.id()).collect();
        for record in records.iter().filter(|r| !known.contains(r.id.as_str())) {
            tracing::warn!("Migration {} is logged as applied but has no migration file", record.id);
        }

        Ok(units
            .iter()
            .map(|unit| MigrationStatusEntry {
                id: unit.id().to_string(),
                status: match batches.get(unit.id()) {
                    Some(&batch) => MigrationStatus::Applied { batch },
                    None => MigrationStatus::Pending,
                },
            })
            .collect())
    }

    async fn run_pending(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        let units = self.resolve_units(paths)?;
        let connection = self.connection.as_mut();

        self.repository.ensure_repository(connection).await?;
        let ran: HashSet<String> = self.repository.get_ran(connection).await?.into_iter().collect();

        let pending: Vec<_> = units.into_iter().filter(|unit| !ran.contains(unit.id())).collect();
        if pending.is_empty() {
            tracing::info!("Nothing to migrate");
            return Ok(Vec::new());
        }

        let batch = self.repository.get_last_batch_number(connection).await? + 1;
        let mut applied = Vec::with_capacity(pending.len());

        for unit in &pending {
            run_unit(
                connection,
                &mut self.transaction_open,
                &self.repository,
                unit.as_ref(),
                MigrationDirection::Up,
                batch,
            )
            .await?;
            tracing::info!(migration = unit.id(), batch, "Migrated: {}", unit.id());
            applied.push(unit.id().to_string());
        }

        Ok(applied)
    }

    async fn reset_all(&mut self, paths: &[PathBuf]) -> SchemaResult<Vec<String>> {
        if !self.repository.exists(self.connection.as_mut()).await? {
            tracing::info!("Nothing to reset");
            return Ok(Vec::new());
        }

        let mut records = self.repository.get_records(self.connection.as_mut()).await?;
        records.reverse();
        self.revert_records(paths, records).await
    }

    /// Revert records in the given order
    async fn revert_records(&mut self, paths: &[PathBuf], records: Vec<MigrationRecord>) -> SchemaResult<Vec<String>> {
        if records.is_empty() {
            tracing::info!("Nothing to roll back");
            return Ok(Vec::new());
        }

        let units: HashMap<String, Arc<dyn Migration>> = self
            .resolve_units(paths)?
            .into_iter()
            .map(|unit| (unit.id().to_string(), unit))
            .collect();

        let connection = self.connection.as_mut();
        let mut reverted = Vec::with_capacity(records.len());

        for record in &records {
            let unit = units.get(&record.id).ok_or_else(|| {
                SchemaError::Migration(format!(
                    "Migration {} is logged as applied but no migration file was found",
                    record.id
                ))
            })?;

            run_unit(
                connection,
                &mut self.transaction_open,
                &self.repository,
                unit.as_ref(),
                MigrationDirection::Down,
                record.batch,
            )
            .await?;
            tracing::info!(migration = record.id.as_str(), batch = record.batch, "Rolled back: {}", record.id);
            reverted.push(record.id.clone());
        }

        Ok(reverted)
    }

    /// File migrations and registered units merged in id order
    fn resolve_units(&self, paths: &[PathBuf]) -> SchemaResult<Vec<Arc<dyn Migration>>> {
        let mut units: Vec<Arc<dyn Migration>> = MigrationManager::new(paths.iter().cloned())
            .load_migrations()?
            .into_iter()
            .map(|migration| Arc::new(migration) as Arc<dyn Migration>)
            .collect();

        for unit in &self.units {
            MigrationManager::validate_id(unit.id(), "registered migration")?;
        }
        units.extend(self.units.iter().cloned());
        units.sort_by(|a, b| a.id().cmp(b.id()));

        if let Some(pair) = units.windows(2).find(|pair| pair[0].id() == pair[1].id()) {
            return Err(SchemaError::Migration(format!("Duplicate migration id '{}'", pair[0].id())));
        }

        Ok(units)
    }

    fn lock_name(&self) -> String {
        format!("elif_schema:{}", self.repository.table())
    }

    /// Roll back a transaction left open by a cancelled operation
    async fn recover(&mut self) -> SchemaResult<()> {
        if !self.transaction_open {
            return Ok(());
        }

        tracing::warn!("Rolling back migration transaction left open by a cancelled operation");
        self.connection.rollback().await?;
        self.transaction_open = false;
        Ok(())
    }

    async fn acquire_lock(&mut self) -> SchemaResult<()> {
        self.recover().await?;
        if !self.config.advisory_lock || self.lock_held {
            return Ok(());
        }

        let grammar = grammar_for_driver(self.connection.driver_name())?;
        let Some(sql) = grammar.compile_acquire_lock(&self.lock_name()) else {
            return Ok(());
        };

        let row = self
            .connection
            .fetch_optional(&sql, &[])
            .await
            .map_err(|e| SchemaError::execution(sql.as_str(), e))?;
        let acquired = row
            .as_ref()
            .and_then(|row| row.get_by_index(0).ok())
            .and_then(|value| value.as_i64())
            == Some(1);

        if !acquired {
            return Err(SchemaError::Locked(format!(
                "another migrator is running against '{}'",
                self.repository.table()
            )));
        }

        tracing::debug!("Acquired migration lock {}", self.lock_name());
        self.lock_held = true;
        Ok(())
    }

    async fn release_lock(&mut self) {
        if !self.lock_held {
            return;
        }
        self.lock_held = false;

        let sql = match grammar_for_driver(self.connection.driver_name()) {
            Ok(grammar) => grammar.compile_release_lock(&self.lock_name()),
            Err(_) => None,
        };
        if let Some(sql) = sql {
            if let Err(e) = self.connection.fetch_optional(&sql, &[]).await {
                tracing::warn!("Failed to release migration lock: {}", e);
            }
        }
    }
}

/// Apply or revert one unit and update the log, inside one transaction
///
/// `transaction_open` stays set if the future is dropped before the
/// transaction ends.
async fn run_unit(
    connection: &mut dyn DatabaseConnection,
    transaction_open: &mut bool,
    repository: &MigrationRepository,
    unit: &dyn Migration,
    direction: MigrationDirection,
    batch: i64,
) -> SchemaResult<()> {
    tracing::debug!(migration = unit.id(), direction = direction.as_str(), "Starting migration");

    connection.begin_transaction().await.map_err(|e| e.in_migration(unit.id()))?;
    *transaction_open = true;

    let outcome: SchemaResult<()> = async {
        {
            let mut schema = SchemaBuilder::new(&mut *connection);
            match direction {
                MigrationDirection::Up => unit.up(&mut schema).await?,
                MigrationDirection::Down => unit.down(&mut schema).await?,
            }
        }
        match direction {
            MigrationDirection::Up => repository.log(&mut *connection, unit.id(), batch).await,
            MigrationDirection::Down => repository.delete(&mut *connection, unit.id()).await,
        }
    }
    .await;

    let result = match outcome {
        Ok(()) => connection.commit().await.map_err(|e| e.in_migration(unit.id())),
        Err(e) => {
            if let Err(rollback_error) = connection.rollback().await {
                tracing::warn!(
                    migration = unit.id(),
                    "Failed to roll back migration transaction: {}",
                    rollback_error
                );
            }
            let transactional_ddl = SqlDialect::from_driver_name(connection.driver_name())
                .map_or(true, |dialect| dialect.supports_transactional_ddl());
            if !transactional_ddl {
                tracing::warn!(
                    migration = unit.id(),
                    "{} commits DDL implicitly, statements before the failure may remain applied",
                    connection.driver_name()
                );
            }
            Err(e.in_migration(unit.id()))
        }
    };
    *transaction_open = false;
    result
}
