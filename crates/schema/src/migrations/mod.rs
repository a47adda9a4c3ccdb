//! Migration System
//!
//! Discovers migration units, tracks applied state in a log table and
//! applies or reverts units in order.

pub mod definitions;
pub mod manager;
pub mod migrator;
pub mod repository;
pub mod unit;

pub use definitions::*;
pub use manager::{migration_id, MigrationManager};
pub use migrator::Migrator;
pub use repository::MigrationRepository;
pub use unit::{split_sql_statements, Migration, SqlMigration};
