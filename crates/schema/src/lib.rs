//! # elif-schema: schema builder and migrations for elif.rs
//!
//! A declarative table DSL ([`Blueprint`]), dialect grammars compiling it to
//! MySQL, SQLite and PostgreSQL DDL, a [`SchemaBuilder`] running the result
//! against a live connection, and a [`Migrator`] applying and reverting
//! ordered migration units with their state kept in a log table.

pub mod config;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod schema;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use migrations::*;
pub use schema::*;

/// Async trait support for implementing [`Migration`]
pub use async_trait::async_trait;
