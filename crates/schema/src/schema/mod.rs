//! Schema definition and DDL compilation
//!
//! [`Blueprint`] describes one table change, a [`Grammar`] compiles it for a
//! dialect and [`SchemaBuilder`] runs the result against a connection.

pub mod blueprint;
pub mod builder;
pub mod column;
pub mod command;
pub mod foreign;
pub mod grammar;

pub use blueprint::{Blueprint, IndexKind};
pub use builder::SchemaBuilder;
pub use column::{ColumnDefinition, ColumnType, DefaultValue};
pub use command::Command;
pub use foreign::{ForeignKeyDefinition, ReferentialAction};
pub use grammar::{grammar_for, grammar_for_driver, Grammar, MySqlGrammar, PostgresGrammar, SqliteGrammar};
