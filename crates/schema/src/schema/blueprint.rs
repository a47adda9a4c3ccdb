//! Blueprint - declarative description of one table change
//!
//! A blueprint collects column definitions and structural commands for a
//! single table. Nothing touches the database while it is being populated;
//! [`Blueprint::to_sql`] hands it to a grammar which returns the statements
//! to execute in order.

use super::column::{ColumnDefinition, ColumnType};
use super::command::Command;
use super::foreign::ForeignKeyDefinition;
use super::grammar::Grammar;
use crate::error::SchemaResult;

/// Kind of index, used to build generated index names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Primary => "primary",
            IndexKind::Unique => "unique",
            IndexKind::Index => "index",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

/// Columns and commands for one table, compiled into SQL by a [`Grammar`]
#[derive(Debug, Clone)]
pub struct Blueprint {
    table: String,
    columns: Vec<ColumnDefinition>,
    commands: Vec<Command>,
    updating: bool,
    engine: Option<String>,
    charset: Option<String>,
    collation: Option<String>,
}

impl Blueprint {
    /// Blueprint for a new table (`CREATE TABLE`)
    pub fn create(table: impl Into<String>) -> Self {
        Self::new(table.into(), false)
    }

    /// Blueprint for changes to an existing table (`ALTER TABLE`)
    pub fn table(table: impl Into<String>) -> Self {
        Self::new(table.into(), true)
    }

    fn new(table: String, updating: bool) -> Self {
        Self {
            table,
            columns: Vec::new(),
            commands: Vec::new(),
            updating,
            engine: None,
            charset: None,
            collation: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn is_creating(&self) -> bool {
        !self.updating
    }

    /// Columns that are added (everything except `change()` columns)
    pub fn added_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(move |c| !(self.updating && c.change))
    }

    /// Existing columns being modified; always empty for a create
    pub fn changed_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(move |c| self.updating && c.change)
    }

    /// Index commands implied by `primary()`, `unique()` and `index()` column flags
    pub fn implied_commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();

        for column in &self.columns {
            let columns = vec![column.name().to_string()];

            // auto-increment keys are declared inline with the column
            if column.primary && !column.auto_increment {
                commands.push(Command::Primary {
                    name: self.index_name(IndexKind::Primary, &columns),
                    columns: columns.clone(),
                });
            }
            if column.unique {
                commands.push(Command::Unique {
                    name: self.index_name(IndexKind::Unique, &columns),
                    columns: columns.clone(),
                });
            }
            if column.index {
                commands.push(Command::Index {
                    name: self.index_name(IndexKind::Index, &columns),
                    columns,
                });
            }
        }

        commands
    }

    /// Implied commands followed by the explicit ones, in compile order
    pub fn all_commands(&self) -> Vec<Command> {
        let mut commands = self.implied_commands();
        commands.extend(self.commands.iter().cloned());
        commands
    }

    /// Generated index name: `{table}_{columns}_{kind}`, lowercased, `-` and `.` as `_`
    pub fn index_name<S: AsRef<str>>(&self, kind: IndexKind, columns: &[S]) -> String {
        let joined = columns.iter().map(|c| c.as_ref()).collect::<Vec<_>>().join("_");
        format!("{}_{}_{}", self.table, joined, kind.as_str())
            .to_lowercase()
            .replace(['-', '.'], "_")
    }

    /// Compile into the ordered statements for `grammar`
    pub fn to_sql(&self, grammar: &dyn Grammar) -> SchemaResult<Vec<String>> {
        grammar.compile_blueprint(self)
    }

    /// Storage engine for the table (MySQL)
    pub fn engine(&mut self, engine: impl Into<String>) -> &mut Self {
        self.engine = Some(engine.into());
        self
    }

    /// Default character set for the table (MySQL)
    pub fn charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = Some(charset.into());
        self
    }

    /// Default collation for the table (MySQL)
    pub fn collation(&mut self, collation: impl Into<String>) -> &mut Self {
        self.collation = Some(collation.into());
        self
    }

    pub fn table_engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn table_charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn table_collation(&self) -> Option<&str> {
        self.collation.as_deref()
    }

    // --- column factories -------------------------------------------------

    /// Append a column of any type
    pub fn add_column(&mut self, column_type: ColumnType, name: impl Into<String>) -> &mut ColumnDefinition {
        self.columns.push(ColumnDefinition::new(column_type, name));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    /// Auto-incrementing `BIGINT` primary key named `id`
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.big_increments("id")
    }

    pub fn increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Increments, name)
    }

    pub fn big_increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::BigIncrements, name)
    }

    pub fn tiny_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::TinyInteger, name)
    }

    pub fn small_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::SmallInteger, name)
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Integer, name)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::BigInteger, name)
    }

    pub fn unsigned_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.integer(name).unsigned()
    }

    pub fn unsigned_big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.big_integer(name).unsigned()
    }

    /// Unsigned `BIGINT` meant to reference an `id()` column
    pub fn foreign_id(&mut self, name: &str) -> &mut ColumnDefinition {
        self.unsigned_big_integer(name)
    }

    pub fn float(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Float, name)
    }

    pub fn double(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Double, name)
    }

    pub fn decimal(&mut self, name: &str, total: u8, places: u8) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Decimal { total, places }, name)
    }

    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Boolean, name)
    }

    pub fn char(&mut self, name: &str, length: u32) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Char(length), name)
    }

    pub fn string(&mut self, name: &str, length: u32) -> &mut ColumnDefinition {
        self.add_column(ColumnType::String(length), name)
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Text, name)
    }

    pub fn medium_text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::MediumText, name)
    }

    pub fn long_text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::LongText, name)
    }

    pub fn date(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Date, name)
    }

    pub fn date_time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::DateTime, name)
    }

    pub fn time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Time, name)
    }

    pub fn timestamp(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Timestamp, name)
    }

    pub fn json(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Json, name)
    }

    pub fn jsonb(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Jsonb, name)
    }

    pub fn binary(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Binary, name)
    }

    pub fn uuid(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(ColumnType::Uuid, name)
    }

    /// Column restricted to a fixed set of string values
    pub fn enumeration<S: AsRef<str>>(&mut self, name: &str, allowed: &[S]) -> &mut ColumnDefinition {
        let allowed = allowed.iter().map(|s| s.as_ref().to_string()).collect();
        self.add_column(ColumnType::Enum(allowed), name)
    }

    /// Nullable `created_at` and `updated_at` timestamps
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    /// Nullable `deleted_at` timestamp
    pub fn soft_deletes(&mut self) -> &mut ColumnDefinition {
        self.timestamp("deleted_at").nullable()
    }

    // --- index and constraint factories -----------------------------------

    pub fn primary(&mut self, columns: &[&str]) -> &mut Self {
        self.add_index(IndexKind::Primary, columns, None)
    }

    pub fn primary_named(&mut self, columns: &[&str], name: &str) -> &mut Self {
        self.add_index(IndexKind::Primary, columns, Some(name))
    }

    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.add_index(IndexKind::Unique, columns, None)
    }

    pub fn unique_named(&mut self, columns: &[&str], name: &str) -> &mut Self {
        self.add_index(IndexKind::Unique, columns, Some(name))
    }

    pub fn index(&mut self, columns: &[&str]) -> &mut Self {
        self.add_index(IndexKind::Index, columns, None)
    }

    pub fn index_named(&mut self, columns: &[&str], name: &str) -> &mut Self {
        self.add_index(IndexKind::Index, columns, Some(name))
    }

    pub fn fulltext(&mut self, columns: &[&str]) -> &mut Self {
        self.add_index(IndexKind::Fulltext, columns, None)
    }

    pub fn fulltext_named(&mut self, columns: &[&str], name: &str) -> &mut Self {
        self.add_index(IndexKind::Fulltext, columns, Some(name))
    }

    fn add_index(&mut self, kind: IndexKind, columns: &[&str], name: Option<&str>) -> &mut Self {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.index_name(kind, columns));
        let columns = columns.iter().map(|c| c.to_string()).collect();

        self.commands.push(match kind {
            IndexKind::Primary => Command::Primary { columns, name },
            IndexKind::Unique => Command::Unique { columns, name },
            IndexKind::Index => Command::Index { columns, name },
            IndexKind::Fulltext => Command::Fulltext { columns, name },
        });
        self
    }

    /// Foreign key on `column`; chain `.references(..).on(..)`
    pub fn foreign(&mut self, column: &str) -> &mut ForeignKeyDefinition {
        self.commands.push(Command::Foreign(ForeignKeyDefinition::new(column)));
        match self.commands.last_mut() {
            Some(Command::Foreign(foreign)) => foreign,
            _ => unreachable!("foreign command was just pushed"),
        }
    }

    // --- drop and rename factories ----------------------------------------

    pub fn drop_column(&mut self, column: &str) -> &mut Self {
        self.drop_columns(&[column])
    }

    pub fn drop_columns(&mut self, columns: &[&str]) -> &mut Self {
        self.commands.push(Command::DropColumn {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn drop_primary(&mut self) -> &mut Self {
        self.commands.push(Command::DropPrimary);
        self
    }

    pub fn drop_unique(&mut self, name: &str) -> &mut Self {
        self.commands.push(Command::DropUnique { name: name.to_string() });
        self
    }

    pub fn drop_index(&mut self, name: &str) -> &mut Self {
        self.commands.push(Command::DropIndex { name: name.to_string() });
        self
    }

    pub fn drop_foreign(&mut self, name: &str) -> &mut Self {
        self.commands.push(Command::DropForeign { name: name.to_string() });
        self
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> &mut Self {
        self.commands.push(Command::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn drop_timestamps(&mut self) -> &mut Self {
        self.drop_columns(&["created_at", "updated_at"])
    }

    pub fn drop_soft_deletes(&mut self) -> &mut Self {
        self.drop_column("deleted_at")
    }
}
