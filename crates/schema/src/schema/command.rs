//! Structural commands accumulated by a blueprint

use super::foreign::ForeignKeyDefinition;

/// One DDL operation on a table, compiled after the column statements
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Primary { columns: Vec<String>, name: String },
    Unique { columns: Vec<String>, name: String },
    Index { columns: Vec<String>, name: String },
    Fulltext { columns: Vec<String>, name: String },
    Foreign(ForeignKeyDefinition),
    DropColumn { columns: Vec<String> },
    DropPrimary,
    DropUnique { name: String },
    DropIndex { name: String },
    DropForeign { name: String },
    RenameColumn { from: String, to: String },
}

impl Command {
    /// Short name of the command, used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Primary { .. } => "primary",
            Command::Unique { .. } => "unique",
            Command::Index { .. } => "index",
            Command::Fulltext { .. } => "fulltext",
            Command::Foreign(_) => "foreign",
            Command::DropColumn { .. } => "dropColumn",
            Command::DropPrimary => "dropPrimary",
            Command::DropUnique { .. } => "dropUnique",
            Command::DropIndex { .. } => "dropIndex",
            Command::DropForeign { .. } => "dropForeign",
            Command::RenameColumn { .. } => "renameColumn",
        }
    }
}
