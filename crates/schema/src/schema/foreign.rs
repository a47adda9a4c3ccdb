//! Foreign key definitions

use std::fmt;

/// Action taken on referencing rows when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A foreign key constraint: `column` references `table(references)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    pub(crate) column: String,
    pub(crate) table: String,
    pub(crate) references: String,
    pub(crate) on_delete: ReferentialAction,
    pub(crate) on_update: ReferentialAction,
    pub(crate) name: Option<String>,
}

impl ForeignKeyDefinition {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: String::new(),
            references: String::new(),
            on_delete: ReferentialAction::default(),
            on_update: ReferentialAction::default(),
            name: None,
        }
    }

    /// Referenced column
    pub fn references(&mut self, column: impl Into<String>) -> &mut Self {
        self.references = column.into();
        self
    }

    /// Referenced table
    pub fn on(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    pub fn on_delete(&mut self, action: ReferentialAction) -> &mut Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(&mut self, action: ReferentialAction) -> &mut Self {
        self.on_update = action;
        self
    }

    pub fn cascade_on_delete(&mut self) -> &mut Self {
        self.on_delete(ReferentialAction::Cascade)
    }

    pub fn null_on_delete(&mut self) -> &mut Self {
        self.on_delete(ReferentialAction::SetNull)
    }

    /// Explicit constraint name
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn referenced_table(&self) -> &str {
        &self.table
    }

    pub fn referenced_column(&self) -> &str {
        &self.references
    }

    pub fn delete_action(&self) -> ReferentialAction {
        self.on_delete
    }

    pub fn update_action(&self) -> ReferentialAction {
        self.on_update
    }

    /// The explicit name, or `fk_{column}_{table}_{references}`
    pub fn constraint_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("fk_{}_{}_{}", self.column, self.table, self.references),
        }
    }
}
