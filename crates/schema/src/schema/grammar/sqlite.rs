//! SQLite grammar
//!
//! SQLite cannot add primary or foreign keys to an existing table, so both
//! are declared inside `CREATE TABLE` and skipped when altering.

use super::Grammar;
use crate::connection::{DatabaseValue, SqlDialect};
use crate::error::{SchemaError, SchemaResult};
use crate::schema::blueprint::Blueprint;
use crate::schema::column::{ColumnDefinition, ColumnType};
use crate::schema::command::Command;

/// DDL compiler for SQLite
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl SqliteGrammar {
    /// Inline `PRIMARY KEY` and `FOREIGN KEY` table constraints for a create
    fn table_constraints(&self, blueprint: &Blueprint) -> Vec<String> {
        blueprint
            .all_commands()
            .iter()
            .filter_map(|command| match command {
                Command::Primary { columns, .. } => Some(format!("PRIMARY KEY ({})", self.columnize(columns))),
                Command::Foreign(foreign) => Some(format!(
                    "CONSTRAINT {} {}",
                    self.wrap(&foreign.constraint_name()),
                    self.foreign_clause(foreign)
                )),
                _ => None,
            })
            .collect()
    }
}

impl Grammar for SqliteGrammar {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    fn type_sql(&self, column: &ColumnDefinition) -> SchemaResult<String> {
        Ok(match column.column_type() {
            ColumnType::Increments
            | ColumnType::BigIncrements
            | ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger => "INTEGER".to_string(),
            ColumnType::Float | ColumnType::Double => "REAL".to_string(),
            ColumnType::Decimal { .. } => "NUMERIC".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Char(_) | ColumnType::String(_) | ColumnType::Uuid => "VARCHAR".to_string(),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => "TEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::Timestamp => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Json | ColumnType::Jsonb => "TEXT".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Enum(allowed) => format!(
                "VARCHAR CHECK ({} IN ({}))",
                self.wrap(column.name()),
                self.enum_values(column, allowed)?
            ),
        })
    }

    /// Modifier order: increment, nullable, default
    fn column_sql(&self, _blueprint: &Blueprint, column: &ColumnDefinition) -> SchemaResult<String> {
        let mut sql = format!("{} {}", self.wrap(column.name()), self.type_sql(column)?);

        if column.auto_increment {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = self.default_clause(column) {
            sql.push_str(&default);
        }

        Ok(sql)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let mut definitions = blueprint
            .added_columns()
            .map(|column| self.column_sql(blueprint, column))
            .collect::<SchemaResult<Vec<_>>>()?;
        definitions.extend(self.table_constraints(blueprint));

        Ok(vec![format!(
            "CREATE TABLE {} ({})",
            self.wrap_table(blueprint.table_name()),
            definitions.join(", ")
        )])
    }

    fn inlined_on_create(&self, command: &Command) -> bool {
        matches!(command, Command::Primary { .. } | Command::Foreign(_))
    }

    /// One statement per column, SQLite adds a single column per `ALTER TABLE`
    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        if let Some(column) = blueprint.added_columns().find(|column| column.auto_increment) {
            return Err(SchemaError::Compile(format!(
                "{} grammar cannot add auto-increment column '{}' to an existing table",
                self.dialect(),
                column.name()
            )));
        }

        blueprint
            .added_columns()
            .map(|column| {
                Ok(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.wrap_table(blueprint.table_name()),
                    self.column_sql(blueprint, column)?
                ))
            })
            .collect()
    }

    fn compile_unique(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        vec![format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.wrap(name),
            self.wrap_table(blueprint.table_name()),
            self.columnize(columns)
        )]
    }

    fn compile_index(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        vec![format!(
            "CREATE INDEX {} ON {} ({})",
            self.wrap(name),
            self.wrap_table(blueprint.table_name()),
            self.columnize(columns)
        )]
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|column| {
                format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.wrap_table(blueprint.table_name()),
                    self.wrap(column)
                )
            })
            .collect()
    }

    fn compile_drop_unique(&self, _blueprint: &Blueprint, name: &str) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.wrap(name))]
    }

    fn compile_drop_index(&self, _blueprint: &Blueprint, name: &str) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.wrap(name))]
    }

    fn compile_drop_all_tables(&self, tables: &[String]) -> Vec<String> {
        if tables.is_empty() {
            return Vec::new();
        }
        let mut statements = vec!["PRAGMA foreign_keys = OFF".to_string()];
        statements.extend(tables.iter().map(|table| self.compile_drop(table)));
        statements.push("PRAGMA foreign_keys = ON".to_string());
        statements
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<DatabaseValue>) {
        (
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?".to_string(),
            vec![table.into()],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<DatabaseValue>) {
        (
            "SELECT name AS column_name FROM pragma_table_info(?) ORDER BY cid".to_string(),
            vec![table.into()],
        )
    }

    fn compile_all_tables(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_with_id() {
        let mut table = Blueprint::create("users");
        table.id();

        let sql = table.to_sql(&SqliteGrammar).unwrap();
        assert_eq!(sql, vec!["CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL)"]);
    }

    #[test]
    fn test_keys_are_inlined_on_create() {
        let mut table = Blueprint::create("memberships");
        table.integer("user_id");
        table.integer("team_id");
        table.boolean("owner").default(true);
        table.primary(&["user_id", "team_id"]);
        table.foreign("user_id").references("id").on("users").cascade_on_delete();
        table.index(&["team_id"]);

        let sql = table.to_sql(&SqliteGrammar).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"memberships\" (\"user_id\" INTEGER NOT NULL, \"team_id\" INTEGER NOT NULL, \
                 \"owner\" TINYINT(1) NOT NULL DEFAULT 1, PRIMARY KEY (\"user_id\", \"team_id\"), \
                 CONSTRAINT \"fk_user_id_users_id\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") \
                 ON DELETE CASCADE ON UPDATE RESTRICT)",
                "CREATE INDEX \"memberships_team_id_index\" ON \"memberships\" (\"team_id\")",
            ]
        );
    }

    #[test]
    fn test_alter_skips_unsupported_commands() {
        let mut table = Blueprint::table("users");
        table.string("bio", 500).nullable();
        table.text("notes").nullable();
        table.foreign("team_id").references("id").on("teams");
        table.drop_primary();
        table.fulltext(&["bio"]);
        table.drop_columns(&["a", "b"]);

        let sql = table.to_sql(&SqliteGrammar).unwrap();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" ADD COLUMN \"bio\" VARCHAR NULL",
                "ALTER TABLE \"users\" ADD COLUMN \"notes\" TEXT NULL",
                "ALTER TABLE \"users\" DROP COLUMN \"a\"",
                "ALTER TABLE \"users\" DROP COLUMN \"b\"",
            ]
        );
    }

    #[test]
    fn test_change_is_compile_error() {
        let mut table = Blueprint::table("users");
        table.string("name", 100).change();

        assert!(matches!(
            table.to_sql(&SqliteGrammar),
            Err(crate::error::SchemaError::Compile(_))
        ));
    }

    #[test]
    fn test_only_table_keys_count_as_inlined() {
        let primary = Command::Primary { columns: vec!["id".to_string()], name: "users_id_primary".to_string() };
        let index = Command::Index { columns: vec!["email".to_string()], name: "users_email_index".to_string() };

        assert!(SqliteGrammar.inlined_on_create(&primary));
        assert!(!SqliteGrammar.inlined_on_create(&index));
        assert!(!SqliteGrammar.inlined_on_create(&Command::DropPrimary));
        assert!(!super::super::MySqlGrammar.inlined_on_create(&primary));
    }

    #[test]
    fn test_adding_increments_is_compile_error() {
        let mut table = Blueprint::table("users");
        table.increments("legacy_id");

        assert!(matches!(
            table.to_sql(&SqliteGrammar),
            Err(crate::error::SchemaError::Compile(_))
        ));
    }

    #[test]
    fn test_enum_check_constraint() {
        let mut table = Blueprint::create("posts");
        table.enumeration("status", &["draft", "live"]).default("draft");

        let sql = table.to_sql(&SqliteGrammar).unwrap();
        assert_eq!(
            sql[0],
            "CREATE TABLE \"posts\" (\"status\" VARCHAR CHECK (\"status\" IN ('draft', 'live')) NOT NULL DEFAULT 'draft')"
        );
    }
}
