//! MySQL grammar

use super::Grammar;
use crate::connection::{DatabaseValue, SqlDialect};
use crate::error::SchemaResult;
use crate::schema::blueprint::Blueprint;
use crate::schema::column::{ColumnDefinition, ColumnType};
use crate::schema::foreign::ForeignKeyDefinition;

/// DDL compiler for MySQL and MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl MySqlGrammar {
    fn alter(&self, blueprint: &Blueprint, clause: String) -> Vec<String> {
        vec![format!("ALTER TABLE {} {}", self.wrap_table(blueprint.table_name()), clause)]
    }

    fn index_clause(&self, keyword: &str, columns: &[String], name: &str) -> String {
        format!("ADD {} {}({})", keyword, self.wrap(name), self.columnize(columns))
    }
}

impl Grammar for MySqlGrammar {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySQL
    }

    fn type_sql(&self, column: &ColumnDefinition) -> SchemaResult<String> {
        Ok(match column.column_type() {
            ColumnType::Increments | ColumnType::Integer => "INT".to_string(),
            ColumnType::BigIncrements | ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::TinyInteger => "TINYINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { total, places } => format!("DECIMAL({}, {})", total, places),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Char(length) => format!("CHAR({})", length),
            ColumnType::String(length) => format!("VARCHAR({})", length),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::MediumText => "MEDIUMTEXT".to_string(),
            ColumnType::LongText => "LONGTEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json | ColumnType::Jsonb => "JSON".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
            ColumnType::Enum(allowed) => format!("ENUM({})", self.enum_values(column, allowed)?),
        })
    }

    /// Modifier order: unsigned, charset, collation, nullable, default,
    /// on update, increment, comment, placement
    fn column_sql(&self, _blueprint: &Blueprint, column: &ColumnDefinition) -> SchemaResult<String> {
        let mut sql = format!("{} {}", self.wrap(column.name()), self.type_sql(column)?);

        if column.unsigned {
            sql.push_str(" UNSIGNED");
        }
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" CHARACTER SET {}", charset));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE {}", self.quote_string(collation)));
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = self.default_clause(column) {
            sql.push_str(&default);
        }
        if column.use_current_on_update {
            sql.push_str(" ON UPDATE CURRENT_TIMESTAMP");
        }
        if column.auto_increment {
            // a modified column keeps its existing key
            sql.push_str(if column.change { " AUTO_INCREMENT" } else { " AUTO_INCREMENT PRIMARY KEY" });
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" COMMENT {}", self.quote_string(comment)));
        }
        if let Some(after) = &column.after {
            sql.push_str(&format!(" AFTER {}", self.wrap(after)));
        } else if column.first {
            sql.push_str(" FIRST");
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

    /// Backslash is an escape character in MySQL string literals
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let columns = blueprint
            .added_columns()
            .map(|column| self.column_sql(blueprint, column))
            .collect::<SchemaResult<Vec<_>>>()?;

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            self.wrap_table(blueprint.table_name()),
            columns.join(", ")
        );
        if let Some(charset) = blueprint.table_charset() {
            sql.push_str(&format!(" DEFAULT CHARACTER SET {}", charset));
        }
        if let Some(collation) = blueprint.table_collation() {
            sql.push_str(&format!(" COLLATE {}", self.quote_string(collation)));
        }
        if let Some(engine) = blueprint.table_engine() {
            sql.push_str(&format!(" ENGINE = {}", engine));
        }

        Ok(vec![sql])
    }

    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let clauses = blueprint
            .added_columns()
            .map(|column| Ok(format!("ADD COLUMN {}", self.column_sql(blueprint, column)?)))
            .collect::<SchemaResult<Vec<_>>>()?;

        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.alter(blueprint, clauses.join(", ")))
    }

    fn compile_change(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let clauses = blueprint
            .changed_columns()
            .map(|column| Ok(format!("MODIFY COLUMN {}", self.column_sql(blueprint, column)?)))
            .collect::<SchemaResult<Vec<_>>>()?;

        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.alter(blueprint, clauses.join(", ")))
    }

    fn compile_primary(&self, blueprint: &Blueprint, columns: &[String], _name: &str) -> Vec<String> {
        self.alter(blueprint, format!("ADD PRIMARY KEY ({})", self.columnize(columns)))
    }

    fn compile_unique(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        self.alter(blueprint, self.index_clause("UNIQUE", columns, name))
    }

    fn compile_index(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        self.alter(blueprint, self.index_clause("INDEX", columns, name))
    }

    fn compile_fulltext(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        self.alter(blueprint, self.index_clause("FULLTEXT", columns, name))
    }

    fn compile_foreign(&self, blueprint: &Blueprint, foreign: &ForeignKeyDefinition) -> Vec<String> {
        self.alter(
            blueprint,
            format!(
                "ADD CONSTRAINT {} {}",
                self.wrap(&foreign.constraint_name()),
                self.foreign_clause(foreign)
            ),
        )
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> Vec<String> {
        let clauses: Vec<_> = columns.iter().map(|c| format!("DROP COLUMN {}", self.wrap(c))).collect();
        self.alter(blueprint, clauses.join(", "))
    }

    fn compile_drop_primary(&self, blueprint: &Blueprint) -> Vec<String> {
        self.alter(blueprint, "DROP PRIMARY KEY".to_string())
    }

    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> Vec<String> {
        self.alter(blueprint, format!("DROP INDEX {}", self.wrap(name)))
    }

    fn compile_drop_index(&self, blueprint: &Blueprint, name: &str) -> Vec<String> {
        self.alter(blueprint, format!("DROP INDEX {}", self.wrap(name)))
    }

    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> Vec<String> {
        self.alter(blueprint, format!("DROP FOREIGN KEY {}", self.wrap(name)))
    }

    fn compile_rename(&self, from: &str, to: &str) -> String {
        format!("RENAME TABLE {} TO {}", self.wrap_table(from), self.wrap_table(to))
    }

    fn compile_drop_all_tables(&self, tables: &[String]) -> Vec<String> {
        if tables.is_empty() {
            return Vec::new();
        }
        let tables: Vec<_> = tables.iter().map(|t| self.wrap_table(t)).collect();
        vec![
            "SET FOREIGN_KEY_CHECKS = 0".to_string(),
            format!("DROP TABLE {}", tables.join(", ")),
            "SET FOREIGN_KEY_CHECKS = 1".to_string(),
        ]
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<DatabaseValue>) {
        (
            "SELECT table_name AS table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ? AND table_type = 'BASE TABLE'"
                .to_string(),
            vec![table.into()],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<DatabaseValue>) {
        (
            "SELECT column_name AS column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position"
                .to_string(),
            vec![table.into()],
        )
    }

    fn compile_all_tables(&self) -> String {
        "SELECT table_name AS table_name FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name"
            .to_string()
    }

    fn compile_acquire_lock(&self, name: &str) -> Option<String> {
        Some(format!("SELECT GET_LOCK({}, 0) AS acquired", self.quote_string(name)))
    }

    fn compile_release_lock(&self, name: &str) -> Option<String> {
        Some(format!("SELECT RELEASE_LOCK({}) AS released", self.quote_string(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(table: &Blueprint) -> Vec<String> {
        table.to_sql(&MySqlGrammar).unwrap()
    }

    #[test]
    fn test_create_with_id() {
        let mut table = Blueprint::create("users");
        table.id();

        let sql = compile(&table);
        assert_eq!(sql.len(), 1);
        assert_eq!(
            sql[0],
            "CREATE TABLE `users` (`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY)"
        );
    }

    #[test]
    fn test_modifier_order_and_escaping() {
        let mut table = Blueprint::create("posts");
        table
            .string("title", 200)
            .nullable()
            .default("it's C:\\")
            .comment("shown 'as is'");
        table.boolean("published").default(false);
        table.timestamp("edited_at").use_current().use_current_on_update();
        table.engine("InnoDB").charset("utf8mb4");

        let sql = compile(&table);
        assert_eq!(
            sql[0],
            "CREATE TABLE `posts` (\
             `title` VARCHAR(200) NULL DEFAULT 'it''s C:\\\\' COMMENT 'shown ''as is''', \
             `published` TINYINT(1) NOT NULL DEFAULT 0, \
             `edited_at` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP\
             ) DEFAULT CHARACTER SET utf8mb4 ENGINE = InnoDB"
        );
    }

    #[test]
    fn test_alter_adds_columns_then_commands() {
        let mut table = Blueprint::table("users");
        table.string("phone", 32).nullable().after("email");
        table.string("nickname", 50).change();
        table.index(&["phone"]);
        table.drop_foreign("fk_team_id_teams_id");
        table.rename_column("name", "full_name");

        let sql = compile(&table);
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE `users` ADD COLUMN `phone` VARCHAR(32) NULL AFTER `email`",
                "ALTER TABLE `users` MODIFY COLUMN `nickname` VARCHAR(50) NOT NULL",
                "ALTER TABLE `users` ADD INDEX `users_phone_index`(`phone`)",
                "ALTER TABLE `users` DROP FOREIGN KEY `fk_team_id_teams_id`",
                "ALTER TABLE `users` RENAME COLUMN `name` TO `full_name`",
            ]
        );
    }

    #[test]
    fn test_foreign_key_default_name() {
        let mut table = Blueprint::create("posts");
        table.foreign_id("user_id");
        table.foreign("user_id").references("id").on("users");

        let sql = compile(&table);
        assert_eq!(
            sql[1],
            "ALTER TABLE `posts` ADD CONSTRAINT `fk_user_id_users_id` FOREIGN KEY (`user_id`) \
             REFERENCES `users` (`id`) ON DELETE RESTRICT ON UPDATE RESTRICT"
        );
    }

    #[test]
    fn test_drop_and_rename_table() {
        assert_eq!(MySqlGrammar.compile_drop("users"), "DROP TABLE `users`");
        assert_eq!(MySqlGrammar.compile_rename("users", "people"), "RENAME TABLE `users` TO `people`");
        assert_eq!(
            MySqlGrammar.compile_drop_all_tables(&["a".to_string(), "b".to_string()])[1],
            "DROP TABLE `a`, `b`"
        );
    }
}
