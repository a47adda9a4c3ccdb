//! PostgreSQL grammar

use super::Grammar;
use crate::connection::{DatabaseValue, SqlDialect};
use crate::error::SchemaResult;
use crate::schema::blueprint::Blueprint;
use crate::schema::column::{ColumnDefinition, ColumnType};
use crate::schema::foreign::ForeignKeyDefinition;

/// DDL compiler for PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl PostgresGrammar {
    fn alter(&self, blueprint: &Blueprint, clause: String) -> Vec<String> {
        vec![format!("ALTER TABLE {} {}", self.wrap_table(blueprint.table_name()), clause)]
    }

    /// `COMMENT ON COLUMN` statements; Postgres has no inline column comment
    fn compile_comments<'a>(
        &self,
        blueprint: &Blueprint,
        columns: impl Iterator<Item = &'a ColumnDefinition>,
    ) -> Vec<String> {
        columns
            .filter_map(|column| {
                column.get_comment().map(|comment| {
                    format!(
                        "COMMENT ON COLUMN {}.{} IS {}",
                        self.wrap_table(blueprint.table_name()),
                        self.wrap(column.name()),
                        self.quote_string(comment)
                    )
                })
            })
            .collect()
    }

    /// Underlying integer type, used where serial pseudo-types are not allowed
    fn change_type_sql(&self, column: &ColumnDefinition) -> SchemaResult<String> {
        Ok(match column.column_type() {
            ColumnType::Increments => "INTEGER".to_string(),
            ColumnType::BigIncrements => "BIGINT".to_string(),
            // the check constraint is replaced separately, TYPE takes no constraints
            ColumnType::Enum(_) => "VARCHAR(255)".to_string(),
            _ => self.type_sql(column)?,
        })
    }

    fn table_base_name<'a>(&self, table: &'a str) -> &'a str {
        table.rsplit('.').next().unwrap_or(table)
    }
}

impl Grammar for PostgresGrammar {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn type_sql(&self, column: &ColumnDefinition) -> SchemaResult<String> {
        let serial = column.auto_increment && !column.change;
        Ok(match column.column_type() {
            ColumnType::Increments => "SERIAL".to_string(),
            ColumnType::BigIncrements => "BIGSERIAL".to_string(),
            ColumnType::TinyInteger | ColumnType::SmallInteger if serial => "SMALLSERIAL".to_string(),
            ColumnType::TinyInteger | ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Integer if serial => "SERIAL".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger if serial => "BIGSERIAL".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { total, places } => format!("DECIMAL({}, {})", total, places),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Char(length) => format!("CHAR({})", length),
            ColumnType::String(length) => format!("VARCHAR({})", length),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => "TEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::Timestamp => "TIMESTAMP(0) WITHOUT TIME ZONE".to_string(),
            ColumnType::Time => "TIME(0) WITHOUT TIME ZONE".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
            ColumnType::Binary => "BYTEA".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Enum(allowed) => format!(
                "VARCHAR(255) CHECK ({} IN ({}))",
                self.wrap(column.name()),
                self.enum_values(column, allowed)?
            ),
        })
    }

    /// Modifier order: increment, collation, nullable, default
    fn column_sql(&self, _blueprint: &Blueprint, column: &ColumnDefinition) -> SchemaResult<String> {
        let mut sql = format!("{} {}", self.wrap(column.name()), self.type_sql(column)?);

        if column.auto_increment {
            sql.push_str(" PRIMARY KEY");
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE {}", self.wrap(collation)));
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = self.default_clause(column) {
            sql.push_str(&default);
        }

        Ok(sql)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let columns = blueprint
            .added_columns()
            .map(|column| self.column_sql(blueprint, column))
            .collect::<SchemaResult<Vec<_>>>()?;

        let mut statements = vec![format!(
            "CREATE TABLE {} ({})",
            self.wrap_table(blueprint.table_name()),
            columns.join(", ")
        )];
        statements.extend(self.compile_comments(blueprint, blueprint.added_columns()));
        Ok(statements)
    }

    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let clauses = blueprint
            .added_columns()
            .map(|column| Ok(format!("ADD COLUMN {}", self.column_sql(blueprint, column)?)))
            .collect::<SchemaResult<Vec<_>>>()?;

        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        let mut statements = self.alter(blueprint, clauses.join(", "));
        statements.extend(self.compile_comments(blueprint, blueprint.added_columns()));
        Ok(statements)
    }

    fn compile_change(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let mut clauses = Vec::new();
        for column in blueprint.changed_columns() {
            let name = self.wrap(column.name());
            clauses.push(format!("ALTER COLUMN {} TYPE {}", name, self.change_type_sql(column)?));
            clauses.push(if column.nullable {
                format!("ALTER COLUMN {} DROP NOT NULL", name)
            } else {
                format!("ALTER COLUMN {} SET NOT NULL", name)
            });
            clauses.push(match self.default_clause(column) {
                Some(default) => format!("ALTER COLUMN {} SET{}", name, default),
                None => format!("ALTER COLUMN {} DROP DEFAULT", name),
            });
            if let ColumnType::Enum(allowed) = column.column_type() {
                // same name Postgres gives an inline column check
                let check = self.wrap(&format!(
                    "{}_{}_check",
                    self.table_base_name(blueprint.table_name()),
                    column.name()
                ));
                clauses.push(format!("DROP CONSTRAINT IF EXISTS {}", check));
                clauses.push(format!(
                    "ADD CONSTRAINT {} CHECK ({} IN ({}))",
                    check,
                    name,
                    self.enum_values(column, allowed)?
                ));
            }
        }

        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        let mut statements = self.alter(blueprint, clauses.join(", "));
        statements.extend(self.compile_comments(blueprint, blueprint.changed_columns()));
        Ok(statements)
    }

    fn compile_primary(&self, blueprint: &Blueprint, columns: &[String], _name: &str) -> Vec<String> {
        self.alter(blueprint, format!("ADD PRIMARY KEY ({})", self.columnize(columns)))
    }

    fn compile_unique(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        self.alter(
            blueprint,
            format!("ADD CONSTRAINT {} UNIQUE ({})", self.wrap(name), self.columnize(columns)),
        )
    }

    fn compile_index(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        vec![format!(
            "CREATE INDEX {} ON {} ({})",
            self.wrap(name),
            self.wrap_table(blueprint.table_name()),
            self.columnize(columns)
        )]
    }

    fn compile_fulltext(&self, blueprint: &Blueprint, columns: &[String], name: &str) -> Vec<String> {
        let vectors: Vec<_> = columns
            .iter()
            .map(|column| format!("to_tsvector('english', {})", self.wrap(column)))
            .collect();

        vec![format!(
            "CREATE INDEX {} ON {} USING gin (({}))",
            self.wrap(name),
            self.wrap_table(blueprint.table_name()),
            vectors.join(" || ")
        )]
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

    /// Postgres names an unnamed primary key `{table}_pkey`
    fn compile_drop_primary(&self, blueprint: &Blueprint) -> Vec<String> {
        let name = format!("{}_pkey", self.table_base_name(blueprint.table_name()));
        self.alter(blueprint, format!("DROP CONSTRAINT {}", self.wrap(&name)))
    }

    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> Vec<String> {
        self.alter(blueprint, format!("DROP CONSTRAINT {}", self.wrap(name)))
    }

    fn compile_drop_index(&self, _blueprint: &Blueprint, name: &str) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.wrap(name))]
    }

    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> Vec<String> {
        self.alter(blueprint, format!("DROP CONSTRAINT {}", self.wrap(name)))
    }

    fn compile_drop_all_tables(&self, tables: &[String]) -> Vec<String> {
        if tables.is_empty() {
            return Vec::new();
        }
        let tables: Vec<_> = tables.iter().map(|t| self.wrap_table(t)).collect();
        vec![format!("DROP TABLE {} CASCADE", tables.join(", "))]
    }

    // information_schema uses the sql_identifier domain, cast to text for the driver
    fn compile_table_exists(&self, table: &str) -> (String, Vec<DatabaseValue>) {
        (
            "SELECT CAST(table_name AS TEXT) AS table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1 AND table_type = 'BASE TABLE'"
                .to_string(),
            vec![table.into()],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<DatabaseValue>) {
        (
            "SELECT CAST(column_name AS TEXT) AS column_name FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 ORDER BY ordinal_position"
                .to_string(),
            vec![table.into()],
        )
    }

    fn compile_all_tables(&self) -> String {
        "SELECT CAST(table_name AS TEXT) AS table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name"
            .to_string()
    }

    fn compile_acquire_lock(&self, name: &str) -> Option<String> {
        Some(format!("SELECT pg_try_advisory_lock({}) AS acquired", lock_key(name)))
    }

    fn compile_release_lock(&self, name: &str) -> Option<String> {
        Some(format!("SELECT pg_advisory_unlock({}) AS released", lock_key(name)))
    }
}

/// Stable 64-bit key for a lock name (FNV-1a)
fn lock_key(name: &str) -> i64 {
    let hash = name.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    });
    hash as i64
}
