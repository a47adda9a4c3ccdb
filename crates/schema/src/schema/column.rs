//! Column definitions
//!
//! A [`ColumnDefinition`] is created by one of the [`Blueprint`] column
//! factories and refined through chained modifiers. The column type is fixed
//! at construction; every modifier can be set again and the last write wins.
//!
//! [`Blueprint`]: crate::schema::Blueprint

/// Abstract column types understood by every grammar
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Increments,
    BigIncrements,
    TinyInteger,
    SmallInteger,
    Integer,
    BigInteger,
    Float,
    Double,
    Decimal { total: u8, places: u8 },
    Boolean,
    Char(u32),
    String(u32),
    Text,
    MediumText,
    LongText,
    Date,
    DateTime,
    Time,
    Timestamp,
    Json,
    Jsonb,
    Binary,
    Uuid,
    Enum(Vec<String>),
}

impl ColumnType {
    /// Whether this is an auto-incrementing key type
    pub fn is_increments(&self) -> bool {
        matches!(self, ColumnType::Increments | ColumnType::BigIncrements)
    }
}

/// Literal default value for a column
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Raw SQL expression, emitted unquoted (e.g. `CURRENT_TIMESTAMP`)
    Expression(String),
}

impl DefaultValue {
    pub fn expression(sql: impl Into<String>) -> Self {
        DefaultValue::Expression(sql.into())
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        DefaultValue::Bool(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        DefaultValue::Integer(value as i64)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        DefaultValue::Integer(value)
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        DefaultValue::Float(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        DefaultValue::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        DefaultValue::String(value)
    }
}

impl<T: Into<DefaultValue>> From<Option<T>> for DefaultValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DefaultValue::Null, Into::into)
    }
}

/// One column of a table change-set
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    column_type: ColumnType,
    name: String,
    pub(crate) nullable: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) unsigned: bool,
    pub(crate) auto_increment: bool,
    pub(crate) primary: bool,
    pub(crate) unique: bool,
    pub(crate) index: bool,
    pub(crate) comment: Option<String>,
    pub(crate) after: Option<String>,
    pub(crate) first: bool,
    pub(crate) charset: Option<String>,
    pub(crate) collation: Option<String>,
    pub(crate) change: bool,
    pub(crate) use_current: bool,
    pub(crate) use_current_on_update: bool,
}

impl ColumnDefinition {
    pub fn new(column_type: ColumnType, name: impl Into<String>) -> Self {
        let increments = column_type.is_increments();
        Self {
            column_type,
            name: name.into(),
            nullable: false,
            default: None,
            unsigned: increments,
            auto_increment: increments,
            primary: increments,
            unique: false,
            index: false,
            comment: None,
            after: None,
            first: false,
            charset: None,
            collation: None,
            change: false,
            use_current: false,
            use_current_on_update: false,
        }
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allow NULL values
    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    /// Set whether NULL values are allowed
    pub fn set_nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = nullable;
        self
    }

    /// Set the column default
    pub fn default(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    /// Make this column (alone) the primary key
    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    /// Add a unique index on this column
    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    /// Add a plain index on this column
    pub fn index(&mut self) -> &mut Self {
        self.index = true;
        self
    }

    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    /// Place the column after another one (MySQL)
    pub fn after(&mut self, column: impl Into<String>) -> &mut Self {
        self.after = Some(column.into());
        self
    }

    /// Place the column first in the table (MySQL)
    pub fn first(&mut self) -> &mut Self {
        self.first = true;
        self
    }

    pub fn charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn collation(&mut self, collation: impl Into<String>) -> &mut Self {
        self.collation = Some(collation.into());
        self
    }

    /// Modify an existing column instead of adding a new one
    pub fn change(&mut self) -> &mut Self {
        self.change = true;
        self
    }

    /// Default timestamp columns to the current time
    pub fn use_current(&mut self) -> &mut Self {
        self.use_current = true;
        self
    }

    /// Refresh timestamp columns on every update (MySQL)
    pub fn use_current_on_update(&mut self) -> &mut Self {
        self.use_current_on_update = true;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_index(&self) -> bool {
        self.index
    }

    pub fn get_comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn is_change(&self) -> bool {
        self.change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_imply_key_flags() {
        let column = ColumnDefinition::new(ColumnType::BigIncrements, "id");

        assert!(column.is_auto_increment());
        assert!(column.is_primary());
        assert!(column.is_unsigned());
        assert!(!column.is_nullable());
    }

    #[test]
    fn test_modifiers_last_write_wins() {
        let mut column = ColumnDefinition::new(ColumnType::String(255), "status");
        column.default("draft").nullable().default("published").set_nullable(false);

        assert_eq!(column.default_value(), Some(&DefaultValue::String("published".to_string())));
        assert!(!column.is_nullable());
        assert_eq!(column.column_type(), &ColumnType::String(255));
    }

    #[test]
    fn test_default_from_option() {
        assert_eq!(DefaultValue::from(None::<i64>), DefaultValue::Null);
        assert_eq!(DefaultValue::from(Some(3)), DefaultValue::Integer(3));
    }
}
