//! Column descriptors.
//!
//! A `Field` is static metadata describing one column of a record type: the
//! column name, its SQL type, whether it is the primary key, and the default
//! used when a record is saved without a value for it. Nothing here checks
//! values against the declared type.

use crate::models::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Zero-argument producer for computed defaults (ids, timestamps).
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default applied by `Record::get_or_default`.
#[derive(Clone)]
pub enum FieldDefault {
    /// A literal, cloned on every use.
    Value(Value),
    /// Invoked once per record, the first time the default is needed.
    Producer(DefaultFn),
}

impl FieldDefault {
    /// Resolve the default to a concrete value.
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// The family a descriptor belongs to. Fixes the default SQL type and default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Boolean,
    Integer,
    Float,
    Text,
}

impl FieldKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::String => "StringField",
            Self::Boolean => "BooleanField",
            Self::Integer => "IntegerField",
            Self::Float => "FloatField",
            Self::Text => "TextField",
        }
    }

    pub fn default_sql_type(&self) -> &'static str {
        match self {
            Self::String => "varchar(100)",
            Self::Boolean => "boolean",
            Self::Integer => "bigint",
            Self::Float => "real",
            Self::Text => "text",
        }
    }

    fn default_value(&self) -> Option<FieldDefault> {
        match self {
            Self::Boolean => Some(FieldDefault::Value(Value::Bool(false))),
            Self::Integer => Some(FieldDefault::Value(Value::Int(0))),
            Self::Float => Some(FieldDefault::Value(Value::Float(0.0))),
            Self::String | Self::Text => None,
        }
    }

    /// Booleans and text blobs never serve as keys.
    pub fn can_be_primary_key(&self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Float)
    }
}

/// Descriptor for one column.
///
/// Built with one of the kind constructors and refined with the consuming
/// builder methods; once attached to a schema it is never modified.
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    name: String,
    sql_type: String,
    primary_key: bool,
    default: Option<FieldDefault>,
}

impl Field {
    fn of_kind(kind: FieldKind) -> Self {
        Self {
            kind,
            name: String::new(),
            sql_type: kind.default_sql_type().to_string(),
            primary_key: false,
            default: kind.default_value(),
        }
    }

    /// `varchar(100)` column, no default.
    pub fn string() -> Self {
        Self::of_kind(FieldKind::String)
    }

    /// `boolean` column defaulting to `false`.
    pub fn boolean() -> Self {
        Self::of_kind(FieldKind::Boolean)
    }

    /// `bigint` column defaulting to `0`.
    pub fn integer() -> Self {
        Self::of_kind(FieldKind::Integer)
    }

    /// `real` column defaulting to `0.0`.
    pub fn float() -> Self {
        Self::of_kind(FieldKind::Float)
    }

    /// `text` column, no default.
    pub fn text() -> Self {
        Self::of_kind(FieldKind::Text)
    }

    /// Set an explicit column name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the SQL type (e.g. `varchar(50)`).
    pub fn ddl(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = sql_type.into();
        self
    }

    /// Mark this column as the primary key.
    pub fn primary_key(mut self) -> Self {
        if self.kind.can_be_primary_key() {
            self.primary_key = true;
        } else {
            warn!(
                kind = self.kind.class_name(),
                "Ignoring primary key flag on a field kind that cannot be a key"
            );
        }
        self
    }

    /// Use a literal default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Use a producer default, evaluated lazily per record.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Producer(Arc::new(producer)));
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Explicit column name; empty when the attribute name is used.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    /// Column name, falling back to the attribute name the field is declared under.
    pub fn column_name<'a>(&'a self, attr: &'a str) -> &'a str {
        if self.name.is_empty() { attr } else { &self.name }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {}:{}>",
            self.kind.class_name(),
            self.sql_type,
            self.name
        )
    }
}
