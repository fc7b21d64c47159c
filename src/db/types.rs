//! Row decoding.
//!
//! Driver rows are converted into ordered column→`Value` rows in two phases:
//! 1. `TypeCategory` classifies the column type name
//! 2. Backend-specific decoders extract the value
//!
//! MySQL reports precise column types, including for expressions. SQLite is
//! dynamically typed, so its decoder prefers the storage class of each value
//! and only uses the declared type to recover booleans.

use crate::models::{DatabaseType, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};
use tracing::warn;

// =============================================================================
// Rows
// =============================================================================

/// One fetched row: column names and values in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; a repeated name replaces the earlier value.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    DateTime,
    Timestamp,
    Date,
    Time,
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Decimal/Numeric - SQLite's NUMERIC is a float affinity
    if lower.contains("decimal") || lower.contains("numeric") {
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    let base = lower.trim_end_matches(" unsigned");
    if matches!(
        base,
        "tinyint"
            | "smallint"
            | "mediumint"
            | "int"
            | "integer"
            | "bigint"
            | "int2"
            | "int4"
            | "int8"
            | "year"
    ) || base.contains("serial")
    {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    match lower.as_str() {
        "datetime" => return TypeCategory::DateTime,
        "timestamp" => return TypeCategory::Timestamp,
        "date" => return TypeCategory::Date,
        "time" => return TypeCategory::Time,
        _ => {}
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "enum" || lower == "set" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row to Values Trait
// =============================================================================

/// Trait for converting driver rows into `Row`s.
pub trait RowToValues {
    fn to_row(&self) -> Row;
}

impl RowToValues for MySqlRow {
    fn to_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn to_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                (col.name().to_string(), sqlite::decode_column(self, idx, declared))
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Value {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Err(e) => {
                warn!(column = idx, error = %e, "Failed to read column");
                return Value::Null;
            }
            Ok(_) => {}
        }

        match category {
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Binary => decode_bytes(row, idx),
            TypeCategory::DateTime => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .map(|v| Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
                .unwrap_or_else(|_| decode_text(row, idx)),
            TypeCategory::Timestamp => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .map(|v| Value::Text(v.to_rfc3339()))
                .unwrap_or_else(|_| decode_text(row, idx)),
            TypeCategory::Date => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or_else(|_| decode_text(row, idx)),
            TypeCategory::Time => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or_else(|_| decode_text(row, idx)),
            _ => decode_text(row, idx),
        }
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<bool, _>(idx)
            .map(Value::Bool)
            .unwrap_or_else(|_| decode_integer(row, idx))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Value::Int(v);
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Value::Int(i64::from(v));
        }
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Value::Int(i64::from(v));
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            // BIGINT UNSIGNED beyond i64 keeps its exact digits
            return i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(v.to_string()));
        }
        decode_text(row, idx)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Value::Float(v);
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return Value::Float(f64::from(v));
        }
        decode_text(row, idx)
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Value {
        match row.try_get::<RawDecimal, _>(idx) {
            Ok(v) => Value::Text(v.0),
            Err(e) => {
                warn!(column = idx, error = %e, "Failed to decode DECIMAL");
                Value::Null
            }
        }
    }

    fn decode_bytes(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Vec<u8>, _>(idx)
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Value::Text(v);
        }
        // Binary collations and unknown types arrive as raw bytes
        match row.try_get_unchecked::<Vec<u8>, _>(idx) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => Value::Text(s),
                Err(e) => Value::Bytes(e.into_bytes()),
            },
            Err(e) => {
                warn!(column = idx, error = %e, "Failed to decode column");
                Value::Null
            }
        }
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, declared: TypeCategory) -> Value {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => categorize_type(raw.type_info().name(), DatabaseType::SQLite),
            Err(e) => {
                warn!(column = idx, error = %e, "Failed to read column");
                return Value::Null;
            }
        };

        // Booleans are stored as integers; only the declared type tells them apart
        if declared == TypeCategory::Boolean && storage == TypeCategory::Integer {
            return row
                .try_get_unchecked::<bool, _>(idx)
                .map(Value::Bool)
                .unwrap_or(Value::Null);
        }

        match storage {
            TypeCategory::Integer | TypeCategory::Boolean => row
                .try_get_unchecked::<i64, _>(idx)
                .map(Value::Int)
                .unwrap_or(Value::Null),
            TypeCategory::Float => row
                .try_get_unchecked::<f64, _>(idx)
                .map(Value::Float)
                .unwrap_or(Value::Null),
            TypeCategory::Binary => row
                .try_get_unchecked::<Vec<u8>, _>(idx)
                .map(Value::Bytes)
                .unwrap_or(Value::Null),
            _ => row
                .try_get_unchecked::<String, _>(idx)
                .map(Value::Text)
                .unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        for name in ["BIGINT", "INT", "TINYINT", "INTEGER", "BIGINT UNSIGNED", "SMALLINT"] {
            assert_eq!(
                categorize_type(name, DatabaseType::MySQL),
                TypeCategory::Integer,
                "{name}"
            );
        }
        assert_ne!(
            categorize_type("POINT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_boolean_before_integer() {
        assert_eq!(
            categorize_type("BOOLEAN", DatabaseType::MySQL),
            TypeCategory::Boolean
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_text_and_time() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::DateTime
        );
        assert_eq!(
            categorize_type("REAL", DatabaseType::SQLite),
            TypeCategory::Float
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Null
        );
        assert_eq!(
            categorize_type("BLOB", DatabaseType::SQLite),
            TypeCategory::Binary
        );
    }

    #[test]
    fn test_row_keeps_column_order() {
        let row: Row = vec![
            ("id", Value::Int(1)),
            ("name", Value::from("a")),
            ("email", Value::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(row.column_names(), ["id", "name", "email"]);
        assert_eq!(row.get("name"), Some(&Value::from("a")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_row_push_replaces_duplicate() {
        let mut row = Row::new();
        row.push("n", Value::Int(1));
        row.push("n", Value::Int(2));
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("n"), Some(&Value::Int(2)));
    }
}
