//! Records and their CRUD operations.
//!
//! A [`Record`] is an ordered attribute→value bag bound to one registered
//! [`TableSchema`]. The schema supplies SQL and defaults; the values live in
//! the record itself. Nothing is loaded or flushed implicitly: reads go
//! through [`Record::find`], [`Record::find_all`] and [`Record::find_number`],
//! writes through [`Record::save`], [`Record::update`] and [`Record::remove`].

use crate::db::{QueryExecutor, Row};
use crate::error::{OrmError, OrmResult};
use crate::models::{TableSchema, Value, quote_ident};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// A row-limit clause: `limit ?` or `limit ?, ?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// At most `n` rows.
    Count(u64),
    /// `count` rows starting at `offset`.
    Range(u64, u64),
}

impl Limit {
    fn clause(&self) -> &'static str {
        match self {
            Limit::Count(_) => "limit ?",
            Limit::Range(..) => "limit ?, ?",
        }
    }

    fn args(&self) -> OrmResult<Vec<Value>> {
        match *self {
            Limit::Count(n) => Ok(vec![bound(n)?]),
            Limit::Range(offset, count) => Ok(vec![bound(offset)?, bound(count)?]),
        }
    }
}

/// Limit values are bound as signed 64-bit integers.
fn bound(n: u64) -> OrmResult<Value> {
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| OrmError::invalid_argument(format!("limit value out of range: {}", n)))
}

fn non_negative(n: i64) -> OrmResult<u64> {
    u64::try_from(n)
        .map_err(|_| OrmError::invalid_argument(format!("invalid limit value: {}", n)))
}

impl From<u64> for Limit {
    fn from(n: u64) -> Self {
        Limit::Count(n)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Range(offset, count)
    }
}

impl TryFrom<i64> for Limit {
    type Error = OrmError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Ok(Limit::Count(non_negative(n)?))
    }
}

impl TryFrom<(i64, i64)> for Limit {
    type Error = OrmError;

    fn try_from((offset, count): (i64, i64)) -> Result<Self, Self::Error> {
        Ok(Limit::Range(non_negative(offset)?, non_negative(count)?))
    }
}

impl TryFrom<&[i64]> for Limit {
    type Error = OrmError;

    fn try_from(values: &[i64]) -> Result<Self, Self::Error> {
        match *values {
            [n] => Limit::try_from(n),
            [offset, count] => Limit::try_from((offset, count)),
            _ => Err(OrmError::invalid_argument(format!(
                "invalid limit value: {:?}",
                values
            ))),
        }
    }
}

impl FromStr for Limit {
    type Err = OrmError;

    /// Parses `"5"` or `"10,20"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| OrmError::invalid_argument(format!("invalid limit value: {}", s)))?;
        Limit::try_from(parts.as_slice())
    }
}

/// Filters for [`Record::find_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub where_clause: Option<String>,
    pub args: Vec<Value>,
    pub order_by: Option<String>,
    pub limit: Option<Limit>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `where` fragment with its `?` arguments.
    pub fn filter(mut self, clause: impl Into<String>, args: Vec<Value>) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args;
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Statement and arguments for a `find_all` over `schema`.
    pub fn statement(&self, schema: &TableSchema) -> OrmResult<(String, Vec<Value>)> {
        let mut sql = schema.select_sql().to_string();
        let mut args = self.args.clone();

        if let Some(clause) = non_empty(&self.where_clause) {
            sql.push_str(" where ");
            sql.push_str(clause);
        }
        if let Some(order_by) = non_empty(&self.order_by) {
            sql.push_str(" order by ");
            sql.push_str(order_by);
        }
        if let Some(limit) = &self.limit {
            sql.push(' ');
            sql.push_str(limit.clause());
            args.extend(limit.args()?);
        }
        Ok((sql, args))
    }
}

fn non_empty(fragment: &Option<String>) -> Option<&str> {
    fragment.as_deref().filter(|s| !s.trim().is_empty())
}

/// An instance of a registered record type.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<TableSchema>,
    values: Vec<(String, Value)>,
}

impl TableSchema {
    /// An empty record of this type.
    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }
}

impl Record {
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            values: Vec::new(),
        }
    }

    /// Build a record from attribute/value pairs.
    pub fn with_values<K, V, I>(schema: Arc<TableSchema>, values: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new(schema);
        for (key, value) in values {
            record.set(key, value);
        }
        record
    }

    /// Wrap a fetched row. Columns keep their order.
    pub fn from_row(schema: Arc<TableSchema>, row: Row) -> Self {
        Self::with_values(schema, row)
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Stored value, without falling back to defaults.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.values.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.values.push((key, value));
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    pub fn remove_value(&mut self, key: &str) -> Option<Value> {
        let index = self.values.iter().position(|(k, _)| k == key)?;
        Some(self.values.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn primary_key_value(&self) -> Option<&Value> {
        self.get(self.schema.primary_key())
    }

    /// Stored value, or the declared default for `key`.
    ///
    /// A resolved default is stored on the record, so a producer runs at most
    /// once per record. Stored nulls count as absent.
    pub fn get_or_default(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.get(key).filter(|v| !v.is_null()) {
            return Some(value.clone());
        }
        let default = self.schema.mapping(key)?.default()?;
        let value = default.resolve();
        debug!("using default value for {}: {}", key, value);
        self.set(key, value.clone());
        Some(value)
    }

    /// Find one record by primary key.
    pub async fn find(
        schema: &Arc<TableSchema>,
        executor: &QueryExecutor,
        key: impl Into<Value>,
    ) -> OrmResult<Option<Record>> {
        let rows = executor
            .query(&schema.find_sql(), &[key.into()], Some(1))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| Record::from_row(Arc::clone(schema), row)))
    }

    /// Find records matching `options`.
    pub async fn find_all(
        schema: &Arc<TableSchema>,
        executor: &QueryExecutor,
        options: &FindOptions,
    ) -> OrmResult<Vec<Record>> {
        let (sql, args) = options.statement(schema)?;
        let rows = executor.query(&sql, &args, None).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(Arc::clone(schema), row))
            .collect())
    }

    /// Evaluate `select <select_expr> _num_ from <table> [where ...]`, e.g. `count(id)`.
    pub async fn find_number(
        schema: &TableSchema,
        executor: &QueryExecutor,
        select_expr: &str,
        where_clause: Option<&str>,
        args: &[Value],
    ) -> OrmResult<Option<Value>> {
        let mut sql = format!(
            "select {} _num_ from {}",
            select_expr,
            quote_ident(schema.table_name())
        );
        if let Some(clause) = where_clause.filter(|c| !c.trim().is_empty()) {
            sql.push_str(" where ");
            sql.push_str(clause);
        }
        let rows = executor.query(&sql, args, Some(1)).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get("_num_").cloned()))
    }

    /// Insert this record. Unset fields take their declared defaults.
    pub async fn save(&mut self, executor: &QueryExecutor) -> OrmResult<u64> {
        let schema = Arc::clone(&self.schema);
        let args: Vec<Value> = schema
            .fields()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(schema.primary_key()))
            .map(|attr| self.get_or_default(attr).unwrap_or(Value::Null))
            .collect();

        let affected = executor.execute(schema.insert_sql(), &args, true).await?;
        if affected != 1 {
            warn!("failed to insert record: affected rows: {}", affected);
        }
        Ok(affected)
    }

    /// Write every field's stored value. Unset fields are written as NULL.
    pub async fn update(&self, executor: &QueryExecutor) -> OrmResult<u64> {
        let args: Vec<Value> = self
            .schema
            .fields()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.schema.primary_key()))
            .map(|attr| self.get(attr).cloned().unwrap_or(Value::Null))
            .collect();

        let affected = executor
            .execute(self.schema.update_sql(), &args, true)
            .await?;
        if affected != 1 {
            warn!("failed to update by primary key: affected rows: {}", affected);
        }
        Ok(affected)
    }

    /// Delete the row with this record's primary key.
    pub async fn remove(&self, executor: &QueryExecutor) -> OrmResult<u64> {
        let key = self.primary_key_value().cloned().unwrap_or(Value::Null);
        let affected = executor
            .execute(self.schema.delete_sql(), &[key], true)
            .await?;
        if affected != 1 {
            warn!("failed to remove by primary key: affected rows: {}", affected);
        }
        Ok(affected)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
