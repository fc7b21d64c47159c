//! Placeholder translation.
//!
//! Statements are written with `?` for every bound value. Before execution
//! the statement is tokenized with the backend's SQL dialect and each bare `?`
//! placeholder token is rewritten into the backend's own syntax. String
//! literals, quoted identifiers and comments follow the dialect's rules, so a
//! `?` inside them is left alone.

use crate::error::{OrmError, OrmResult};
use crate::models::DatabaseType;
use sqlparser::dialect::{Dialect, MySqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Location, Token, Tokenizer};

/// Get the SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Byte offsets of every bare `?` placeholder in `sql`, in order.
fn placeholder_offsets(sql: &str, db: DatabaseType) -> OrmResult<Vec<usize>> {
    let dialect = get_dialect(db);
    let tokens = Tokenizer::new(dialect.as_ref(), sql)
        .tokenize_with_location()
        .map_err(|e| OrmError::invalid_argument(format!("Failed to tokenize SQL: {}", e)))?;

    let locations: Vec<Location> = tokens
        .iter()
        .filter(|t| matches!(&t.token, Token::Placeholder(p) if p == "?"))
        .map(|t| t.span.start)
        .collect();

    // Token locations are 1-based line/column pairs counted in chars
    let mut offsets = Vec::with_capacity(locations.len());
    let mut pending = locations.iter().peekable();
    let (mut line, mut column) = (1u64, 1u64);
    for (idx, ch) in sql.char_indices() {
        let Some(next) = pending.peek() else {
            break;
        };
        if next.line == line && next.column == column {
            offsets.push(idx);
            pending.next();
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    if offsets.len() != locations.len() {
        return Err(OrmError::invalid_argument(
            "Failed to locate placeholders in SQL",
        ));
    }
    Ok(offsets)
}

/// Count the bare `?` placeholders in `sql`.
pub fn count_placeholders(sql: &str, db: DatabaseType) -> OrmResult<usize> {
    Ok(placeholder_offsets(sql, db)?.len())
}

/// Rewrite `?` placeholders for `db`. Returns the statement and the placeholder count.
pub fn translate(sql: &str, db: DatabaseType) -> OrmResult<(String, usize)> {
    let offsets = placeholder_offsets(sql, db)?;
    let mut out = String::with_capacity(sql.len() + offsets.len() * 2);
    let mut copied = 0;
    for (i, offset) in offsets.iter().enumerate() {
        out.push_str(&sql[copied..*offset]);
        out.push_str(&db.placeholder(i + 1));
        copied = offset + 1;
    }
    out.push_str(&sql[copied..]);
    Ok((out, offsets.len()))
}

/// Translate `sql` and check that it expects exactly `arg_count` values.
pub fn prepare(sql: &str, db: DatabaseType, arg_count: usize) -> OrmResult<String> {
    let (translated, expected) = translate(sql, db)?;
    if expected != arg_count {
        return Err(OrmError::invalid_argument(format!(
            "statement expects {} argument(s) but {} were supplied",
            expected, arg_count
        )));
    }
    Ok(translated)
}
