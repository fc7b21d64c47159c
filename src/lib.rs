//! record-orm library
//!
//! A small active-record layer over pooled MySQL or SQLite connections:
//! register a record type once, then find, save, update and remove its rows.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod record;

pub use config::{Config, PoolConfig};
pub use db::{ConnectionManager, QueryExecutor, Row};
pub use error::{OrmError, OrmResult, SchemaError};
pub use models::{Field, TableSchema, Value};
pub use record::{FindOptions, Limit, Record};
