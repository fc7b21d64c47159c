//! Data models for the record mapping layer.
//!
//! This module re-exports the declarative types: column values, field
//! descriptors and table schemas.

pub mod connection;
pub mod field;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use field::{DefaultFn, Field, FieldDefault, FieldKind};
pub use schema::{SchemaBuilder, TableSchema, placeholders, quote_ident};
pub use value::Value;
