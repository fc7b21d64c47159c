//! Database access layer.
//!
//! - Connection pool management
//! - Placeholder translation
//! - Query execution
//! - Row decoding

pub mod executor;
pub(crate) mod params;
pub mod placeholder;
pub mod pool;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionManager, DbPool, PooledConnection};
pub use types::{Row, RowToValues};
