//! Error types for the record mapping layer.
//!
//! All errors are defined with `thiserror`. Schema errors are raised while a
//! record type is being registered; everything else is raised by the pool,
//! the executor or the CRUD operations and always surfaces to the caller.

use thiserror::Error;

/// Errors raised while registering a record type.
///
/// These are configuration errors: a type whose schema fails to register
/// never becomes usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate primary key for field: {field}")]
    DuplicateKey { field: String },

    #[error("Primary key not found for type: {type_name}")]
    MissingKey { type_name: String },

    #[error("Field declared twice: {field}")]
    DuplicateField { field: String },
}

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "23000" for an integrity constraint violation
        sql_state: Option<String>,
    },

    #[error("Decode error: {message}")]
    Decode { message: String },
}

impl OrmError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error came from reaching (or failing to reach) the database.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors to OrmError.
impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => OrmError::connection(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                OrmError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => OrmError::execution("No rows returned", None),
            sqlx::Error::PoolTimedOut => OrmError::connection(
                "Timed out waiting for a pooled connection",
                "Increase the pool size or the acquire timeout",
            ),
            sqlx::Error::PoolClosed => {
                OrmError::connection("Connection pool is closed", "Initialize the pool again")
            }
            sqlx::Error::Io(io_err) => OrmError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => OrmError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => OrmError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                OrmError::decode(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => OrmError::decode(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                OrmError::decode(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => OrmError::decode(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => OrmError::connection(
                "Database worker crashed",
                "Initialize the pool again",
            ),
            _ => OrmError::execution(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for mapping-layer operations.
pub type OrmResult<T> = Result<T, OrmError>;
