//! Connection pool management.
//!
//! The `ConnectionManager` is the explicit handle to the process-wide pool.
//! It is created empty, populated by `initialize`, and emptied by `close`.
//! Clones share the same pool slot, so one manager can be handed to every
//! executor in the process.

use crate::config::PoolConfig;
use crate::error::{OrmError, OrmResult};
use crate::models::DatabaseType;
use sqlx::pool::PoolConnection;
use sqlx::{
    MySql, MySqlPool, Sqlite, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Backend-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Acquire a connection, waiting while the pool is at its max size.
    pub async fn acquire(&self) -> OrmResult<PooledConnection> {
        match self {
            DbPool::MySql(pool) => Ok(PooledConnection::MySql(pool.acquire().await?)),
            DbPool::SQLite(pool) => Ok(PooledConnection::SQLite(pool.acquire().await?)),
        }
    }
}

/// A connection checked out of the pool.
///
/// Returned to the pool when dropped, on every exit path.
#[derive(Debug)]
pub enum PooledConnection {
    MySql(PoolConnection<MySql>),
    SQLite(PoolConnection<Sqlite>),
}

impl PooledConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            PooledConnection::MySql(_) => DatabaseType::MySQL,
            PooledConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    pool: Arc<RwLock<Option<DbPool>>>,
}

impl ConnectionManager {
    /// Create a manager with no pool yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager and initialize its pool in one step.
    pub async fn connect(config: &PoolConfig) -> OrmResult<Self> {
        let manager = Self::new();
        manager.initialize(config).await?;
        Ok(manager)
    }

    /// Create the pool from `config`, replacing (and closing) any existing one.
    ///
    /// On failure the previous pool, if any, stays in place.
    pub async fn initialize(&self, config: &PoolConfig) -> OrmResult<()> {
        config.validate()?;

        info!(
            backend = %config.backend,
            host = %config.host,
            port = config.port,
            database = %config.database,
            min_size = config.min_size,
            max_size = config.max_size,
            "create database connection pool..."
        );

        let pool = self.create_pool(config).await?;

        // Swap under the lock, close the old pool outside of it
        let previous = {
            let mut slot = self.pool.write().await;
            slot.replace(pool)
        };

        if let Some(previous) = previous {
            info!("Replacing existing connection pool");
            previous.close().await;
        }

        Ok(())
    }

    /// Get a handle to the current pool.
    pub async fn pool(&self) -> OrmResult<DbPool> {
        let slot = self.pool.read().await;
        slot.clone().ok_or_else(|| {
            OrmError::connection(
                "Connection pool not initialized",
                "Call ConnectionManager::initialize before running queries",
            )
        })
    }

    /// Scoped acquisition: the connection goes back to the pool when dropped.
    pub async fn acquire(&self) -> OrmResult<PooledConnection> {
        // The lock is released before waiting on the pool
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        debug!(backend = %conn.db_type(), "Acquired pooled connection");
        Ok(conn)
    }

    pub async fn is_initialized(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Backend of the current pool.
    pub async fn db_type(&self) -> Option<DatabaseType> {
        self.pool.read().await.as_ref().map(DbPool::db_type)
    }

    /// Close the pool. Later queries fail until `initialize` is called again.
    pub async fn close(&self) {
        let previous = self.pool.write().await.take();
        if let Some(pool) = previous {
            pool.close().await;
            info!("Connection pool closed");
        }
    }

    /// Create a connection pool for the given configuration.
    async fn create_pool(&self, config: &PoolConfig) -> OrmResult<DbPool> {
        match config.backend {
            DatabaseType::MySQL => {
                let options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .database(&config.database)
                    .charset(&config.charset);

                let mut pool_options = MySqlPoolOptions::new()
                    .min_connections(config.min_size)
                    .max_connections(config.max_size)
                    .acquire_timeout(config.acquire_timeout());

                if !config.autocommit {
                    pool_options = pool_options.after_connect(|conn, _meta| {
                        Box::pin(async move {
                            use sqlx::Executor;
                            conn.execute("SET autocommit=0").await?;
                            Ok(())
                        })
                    });
                }

                let pool = DbPool::MySql(pool_options.connect_lazy_with(options));
                self.verify_pool(pool, config).await
            }
            DatabaseType::SQLite => {
                let options = if config.database == ":memory:" {
                    SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                        OrmError::connection(
                            format!("Invalid SQLite options: {}", e),
                            "Use sqlite::memory: or a file path",
                        )
                    })?
                } else {
                    SqliteConnectOptions::new()
                        .filename(&config.database)
                        .create_if_missing(true)
                };

                if !config.autocommit {
                    warn!("autocommit=false is ignored for SQLite pools");
                }

                let pool = SqlitePoolOptions::new()
                    .min_connections(config.min_size)
                    .max_connections(config.max_size)
                    .acquire_timeout(config.acquire_timeout())
                    .connect_lazy_with(options);
                self.verify_pool(DbPool::SQLite(pool), config).await
            }
        }
    }

    /// Open one connection within the connect timeout so unreachable servers fail fast.
    async fn verify_pool(&self, pool: DbPool, config: &PoolConfig) -> OrmResult<DbPool> {
        let error = match timeout(config.connect_timeout(), pool.acquire()).await {
            Ok(Ok(_conn)) => return Ok(pool),
            Ok(Err(OrmError::Connection { message, .. })) => OrmError::connection(
                format!("Failed to connect: {}", message),
                self.connection_suggestion(config.backend, &message),
            ),
            Ok(Err(e)) => OrmError::connection(
                format!("Failed to connect: {}", e),
                self.connection_suggestion(config.backend, &e.to_string()),
            ),
            Err(_) => OrmError::connection(
                format!(
                    "Timed out after {}s connecting to {}",
                    config.connect_timeout_secs, config.backend
                ),
                self.connection_suggestion(config.backend, "connection refused"),
            ),
        };
        pool.close().await;
        Err(error)
    }

    /// Generate a helpful suggestion for connection errors.
    fn connection_suggestion(&self, db_type: DatabaseType, error: &str) -> String {
        let error_str = error.to_lowercase();

        if error_str.contains("connection refused") {
            return format!(
                "Check that the {} server is running and accessible",
                db_type
            );
        }

        if error_str.contains("access denied")
            || error_str.contains("authentication")
            || error_str.contains("password")
        {
            return "Verify the user and password".to_string();
        }

        if error_str.contains("unknown database") || error_str.contains("unable to open") {
            return "Check that the database exists".to_string();
        }

        match db_type {
            DatabaseType::MySQL => "Verify host, port and credentials of the MySQL server".to_string(),
            DatabaseType::SQLite => {
                "Verify the file path exists and is accessible".to_string()
            }
        }
    }
}
