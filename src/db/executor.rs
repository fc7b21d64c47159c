//! Query execution engine.
//!
//! Every call acquires a connection from the [`ConnectionManager`], rewrites
//! `?` placeholders for the backend, binds the arguments in order and hands
//! the connection back when it returns, on success and on error alike.
//!
//! The backend-specific halves live in the `mysql` and `sqlite` submodules,
//! which are kept line-for-line parallel.

use crate::db::placeholder;
use crate::db::pool::{ConnectionManager, PooledConnection};
use crate::db::types::{Row, RowToValues};
use crate::error::{OrmError, OrmResult};
use crate::models::Value;
use futures_util::StreamExt;
use tracing::{info, warn};

/// Runs reads and writes against the pool owned by a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    manager: ConnectionManager,
}

impl QueryExecutor {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Run a read statement and return at most `limit` rows (all rows when `None`).
    pub async fn query(
        &self,
        sql: &str,
        args: &[Value],
        limit: Option<usize>,
    ) -> OrmResult<Vec<Row>> {
        info!("SQL: {}", sql);

        let mut conn = self.manager.acquire().await?;
        let statement = placeholder::prepare(sql, conn.db_type(), args.len())?;
        let fetch_limit = limit.unwrap_or(usize::MAX);

        let rows = match &mut conn {
            PooledConnection::MySql(c) => mysql::fetch_rows(c, &statement, args, fetch_limit).await?,
            PooledConnection::SQLite(c) => {
                sqlite::fetch_rows(c, &statement, args, fetch_limit).await?
            }
        };

        info!("rows returned: {}", rows.len());
        Ok(rows)
    }

    /// Run a write statement and return the number of affected rows.
    ///
    /// With `autocommit == false` the statement runs inside its own
    /// transaction: committed on success, rolled back on failure. The
    /// statement's error is returned even when the rollback fails too.
    pub async fn execute(&self, sql: &str, args: &[Value], autocommit: bool) -> OrmResult<u64> {
        info!("SQL: {}", sql);

        let mut conn = self.manager.acquire().await?;
        let statement = placeholder::prepare(sql, conn.db_type(), args.len())?;

        match &mut conn {
            PooledConnection::MySql(c) => {
                if autocommit {
                    mysql::execute_write(c, &statement, args).await
                } else {
                    mysql::execute_in_transaction(c, &statement, args).await
                }
            }
            PooledConnection::SQLite(c) => {
                if autocommit {
                    sqlite::execute_write(c, &statement, args).await
                } else {
                    sqlite::execute_in_transaction(c, &statement, args).await
                }
            }
        }
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R: RowToValues>(results: Vec<Result<R, sqlx::Error>>) -> OrmResult<Vec<Row>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(OrmError::from)?.to_row());
    }
    Ok(rows)
}

/// Keep the statement's outcome; a failed rollback is only logged.
fn log_rollback_failure(result: Result<(), sqlx::Error>) {
    if let Err(e) = result {
        warn!(error = %e, "rollback failed");
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::{Connection, MySqlConnection};

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        args: &[Value],
        fetch_limit: usize,
    ) -> OrmResult<Vec<Row>> {
        // Without arguments run the raw statement, skipping the prepare round trip
        let results = if args.is_empty() {
            use sqlx::Executor;
            let stream = conn.fetch(sql);
            stream.take(fetch_limit).collect::<Vec<_>>().await
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_mysql_param(query, arg);
            }
            let stream = query.fetch(&mut *conn);
            stream.take(fetch_limit).collect::<Vec<_>>().await
        };
        collect_rows(results)
    }

    pub async fn execute_write(
        conn: &mut MySqlConnection,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<u64> {
        let result = if args.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_mysql_param(query, arg);
            }
            query.execute(&mut *conn).await?
        };
        Ok(result.rows_affected())
    }

    pub async fn execute_in_transaction(
        conn: &mut MySqlConnection,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<u64> {
        let mut tx = conn.begin().await?;
        match execute_write(&mut tx, sql, args).await {
            Ok(affected) => {
                tx.commit().await?;
                Ok(affected)
            }
            Err(e) => {
                log_rollback_failure(tx.rollback().await);
                Err(e)
            }
        }
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::{Connection, SqliteConnection};

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        args: &[Value],
        fetch_limit: usize,
    ) -> OrmResult<Vec<Row>> {
        let results = if args.is_empty() {
            use sqlx::Executor;
            let stream = conn.fetch(sql);
            stream.take(fetch_limit).collect::<Vec<_>>().await
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_sqlite_param(query, arg);
            }
            let stream = query.fetch(&mut *conn);
            stream.take(fetch_limit).collect::<Vec<_>>().await
        };
        collect_rows(results)
    }

    pub async fn execute_write(
        conn: &mut SqliteConnection,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<u64> {
        let result = if args.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_sqlite_param(query, arg);
            }
            query.execute(&mut *conn).await?
        };
        Ok(result.rows_affected())
    }

    pub async fn execute_in_transaction(
        conn: &mut SqliteConnection,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<u64> {
        let mut tx = conn.begin().await?;
        match execute_write(&mut tx, sql, args).await {
            Ok(affected) => {
                tx.commit().await?;
                Ok(affected)
            }
            Err(e) => {
                log_rollback_failure(tx.rollback().await);
                Err(e)
            }
        }
    }
}
