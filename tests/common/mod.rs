//! Shared setup for the integration tests.

#![allow(dead_code)]

use record_orm::{ConnectionManager, Field, PoolConfig, QueryExecutor, TableSchema};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Executor over a fresh SQLite file. Keep the returned file alive for the test.
pub async fn sqlite_executor() -> (QueryExecutor, NamedTempFile) {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    let path = file.path().to_string_lossy().to_string();
    let manager = ConnectionManager::connect(&PoolConfig::sqlite(path).pool_size(1, 1))
        .await
        .expect("Failed to open SQLite pool");
    (QueryExecutor::new(manager), file)
}

pub fn user_schema() -> Arc<TableSchema> {
    TableSchema::builder("User")
        .table("users")
        .field("id", Field::string().ddl("varchar(50)").primary_key())
        .field("email", Field::string().ddl("varchar(50)"))
        .field("passwd", Field::string().ddl("varchar(50)"))
        .field("admin", Field::boolean())
        .field("name", Field::string().ddl("varchar(50)"))
        .field("image", Field::string().ddl("varchar(500)"))
        .field("created_at", Field::float())
        .register_shared()
        .expect("User schema should register")
}

pub async fn create_table(executor: &QueryExecutor, schema: &TableSchema) {
    executor
        .execute(&schema.create_table_sql(), &[], true)
        .await
        .expect("Failed to create table");
}
