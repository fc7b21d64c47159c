//! Integration tests for `execute` with autocommit disabled.

mod common;

use common::sqlite_executor;
use record_orm::{OrmError, QueryExecutor, Value};

async fn setup() -> (QueryExecutor, tempfile::NamedTempFile) {
    let (executor, file) = sqlite_executor().await;
    executor
        .execute(
            "create table `accounts` (`id` integer primary key, `balance` bigint not null)",
            &[],
            true,
        )
        .await
        .expect("Failed to create table");
    (executor, file)
}

async fn balances(executor: &QueryExecutor) -> Vec<Value> {
    executor
        .query("select `balance` from `accounts` order by `id`", &[], None)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|row| row.get("balance").cloned())
        .collect()
}

#[tokio::test]
async fn test_commit_persists() {
    let (executor, _file) = setup().await;

    let affected = executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?)",
            &[Value::Int(1), Value::Int(100)],
            false,
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(balances(&executor).await, [Value::Int(100)]);
}

#[tokio::test]
async fn test_failure_rolls_back_and_returns_statement_error() {
    let (executor, _file) = setup().await;
    executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?), (?, ?)",
            &[Value::Int(1), Value::Int(10), Value::Int(2), Value::Int(20)],
            false,
        )
        .await
        .unwrap();

    // The first row of this statement succeeds before the duplicate key fails
    let err = executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?), (?, ?)",
            &[Value::Int(3), Value::Int(30), Value::Int(1), Value::Int(99)],
            false,
        )
        .await
        .unwrap_err();
    match err {
        OrmError::Execution { message, .. } => {
            assert!(message.to_lowercase().contains("unique"), "{message}")
        }
        other => panic!("expected execution error, got {other:?}"),
    }

    assert_eq!(balances(&executor).await, [Value::Int(10), Value::Int(20)]);
}

#[tokio::test]
async fn test_not_null_violation_rolls_back() {
    let (executor, _file) = setup().await;

    // No rows to update, so nothing fails
    let affected = executor
        .execute("update `accounts` set `balance`=?", &[Value::Null], false)
        .await
        .unwrap();
    assert_eq!(affected, 0);

    executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?)",
            &[Value::Int(1), Value::Int(5)],
            true,
        )
        .await
        .unwrap();
    let err = executor
        .execute("update `accounts` set `balance`=?", &[Value::Null], false)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
    assert_eq!(balances(&executor).await, [Value::Int(5)]);
}

#[tokio::test]
async fn test_connection_is_reusable_after_rollback() {
    let (executor, _file) = setup().await;
    let _ = executor
        .execute("insert into `missing` (`id`) values (?)", &[Value::Int(1)], false)
        .await
        .unwrap_err();

    // The single pooled connection must not be left inside an open transaction
    executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?)",
            &[Value::Int(7), Value::Int(70)],
            false,
        )
        .await
        .unwrap();
    assert_eq!(balances(&executor).await, [Value::Int(70)]);
}

async fn count(executor: &QueryExecutor) -> Value {
    executor
        .query("select count(*) as `n` from `accounts`", &[], None)
        .await
        .unwrap()
        .remove(0)
        .get("n")
        .cloned()
        .unwrap_or(Value::Null)
}

const INSERT_OR_FAIL: &str =
    "insert or fail into `accounts` (`id`, `balance`) values (?, ?), (?, ?)";

#[tokio::test]
async fn test_partial_write_kept_without_transaction() {
    let (executor, _file) = setup().await;
    executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?)",
            &[Value::Int(1), Value::Int(10)],
            true,
        )
        .await
        .unwrap();

    // `or fail` keeps rows written before the conflicting one
    let err = executor
        .execute(
            INSERT_OR_FAIL,
            &[Value::Int(2), Value::Int(20), Value::Int(1), Value::Int(99)],
            true,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
    assert_eq!(count(&executor).await, Value::Int(2));
}

#[tokio::test]
async fn test_partial_write_rolled_back_in_transaction() {
    let (executor, _file) = setup().await;
    executor
        .execute(
            "insert into `accounts` (`id`, `balance`) values (?, ?)",
            &[Value::Int(1), Value::Int(10)],
            true,
        )
        .await
        .unwrap();

    let err = executor
        .execute(
            INSERT_OR_FAIL,
            &[Value::Int(2), Value::Int(20), Value::Int(1), Value::Int(99)],
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
    assert_eq!(count(&executor).await, Value::Int(1));
    assert_eq!(balances(&executor).await, [Value::Int(10)]);
}
