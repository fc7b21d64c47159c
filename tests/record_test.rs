//! Integration tests for record CRUD against a SQLite file database.

mod common;

use common::{create_table, sqlite_executor, user_schema};
use record_orm::{Field, FindOptions, Limit, OrmError, Record, TableSchema, Value};
use std::sync::Arc;

fn user(id: &str, name: &str, created_at: f64) -> Record {
    Record::with_values(
        user_schema(),
        [
            ("id", Value::from(id)),
            ("email", Value::from(format!("{}@example.com", name))),
            ("passwd", Value::from("secret")),
            ("name", Value::from(name)),
            ("image", Value::from("about:blank")),
            ("created_at", Value::Float(created_at)),
        ],
    )
}

#[tokio::test]
async fn test_save_then_find() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    let mut record = user("u1", "Test", 1.5);
    assert_eq!(record.save(&executor).await.unwrap(), 1);
    // `admin` was unset, so its default was materialized on save
    assert_eq!(record.get("admin"), Some(&Value::Bool(false)));

    let found = Record::find(&schema, &executor, "u1")
        .await
        .unwrap()
        .expect("saved user should be found");
    assert_eq!(found.get("id"), Some(&Value::from("u1")));
    assert_eq!(found.get("name"), Some(&Value::from("Test")));
    assert_eq!(found.get("email"), Some(&Value::from("Test@example.com")));
    assert_eq!(found.get("admin"), Some(&Value::Bool(false)));
    assert_eq!(found.get("created_at"), Some(&Value::Float(1.5)));

    let columns: Vec<&str> = found.iter().map(|(k, _)| k).collect();
    assert_eq!(
        columns,
        ["id", "email", "passwd", "admin", "name", "image", "created_at"]
    );
}

#[tokio::test]
async fn test_find_missing_returns_none() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    let found = Record::find(&schema, &executor, "nobody").await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_save_uses_producer_default_for_key() {
    let (executor, _file) = sqlite_executor().await;
    let schema = TableSchema::builder("Comment")
        .table("comments")
        .field(
            "id",
            Field::string()
                .ddl("varchar(50)")
                .primary_key()
                .default_with(|| Value::from("generated-id")),
        )
        .field("content", Field::text())
        .register_shared()
        .unwrap();
    create_table(&executor, &schema).await;

    let mut comment = Record::with_values(Arc::clone(&schema), [("content", "hello")]);
    comment.save(&executor).await.unwrap();
    assert_eq!(comment.primary_key_value(), Some(&Value::from("generated-id")));

    let found = Record::find(&schema, &executor, "generated-id")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.get("content"), Some(&Value::from("hello")));
}

#[tokio::test]
async fn test_update_writes_stored_values_only() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;
    user("u1", "Before", 2.0).save(&executor).await.unwrap();

    let mut loaded = Record::find(&schema, &executor, "u1").await.unwrap().unwrap();
    loaded.set("name", "After");
    assert_eq!(loaded.update(&executor).await.unwrap(), 1);

    let found = Record::find(&schema, &executor, "u1").await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&Value::from("After")));
    assert_eq!(found.get("email"), Some(&Value::from("Before@example.com")));

    // Unset fields are written as NULL, defaults are not applied on update
    let partial = Record::with_values(Arc::clone(&schema), [("id", "u1"), ("name", "Bare")]);
    partial.update(&executor).await.unwrap();
    let found = Record::find(&schema, &executor, "u1").await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&Value::from("Bare")));
    assert_eq!(found.get("email"), Some(&Value::Null));
    assert_eq!(found.get("admin"), Some(&Value::Null));
}

#[tokio::test]
async fn test_update_missing_row_affects_nothing() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    let affected = user("ghost", "Ghost", 0.0).update(&executor).await.unwrap();
    assert_eq!(affected, 0);
}

#[tokio::test]
async fn test_remove() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    let mut record = user("u1", "Gone", 1.0);
    record.save(&executor).await.unwrap();
    assert_eq!(record.remove(&executor).await.unwrap(), 1);
    assert!(Record::find(&schema, &executor, "u1").await.unwrap().is_none());
    assert_eq!(record.remove(&executor).await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_all_where_order_and_limit() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;
    for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        user(&format!("u{}", i), name, i as f64)
            .save(&executor)
            .await
            .unwrap();
    }

    let all = Record::find_all(&schema, &executor, &FindOptions::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 5);

    let newest = Record::find_all(
        &schema,
        &executor,
        &FindOptions::new().order_by("`created_at` desc").limit(Limit::Count(2)),
    )
    .await
    .unwrap();
    let names: Vec<_> = newest.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, [&Value::from("e"), &Value::from("d")]);

    let page = Record::find_all(
        &schema,
        &executor,
        &FindOptions::new()
            .filter("`created_at` >= ?", vec![Value::Float(1.0)])
            .order_by("`created_at`")
            .limit("1,2".parse::<Limit>().unwrap()),
    )
    .await
    .unwrap();
    let names: Vec<_> = page.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, [&Value::from("c"), &Value::from("d")]);
}

#[tokio::test]
async fn test_find_all_rejects_bad_filter_arity() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    let options = FindOptions::new().filter("`name`=? and `email`=?", vec![Value::from("x")]);
    let result = Record::find_all(&schema, &executor, &options).await;
    assert!(matches!(result, Err(OrmError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_find_number() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    let count = Record::find_number(&schema, &executor, "count(`id`)", None, &[])
        .await
        .unwrap();
    assert_eq!(count, Some(Value::Int(0)));

    for i in 0..3 {
        user(&format!("u{}", i), "n", i as f64)
            .save(&executor)
            .await
            .unwrap();
    }
    let count = Record::find_number(
        &schema,
        &executor,
        "count(`id`)",
        Some("`created_at` > ?"),
        &[Value::Float(0.0)],
    )
    .await
    .unwrap();
    assert_eq!(count, Some(Value::Int(2)));
}

#[tokio::test]
async fn test_duplicate_key_on_save_is_execution_error() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;

    user("u1", "first", 0.0).save(&executor).await.unwrap();
    let err = user("u1", "second", 0.0).save(&executor).await.unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
}

#[tokio::test]
async fn test_find_all_rejects_offset_beyond_i64() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;
    user("u1", "only", 0.0).save(&executor).await.unwrap();

    let options = FindOptions::new().limit(Limit::Range(u64::MAX, 1));
    let result = Record::find_all(&schema, &executor, &options).await;
    assert!(matches!(result, Err(OrmError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_find_all_with_backslash_literal() {
    let (executor, _file) = sqlite_executor().await;
    let schema = user_schema();
    create_table(&executor, &schema).await;
    let mut record = user("u1", "win", 0.0);
    record.set("image", r"C:\");
    record.save(&executor).await.unwrap();

    let options = FindOptions::new().filter(r"`image` = 'C:\' and `id` = ?", vec![Value::from("u1")]);
    let found = Record::find_all(&schema, &executor, &options).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("image"), Some(&Value::from(r"C:\")));
}
