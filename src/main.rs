//! record-orm - command-line entry point.
//!
//! Runs CRUD operations for the blog `User` record against a configured
//! MySQL or SQLite database and prints the results as JSON.

use chrono::Utc;
use clap::Parser;
use record_orm::config::{Command, Config};
use record_orm::{
    ConnectionManager, Field, FindOptions, Limit, OrmError, OrmResult, QueryExecutor, Record,
    TableSchema, Value,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

/// Time-ordered id: 15 digits of epoch millis, a random hex suffix, then `000`.
fn next_id() -> Value {
    Value::Text(format!(
        "{:015}{}000",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    ))
}

fn now() -> Value {
    Value::Float(Utc::now().timestamp_micros() as f64 / 1_000_000.0)
}

fn user_schema() -> OrmResult<Arc<TableSchema>> {
    Ok(TableSchema::builder("User")
        .table("users")
        .field(
            "id",
            Field::string()
                .ddl("varchar(50)")
                .primary_key()
                .default_with(next_id),
        )
        .field("email", Field::string().ddl("varchar(50)"))
        .field("passwd", Field::string().ddl("varchar(50)"))
        .field("admin", Field::boolean())
        .field("name", Field::string().ddl("varchar(50)"))
        .field("image", Field::string().ddl("varchar(500)"))
        .field("created_at", Field::float().default_with(now))
        .register_shared()?)
}

async fn run(
    command: &Command,
    schema: &Arc<TableSchema>,
    executor: &QueryExecutor,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let output = match command {
        Command::InitSchema => {
            executor
                .execute(&schema.create_table_sql(), &[], true)
                .await?;
            serde_json::json!({ "table": schema.table_name(), "created": true })
        }
        Command::CreateUser {
            name,
            email,
            passwd,
            image,
            admin,
        } => {
            let mut user = Record::with_values(
                Arc::clone(schema),
                [
                    ("name", Value::from(name.as_str())),
                    ("email", Value::from(email.as_str())),
                    ("passwd", Value::from(passwd.as_str())),
                    ("image", Value::from(image.as_str())),
                    ("admin", Value::Bool(*admin)),
                ],
            );
            user.save(executor).await?;
            serde_json::to_value(&user)?
        }
        Command::ListUsers {
            limit,
            where_clause,
        } => {
            let mut options = FindOptions::new().order_by("`created_at` desc");
            if let Some(clause) = where_clause {
                options = options.filter(clause.as_str(), Vec::new());
            }
            if let Some(limit) = limit {
                options = options.limit(limit.parse::<Limit>()?);
            }
            let users = Record::find_all(schema, executor, &options).await?;
            serde_json::to_value(&users)?
        }
        Command::CountUsers => {
            let count = Record::find_number(schema, executor, "count(`id`)", None, &[]).await?;
            serde_json::json!({ "count": count.as_ref().and_then(Value::as_i64).unwrap_or(0) })
        }
        Command::DeleteUser { id } => match Record::find(schema, executor, id.as_str()).await? {
            Some(user) => {
                let affected = user.remove(executor).await?;
                serde_json::json!({ "id": id, "deleted": affected == 1 })
            }
            None => serde_json::json!({ "id": id, "deleted": false }),
        },
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting record-orm v{}", env!("CARGO_PKG_VERSION"));

    let pool_config = config.pool_config()?;
    let manager = ConnectionManager::connect(&pool_config).await?;
    let executor = QueryExecutor::new(manager.clone());
    let schema = user_schema()?;

    let result = run(&config.command, &schema, &executor).await;
    manager.close().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            if let Some(suggestion) = e.downcast_ref::<OrmError>().and_then(OrmError::suggestion) {
                eprintln!("Suggestion: {}", suggestion);
            }
            Err(e)
        }
    }
}
