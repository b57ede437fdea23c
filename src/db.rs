use std::time::Duration;

use migration::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;

use crate::error::AppResult;

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url);
    opts.sqlx_logging(false).acquire_timeout(Duration::from_secs(10));

    // Every pooled connection to `:memory:` would get its own empty database.
    if database_url.contains(":memory:") {
        opts.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opts).await?;

    let pragmas = [
        "PRAGMA foreign_keys=ON",
        "PRAGMA journal_mode=WAL",
        "PRAGMA synchronous=NORMAL",
    ];
    for pragma in pragmas {
        db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string())).await?;
    }

    Migrator::up(&db, None).await?;
    tracing::debug!("database migrated");

    Ok(db)
}

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
pub async fn test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:").await.expect("in-memory database")
}
