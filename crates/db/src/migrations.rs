use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Highest applied migration version, read from the `_sqlx_migrations`
/// bookkeeping table. Only meaningful after [`run_pending`].
pub async fn schema_version(pool: &DbPool) -> Result<Option<i64>, MigrateError> {
    let version =
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM _sqlx_migrations")
            .fetch_one(pool)
            .await?;
    Ok(version)
}
