//! Embedded schema migrations
//!
//! SQL files in `trendit-shared/migrations/` are compiled into the binary, so the API
//! and the worker always carry the schema they were built against.

use serde::Serialize;
use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{info, warn};

/// All migrations known to this build
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applied vs. known migrations
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub known_migrations: usize,
    pub latest_version: Option<i64>,
    pub is_up_to_date: bool,
}

/// Applies pending migrations
///
/// # Errors
///
/// Returns an error if a migration fails or an applied migration was modified
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(known = MIGRATOR.iter().count(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })
}

/// Compares applied migrations against the ones embedded in this build
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let known_migrations = MIGRATOR.iter().count();

    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(MigrationStatus {
            applied_migrations: 0,
            known_migrations,
            latest_version: None,
            is_up_to_date: known_migrations == 0,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let applied_migrations = count as usize;
    Ok(MigrationStatus {
        applied_migrations,
        known_migrations,
        latest_version,
        is_up_to_date: applied_migrations >= known_migrations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_schema_is_embedded() {
        let first = MIGRATOR.iter().next().expect("at least one migration");
        assert_eq!(first.version, 20250301000001);
        assert!(first.sql.contains("CREATE TABLE wallets"));
        assert!(first.sql.contains("UNIQUE (reference, transaction_type)"));
    }

    #[test]
    fn test_migrations_are_ordered() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert!(versions.len() >= 2);
        assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
