/// Embedded schema migrations
///
/// Migration files live in `migrations/` at the workspace root as paired
/// `{timestamp}_{name}.sql` / `{timestamp}_{name}.down.sql` files and are
/// compiled into the binary with `sqlx::migrate!`, so a deployment never
/// depends on the directory being present at runtime.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// What the `_sqlx_migrations` bookkeeping table currently records
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Successfully applied migrations
    pub applied_migrations: usize,

    /// Latest applied version (timestamp), if any
    pub latest_version: Option<i64>,

    /// Whether at least one migration has landed
    pub is_up_to_date: bool,
}

/// Applies all pending migrations.
///
/// Each migration runs in its own transaction where PostgreSQL allows it; a
/// failure rolls that migration back and is returned.
///
/// # Errors
///
/// Returns an error if a migration fails or the connection is lost
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Applying schema migrations");

    if let Err(e) = sqlx::migrate!("../migrations").run(pool).await {
        warn!("Migration failed: {}", e);
        return Err(e);
    }

    info!("Schema is current");
    Ok(())
}

/// Reads the migration bookkeeping table.
///
/// # Errors
///
/// Returns an error if the bookkeeping table cannot be queried
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("No migrations have run yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: false,
        });
    }

    let (applied, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version)
         FROM _sqlx_migrations
         WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus {
        applied_migrations: applied as usize,
        latest_version,
        is_up_to_date: applied > 0,
    })
}

/// Creates the database if it doesn't exist yet.
///
/// Development and test convenience; production databases are provisioned
/// ahead of time.
///
/// # Errors
///
/// Returns an error if the server is unreachable or creation is not permitted
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
    } else {
        info!("Creating database");
        Postgres::create_database(database_url).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_status_clone() {
        let status = MigrationStatus {
            applied_migrations: 1,
            latest_version: Some(20250610000001),
            is_up_to_date: true,
        };

        let cloned = status.clone();
        assert_eq!(status.applied_migrations, cloned.applied_migrations);
        assert_eq!(status.latest_version, cloned.latest_version);
        assert_eq!(status.is_up_to_date, cloned.is_up_to_date);
    }

    // Tests that touch a real database live in tests/db_migrations_tests.rs.
}
