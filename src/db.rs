use anyhow::Result;
use sea_orm::{DatabaseConnection, SqlxPostgresConnector};
use sea_orm_migration::MigratorTrait;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::migration::Migrator;

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Create the shared sqlx pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Wrap an existing pool in a SeaORM connection so both layers share connections.
pub fn create_orm_conn(pool: &DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone())
}

/// Apply every pending migration. Already-applied versions are skipped, so
/// calling this on each boot is safe.
pub async fn run_migrations(conn: &OrmConn) -> Result<()> {
    let pending = Migrator::get_pending_migrations(conn).await?;
    if pending.is_empty() {
        tracing::debug!("schema up to date");
    } else {
        tracing::info!(count = pending.len(), "applying migrations");
    }
    Migrator::up(conn, None).await?;
    Ok(())
}
