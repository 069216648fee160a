use anyhow::{Context, Result};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

use crate::config::SqlConfig;

pub mod location_db;

/// Connect to the database described by `sql`.
pub async fn connect(sql: &SqlConfig) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&sql.url())
        .await
        .with_context(|| format!(
            "Cannot connect to MySQL (host={}:{} db={} user={})",
            sql.ip, sql.port, sql.db, sql.id
        ))?;
    tracing::info!("[db] Connected to MariaDB");
    Ok(pool)
}

/// Apply the bundled migrations (creates the location table).
pub async fn migrate(pool: &MySqlPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Cannot apply database migrations")?;
    Ok(())
}
