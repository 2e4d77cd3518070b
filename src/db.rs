use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::Config;

const TICKET_QUEUE_SCHEMA: &str = include_str!("../migrations/0001_ticket_queue.sql");

pub async fn connect_pg(cfg: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .connect(&cfg.database_url)
        .await?;
    Ok(pool)
}

/// Applies the queue tables. Every statement is idempotent.
pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql(TICKET_QUEUE_SCHEMA).execute(pool).await?;
    tracing::info!("ticket queue schema ready");
    Ok(())
}
