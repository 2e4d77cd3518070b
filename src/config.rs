use std::env;

use anyhow::Context;
use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Business timezone used for "today" and every day boundary.
    pub timezone: Tz,
    pub queue_retry_limit: u32,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let tz_name = env::var("CLINIC_TIMEZONE").unwrap_or_else(|_| "Asia/Bangkok".to_string());
        let timezone = parse_timezone(&tz_name)?;

        let queue_retry_limit = env::var("QUEUE_RETRY_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3)
            .max(1);
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let db_acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(5);

        Ok(Self {
            database_url,
            bind_addr,
            timezone,
            queue_retry_limit,
            db_max_connections,
            db_acquire_timeout_secs,
        })
    }
}

fn parse_timezone(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("invalid CLINIC_TIMEZONE {name:?}: {e}"))
}
