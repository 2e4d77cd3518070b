mod auth;
mod clock;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod queue;
mod routes;

use std::sync::Arc;

use crate::{
    clock::SystemClock,
    config::Config,
    models::AppState,
    queue::{dispatcher::QueueDispatcher, pg_store::PgTicketStore},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg).await?;
    db::ensure_schema(&pool).await?;

    let queue = QueueDispatcher::new(
        Arc::new(PgTicketStore::new(pool.clone())),
        Arc::new(SystemClock),
        cfg.timezone,
        cfg.queue_retry_limit,
    );

    let state = AppState { db: pool, queue };

    // Waiting-room displays and staff terminals are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(timezone = %cfg.timezone, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
