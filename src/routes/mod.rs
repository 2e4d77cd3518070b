use crate::models::AppState;
use axum::Router;

pub mod ticket_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", ticket_routes::router())
        .with_state(state)
}
