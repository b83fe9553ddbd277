//! HTTP route handlers.

pub mod entity;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with all routes and layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(entity::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
