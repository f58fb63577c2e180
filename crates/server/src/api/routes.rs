use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{handlers, research, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Research sessions
        .route("/research", post(research::create_research))
        .route("/research", get(research::list_research))
        .route("/research/{id}", get(research::get_research))
        .route("/research/{id}", delete(research::delete_research))
        .route("/research/{id}/results", get(research::get_results))
        .route("/research/{id}/cancel", post(research::cancel_research))
        // Live progress
        .route("/research/{id}/events", get(ws::research_events))
        .with_state(Arc::clone(&state));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
