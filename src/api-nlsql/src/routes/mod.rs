use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use core_nlsql::{QueryRunner, SharedPipeline};
use tower_http::trace::TraceLayer;

pub mod ask;
pub mod health;
pub mod logging_middleware;

/// Shared by every handler. Both halves are stateless per request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SharedPipeline>,
    pub runner: Arc<dyn QueryRunner>,
}

impl AppState {
    pub fn new(pipeline: SharedPipeline, runner: Arc<dyn QueryRunner>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            runner,
        }
    }
}

//
// Router
//

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/sql", post(ask::post_sql))
        .route("/api/query", post(ask::post_query))
        // Custom route access logging
        .layer(middleware::from_fn(logging_middleware::log_route_access))
        // Tracing middleware
        .layer(TraceLayer::new_for_http())
}
