//! Squeeze HTTP API server (Axum).
//!
//! Multipart PDF upload in, compressed (or original) PDF out, plus
//! health/status routes.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use sq_core::SqueezeConfig;
use sq_engine::Compressor;
use sq_policy::PolicyConfig;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router from configuration, with the default
/// strategies and local working storage.
pub fn app(config: &SqueezeConfig, policy: PolicyConfig) -> Router {
    app_with_state(AppState::new(Compressor::from_config(config, policy)))
}

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::compress_routes(state.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
