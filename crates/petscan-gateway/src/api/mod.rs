//! API module for the gateway

pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::GatewayConfig;
use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// CORS policy for the configured browser origins
pub fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        // Auth endpoints
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/verify", get(handlers::verify))
        // Analysis endpoints
        .route("/api/pets/analyze", post(handlers::analyze_image))
        // Middleware: route policy runs inside the auth gate
        .layer(from_fn(middleware::require_identity))
        .layer(from_fn_with_state(state.clone(), middleware::auth_gate))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
