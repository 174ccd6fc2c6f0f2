//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the relay, including the
//! forwarding endpoints, the health probe and the OpenAPI documentation.

use crate::{
    config::AllowedOrigins,
    handlers,
    models::{ChatPayload, EchoPayload, ErrorResponse, HealthResponse},
    state::AppState,
};

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::relay_chat, handlers::relay_echo, handlers::health),
    components(schemas(ChatPayload, EchoPayload, ErrorResponse, HealthResponse)),
    tags(
        (name = "Chat relay", description = "Same-origin relay in front of the chat backend")
    )
)]
pub struct ApiDoc;

/// Builds the CORS layer for the configured origins.
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "Skipping invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(values)
        }
    }
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);

    let api_router = Router::new()
        .route("/api/chat", post(handlers::relay_chat))
        .route("/api/echo", post(handlers::relay_echo))
        .route("/health", get(handlers::health))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(cors)
}
