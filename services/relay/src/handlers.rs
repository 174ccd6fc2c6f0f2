//! Axum Handlers for the Relay API
//!
//! Each relay handler forwards the browser's request body verbatim to the
//! chat backend and hands the backend's status, content type and body stream
//! back without buffering. Only transport failures are answered locally.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
};
use futures_util::TryStreamExt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    models::{ChatPayload, EchoPayload, ErrorResponse, HealthResponse},
    state::AppState,
};

pub enum ApiError {
    /// The backend could not be reached at all.
    BackendUnavailable(reqwest::Error),
    /// The backend was reached but the exchange broke down.
    BadGateway(reqwest::Error),
    InternalServerError(anyhow::Error),
}

impl ApiError {
    /// Classifies a failure of the upstream request.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ApiError::BackendUnavailable(err)
        } else {
            ApiError::BadGateway(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BackendUnavailable(err) => {
                warn!(error = %err, "Chat backend unreachable");
                let error = "Chat backend is unavailable.".to_string();
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse { error })).into_response()
            }
            ApiError::BadGateway(err) => {
                warn!(error = %err, "Chat backend request failed");
                let error = format!("Failed to reach chat backend: {}", err);
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { error })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let error = "An internal server error occurred.".to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error })).into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// POSTs `body` to `path` on the backend and streams the answer back.
async fn forward(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut request = state.http.post(state.backend_url(path)).body(body);
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        request = request.header(CONTENT_TYPE, content_type.clone());
    }

    let upstream = request.send().await.map_err(ApiError::from_transport)?;
    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    info!(%status, path, "Relaying backend response");

    let stream = upstream
        .bytes_stream()
        .inspect_err(|e| warn!(error = %e, "Backend stream broke off"));

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(CONTENT_TYPE, content_type);
    }
    Ok(response.body(Body::from_stream(stream))?)
}

/// Relay a chat message and its streamed reply.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "Backend token stream, relayed unmodified", content_type = "text/event-stream", body = String),
        (status = 502, description = "Backend request failed", body = ErrorResponse),
        (status = 503, description = "Backend unreachable", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn relay_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward(&state, "/chat", &headers, body).await
}

/// Relay an echo request.
#[utoipa::path(
    post,
    path = "/api/echo",
    request_body = EchoPayload,
    responses(
        (status = 200, description = "Backend echo reply, relayed unmodified"),
        (status = 502, description = "Backend request failed", body = ErrorResponse),
        (status = 503, description = "Backend unreachable", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn relay_echo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward(&state, "/echo", &headers, body).await
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Relay is running", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
