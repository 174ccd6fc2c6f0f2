//! API Models
//!
//! Shapes used in relay responses and in the generated OpenAPI document.
//! Request bodies are forwarded verbatim and never deserialized by the relay;
//! their types exist for documentation only.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /api/chat`, as understood by the backend.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ChatPayload {
    #[schema(example = 1)]
    pub session_id: i64,
    #[schema(example = "Explain ownership in Rust")]
    pub message: String,
}

/// Body of `POST /api/echo`, as understood by the backend.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct EchoPayload {
    #[schema(example = "ping")]
    pub message: String,
}

/// Synthesized when the backend cannot be reached.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}
