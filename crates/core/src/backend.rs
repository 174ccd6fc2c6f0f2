//! Chat Backend Contract
//!
//! This module defines the HTTP contract the client consumes (session
//! creation, history lookup, streamed chat and echo) behind the
//! [`ChatBackend`] trait, plus the `reqwest` implementation used at runtime.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{fmt, pin::Pin, str::FromStr, time::Duration};
use tracing::{debug, instrument};

use crate::message_log::Role;

/// Errors raised while talking to the chat backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Backend returned HTTP {0}")]
    Status(u16),
    #[error("Malformed response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Body(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Identifier of a backend chat session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SessionId)
    }
}

/// One stored turn as returned by `GET /sessions/{id}/messages`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HistoryMessage {
    pub id: i64,
    pub role: Role,
    pub content: String,
}

#[derive(Deserialize, Debug)]
struct CreatedSession {
    id: SessionId,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    session_id: SessionId,
    message: &'a str,
}

#[derive(Serialize, Debug)]
struct EchoRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize, Debug)]
struct EchoReply {
    #[serde(alias = "you sent")]
    you_sent: String,
}

/// Raw response body of a streamed chat call, delivered in arbitrary chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// The backend operations the chat client depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetches the stored history of a session. Any non-success status means
    /// the session is unknown.
    async fn fetch_history(&self, id: SessionId) -> Result<Vec<HistoryMessage>, BackendError>;

    /// Creates a fresh, empty session.
    async fn create_session(&self) -> Result<SessionId, BackendError>;

    /// Sends a user message and opens the streamed response body.
    async fn open_chat(&self, id: SessionId, message: &str) -> Result<ByteStream, BackendError>;

    /// Non-streaming round trip used by the echo exchange.
    async fn echo(&self, message: &str) -> Result<String, BackendError>;
}

/// [`ChatBackend`] over HTTP.
pub struct HttpChatBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpChatBackend {
    /// Creates a client for the backend rooted at `base_url`
    /// (for example `http://127.0.0.1:8000`).
    ///
    /// No overall request timeout is set: a streamed response may legitimately
    /// stay open for as long as the model keeps producing tokens.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BackendError::Status(status.as_u16()))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    #[instrument(skip(self))]
    async fn fetch_history(&self, id: SessionId) -> Result<Vec<HistoryMessage>, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{id}/messages")))
            .send()
            .await?;
        let history: Vec<HistoryMessage> = ensure_success(response)?.json().await?;
        debug!(count = history.len(), "Fetched session history");
        Ok(history)
    }

    #[instrument(skip(self))]
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        let response = self
            .http
            .post(self.url("/sessions"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let created: CreatedSession = ensure_success(response)?.json().await?;
        Ok(created.id)
    }

    #[instrument(skip(self, message))]
    async fn open_chat(&self, id: SessionId, message: &str) -> Result<ByteStream, BackendError> {
        let response = self
            .http
            .post(self.url("/chat"))
            .json(&ChatRequest {
                session_id: id,
                message,
            })
            .send()
            .await?;
        let response = ensure_success(response)?;
        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(BackendError::from)),
        ))
    }

    #[instrument(skip(self, message))]
    async fn echo(&self, message: &str) -> Result<String, BackendError> {
        let response = self
            .http
            .post(self.url("/echo"))
            .json(&EchoRequest { message })
            .send()
            .await?;
        let reply: EchoReply = ensure_success(response)?.json().await?;
        Ok(reply.you_sent)
    }
}
