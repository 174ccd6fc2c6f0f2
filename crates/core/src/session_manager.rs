//! Session Bootstrap
//!
//! Obtains a usable session identifier at startup: the persisted one if the
//! backend still knows it, otherwise a freshly created one. There is no
//! retry; every failure path ends the attempt.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    backend::{BackendError, ChatBackend, SessionId},
    message_log::{MessageLog, Role},
    notice::Notice,
    session_store::SessionStore,
};

/// A usable session together with the history it was resumed with.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Stored turns as `(role, text)`, oldest first. Empty for new sessions.
    pub history: Vec<(Role, String)>,
}

impl SessionHandle {
    /// Builds the message log for this session, numbering turns from 1.
    pub fn message_log(&self) -> MessageLog {
        MessageLog::from_history(self.history.iter().cloned())
    }
}

/// Result of a successful bootstrap.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub handle: SessionHandle,
    /// Set when the persisted session had to be replaced.
    pub notice: Option<Notice>,
}

/// The backend could not provide a session at all.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not create a chat session: {0}")]
    Unavailable(#[source] BackendError),
}

/// Why a persisted session could not be resumed.
#[derive(Debug, thiserror::Error)]
enum ResumeError {
    #[error("invalid session id: {0}")]
    InvalidId(#[from] std::num::ParseIntError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    pub fn notice(&self) -> Notice {
        Notice::ServiceUnavailable
    }
}

pub struct SessionManager {
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn ChatBackend>, store: Arc<dyn SessionStore>) -> Self {
        Self { backend, store }
    }

    /// Resumes the persisted session or creates a new one.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self) -> Result<Bootstrap, SessionError> {
        let mut notice = None;

        if let Some(stored) = self.store.get() {
            match self.resume(&stored).await {
                Ok(handle) => {
                    info!(session_id = %handle.id, turns = handle.history.len(), "Resumed session");
                    return Ok(Bootstrap { handle, notice });
                }
                Err(reason) => {
                    error!(stored = %stored, %reason, "Could not load previous session");
                    self.store.clear();
                    notice = Some(Notice::StartingNewChat);
                }
            }
        }

        let id = self.backend.create_session().await.map_err(|e| {
            error!(error = %e, "Failed to create session");
            SessionError::Unavailable(e)
        })?;
        self.store.set(&id.to_string());
        info!(session_id = %id, "Created new session");

        Ok(Bootstrap {
            handle: SessionHandle {
                id,
                history: Vec::new(),
            },
            notice,
        })
    }

    async fn resume(&self, stored: &str) -> Result<SessionHandle, ResumeError> {
        let id = stored.parse::<SessionId>().inspect_err(|_| {
            warn!(stored = %stored, "Persisted session id is not a number");
        })?;
        let history = self.backend.fetch_history(id).await?;

        Ok(SessionHandle {
            id,
            history: history.into_iter().map(|m| (m.role, m.content)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{HistoryMessage, MockChatBackend},
        session_store::MemorySessionStore,
    };

    fn manager(backend: MockChatBackend, store: Arc<MemorySessionStore>) -> SessionManager {
        SessionManager::new(Arc::new(backend), store)
    }

    #[tokio::test]
    async fn test_resumes_persisted_session_with_history() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_fetch_history()
            .withf(|id| *id == SessionId(5))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    HistoryMessage {
                        id: 40,
                        role: Role::User,
                        content: "hi".into(),
                    },
                    HistoryMessage {
                        id: 41,
                        role: Role::Assistant,
                        content: "hello".into(),
                    },
                ])
            });
        backend.expect_create_session().never();
        let store = Arc::new(MemorySessionStore::with_value("5"));

        let bootstrap = manager(backend, store.clone()).ensure_session().await.unwrap();

        assert_eq!(bootstrap.handle.id, SessionId(5));
        assert!(bootstrap.notice.is_none());
        let log = bootstrap.handle.message_log();
        let ids: Vec<u64> = log.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(log.messages()[1].text, "hello");
        assert_eq!(store.get(), Some("5".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_session_is_cleared_and_replaced() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_fetch_history()
            .times(1)
            .returning(|_| Err(BackendError::Status(404)));
        backend
            .expect_create_session()
            .times(1)
            .returning(|| Ok(SessionId(9)));
        let store = Arc::new(MemorySessionStore::with_value("5"));

        let bootstrap = manager(backend, store.clone()).ensure_session().await.unwrap();

        assert_eq!(bootstrap.handle.id, SessionId(9));
        assert!(bootstrap.handle.history.is_empty());
        assert_eq!(bootstrap.notice, Some(Notice::StartingNewChat));
        assert_eq!(store.get(), Some("9".to_string()));
    }

    #[tokio::test]
    async fn test_unparsable_persisted_id_is_treated_as_stale() {
        let mut backend = MockChatBackend::new();
        backend.expect_fetch_history().never();
        backend
            .expect_create_session()
            .times(1)
            .returning(|| Ok(SessionId(1)));
        let store = Arc::new(MemorySessionStore::with_value("not-a-number"));

        let bootstrap = manager(backend, store.clone()).ensure_session().await.unwrap();

        assert_eq!(bootstrap.notice, Some(Notice::StartingNewChat));
        assert_eq!(store.get(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_resume_reports_typed_reasons() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_fetch_history()
            .times(1)
            .returning(|_| Err(BackendError::Status(404)));
        let manager = manager(backend, Arc::new(MemorySessionStore::new()));

        let err = manager.resume("abc").await.unwrap_err();
        assert!(matches!(err, ResumeError::InvalidId(_)));
        assert!(err.to_string().starts_with("invalid session id"));

        let err = manager.resume("7").await.unwrap_err();
        assert!(matches!(err, ResumeError::Backend(BackendError::Status(404))));
    }

    #[tokio::test]
    async fn test_creates_session_when_nothing_persisted() {
        let mut backend = MockChatBackend::new();
        backend.expect_fetch_history().never();
        backend
            .expect_create_session()
            .times(1)
            .returning(|| Ok(SessionId(3)));
        let store = Arc::new(MemorySessionStore::new());

        let bootstrap = manager(backend, store.clone()).ensure_session().await.unwrap();

        assert_eq!(bootstrap.handle.id, SessionId(3));
        assert!(bootstrap.notice.is_none());
        assert_eq!(store.get(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_creation_failure_is_unavailable() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_fetch_history()
            .returning(|_| Err(BackendError::Transport("connection refused".into())));
        backend
            .expect_create_session()
            .times(1)
            .returning(|| Err(BackendError::Status(500)));
        let store = Arc::new(MemorySessionStore::with_value("5"));

        let err = manager(backend, store.clone())
            .ensure_session()
            .await
            .unwrap_err();

        assert_eq!(err.notice(), Notice::ServiceUnavailable);
        assert!(matches!(err, SessionError::Unavailable(BackendError::Status(500))));
        // The stale id was still discarded before creation was attempted.
        assert_eq!(store.get(), None);
    }
}
