//! Chat Session Controller
//!
//! Drives one exchange at a time: records the user turn and an empty assistant
//! placeholder, opens the streamed reply, and folds decoded events into the
//! placeholder. Every failure is converted into state (placeholder text and a
//! banner notice); nothing escapes [`ChatController::send`].

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    backend::{BackendError, ChatBackend},
    message_log::{Message, MessageLog, Role, TailSlot},
    notice::{EXCHANGE_ERROR_TEXT, Notice},
    session_manager::{SessionHandle, SessionManager},
    stream_decoder::{StreamEvent, decode_events},
};

/// What a renderer needs to draw the chat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub loading: bool,
    pub notice: Option<Notice>,
}

/// Why an exchange ended without reaching the sentinel cleanly.
#[derive(Debug, thiserror::Error)]
enum ExchangeError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Stream reported an error: {0}")]
    Stream(String),
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    session: Option<SessionHandle>,
    log: MessageLog,
    loading: bool,
    notice: Option<Notice>,
    updates: watch::Sender<ChatSnapshot>,
}

impl ChatController {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (updates, _) = watch::channel(ChatSnapshot::default());
        Self {
            backend,
            session: None,
            log: MessageLog::new(),
            loading: false,
            notice: None,
            updates,
        }
    }

    /// Subscribes to state changes. The receiver always holds the latest
    /// snapshot; intermediate ones may be skipped.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.log.snapshot(),
            loading: self.loading,
            notice: self.notice,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    /// Obtains a session through `manager` and loads its history.
    ///
    /// On failure no session is attached and every later `send` is ignored.
    pub async fn bootstrap(&mut self, manager: &SessionManager) {
        match manager.ensure_session().await {
            Ok(bootstrap) => {
                self.log = bootstrap.handle.message_log();
                self.session = Some(bootstrap.handle);
                self.notice = bootstrap.notice;
            }
            Err(e) => {
                self.session = None;
                self.notice = Some(e.notice());
            }
        }
        self.publish();
    }

    /// Attaches an already obtained session, replacing the transcript.
    pub fn attach(&mut self, handle: SessionHandle) {
        self.log = handle.message_log();
        self.session = Some(handle);
        self.publish();
    }

    /// Sends `text` and streams the reply into a new assistant message.
    ///
    /// Blank input, or input without an attached session, is ignored.
    #[instrument(skip(self, text))]
    pub async fn send(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            warn!("Ignoring message sent without an active session");
            return;
        };

        let slot = self.begin_exchange(trimmed);

        let result = async {
            let body = self.backend.open_chat(session_id, trimmed).await?;
            let mut events = Box::pin(decode_events(body));
            let mut reply = String::new();

            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::Token(token) => {
                        reply.push_str(&token);
                        self.log.update_tail(slot, reply.as_str());
                        self.publish();
                    }
                    StreamEvent::Error(message) => return Err(ExchangeError::Stream(message)),
                    StreamEvent::Done => break,
                }
            }
            debug!(chars = reply.len(), "Reply stream finished");
            Ok::<_, ExchangeError>(())
        }
        .await;

        self.finish_exchange(slot, result);
    }

    /// Non-streaming variant: the backend echoes the message back in one
    /// response, which replaces the placeholder text.
    #[instrument(skip(self, text))]
    pub async fn send_echo(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let slot = self.begin_exchange(trimmed);
        let result = match self.backend.echo(trimmed).await {
            Ok(reply) => {
                self.log.update_tail(slot, reply);
                Ok(())
            }
            Err(e) => Err(ExchangeError::from(e)),
        };
        self.finish_exchange(slot, result);
    }

    fn begin_exchange(&mut self, text: &str) -> TailSlot {
        self.notice = None;
        self.log.append(Role::User, text);
        let slot = self.log.append_tail(Role::Assistant, "");
        self.loading = true;
        self.publish();
        slot
    }

    fn finish_exchange(&mut self, slot: TailSlot, result: Result<(), ExchangeError>) {
        match result {
            Ok(()) => info!("Exchange completed"),
            Err(e) => {
                error!(error = %e, "Exchange failed");
                self.log.update_tail(slot, EXCHANGE_ERROR_TEXT);
                self.notice = Some(Notice::ExchangeFailed);
            }
        }
        self.loading = false;
        self.publish();
    }
}
