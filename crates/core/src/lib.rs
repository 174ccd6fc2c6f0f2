//! Streaming Chat Client Core
//!
//! This crate holds the client-side state machine of the chat application:
//! session bootstrap against a persisted identifier, the ordered message log,
//! the decoder for the backend's framed token stream, and the controller that
//! folds a streamed reply into the log. Rendering and transport relaying live
//! in the service crates.

pub mod backend;
pub mod controller;
pub mod message_log;
pub mod notice;
pub mod session_manager;
pub mod session_store;
pub mod stream_decoder;

pub use backend::{BackendError, ChatBackend, HttpChatBackend, SessionId};
pub use controller::{ChatController, ChatSnapshot};
pub use message_log::{Message, MessageLog, Role};
pub use notice::Notice;
pub use session_manager::{SessionError, SessionHandle, SessionManager};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use stream_decoder::{StreamEvent, decode_events};
