//! User-visible banner messages.

use std::fmt;

/// Text shown in place of an assistant reply whose exchange failed.
pub const EXCHANGE_ERROR_TEXT: &str = "Error calling API.";

/// A banner notice raised by the session or chat layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The persisted session was rejected and a fresh one is being used.
    StartingNewChat,
    /// No session could be created; sending is disabled until restart.
    ServiceUnavailable,
    /// One exchange failed; the session stays usable.
    ExchangeFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::StartingNewChat => "Could not load previous session. Starting a new chat.",
            Notice::ServiceUnavailable => "Chat service is unavailable. Please try again later.",
            Notice::ExchangeFailed => {
                "Chat service is temporarily unavailable. Please try again later."
            }
        }
    }

    /// Whether the page can keep working after this notice.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Notice::ServiceUnavailable)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
