//! Terminal rendering of chat snapshots.
//!
//! The controller publishes whole snapshots; the printer diffs each one
//! against what it already wrote and returns only the new output, so a
//! streaming reply appears token by token on a single line.

use streamchat_core::{ChatSnapshot, Message, Notice, Role};

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    written: Vec<Message>,
    line_open: bool,
    notice: Option<Notice>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text to write so the terminal reflects `snapshot`.
    pub fn render(&mut self, snapshot: &ChatSnapshot) -> String {
        let mut out = String::new();

        for (index, message) in snapshot.messages.iter().enumerate() {
            match self.written.get(index) {
                Some(previous) if previous.text == message.text => {}
                Some(previous) => {
                    if let Some(suffix) = message.text.strip_prefix(previous.text.as_str()) {
                        out.push_str(suffix);
                    } else {
                        // The text was replaced rather than extended.
                        self.close_line(&mut out);
                        out.push_str(&format!("{}: {}", label(message.role), message.text));
                        self.line_open = true;
                    }
                    self.written[index] = message.clone();
                }
                None => {
                    self.close_line(&mut out);
                    out.push_str(&format!("{}: {}", label(message.role), message.text));
                    self.line_open = true;
                    self.written.push(message.clone());
                }
            }
        }

        let last_is_streaming = snapshot.loading
            && snapshot
                .messages
                .last()
                .is_some_and(|m| m.role == Role::Assistant);
        if !last_is_streaming {
            self.close_line(&mut out);
        }

        if snapshot.notice != self.notice {
            if let Some(notice) = snapshot.notice {
                self.close_line(&mut out);
                out.push_str(&format!("! {}\n", notice));
            }
            self.notice = snapshot.notice;
        }

        out
    }

    fn close_line(&mut self, out: &mut String) {
        if self.line_open {
            out.push('\n');
            self.line_open = false;
        }
    }
}
