//! Persisted Session Identifier
//!
//! A single string-valued slot that survives restarts. Absence means no
//! session has been created yet for this profile.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::warn;

/// Durable get/set/clear capability for one session identifier.
///
/// Storage failures are not fatal for the caller: a store that cannot read
/// behaves as if nothing were persisted, and failed writes are logged.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, id: &str);
    fn clear(&self);
}

/// Process-local store, used by tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    value: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(id: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(id.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<String> {
        self.value.lock().ok().and_then(|v| v.clone())
    }

    fn set(&self, id: &str) {
        if let Ok(mut value) = self.value.lock() {
            *value = Some(id.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut value) = self.value.lock() {
            *value = None;
        }
    }
}

/// Keeps the identifier in a small text file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = content.trim();
                (!id.is_empty()).then(|| id.to_string())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                None
            }
        }
    }

    fn set(&self, id: &str) {
        if let Err(e) = fs::write(&self.path, id) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session id");
        }
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove session file")
            }
        }
    }
}
