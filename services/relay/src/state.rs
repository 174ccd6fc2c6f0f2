//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared HTTP
//! client and configuration handed to every handler.

use crate::config::Config;
use std::{sync::Arc, time::Duration};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state with a client suited to long-lived streamed bodies:
    /// connecting is bounded, the response itself is not.
    pub fn new(config: Config) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Absolute backend URL for `path`.
    pub fn backend_url(&self, path: &str) -> String {
        format!("{}{}", self.config.backend_url, path)
    }
}
