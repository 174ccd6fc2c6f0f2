//! Chat Relay Library Crate
//!
//! This library contains the same-origin relay that sits between the browser
//! and the chat backend: configuration, shared state, the forwarding handlers
//! and routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
