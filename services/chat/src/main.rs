//! Terminal chat client.
//!
//! Resumes (or creates) a chat session, prints its history, then sends each
//! line read from stdin and prints the reply as it streams in.

mod config;
mod render;

use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use streamchat_core::{
    ChatBackend, ChatController, ChatSnapshot, FileSessionStore, HttpChatBackend, SessionManager,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::watch,
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{config::Config, render::TranscriptPrinter};

#[derive(Parser, Debug)]
#[command(version, about = "Chat with a streaming chat backend from the terminal")]
struct Cli {
    /// Base URL of the chat backend (overrides BACKEND_URL).
    #[arg(long)]
    backend_url: Option<String>,

    /// File holding the persisted session id (overrides SESSION_FILE).
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Use the echo endpoint instead of streaming chat.
    #[arg(long)]
    echo: bool,
}

/// Writes every published snapshot to stdout until the controller goes away.
fn spawn_printer(mut updates: watch::Receiver<ChatSnapshot>) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let mut printer = TranscriptPrinter::new();
        let mut stdout = tokio::io::stdout();
        loop {
            let output = {
                let snapshot = updates.borrow_and_update();
                printer.render(&snapshot)
            };
            if !output.is_empty() {
                stdout.write_all(output.as_bytes()).await?;
                stdout.flush().await?;
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env()
        .and_then(|c| c.with_overrides(cli.backend_url, cli.session_file))
        .context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(backend = %config.backend_url, session_file = ?config.session_file, "Starting chat client");

    // --- 3. Wire the session layer ---
    let backend: Arc<dyn ChatBackend> = Arc::new(
        HttpChatBackend::new(config.backend_url.clone()).context("Failed to build HTTP client")?,
    );
    let store = Arc::new(FileSessionStore::new(config.session_file.clone()));
    let manager = SessionManager::new(backend.clone(), store);
    let mut controller = ChatController::new(backend);
    let printer = spawn_printer(controller.subscribe());

    // --- 4. Obtain a session ---
    if !cli.echo {
        controller.bootstrap(&manager).await;
        if controller.notice().is_some_and(|n| !n.is_recoverable()) {
            drop(controller);
            printer.await??;
            anyhow::bail!("No chat session could be established");
        }
    }

    // --- 5. Read input until EOF ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if cli.echo {
            controller.send_echo(&line).await;
        } else {
            controller.send(&line).await;
        }
    }

    debug!("Input closed");
    drop(controller);
    printer.await??;
    Ok(())
}
