//! Writes the relay's OpenAPI document to disk.
//!
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use anyhow::Context;
use streamchat_relay::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let doc = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    std::fs::write(&path, doc).with_context(|| format!("Failed to write {path}"))?;

    println!("OpenAPI document written to {path}");
    Ok(())
}
