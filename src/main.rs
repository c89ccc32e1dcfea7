// src/main.rs
//! Terminal client for the document/media ingestion and search service:
//! - list indexed documents
//! - upload documents and videos
//! - follow asynchronous video processing until it finishes or fails
//! - ask questions against the index
//!
//! Run: `cargo run`
//! (Service URL defaults to http://localhost:5000; override with DOCSEARCH_API_URL.)

mod client;
mod config;
mod progress;
mod terminal;
mod upload;
mod views;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::from_env().context("invalid configuration")?;
    terminal::terminal(config).await
}

/// Logs go to stderr and default to `warn` so they stay out of the prompts.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
