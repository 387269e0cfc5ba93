//! Sedbot - interactive terminal entry point.

use anyhow::{Context, Result};
use sedbot::cli::{parse_line, CliClient};
use sedbot::SedHandler;
use sedbot_common::config::Config;
use sedbot_common::logging::init_logging;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Sedbot v{}", env!("CARGO_PKG_VERSION"));

    let client = Arc::new(CliClient::new());
    let handler = SedHandler::from_config(client.clone(), &config.sed);

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }
        let Some(input) = parse_line(&line) else {
            continue;
        };

        let message = client.ingest(input).await;
        println!("[{}] {}: {}", message.id, message.sender, message.body);

        let outcome = handler.handle(&message).await;
        tracing::debug!(?outcome, "Handled message");
    }

    tracing::info!("Sedbot shutting down");
    Ok(())
}
