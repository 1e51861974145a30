//! Scribble Session Server - Entry Point
//!
//! Parses configuration, starts the TCP listener and serves connections.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scribble_server::{Config, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Initialize logging with environment filter
    // RUST_LOG takes precedence over --log-filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    // Start TCP listener
    let listener = TcpListener::bind(&config.bind).await?;
    info!(
        "Client buffer: {} messages per connection",
        config.client_buffer
    );

    Server::new(&config).run(listener).await;

    Ok(())
}
