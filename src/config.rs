//! Server configuration
//!
//! Every option can be given as a flag or through its environment variable.

use clap::Parser;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default capacity of each connection's outbound channel
pub const DEFAULT_CLIENT_BUFFER: usize = 256;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "scribble_server=info";

/// Scribble session server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "scribble_server", version, about = "Multiplayer drawing-game session server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "SCRIBBLE_BIND", default_value = DEFAULT_ADDR)]
    pub bind: String,

    /// Outbound messages buffered per client before new ones are dropped
    #[arg(
        long,
        env = "SCRIBBLE_CLIENT_BUFFER",
        default_value_t = DEFAULT_CLIENT_BUFFER,
        value_parser = parse_client_buffer
    )]
    pub client_buffer: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "SCRIBBLE_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_ADDR.to_string(),
            client_buffer: DEFAULT_CLIENT_BUFFER,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parse_client_buffer(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("client buffer must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}
