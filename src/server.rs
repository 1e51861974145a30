//! Session server
//!
//! Owns the client registry and the router, and runs the accept loop that
//! spawns one connection handler per client. Both are created once here and
//! shared by every connection; there is no global state.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::connection::handle_connection;
use crate::registry::Registry;
use crate::router::Router;

/// Shared server context
///
/// Cheap to clone; each connection task holds one.
#[derive(Debug, Clone)]
pub struct Server {
    registry: Registry,
    router: Arc<Router>,
    client_buffer: usize,
}

impl Server {
    /// Create a server running the drawing game's handlers
    pub fn new(config: &Config) -> Self {
        let registry = Registry::new();
        let router = Router::scribble(&registry);
        Self::with_router(registry, router, config.client_buffer)
    }

    /// Create a server over an existing registry and router
    ///
    /// `client_buffer` must be at least 1.
    pub fn with_router(registry: Registry, router: Router, client_buffer: usize) -> Self {
        Self {
            registry,
            router: Arc::new(router),
            client_buffer: client_buffer.max(1),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Capacity of each connection's delivery channel
    pub fn client_buffer(&self) -> usize {
        self.client_buffer
    }

    /// Accept connections until the listener fails permanently
    pub async fn run(self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!("Scribble server listening on {}", addr),
            Err(e) => error!("Listener has no local address: {}", e),
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let server = self.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, server).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
