//! Multiplayer Drawing-Game Session Server Library
//!
//! Clients connect over WebSocket, join a hub named by the request path, and
//! exchange `{"api": ..., "payload": ...}` envelopes that handlers answer by
//! unicast, hub broadcast, or hub broadcast excluding the sender.
//!
//! # Architecture
//! - [`Registry`] maps hub → client → delivery channel behind one
//!   reader/writer lock; sends never block on a slow client.
//! - [`Router`] decodes envelopes and runs every handler subscribed to the
//!   topic, isolating handler failures from each other.
//! - [`game::ActionNotifier`] lets the game master announce game events to
//!   other handlers outside topic routing.
//! - Each connection runs a read task (socket → router) and a write task
//!   (delivery channel → socket).
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use scribble_server::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.bind).await.unwrap();
//!     Server::new(&config).run(listener).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, DeliveryChannel};
pub use config::Config;
pub use connection::handle_connection;
pub use error::{AppError, DeliveryError, DispatchError, HandlerError, SendError};
pub use game::{Action, ActionEvent, ActionListener, ActionNotifier, GameHandler};
pub use message::Envelope;
pub use registry::Registry;
pub use router::Router;
pub use server::Server;
pub use types::{ClientId, ClientIdentity, HubName};
