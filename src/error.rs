//! Error types for the session server
//!
//! Defines connection-level errors plus the delivery, dispatch and handler
//! failure taxonomy. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::{ClientIdentity, HubName};

/// Application-level errors
///
/// Fatal for the connection they occur on, never for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry delivery errors
///
/// Logged by the registry and otherwise best-effort: callers may inspect
/// them but nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No client is registered under the hub
    #[error("Hub not found: {0}")]
    HubNotFound(HubName),

    /// The identity is not registered (or its channel is already closed)
    #[error("Client not found: {0}")]
    IdentityNotFound(ClientIdentity),
}

/// Envelope dispatch errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Inbound bytes were not a valid envelope
    #[error("Malformed envelope: {0}")]
    Decode(#[from] serde_json::Error),

    /// No handler listens to the envelope's topic
    #[error("No handler for topic: {0}")]
    TopicNotFound(String),
}

/// Errors raised inside a single handler invocation
///
/// Contained by the router; never aborts dispatch to other handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload did not match the topic's schema
    #[error("Invalid payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// Reply could not be serialized
    #[error("Failed to build reply: {0}")]
    Encode(#[source] serde_json::Error),

    /// Request was well-formed but not acceptable
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Per-channel enqueue errors
///
/// Occurs when a connection's delivery channel cannot take a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The channel is at capacity; the payload was dropped
    #[error("Channel full")]
    Full,

    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
