//! Registered client entry
//!
//! Holds the registry's usage reference to one connection's delivery
//! channel, along with its overflow counter.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::ClientId;

/// Outbound per-connection queue, owned by the transport
pub type DeliveryChannel = mpsc::Sender<Bytes>;

/// A client as seen by the registry
///
/// The registry only ever enqueues through `sender`; it never closes or
/// drains the channel.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Server → Client payload channel
    sender: DeliveryChannel,
    /// Payloads dropped because the channel was full
    dropped: AtomicU64,
}

impl Client {
    /// Create a new client entry with the given ID and sender channel
    pub fn new(id: ClientId, sender: DeliveryChannel) -> Self {
        Self {
            id,
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a payload without waiting
    ///
    /// A full channel drops the payload and bumps the dropped counter.
    pub fn deliver(&self, payload: Bytes) -> Result<(), SendError> {
        match self.sender.try_send(payload) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    /// Number of payloads dropped on overflow so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
