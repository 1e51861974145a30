//! Envelope wire format
//!
//! Every frame in either direction is a JSON object
//! `{"api": <topic>, "payload": <topic-specific object>}`. The router only
//! reads `api`; `payload` is handed to handlers untouched. An inbound frame
//! without a payload carries `null`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Inbound envelope
///
/// Borrows the raw payload from the input buffer so it is decoded only by
/// the handlers that care about it.
#[derive(Debug, Deserialize)]
pub struct Envelope<'a> {
    /// Topic selecting the handlers
    pub api: String,
    #[serde(borrow, default)]
    payload: Option<&'a RawValue>,
}

impl<'a> Envelope<'a> {
    /// Decode an envelope from inbound bytes
    pub fn decode(bytes: &'a [u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Topic-specific payload, undecoded; `null` when absent
    pub fn payload(&self) -> &'a RawValue {
        self.payload.unwrap_or(RawValue::NULL)
    }
}

/// Outbound envelope, borrowing its payload
#[derive(Debug, Serialize)]
struct OutboundEnvelope<'a, T: ?Sized> {
    api: &'a str,
    payload: &'a T,
}

/// Serialize `payload` under topic `api` into a frame ready for delivery
pub fn build<T: Serialize + ?Sized>(api: &str, payload: &T) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(&OutboundEnvelope { api, payload }).map(Bytes::from)
}
