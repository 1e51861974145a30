//! Game handlers
//!
//! A [`GameHandler`] is a topic-subscribed unit of application logic with
//! private state. Handlers that also react to cross-cutting game events
//! implement [`ActionListener`] and are wired into an [`ActionNotifier`] at
//! startup.

use std::panic::{self, AssertUnwindSafe};

use serde_json::value::RawValue;
use tracing::error;

use crate::error::HandlerError;
use crate::registry::Registry;
use crate::types::ClientIdentity;

pub mod action;
pub mod chat;
pub mod draw;
pub mod echo;
pub mod game_master;
pub mod hub_info;

pub use action::{Action, ActionEvent, ActionListener, ActionNotifier};

/// Topic-subscribed application logic
///
/// All methods run synchronously on the calling connection's task. An
/// implementation may call into the registry while holding its own locks;
/// the registry never waits on a handler lock.
pub trait GameHandler: Send + Sync {
    /// Handle one envelope for a topic this handler listens to
    fn handle_interaction(
        &self,
        api: &str,
        payload: &RawValue,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError>;

    /// A connection was registered
    fn new_client(&self, _client: &ClientIdentity, _registry: &Registry) {}

    /// A connection was unregistered
    fn client_quit(&self, _client: &ClientIdentity, _registry: &Registry) {}

    /// Topics this handler subscribes to
    fn listens_to(&self) -> Vec<String>;

    /// Handler name, used in logs
    fn name(&self) -> &str;
}

/// Decode a handler payload, mapping failures to [`HandlerError::Decode`]
pub(crate) fn decode<'a, T: serde::Deserialize<'a>>(
    payload: &'a RawValue,
) -> Result<T, HandlerError> {
    serde_json::from_str(payload.get()).map_err(HandlerError::Decode)
}

/// Build an outbound frame, mapping failures to [`HandlerError::Encode`]
pub(crate) fn build<T: serde::Serialize + ?Sized>(
    api: &str,
    payload: &T,
) -> Result<bytes::Bytes, HandlerError> {
    crate::message::build(api, payload).map_err(HandlerError::Encode)
}

/// Run one handler or listener call, catching and logging a panic
pub(crate) fn contain<T>(name: &str, call: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown panic");
            error!("Handler {} panicked: {}", name, reason);
            None
        }
    }
}
