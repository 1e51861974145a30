//! Action notification chain
//!
//! Lets the handler that owns game policy announce semantic events to a
//! fixed list of listeners, outside topic routing. A listener that panics
//! is logged and skipped; the remaining listeners still run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::game::contain;
use crate::types::HubName;

/// High-level game events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// A new round began; players are choosing a word
    WordSelectStart,
    /// The current round finished
    RoundEnd,
}

/// One announced action, scoped to the hub it happened in
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub action: Action,
    pub hub: HubName,
    /// Free-form details supplied by the notifier
    pub details: Option<Value>,
}

impl ActionEvent {
    pub fn new(action: Action, hub: HubName) -> Self {
        Self {
            action,
            hub,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Reacts to announced actions
///
/// Called synchronously on the notifier's task. Listeners may broadcast
/// through the registry; the notifier holds no lock while calling them.
pub trait ActionListener: Send + Sync {
    fn action_happened(&self, event: &ActionEvent);
}

/// Insertion-ordered list of listeners, built once at startup
#[derive(Default)]
pub struct ActionNotifier {
    listeners: Vec<Arc<dyn ActionListener>>,
}

impl ActionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn ActionListener>) {
        self.listeners.push(listener);
    }

    /// Deliver `event` to every listener in registration order
    pub fn notify(&self, event: &ActionEvent) {
        debug!(
            "Notifying {} listeners of {:?} in hub {}",
            self.listeners.len(),
            event.action,
            event.hub
        );
        for listener in &self.listeners {
            contain("action listener", || listener.action_happened(event));
        }
    }
}

impl std::fmt::Debug for ActionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
