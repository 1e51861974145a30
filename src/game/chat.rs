//! Chat handler
//!
//! Broadcasts chat lines to the sender's hub and keeps an in-memory log per
//! hub so late joiners can catch up. Also announces game actions as system
//! lines.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, error};

use crate::error::HandlerError;
use crate::game::{build, decode, Action, ActionEvent, ActionListener, GameHandler};
use crate::registry::Registry;
use crate::types::{ClientId, ClientIdentity, HubName};

const NAME: &str = "chat";

/// Longest line accepted, in characters
pub const MAX_MESSAGE_LEN: usize = 500;

/// Lines kept per hub
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Deserialize)]
struct ReceiveChat {
    message: String,
}

/// One chat line as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    /// Author, absent for system lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub system: bool,
}

#[derive(Debug, Serialize)]
struct ChatHistory<'a> {
    history: &'a [ChatLine],
}

#[derive(Debug)]
pub struct ChatHandler {
    logs: Mutex<HashMap<HubName, Vec<ChatLine>>>,
    registry: Registry,
}

impl ChatHandler {
    pub fn new(registry: Registry) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            registry,
        }
    }

    /// Lines currently logged for `hub`
    pub fn log(&self, hub: &HubName) -> Vec<ChatLine> {
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hub)
            .cloned()
            .unwrap_or_default()
    }

    /// Append `line` to the hub's log and broadcast it
    ///
    /// Both happen under the log lock so every client sees lines in log order.
    fn post(
        &self,
        hub: &HubName,
        line: ChatLine,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let frame = build(NAME, &line)?;

        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let log = logs.entry(hub.clone()).or_default();
        log.push(line);
        if log.len() > LOG_CAPACITY {
            let excess = log.len() - LOG_CAPACITY;
            log.drain(..excess);
        }
        let _ = registry.send_to_hub(hub, frame);

        Ok(())
    }
}

impl GameHandler for ChatHandler {
    fn handle_interaction(
        &self,
        _api: &str,
        payload: &RawValue,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let msg: ReceiveChat = decode(payload)?;

        let message = msg.message.trim();
        if message.is_empty() {
            return Err(HandlerError::Rejected("empty chat message".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(HandlerError::Rejected(format!(
                "chat message longer than {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let line = ChatLine {
            client_id: Some(caller.client),
            message: message.to_string(),
            system: false,
        };
        self.post(&caller.hub, line, registry)
    }

    fn new_client(&self, client: &ClientIdentity, registry: &Registry) {
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(log) = logs.get(&client.hub).filter(|log| !log.is_empty()) else {
            return;
        };

        match build(NAME, &ChatHistory { history: log }) {
            Ok(frame) => {
                let _ = registry.send_to_caller(client, frame);
            }
            Err(e) => error!("Failed to build chat history: {}", e),
        }
    }

    fn client_quit(&self, client: &ClientIdentity, registry: &Registry) {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        if !registry.hub_exists(&client.hub) && logs.remove(&client.hub).is_some() {
            debug!("Dropped chat log for hub {}", client.hub);
        }
    }

    fn listens_to(&self) -> Vec<String> {
        vec![NAME.to_string()]
    }

    fn name(&self) -> &str {
        NAME
    }
}

impl ActionListener for ChatHandler {
    fn action_happened(&self, event: &ActionEvent) {
        let message = match event.action {
            Action::WordSelectStart => "A new round is starting!",
            Action::RoundEnd => "The round has ended.",
        };
        let line = ChatLine {
            client_id: None,
            message: message.to_string(),
            system: true,
        };

        if let Err(e) = self.post(&event.hub, line, &self.registry) {
            error!("Failed to announce {:?}: {}", event.action, e);
        }
    }
}
