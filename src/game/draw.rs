//! Draw handler
//!
//! Relays drawing strokes between the clients of a hub and keeps the hub's
//! stroke history so clients can redraw the canvas on demand.
//!
//! # Ordering
//! A stroke is appended to the history and broadcast inside the same write
//! critical section, append first. A client requesting history under the
//! read lock therefore sees every stroke exactly once: either in the history
//! reply or as a live broadcast queued after it. Clearing works the same way.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, error};

use crate::error::HandlerError;
use crate::game::{build, decode, Action, ActionEvent, ActionListener, GameHandler};
use crate::registry::Registry;
use crate::types::{ClientIdentity, HubName};

const NAME: &str = "draw";

/// Inbound draw payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveDraw {
    #[serde(default)]
    pub action: Option<DrawAction>,
    #[serde(default)]
    pub request_history: bool,
    #[serde(default)]
    pub clear_history: bool,
}

/// Outbound draw payload
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawReply<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'a DrawAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<DrawHistory<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub clear_history: bool,
}

#[derive(Debug, Serialize)]
pub struct DrawHistory<'a> {
    pub history: &'a [DrawAction],
}

/// A single stroke segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawAction {
    pub from: Point,
    pub to: Point,
    pub brush_style: BrushStyle,
    pub line_cap: LineCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrushStyle {
    pub brush_size: i32,
    pub brush_color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

type HistoryMap = HashMap<HubName, Vec<DrawAction>>;

#[derive(Debug)]
pub struct DrawHandler {
    history: RwLock<HistoryMap>,
    registry: Registry,
}

impl DrawHandler {
    pub fn new(registry: Registry) -> Self {
        Self {
            history: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Strokes currently recorded for `hub`
    pub fn history(&self, hub: &HubName) -> Vec<DrawAction> {
        self.read().get(hub).cloned().unwrap_or_default()
    }

    /// Empty the hub's history and tell every client in it to clear
    pub fn clear_history(&self, hub: &HubName, registry: &Registry) -> Result<(), HandlerError> {
        let frame = build(
            NAME,
            &DrawReply {
                clear_history: true,
                ..Default::default()
            },
        )?;

        let mut history = self.write();
        if let Some(strokes) = history.get_mut(hub) {
            debug!("Clearing {} strokes in hub {}", strokes.len(), hub);
            strokes.clear();
        }
        let _ = registry.send_to_hub(hub, frame);

        Ok(())
    }

    /// Send the hub's full history to `caller` only
    pub fn send_history(
        &self,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let history = self.read();
        let strokes = history.get(&caller.hub).map_or(&[][..], Vec::as_slice);

        let frame = build(
            NAME,
            &DrawReply {
                history: Some(DrawHistory { history: strokes }),
                ..Default::default()
            },
        )?;
        let _ = registry.send_to_caller(caller, frame);

        Ok(())
    }

    /// Record a stroke and relay it to everyone else in the hub
    pub fn forward_action(
        &self,
        action: DrawAction,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let frame = build(
            NAME,
            &DrawReply {
                action: Some(&action),
                ..Default::default()
            },
        )?;

        let mut history = self.write();
        history.entry(caller.hub.clone()).or_default().push(action);
        let _ = registry.send_to_hub_except_caller(&caller.hub, caller.client, frame);

        Ok(())
    }

    // Strokes are plain data; a poisoned lock still holds a usable history.
    fn read(&self) -> RwLockReadGuard<'_, HistoryMap> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HistoryMap> {
        self.history.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameHandler for DrawHandler {
    fn handle_interaction(
        &self,
        _api: &str,
        payload: &RawValue,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let msg: ReceiveDraw = decode(payload)?;

        if msg.clear_history {
            self.clear_history(&caller.hub, registry)?;
        }

        if msg.request_history {
            self.send_history(caller, registry)
        } else if let Some(action) = msg.action {
            self.forward_action(action, caller, registry)
        } else {
            Ok(())
        }
    }

    fn client_quit(&self, client: &ClientIdentity, registry: &Registry) {
        // Checked under the history lock: a client that joins and draws in
        // between must not lose its strokes
        let mut history = self.write();
        if !registry.hub_exists(&client.hub) && history.remove(&client.hub).is_some() {
            debug!("Dropped draw history for hub {}", client.hub);
        }
    }

    fn listens_to(&self) -> Vec<String> {
        vec![NAME.to_string()]
    }

    fn name(&self) -> &str {
        NAME
    }
}

impl ActionListener for DrawHandler {
    fn action_happened(&self, event: &ActionEvent) {
        if event.action == Action::WordSelectStart {
            if let Err(e) = self.clear_history(&event.hub, &self.registry) {
                error!("Failed to clear draw history: {}", e);
            }
        }
    }
}
