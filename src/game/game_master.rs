//! Game-master handler
//!
//! Owns cross-handler game policy: it tracks each hub's current phase,
//! broadcasts phase changes and announces them to its action listeners.
//!
//! # Ordering
//! A phase change is recorded and broadcast under the phase lock, so the
//! order clients see phase frames in matches the order the phases were
//! recorded, and the last frame a client sees is the hub's current phase.
//! Listeners are notified after the lock is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{value::RawValue, Value};
use tracing::{debug, error, info};

use crate::error::HandlerError;
use crate::game::{
    build, decode, Action, ActionEvent, ActionListener, ActionNotifier, GameHandler,
};
use crate::registry::Registry;
use crate::types::{ClientIdentity, HubName};

const NAME: &str = "gameMaster";

#[derive(Debug, Deserialize)]
struct ReceiveGameMaster {
    action: Action,
    #[serde(default)]
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GameState {
    state: Action,
}

#[derive(Debug)]
pub struct GameMasterHandler {
    phases: Mutex<HashMap<HubName, Action>>,
    notifier: ActionNotifier,
}

impl GameMasterHandler {
    pub fn new() -> Self {
        Self {
            phases: Mutex::new(HashMap::new()),
            notifier: ActionNotifier::new(),
        }
    }

    /// Add a listener; only possible while the handler is still being built
    pub fn register_action_listener(&mut self, listener: Arc<dyn ActionListener>) {
        self.notifier.register(listener);
    }

    /// Current phase of `hub`, if a game has started there
    pub fn phase(&self, hub: &HubName) -> Option<Action> {
        self.phases().get(hub).copied()
    }

    /// Move `hub` into `action`'s phase, broadcast it, then notify listeners
    pub fn announce(&self, event: ActionEvent, registry: &Registry) -> Result<(), HandlerError> {
        let frame = build(NAME, &GameState { state: event.action })?;

        // Listeners may take their own locks and the registry's; the phase
        // lock must be released before notifying.
        {
            let mut phases = self.phases();
            phases.insert(event.hub.clone(), event.action);
            let _ = registry.send_to_hub(&event.hub, frame);
        }

        info!("Hub {} entered {:?}", event.hub, event.action);
        self.notifier.notify(&event);

        Ok(())
    }

    fn phases(&self) -> MutexGuard<'_, HashMap<HubName, Action>> {
        self.phases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for GameMasterHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl GameHandler for GameMasterHandler {
    fn handle_interaction(
        &self,
        _api: &str,
        payload: &RawValue,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let msg: ReceiveGameMaster = decode(payload)?;

        let mut event = ActionEvent::new(msg.action, caller.hub.clone());
        if let Some(details) = msg.details {
            event = event.with_details(details);
        }
        self.announce(event, registry)
    }

    fn new_client(&self, client: &ClientIdentity, registry: &Registry) {
        // Held across the send so a concurrent announce can't be overtaken
        let phases = self.phases();
        let Some(&state) = phases.get(&client.hub) else {
            return;
        };

        match build(NAME, &GameState { state }) {
            Ok(frame) => {
                let _ = registry.send_to_caller(client, frame);
            }
            Err(e) => error!("Failed to build game state: {}", e),
        }
    }

    fn client_quit(&self, client: &ClientIdentity, registry: &Registry) {
        // Checked under the phase lock so a client joining in between keeps
        // the game
        let mut phases = self.phases();
        if !registry.hub_exists(&client.hub) && phases.remove(&client.hub).is_some() {
            debug!("Game in hub {} ended (empty)", client.hub);
        }
    }

    fn listens_to(&self) -> Vec<String> {
        vec![NAME.to_string()]
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::game::draw::DrawHandler;
    use crate::game::test_support::{join, join_with_capacity, next_frame, raw};

    #[test]
    fn test_start_word_select_clears_drawing() {
        let registry = Registry::new();
        let draw = Arc::new(DrawHandler::new(registry.clone()));
        let mut game_master = GameMasterHandler::new();
        game_master.register_action_listener(draw.clone());

        let (a, mut rx_a) = join(&registry, "r1");
        let stroke = json!({
            "from": {"x": 0.0, "y": 0.0},
            "to": {"x": 1.0, "y": 1.0},
            "brushStyle": {"brushSize": 1, "brushColor": "#fff"},
            "lineCap": "butt"
        });
        draw.handle_interaction("draw", &raw(json!({"action": stroke})), &a, &registry)
            .unwrap();

        game_master
            .handle_interaction(
                "gameMaster",
                &raw(json!({"action": "wordSelectStart"})),
                &a,
                &registry,
            )
            .unwrap();

        assert_eq!(
            next_frame(&mut rx_a),
            json!({"api": "gameMaster", "payload": {"state": "wordSelectStart"}})
        );
        assert_eq!(next_frame(&mut rx_a)["payload"]["clearHistory"], true);
        assert!(draw.history(&a.hub).is_empty());
        assert_eq!(game_master.phase(&a.hub), Some(Action::WordSelectStart));
    }

    #[test]
    fn test_new_client_learns_phase() {
        let registry = Registry::new();
        let game_master = GameMasterHandler::new();
        let (a, _rx_a) = join(&registry, "r1");
        game_master
            .announce(ActionEvent::new(Action::RoundEnd, a.hub.clone()), &registry)
            .unwrap();

        let (b, mut rx_b) = join(&registry, "r1");
        game_master.new_client(&b, &registry);

        assert_eq!(next_frame(&mut rx_b)["payload"]["state"], "roundEnd");
    }

    #[test]
    fn test_unknown_action_rejected() {
        let registry = Registry::new();
        let game_master = GameMasterHandler::new();
        let (a, mut rx_a) = join(&registry, "r1");

        let result = game_master.handle_interaction(
            "gameMaster",
            &raw(json!({"action": "explode"})),
            &a,
            &registry,
        );

        assert!(matches!(result, Err(HandlerError::Decode(_))));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(game_master.phase(&a.hub), None);
    }

    #[test]
    fn test_last_phase_frame_matches_phase() {
        let registry = Registry::new();
        let game_master = GameMasterHandler::new();
        let (observer, mut rx) = join_with_capacity(&registry, "r1", 1024);

        std::thread::scope(|scope| {
            for action in [Action::WordSelectStart, Action::RoundEnd] {
                let (game_master, registry, hub) = (&game_master, &registry, &observer.hub);
                scope.spawn(move || {
                    for _ in 0..200 {
                        game_master
                            .announce(ActionEvent::new(action, hub.clone()), registry)
                            .unwrap();
                    }
                });
            }
        });

        let mut frames = 0;
        let mut last = None;
        while let Ok(bytes) = rx.try_recv() {
            let frame: Value = serde_json::from_slice(&bytes).unwrap();
            last = Some(frame["payload"]["state"].clone());
            frames += 1;
        }

        assert_eq!(frames, 400);
        let current = serde_json::to_value(game_master.phase(&observer.hub).unwrap()).unwrap();
        assert_eq!(last, Some(current));
    }

    #[test]
    fn test_quit_after_newcomer_keeps_phase() {
        let registry = Registry::new();
        let game_master = GameMasterHandler::new();
        let (a, _rx_a) = join(&registry, "r1");
        game_master
            .announce(ActionEvent::new(Action::RoundEnd, a.hub.clone()), &registry)
            .unwrap();

        // `b` joins after `a` left the registry but before `a`'s quit runs
        registry.unregister(&a).unwrap();
        let (b, _rx_b) = join(&registry, "r1");
        game_master.client_quit(&a, &registry);

        assert_eq!(game_master.phase(&b.hub), Some(Action::RoundEnd));
    }
}
