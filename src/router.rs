//! Envelope dispatcher
//!
//! Decodes inbound frames and fans each one out to every handler subscribed
//! to its topic. The topic table is built once at construction and never
//! changes; handlers for a topic run in the order they were given.
//!
//! Every handler call is isolated: an error is logged, and a panic is caught
//! and logged, without affecting the remaining handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::DispatchError;
use crate::game::chat::ChatHandler;
use crate::game::draw::DrawHandler;
use crate::game::echo::EchoHandler;
use crate::game::game_master::GameMasterHandler;
use crate::game::hub_info::HubInfoHandler;
use crate::game::{contain, GameHandler};
use crate::message::Envelope;
use crate::registry::Registry;
use crate::types::ClientIdentity;

pub struct Router {
    /// Every handler, in registration order
    handlers: Vec<Arc<dyn GameHandler>>,
    /// Topic → subscribed handlers, in registration order
    topics: HashMap<String, Vec<Arc<dyn GameHandler>>>,
}

impl Router {
    /// Build a router over `handlers`, subscribing each to its topics
    pub fn new(handlers: Vec<Arc<dyn GameHandler>>) -> Self {
        let mut topics: HashMap<String, Vec<Arc<dyn GameHandler>>> = HashMap::new();
        for handler in &handlers {
            for topic in handler.listens_to() {
                debug!("Handler {} listens to {}", handler.name(), topic);
                topics.entry(topic).or_default().push(handler.clone());
            }
        }

        Self { handlers, topics }
    }

    /// The drawing game's handler set
    ///
    /// Chat and draw are registered as listeners of the game master, in that
    /// order.
    pub fn scribble(registry: &Registry) -> Self {
        let chat = Arc::new(ChatHandler::new(registry.clone()));
        let draw = Arc::new(DrawHandler::new(registry.clone()));

        let mut game_master = GameMasterHandler::new();
        game_master.register_action_listener(chat.clone());
        game_master.register_action_listener(draw.clone());

        Self::new(vec![
            Arc::new(EchoHandler::new()),
            chat,
            Arc::new(HubInfoHandler::new()),
            draw,
            Arc::new(game_master),
        ])
    }

    /// Topics with at least one subscriber
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// Dispatch one inbound frame from `caller`
    ///
    /// Returns how many handlers completed successfully. Malformed frames and
    /// unknown topics are logged and dropped.
    pub fn route(
        &self,
        message: &[u8],
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<usize, DispatchError> {
        let envelope = match Envelope::decode(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Unable to decode message from {}: {}", caller, e);
                return Err(DispatchError::Decode(e));
            }
        };

        let Some(handlers) = self.topics.get(&envelope.api) else {
            warn!("Unable to find handler for {} (from {})", envelope.api, caller);
            return Err(DispatchError::TopicNotFound(envelope.api));
        };

        let mut completed = 0;
        for handler in handlers {
            let outcome = contain(handler.name(), || {
                handler.handle_interaction(&envelope.api, envelope.payload(), caller, registry)
            });
            match outcome {
                Some(Ok(())) => completed += 1,
                Some(Err(e)) => error!(
                    "Handler {} failed on {} from {}: {}",
                    handler.name(),
                    envelope.api,
                    caller,
                    e
                ),
                None => {}
            }
        }

        Ok(completed)
    }

    /// Tell every handler about a new connection
    pub fn new_client(&self, client: &ClientIdentity, registry: &Registry) {
        for handler in &self.handlers {
            contain(handler.name(), || handler.new_client(client, registry));
        }
    }

    /// Tell every handler a connection went away
    pub fn client_quit(&self, client: &ClientIdentity, registry: &Registry) {
        for handler in &self.handlers {
            contain(handler.name(), || handler.client_quit(client, registry));
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("Router").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use bytes::Bytes;
    use serde_json::{json, value::RawValue};
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::HandlerError;
    use crate::types::{ClientId, HubName};

    /// Records every call it sees under a shared log
    struct Recorder {
        name: &'static str,
        topics: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Recorder {
        fn new(name: &'static str, topics: &[&'static str], log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                topics: topics.to_vec(),
                log: log.clone(),
                fail: false,
            }
        }
    }

    impl GameHandler for Recorder {
        fn handle_interaction(
            &self,
            api: &str,
            payload: &RawValue,
            _caller: &ClientIdentity,
            _registry: &Registry,
        ) -> Result<(), HandlerError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}:{}", self.name, api, payload.get()));
            if self.fail {
                return Err(HandlerError::Rejected("recorded failure".to_string()));
            }
            Ok(())
        }

        fn new_client(&self, _client: &ClientIdentity, _registry: &Registry) {
            self.log.lock().unwrap().push(format!("{}:connect", self.name));
        }

        fn client_quit(&self, _client: &ClientIdentity, _registry: &Registry) {
            self.log.lock().unwrap().push(format!("{}:quit", self.name));
        }

        fn listens_to(&self) -> Vec<String> {
            self.topics.iter().map(|t| t.to_string()).collect()
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    struct Panicker {
        calls: AtomicUsize,
    }

    impl GameHandler for Panicker {
        fn handle_interaction(
            &self,
            _api: &str,
            _payload: &RawValue,
            _caller: &ClientIdentity,
            _registry: &Registry,
        ) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("handler blew up");
        }

        fn new_client(&self, _client: &ClientIdentity, _registry: &Registry) {
            panic!("connect blew up");
        }

        fn listens_to(&self) -> Vec<String> {
            vec!["t".to_string()]
        }

        fn name(&self) -> &str {
            "panicker"
        }
    }

    fn identity(hub: &str) -> ClientIdentity {
        ClientIdentity::new(HubName::new(hub), ClientId::new())
    }

    #[test]
    fn test_route_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new(vec![
            Arc::new(Recorder::new("first", &["t"], &log)),
            Arc::new(Recorder::new("other", &["u"], &log)),
            Arc::new(Recorder::new("second", &["t", "u"], &log)),
        ]);

        let completed = router
            .route(br#"{"api":"t","payload":{"k":1}}"#, &identity("r1"), &Registry::new())
            .unwrap();

        assert_eq!(completed, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![r#"first:t:{"k":1}"#, r#"second:t:{"k":1}"#]
        );
    }

    #[test]
    fn test_missing_payload_routed_as_null() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new(vec![Arc::new(Recorder::new("only", &["t"], &log))]);

        let completed = router
            .route(br#"{"api":"t"}"#, &identity("r1"), &Registry::new())
            .unwrap();

        assert_eq!(completed, 1);
        assert_eq!(*log.lock().unwrap(), vec!["only:t:null"]);
    }

    #[test]
    fn test_unknown_topic_dropped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new(vec![Arc::new(Recorder::new("only", &["t"], &log))]);

        let result = router.route(
            br#"{"api":"nope","payload":{}}"#,
            &identity("r1"),
            &Registry::new(),
        );

        assert!(matches!(result, Err(DispatchError::TopicNotFound(topic)) if topic == "nope"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_topic_sends_nothing() {
        let registry = Registry::new();
        let router = Router::scribble(&registry);
        let (tx, mut rx) = mpsc::channel::<Bytes>(8);
        let caller = identity("r1");
        registry.register(tx, &caller);

        assert!(router
            .route(br#"{"api":"unknown","payload":{}}"#, &caller, &registry)
            .is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_envelope_dropped() {
        let router = Router::new(Vec::new());

        let result = router.route(b"{not json", &identity("r1"), &Registry::new());

        assert!(matches!(result, Err(DispatchError::Decode(_))));
    }

    #[test]
    fn test_failing_handlers_are_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let panicker = Arc::new(Panicker {
            calls: AtomicUsize::new(0),
        });
        let mut failing = Recorder::new("failing", &["t"], &log);
        failing.fail = true;

        let router = Router::new(vec![
            panicker.clone(),
            Arc::new(failing),
            Arc::new(Recorder::new("healthy", &["t"], &log)),
        ]);

        let completed = router
            .route(br#"{"api":"t","payload":null}"#, &identity("r1"), &Registry::new())
            .unwrap();

        assert_eq!(completed, 1);
        assert_eq!(panicker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_lifecycle_reaches_every_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new(vec![
            Arc::new(Recorder::new("a", &["t"], &log)),
            Arc::new(Panicker {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(Recorder::new("b", &[], &log)),
        ]);
        let client = identity("r1");
        let registry = Registry::new();

        router.new_client(&client, &registry);
        router.client_quit(&client, &registry);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:connect", "b:connect", "a:quit", "b:quit"]
        );
    }

    #[test]
    fn test_scribble_topics() {
        let router = Router::scribble(&Registry::new());
        let mut topics: Vec<&str> = router.topics().collect();
        topics.sort_unstable();

        assert_eq!(topics, vec!["chat", "draw", "echo", "gameMaster", "hub"]);
    }

    #[test]
    fn test_scribble_draw_round_trip() {
        let registry = Registry::new();
        let router = Router::scribble(&registry);
        let (tx_a, _rx_a) = mpsc::channel::<Bytes>(8);
        let (tx_b, mut rx_b) = mpsc::channel::<Bytes>(8);
        let a = identity("r1");
        let b = ClientIdentity::new(a.hub.clone(), ClientId::new());
        registry.register(tx_a, &a);
        registry.register(tx_b, &b);

        let stroke = json!({
            "from": {"x": 0.0, "y": 0.0},
            "to": {"x": 10.0, "y": 10.0},
            "brushStyle": {"brushSize": 5, "brushColor": "#000"},
            "lineCap": "round"
        });
        let frame = json!({"api": "draw", "payload": {"action": stroke.clone()}}).to_string();
        assert_eq!(router.route(frame.as_bytes(), &a, &registry).unwrap(), 1);

        let relayed: serde_json::Value = serde_json::from_slice(&rx_b.try_recv().unwrap()).unwrap();
        assert_eq!(relayed["payload"]["action"], stroke);
    }
}
