//! Echo handler: returns the payload to its sender unchanged

use serde_json::value::RawValue;

use crate::error::HandlerError;
use crate::game::{build, GameHandler};
use crate::registry::Registry;
use crate::types::ClientIdentity;

const NAME: &str = "echo";

#[derive(Debug, Default)]
pub struct EchoHandler;

impl EchoHandler {
    pub fn new() -> Self {
        Self
    }
}

impl GameHandler for EchoHandler {
    fn handle_interaction(
        &self,
        api: &str,
        payload: &RawValue,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let frame = build(api, payload)?;
        let _ = registry.send_to_caller(caller, frame);
        Ok(())
    }

    fn listens_to(&self) -> Vec<String> {
        vec![NAME.to_string()]
    }

    fn name(&self) -> &str {
        NAME
    }
}
