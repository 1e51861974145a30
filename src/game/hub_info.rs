//! Hub-info handler: lets a client ask whether a hub exists before joining

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::HandlerError;
use crate::game::{build, decode, GameHandler};
use crate::registry::Registry;
use crate::types::{ClientIdentity, HubName};

const NAME: &str = "hub";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HubQuery {
    /// Defaults to the caller's own hub
    #[serde(default)]
    hub_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HubInfo<'a> {
    hub_name: &'a HubName,
    exists: bool,
    client_count: usize,
}

#[derive(Debug, Default)]
pub struct HubInfoHandler;

impl HubInfoHandler {
    pub fn new() -> Self {
        Self
    }
}

impl GameHandler for HubInfoHandler {
    fn handle_interaction(
        &self,
        _api: &str,
        payload: &RawValue,
        caller: &ClientIdentity,
        registry: &Registry,
    ) -> Result<(), HandlerError> {
        let query: HubQuery = decode(payload)?;
        let hub = query
            .hub_name
            .map(HubName::new)
            .unwrap_or_else(|| caller.hub.clone());

        let client_count = registry.client_count(&hub);
        let frame = build(
            NAME,
            &HubInfo {
                hub_name: &hub,
                exists: client_count > 0,
                client_count,
            },
        )?;
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
