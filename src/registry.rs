//! Concurrent client registry
//!
//! Maps hub → client → delivery channel and provides the delivery surface
//! handlers use to reach clients.
//!
//! # Locking
//! A single reader/writer lock guards the whole map. `register` and
//! `unregister` take it exclusively; every send takes it shared. Enqueueing
//! uses `try_send`, so a fan-out never waits on a consumer while holding the
//! lock: a full channel drops that payload for that one client (counted, and
//! reported by [`Registry::unregister`]) and a closed channel is treated as a
//! missing client.
//!
//! Members of a hub are kept in registration order and fan-out walks them in
//! that order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::client::{Client, DeliveryChannel};
use crate::error::{DeliveryError, SendError};
use crate::types::{ClientId, ClientIdentity, HubName};

type HubMap = HashMap<HubName, Vec<Client>>;

/// Shared client directory
///
/// Cheap to clone; all clones refer to the same directory.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    hubs: Arc<RwLock<HubMap>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's channel under its identity
    ///
    /// Creates the hub if absent. Registering an identity twice replaces its
    /// channel in place, keeping its position in the hub.
    pub fn register(&self, sender: DeliveryChannel, identity: &ClientIdentity) {
        let mut hubs = self.write();
        let members = hubs.entry(identity.hub.clone()).or_default();

        let client = Client::new(identity.client, sender);
        match members.iter_mut().find(|m| m.id == identity.client) {
            Some(existing) => {
                debug!("Replacing channel for {}", identity);
                *existing = client;
            }
            None => members.push(client),
        }

        debug!(
            "Registered {}; hub size: {}, total hubs: {}",
            identity,
            members.len(),
            hubs.len()
        );
    }

    /// Remove a connection, pruning its hub once empty
    ///
    /// Returns how many payloads the connection lost to a full channel.
    pub fn unregister(&self, identity: &ClientIdentity) -> Result<u64, DeliveryError> {
        let mut hubs = self.write();

        let Some(members) = hubs.get_mut(&identity.hub) else {
            warn!("Could not find client to unregister: {}", identity);
            return Err(DeliveryError::IdentityNotFound(identity.clone()));
        };

        let Some(position) = members.iter().position(|m| m.id == identity.client) else {
            warn!("Could not find client to unregister: {}", identity);
            return Err(DeliveryError::IdentityNotFound(identity.clone()));
        };

        let dropped = members.remove(position).dropped();
        if dropped > 0 {
            warn!("{} lost {} payloads to a full channel", identity, dropped);
        }
        if members.is_empty() {
            hubs.remove(&identity.hub);
            debug!("Hub {} removed (empty)", identity.hub);
        }

        debug!("Unregistered {}; total hubs: {}", identity, hubs.len());
        Ok(dropped)
    }

    /// Whether any client is registered under `hub`
    pub fn hub_exists(&self, hub: &HubName) -> bool {
        self.read().contains_key(hub)
    }

    /// Number of clients registered under `hub`
    pub fn client_count(&self, hub: &HubName) -> usize {
        self.read().get(hub).map_or(0, Vec::len)
    }

    /// Enqueue `payload` for every client in `hub`
    ///
    /// Returns how many channels accepted it.
    pub fn send_to_hub(&self, hub: &HubName, payload: Bytes) -> Result<usize, DeliveryError> {
        self.fan_out(hub, None, payload)
    }

    /// Enqueue `payload` for every client in `hub` except `exclude`
    pub fn send_to_hub_except_caller(
        &self,
        hub: &HubName,
        exclude: ClientId,
        payload: Bytes,
    ) -> Result<usize, DeliveryError> {
        self.fan_out(hub, Some(exclude), payload)
    }

    /// Enqueue `payload` for exactly one client
    ///
    /// A full channel drops the payload but is not an error; a closed one is
    /// reported as a missing client.
    pub fn send_to_caller(
        &self,
        identity: &ClientIdentity,
        payload: Bytes,
    ) -> Result<(), DeliveryError> {
        let hubs = self.read();

        let Some(client) = hubs
            .get(&identity.hub)
            .and_then(|members| members.iter().find(|m| m.id == identity.client))
        else {
            warn!("Could not find channel for {}", identity);
            return Err(DeliveryError::IdentityNotFound(identity.clone()));
        };

        match client.deliver(payload) {
            Ok(()) => Ok(()),
            Err(SendError::Full) => {
                warn!("Channel full for {}, payload dropped", identity);
                Ok(())
            }
            Err(SendError::ChannelClosed) => {
                warn!("Channel closed for {}", identity);
                Err(DeliveryError::IdentityNotFound(identity.clone()))
            }
        }
    }

    fn fan_out(
        &self,
        hub: &HubName,
        exclude: Option<ClientId>,
        payload: Bytes,
    ) -> Result<usize, DeliveryError> {
        let hubs = self.read();

        let Some(members) = hubs.get(hub) else {
            warn!("Cannot find hub {}", hub);
            return Err(DeliveryError::HubNotFound(hub.clone()));
        };

        let mut delivered = 0;
        for client in members.iter().filter(|m| Some(m.id) != exclude) {
            match client.deliver(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::Full) => {
                    warn!("Channel full for {}/{}, payload dropped", hub, client.id);
                }
                Err(SendError::ChannelClosed) => {
                    debug!("Channel closed for {}/{}, skipping", hub, client.id);
                }
            }
        }

        Ok(delivered)
    }

    // A panicking handler cannot leave the map half-updated, so a poisoned
    // lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HubMap> {
        self.hubs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubMap> {
        self.hubs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
