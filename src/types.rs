//! Basic type definitions for the session server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `HubName`: room name taken from the connection URL
//! - `ClientIdentity`: the (hub, client) pair naming one live connection

use serde::Serialize;
use uuid::Uuid;

/// Unique client identifier (newtype pattern)
///
/// Wraps a UUID v4 minted once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hub (room) name
///
/// A hub exists only while at least one client is registered under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HubName(pub String);

impl HubName {
    /// Hub joined when the request path names none
    pub const DEFAULT: &'static str = "lobby";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the hub from a WebSocket request path
    ///
    /// Uses the last non-empty path segment, so both `/lobby/abc` and `/abc`
    /// name hub `abc`. An empty path falls back to [`HubName::DEFAULT`].
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let name = path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(Self::DEFAULT);
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HubName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    pub hub: HubName,
    pub client: ClientId,
}

impl ClientIdentity {
    pub fn new(hub: HubName, client: ClientId) -> Self {
        Self { hub, client }
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.hub, self.client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_unique() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_hub_from_lobby_path() {
        assert_eq!(HubName::from_path("/lobby/abc123").as_str(), "abc123");
        assert_eq!(HubName::from_path("/abc123/").as_str(), "abc123");
        assert_eq!(HubName::from_path("/lobby/xyz?token=1").as_str(), "xyz");
    }

    #[test]
    fn test_hub_from_empty_path() {
        assert_eq!(HubName::from_path("/").as_str(), HubName::DEFAULT);
        assert_eq!(HubName::from_path("").as_str(), HubName::DEFAULT);
    }

    #[test]
    fn test_identity_display() {
        let client = ClientId::new();
        let identity = ClientIdentity::new(HubName::new("r1"), client);
        assert_eq!(identity.to_string(), format!("r1/{}", client));
    }
}
