//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, hub
//! selection from the request path, registration, and the read/write tasks
//! bridging the socket with the router and the client's delivery channel.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::client::DeliveryChannel;
use crate::error::AppError;
use crate::message;
use crate::server::Server;
use crate::types::{ClientId, ClientIdentity, HubName};

/// Topic of the greeting sent to every new connection
pub const CONNECTED_API: &str = "connected";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Connected<'a> {
    client_id: ClientId,
    hub_name: &'a HubName,
}

/// Open a connection's delivery channel with the greeting already queued
///
/// Queued before the channel is registered, so the greeting is always the
/// first frame even when a hub broadcast races the registration.
fn greeted_channel(
    identity: &ClientIdentity,
    capacity: usize,
) -> Result<(DeliveryChannel, mpsc::Receiver<Bytes>), AppError> {
    let greeting = message::build(
        CONNECTED_API,
        &Connected {
            client_id: identity.client,
            hub_name: &identity.hub,
        },
    )?;

    let (msg_tx, msg_rx) = mpsc::channel::<Bytes>(capacity.max(1));
    // A fresh channel has room for at least one payload
    if msg_tx.try_send(greeting).is_err() {
        warn!("Could not queue greeting for {}", identity);
    }
    Ok((msg_tx, msg_rx))
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers the client under the hub
/// named by the request path, and runs until either side closes.
pub async fn handle_connection(stream: TcpStream, server: Server) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, remembering the requested path
    let mut path = String::new();
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            path = request.uri().path().to_string();
            Ok(response)
        },
    )
    .await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let identity = ClientIdentity::new(HubName::from_path(&path), ClientId::new());
    info!("Client {} connected from {}", identity, peer_addr);

    // Delivery channel, owned here; the registry only enqueues on it
    let (msg_tx, mut msg_rx) = greeted_channel(&identity, server.client_buffer())?;
    let registry = server.registry().clone();
    registry.register(msg_tx, &identity);
    server.router().new_client(&identity, &registry);

    // Read task (WebSocket -> Router)
    let read_server = server.clone();
    let read_identity = identity.clone();
    let mut read_task = tokio::spawn(async move {
        let registry = read_server.registry();
        let router = read_server.router();

        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    // Failures are logged by the router
                    let _ = router.route(text.as_bytes(), &read_identity, registry);
                }
                Ok(Message::Binary(data)) => {
                    let _ = router.route(&data, &read_identity, registry);
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", read_identity);
                    break;
                }
                Ok(_) => {
                    // Ping/Pong handled by tungstenite
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", read_identity, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", read_identity);
    });

    // Write task (delivery channel -> WebSocket)
    let write_identity = identity.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(payload) = msg_rx.recv().await {
            let frame = match String::from_utf8(payload.to_vec()) {
                Ok(text) => Message::Text(text),
                Err(e) => Message::Binary(e.into_bytes()),
            };
            if ws_sender.send(frame).await.is_err() {
                debug!("WebSocket send failed, ending write task");
                break;
            }
        }
        debug!("Write task ended for {}", write_identity);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", identity);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", identity);
            read_task.abort();
        }
    }

    // Dropping the registry's sender lets the write task drain and close
    if let Err(e) = registry.unregister(&identity) {
        error!("Failed to unregister {}: {}", identity, e);
    }
    server.router().client_quit(&identity, &registry);

    info!("Client {} disconnected", identity);

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_greeting_precedes_hub_broadcast() {
        let registry = Registry::new();
        let identity = ClientIdentity::new(HubName::new("r1"), ClientId::new());

        let (msg_tx, mut msg_rx) = greeted_channel(&identity, 4).unwrap();
        registry.register(msg_tx, &identity);
        registry
            .send_to_hub(&identity.hub, Bytes::from_static(b"{}"))
            .unwrap();

        let first: Value = serde_json::from_slice(&msg_rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["api"], CONNECTED_API);
        assert_eq!(first["payload"]["hubName"], "r1");
        assert_eq!(first["payload"]["clientId"], identity.client.to_string());
        assert_eq!(msg_rx.try_recv().unwrap(), Bytes::from_static(b"{}"));
    }

    #[test]
    fn test_greeting_fits_smallest_channel() {
        let identity = ClientIdentity::new(HubName::new("r1"), ClientId::new());

        let (_msg_tx, mut msg_rx) = greeted_channel(&identity, 0).unwrap();

        assert!(msg_rx.try_recv().is_ok());
    }
}
