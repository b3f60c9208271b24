//! Websocket upgrade endpoint and client event routing

use crate::transport::registry::ConnectionRegistry;
use crate::transport::socket::Connection;
use crate::types::ClientEvent;
use crate::utils::generate_session_tag;
use async_trait::async_trait;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Handler for decoded client events
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// Handle one event from the client addressed by its session tag
    async fn handle_event(&self, session_tag: &str, event: ClientEvent);

    /// The client's connection dropped; cancel whatever the tag holds
    async fn handle_disconnect(&self, session_tag: &str);
}

/// Shared state for the websocket endpoint
#[derive(Clone)]
pub struct TransportState {
    pub registry: Arc<dyn ConnectionRegistry>,
    pub event_handler: Arc<dyn ClientEventHandler>,
}

/// Websocket upgrade endpoint; mints the session tag for the connection
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<TransportState>,
) -> Response {
    let session_tag = generate_session_tag();

    info!(session_tag = %session_tag, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_websocket_connection(socket, session_tag, state))
}

/// Handle the upgraded websocket connection
async fn handle_websocket_connection(
    socket: axum::extract::ws::WebSocket,
    session_tag: String,
    state: TransportState,
) {
    info!(session_tag = %session_tag, "WebSocket connection established");

    // Outbound channel (core to client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    state
        .registry
        .register(session_tag.clone(), outbound_sender)
        .await;

    let connection = Connection::new(
        session_tag.clone(),
        Box::new(socket),
        outbound_receiver,
        state.event_handler.clone(),
    );

    match connection.run().await {
        Ok(()) => {
            info!(session_tag = %session_tag, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(session_tag = %session_tag, error = ?e, "WebSocket connection error");
        }
    }

    // Cleanup: drop the outbound channel, then cancel queue entries
    state.registry.unregister(&session_tag).await;
    state.event_handler.handle_disconnect(&session_tag).await;

    info!(session_tag = %session_tag, "WebSocket cleanup completed");
}
