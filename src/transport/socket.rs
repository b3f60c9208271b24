//! Websocket connection actor
//!
//! A connection pumps two directions until disconnect: outbound messages
//! arriving on its channel, and inbound frames parsed into client events
//! and handed to the event handler.

use crate::transport::handler::ClientEventHandler;
use crate::types::{ClientEvent, ServerEvent, SessionTag};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Simple websocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug)]
pub enum SocketError {
    ConnectionClosed,
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue, // Ignore binary/ping/pong
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(None), // Connection closed
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// A managed client connection identified by its session tag
pub struct Connection {
    session_tag: SessionTag,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    event_handler: Arc<dyn ClientEventHandler>,
}

impl Connection {
    pub fn new(
        session_tag: SessionTag,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        event_handler: Arc<dyn ClientEventHandler>,
    ) -> Self {
        Self {
            session_tag,
            socket,
            outbound_receiver,
            event_handler,
        }
    }

    /// Run the connection - handles both directions until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Outbound messages (core to client)
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.socket.send_message(message).await?
                        }
                        None => break, // Channel closed, disconnect
                    }
                }

                // Inbound messages (client to core)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            self.dispatch(message).await?;
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }

    /// Parse one frame and hand it to the handler; malformed frames get
    /// a per-sender error reply and are otherwise dropped.
    async fn dispatch(&mut self, raw: String) -> Result<(), SocketError> {
        match serde_json::from_str::<ClientEvent>(&raw) {
            Ok(event) => {
                self.event_handler
                    .handle_event(&self.session_tag, event)
                    .await;
                Ok(())
            }
            Err(e) => {
                debug!(
                    session_tag = %self.session_tag,
                    error = %e,
                    "Dropping malformed client frame"
                );
                let reply = ServerEvent::Error {
                    message: format!("malformed event: {}", e),
                };
                let encoded = serde_json::to_string(&reply)
                    .map_err(|e| SocketError::SendFailed(e.to_string()))?;
                self.socket.send_message(encoded).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted socket feeding canned frames and recording sends
    struct ScriptedSocket {
        inbound: VecDeque<String>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SocketWrapper for ScriptedSocket {
        async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
            Ok(self.inbound.pop_front())
        }

        async fn close(&mut self) -> Result<(), SocketError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<(String, ClientEvent)>>,
        disconnects: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClientEventHandler for RecordingHandler {
        async fn handle_event(&self, session_tag: &str, event: ClientEvent) {
            self.events
                .lock()
                .unwrap()
                .push((session_tag.to_string(), event));
        }

        async fn handle_disconnect(&self, session_tag: &str) {
            self.disconnects.lock().unwrap().push(session_tag.to_string());
        }
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let sent = Arc::new(Mutex::new(Vec::new()));
        let socket = ScriptedSocket {
            inbound: VecDeque::from([
                r#"{"type":"leave_queue","playerId":"0d0cba62-75b5-4d86-a2a7-0b7b0a83a1ce","gameMode":"fps"}"#.to_string(),
            ]),
            sent: sent.clone(),
        };
        let (_tx, rx) = mpsc::unbounded_channel();

        let connection = Connection::new(
            "tag-a".to_string(),
            Box::new(socket),
            rx,
            handler.clone(),
        );
        connection.run().await.unwrap();

        let events = handler.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "tag-a");
        assert!(matches!(events[0].1, ClientEvent::LeaveQueue { .. }));
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let handler = Arc::new(RecordingHandler::default());
        let sent = Arc::new(Mutex::new(Vec::new()));
        let socket = ScriptedSocket {
            inbound: VecDeque::from(["{not json".to_string()]),
            sent: sent.clone(),
        };
        let (_tx, rx) = mpsc::unbounded_channel();

        let connection = Connection::new(
            "tag-b".to_string(),
            Box::new(socket),
            rx,
            handler.clone(),
        );
        connection.run().await.unwrap();

        assert!(handler.events.lock().unwrap().is_empty());
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains(r#""type":"error""#));
    }
}
