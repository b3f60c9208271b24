//! Connection registry mapping session tags to outbound channels
//!
//! Upstream components address clients by session tag; the registry owns
//! the senders that feed each connection's writer task.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Maps a session tag to its outbound channel
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn register(&self, session_tag: String, sender: mpsc::UnboundedSender<String>);

    async fn unregister(&self, session_tag: &str);

    async fn send_to(&self, session_tag: &str, message: &str);

    async fn send_to_many(&self, session_tags: &[String], message: &str);
}

#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    // session tag -> sender
    connections: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, session_tag: String, sender: mpsc::UnboundedSender<String>) {
        let mut connections = self.connections.write().await;
        connections.insert(session_tag, sender);
    }

    async fn unregister(&self, session_tag: &str) {
        let mut connections = self.connections.write().await;
        connections.remove(session_tag);
    }

    async fn send_to(&self, session_tag: &str, message: &str) {
        let connections = self.connections.read().await;
        if let Some(sender) = connections.get(session_tag) {
            let _ = sender.send(message.to_string());
        }
    }

    async fn send_to_many(&self, session_tags: &[String], message: &str) {
        let connections = self.connections.read().await;
        for session_tag in session_tags {
            if let Some(sender) = connections.get(session_tag) {
                let _ = sender.send(message.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_registered_connection() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("tag-1".to_string(), tx).await;

        registry.send_to("tag-1", "hello").await;
        assert_eq!(rx.recv().await.unwrap(), "hello");

        // Unknown tags are silently skipped
        registry.send_to("tag-2", "nobody home").await;
    }

    #[tokio::test]
    async fn test_send_to_many_skips_unregistered() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register("a".to_string(), tx_a).await;
        registry.register("b".to_string(), tx_b).await;
        registry.unregister("b").await;

        registry
            .send_to_many(&["a".to_string(), "b".to_string()], "update")
            .await;

        assert_eq!(rx_a.recv().await.unwrap(), "update");
        assert!(rx_b.try_recv().is_err());
    }
}
