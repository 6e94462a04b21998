//! In-process message fan-out, one broadcast channel per destination.
//!
//! Events only reach subscribers within this process; a multi-replica
//! deployment would put a shared broker behind the same surface.

use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};

use crate::auth::PrincipalId;

const CHANNEL_CAPACITY: usize = 100;

/// A message published to a destination, stamped with its sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub destination: String,
    pub sender: PrincipalId,
    pub body: String,
}

#[derive(Default)]
pub struct ChatHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ChatMessage>>>,
}

impl ChatHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn channel(&self, destination: &str) -> broadcast::Sender<ChatMessage> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub async fn subscribe(&self, destination: &str) -> broadcast::Receiver<ChatMessage> {
        self.channel(destination).await.subscribe()
    }

    pub async fn publish(&self, destination: &str, sender: PrincipalId, body: &str) {
        let channel = self.channel(destination).await;
        // No receivers is fine; the message just has nowhere to go.
        let _ = channel.send(ChatMessage {
            destination: destination.to_string(),
            sender,
            body: body.to_string(),
        });
    }
}
