//! Cross-surface messages
//!
//! Surfaces (popup, in-page dialog, options page, CLI) learn about each
//! other's changes through a closed set of messages. They are JSON-encoded
//! with a `type` tag when they cross a process boundary and delivered
//! in-process through a [`Notifier`].
//!
//! Delivery is best-effort: a message sent while nobody listens is dropped,
//! and a slow subscriber that falls behind the channel capacity skips ahead.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::links::Link;
use crate::shortcuts::{KeyCombo, ShortcutId};

/// Buffered messages per subscriber before old ones are dropped
const CHANNEL_CAPACITY: usize = 64;

/// Messages exchanged between surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Ask the dialog surface to open a link for editing
    EditLink { link: Link },

    /// The saved link collection changed
    LinksChanged {
        /// Site whose links changed, when the change is confined to one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hostname: Option<String>,
    },

    /// A shortcut's effective combo changed
    ShortcutUpdated { id: ShortcutId, combo: KeyCombo },

    /// All shortcut overrides were dropped
    ShortcutsReset,
}

impl Message {
    /// Encode to JSON text
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from JSON text
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Fan-out channel for [`Message`]s
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Message>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to messages sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Broadcast a message to every current subscriber
    pub fn send(&self, message: Message) {
        match self.tx.send(message) {
            Ok(receivers) => debug!("Broadcast message to {} subscriber(s)", receivers),
            Err(broadcast::error::SendError(message)) => {
                debug!("No subscribers for {:?}", message)
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
