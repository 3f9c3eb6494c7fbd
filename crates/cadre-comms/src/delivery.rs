//! Delivery backend abstraction for the email/chat collaborator.
//!
//! Defines an enum-based dispatch for delivery backends, avoiding the
//! dyn-compatibility issues with async trait methods. The HTTP backend
//! talks to the external delivery service; the memory backend is an
//! in-process sink used for tests and offline runs.
//!
//! Delivery is at-most-once from the simulator's side: the hub only calls
//! `deliver` after dedup and cooldown checks have passed.

use std::sync::Mutex;

use cadre_types::{Channel, MessageId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommsError;

/// A finalized message handed to the delivery collaborator.
///
/// Addresses here are already resolved (email addresses, chat handles, or
/// a room key); no worker ids cross this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// The channel to deliver on.
    pub channel: Channel,
    /// The sender's resolved address.
    pub sender_address: String,
    /// Primary recipient addresses.
    pub recipients: Vec<String>,
    /// Carbon-copied addresses (email only).
    pub cc: Vec<String>,
    /// Blind carbon-copied addresses (email only).
    pub bcc: Vec<String>,
    /// Email subject; `None` for chat.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// Thread root, if this continues a thread.
    pub thread_id: Option<MessageId>,
    /// The message being replied to, if any.
    pub reply_to: Option<MessageId>,
}

// ---------------------------------------------------------------------------
// Unified backend enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// A delivery backend that durably stores and delivers a message.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
pub enum DeliveryBackend {
    /// HTTP delivery service.
    Http(HttpDelivery),
    /// In-process sink for tests and offline runs.
    Memory(MemoryDelivery),
}

impl DeliveryBackend {
    /// Deliver a message, returning the identifier the collaborator
    /// assigned to it. The id is later used for reply resolution.
    ///
    /// # Errors
    ///
    /// Returns [`CommsError::Transport`] or [`CommsError::Delivery`] if
    /// the collaborator is unreachable or rejects the message.
    pub async fn deliver(&self, message: &OutgoingMessage) -> Result<MessageId, CommsError> {
        match self {
            Self::Http(backend) => backend.deliver(message).await,
            Self::Memory(backend) => backend.deliver(message),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Memory(_) => "memory",
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

/// Backend for an HTTP delivery service.
///
/// Sends `POST {base_url}/messages` with the outgoing message as JSON and
/// expects `{"id": "<uuid>"}` back.
pub struct HttpDelivery {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Response shape of the delivery service.
#[derive(Debug, Deserialize)]
struct DeliveryResponse {
    id: Uuid,
}

impl HttpDelivery {
    /// Create a new HTTP delivery backend.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Post a message to the delivery service.
    async fn deliver(&self, message: &OutgoingMessage) -> Result<MessageId, CommsError> {
        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CommsError::Delivery(format!(
                "delivery service returned {status}: {text}"
            )));
        }

        let parsed: DeliveryResponse = response.json().await?;
        Ok(MessageId::from(parsed.id))
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

/// In-process delivery sink.
///
/// Records every accepted message and assigns ids locally. Used by tests
/// and by runs configured without a delivery service.
#[derive(Debug, Default)]
pub struct MemoryDelivery {
    sent: Mutex<Vec<(MessageId, OutgoingMessage)>>,
}

impl MemoryDelivery {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message and assign it an id.
    fn deliver(&self, message: &OutgoingMessage) -> Result<MessageId, CommsError> {
        let id = MessageId::new();
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| CommsError::Delivery(String::from("memory sink poisoned")))?;
        sent.push((id, message.clone()));
        Ok(id)
    }

    /// Snapshot of every message delivered so far, in order.
    pub fn sent(&self) -> Vec<(MessageId, OutgoingMessage)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_assigns_distinct_ids() {
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());
        let message = OutgoingMessage {
            channel: Channel::Chat,
            sender_address: String::from("@dana"),
            recipients: vec![String::from("@priya")],
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: None,
            body: String::from("ping"),
            thread_id: None,
            reply_to: None,
        };
        let a = backend.deliver(&message).await.unwrap();
        let b = backend.deliver(&message).await.unwrap();
        assert_ne!(a, b);

        let DeliveryBackend::Memory(sink) = backend else {
            return;
        };
        assert_eq!(sink.sent().len(), 2);
    }
}
