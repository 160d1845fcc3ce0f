//! Adapter trait and delivery receipt.
//!
//! # Why `async_trait`?
//!
//! The dispatch service and the HTTP layer hold adapters as
//! `Arc<dyn Mailer>` so the primary and fallback can be chosen from the
//! environment at startup. Native async trait methods are not object-safe;
//! `#[async_trait]` boxes the returned futures instead. One allocation per
//! send is noise next to a network round trip.
//!
//! Callers holding a concrete adapter type still call it directly:
//!
//! ```ignore
//! let mailer = SendGridMailer::new(api_key);
//! mailer.send(&message).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SendError;
use crate::message::Message;

/// Result of an accepted send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Message ID assigned by the provider (or generated when it gives none)
    pub message_id: String,
    /// Name of the adapter that accepted the message
    pub provider: String,
    /// Link to a rendered preview, for adapters that offer one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Optional provider-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl DeliveryReceipt {
    pub fn new(provider: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            provider: provider.into(),
            preview: None,
            provider_response: None,
        }
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }

    pub fn with_response(mut self, response: serde_json::Value) -> Self {
        self.provider_response = Some(response);
        self
    }
}

/// A transport that sends one message per call.
///
/// Every adapter checks the message's required fields itself and fails with
/// [`SendErrorKind::InvalidMessage`](crate::SendErrorKind::InvalidMessage)
/// before touching the network.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a single message.
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError>;

    /// Lightweight reachability/credentials check. Sends nothing.
    async fn verify(&self) -> Result<(), SendError> {
        Ok(())
    }

    /// Get the provider name (for logging/debugging).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

#[async_trait]
impl<M: Mailer + ?Sized> Mailer for Arc<M> {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError> {
        (**self).send(message).await
    }

    async fn verify(&self) -> Result<(), SendError> {
        (**self).verify().await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}

/// Fallback slot used when no relay is configured. Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

#[async_trait]
impl Mailer for NoFallback {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError> {
        message.validate(self.provider_name())?;
        Err(SendError::relay_unavailable(
            self.provider_name(),
            "no fallback relay configured",
        ))
    }

    async fn verify(&self) -> Result<(), SendError> {
        Err(SendError::relay_unavailable(
            self.provider_name(),
            "no fallback relay configured",
        ))
    }

    fn provider_name(&self) -> &'static str {
        "none"
    }
}
