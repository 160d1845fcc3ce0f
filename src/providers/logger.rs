//! Logger mailer that only logs messages.
//!
//! Useful for staging environments, or as the fallback slot when no relay
//! should ever be used.

use async_trait::async_trait;

use crate::error::SendError;
use crate::mailer::{DeliveryReceipt, Mailer};
use crate::message::Message;

/// Logger mailer that emits tracing events instead of sending.
pub struct LoggerMailer {
    /// If true, log bodies too. If false, just a recipient summary.
    log_full: bool,
}

impl LoggerMailer {
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger mailer that also logs bodies at debug level.
    pub fn full() -> Self {
        Self { log_full: true }
    }
}

impl Default for LoggerMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LoggerMailer {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError> {
        message.validate(self.provider_name())?;
        let message_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            message_id = %message_id,
            from = ?message.from.as_ref().map(|a| a.to_string()),
            to = ?message.destinations(),
            bcc = message.bcc.len(),
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Email logged"
        );

        if self.log_full {
            tracing::debug!(body = %message.plain_text(), "Text body");
            tracing::debug!(body = %message.html_body, "HTML body");
        }

        Ok(DeliveryReceipt::new(self.provider_name(), message_id))
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}
