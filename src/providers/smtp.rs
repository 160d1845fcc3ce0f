//! SMTP relay provider using lettre, the fallback transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use outreach::providers::SmtpMailer;
//!
//! // With authentication
//! let mailer = SmtpMailer::new("smtp.gmail.com", 587)
//!     .credentials("username", "app-password")
//!     .build()?;
//!
//! // Without authentication (local relay)
//! let mailer = SmtpMailer::localhost();
//! ```

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as LettreAttachment, Mailbox, MultiPart},
    transport::smtp::{authentication::Credentials, AsyncSmtpTransportBuilder},
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
};

use crate::address::Address;
use crate::error::SendError;
use crate::mailer::{DeliveryReceipt, Mailer};
use crate::message::Message;

const PROVIDER: &str = "smtp";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP email provider.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer builder with TLS (STARTTLS on port 587).
    pub fn new(host: &str, port: u16) -> SmtpBuilder {
        SmtpBuilder {
            host: host.to_string(),
            port,
            credentials: None,
            tls: TlsMode::StartTls,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a new SMTP mailer for localhost (no TLS, no auth).
    pub fn localhost() -> Self {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost");
        SmtpMailer {
            transport: finish(builder, 25, DEFAULT_TIMEOUT, None),
        }
    }

    /// Build a lettre message from ours.
    fn build_message(&self, message: &Message) -> Result<LettreMessage, SendError> {
        message.validate(PROVIDER)?;
        let from = message
            .from
            .as_ref()
            .ok_or_else(|| SendError::invalid_message(PROVIDER, "Missing required field: from"))?;

        let mut builder = LettreMessage::builder()
            .from(address_to_mailbox(from)?)
            .subject(&message.subject);

        for to in &message.to {
            builder = builder.to(address_to_mailbox(to)?);
        }
        for bcc in &message.bcc {
            builder = builder.bcc(address_to_mailbox(bcc)?);
        }
        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(address_to_mailbox(reply_to)?);
        }

        let body = MultiPart::alternative_plain_html(message.plain_text(), message.html_body.clone());

        let built = if message.attachments.is_empty() {
            builder.multipart(body)
        } else {
            let mut mixed = MultiPart::mixed().multipart(body);

            for attachment in &message.attachments {
                let content_type: ContentType = attachment
                    .mime
                    .parse()
                    .unwrap_or(ContentType::TEXT_PLAIN);

                let part = match attachment.content_id() {
                    Some(cid) => LettreAttachment::new_inline(cid.to_string())
                        .body(attachment.bytes.clone(), content_type),
                    None => LettreAttachment::new(attachment.filename.clone())
                        .body(attachment.bytes.clone(), content_type),
                };

                mixed = mixed.singlepart(part);
            }

            builder.multipart(mixed)
        };

        built.map_err(|e| SendError::invalid_message(PROVIDER, e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError> {
        let email = self.build_message(message)?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| SendError::relay_unavailable(PROVIDER, e.to_string()))?;

        // Use the relay's queue id when it reports one
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(DeliveryReceipt::new(PROVIDER, message_id))
    }

    async fn verify(&self) -> Result<(), SendError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SendError::relay_unavailable(
                PROVIDER,
                "relay did not answer NOOP",
            )),
            Err(e) => Err(SendError::relay_unavailable(PROVIDER, e.to_string())),
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// TLS mode for SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// No TLS (dangerous, only for localhost)
    None,
    /// STARTTLS - upgrade to TLS after connecting (port 587)
    StartTls,
    /// Implicit TLS - connect with TLS from start (port 465)
    Tls,
}

/// Builder for SmtpMailer.
pub struct SmtpBuilder {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    tls: TlsMode,
    timeout: Duration,
}

impl SmtpBuilder {
    /// Set SMTP credentials.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username.to_string(), password.to_string()));
        self
    }

    /// Set TLS mode.
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    /// Disable TLS (dangerous, only for localhost/testing).
    pub fn no_tls(mut self) -> Self {
        self.tls = TlsMode::None;
        self
    }

    /// Bound each connection/command with `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the SmtpMailer.
    ///
    /// Fails when TLS cannot be set up for the host; only [`TlsMode::None`]
    /// ever connects in plaintext.
    pub fn build(self) -> Result<SmtpMailer, SendError> {
        let builder = match self.tls {
            TlsMode::None => {
                if self.credentials.is_some() {
                    tracing::warn!(host = %self.host, "SMTP credentials will be sent without TLS");
                }
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            }
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .map_err(|e| tls_setup_error(&self.host, e))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
                .map_err(|e| tls_setup_error(&self.host, e))?,
        };

        Ok(SmtpMailer {
            transport: finish(builder, self.port, self.timeout, self.credentials),
        })
    }
}

fn tls_setup_error(host: &str, err: lettre::transport::smtp::Error) -> SendError {
    SendError::relay_unavailable(PROVIDER, format!("TLS setup for '{}' failed: {}", host, err))
}

fn finish(
    builder: AsyncSmtpTransportBuilder,
    port: u16,
    timeout: Duration,
    credentials: Option<Credentials>,
) -> AsyncSmtpTransport<Tokio1Executor> {
    let mut builder = builder.port(port).timeout(Some(timeout));
    if let Some(creds) = credentials {
        builder = builder.credentials(creds);
    }
    builder.build()
}

/// Convert our Address to lettre's Mailbox, punycoding the domain.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, SendError> {
    let ascii = addr.to_ascii().unwrap_or_else(|| addr.email.clone());
    let email = ascii.parse().map_err(|e: lettre::address::AddressError| {
        SendError::invalid_message(PROVIDER, format!("Invalid address '{}': {}", addr.email, e))
    })?;

    Ok(Mailbox::new(addr.name.clone(), email))
}
