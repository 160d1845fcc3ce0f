//! Message struct with builder pattern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::address::{Address, ToAddress};
use crate::attachment::{total_size, Attachment, MAX_ATTACHMENT_BYTES};
use crate::error::SendError;

/// An outbound email.
///
/// ```
/// use outreach::Message;
///
/// let message = Message::new()
///     .to("ada@example.org")
///     .subject("Thank you!")
///     .html_body("<p>Your gift makes a difference.</p>");
///
/// assert_eq!(message.plain_text(), "Your gift makes a difference.");
/// ```
///
/// Destination, subject and HTML body are required; everything else is
/// optional. When no plain-text body is set, one is derived from the HTML by
/// stripping markup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender override. The dispatch service fills in its default sender.
    pub from: Option<Address>,
    pub to: Vec<Address>,
    /// Blind-copy recipients
    pub bcc: Vec<Address>,
    pub reply_to: Option<Address>,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Custom email headers
    pub headers: HashMap<String, String>,
    /// Provider-specific options (e.g. SendGrid `template_id`, `categories`)
    pub provider_options: HashMap<String, serde_json::Value>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender override.
    pub fn from(mut self, addr: impl ToAddress) -> Self {
        self.from = Some(addr.to_address());
        self
    }

    /// Add a destination. Can be called multiple times.
    pub fn to(mut self, addr: impl ToAddress) -> Self {
        self.to.push(addr.to_address());
        self
    }

    /// Replace all destinations.
    pub fn put_to(mut self, addrs: Vec<Address>) -> Self {
        self.to = addrs;
        self
    }

    pub fn bcc(mut self, addr: impl ToAddress) -> Self {
        self.bcc.push(addr.to_address());
        self
    }

    pub fn reply_to(mut self, addr: impl ToAddress) -> Self {
        self.reply_to = Some(addr.to_address());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = body.into();
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set a provider-specific option.
    ///
    /// ```rust,ignore
    /// Message::new().provider_option("template_id", "d-0a1b2c")
    /// ```
    pub fn provider_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.provider_options.insert(key.into(), value.into());
        self
    }

    /// Check the required fields.
    ///
    /// `provider` names the component doing the check and ends up in the error.
    pub fn validate(&self, provider: &'static str) -> Result<(), SendError> {
        if self.to.is_empty() || self.to.iter().any(|a| a.email.trim().is_empty()) {
            return Err(SendError::invalid_message(provider, "Missing required field: to"));
        }
        if self.subject.trim().is_empty() {
            return Err(SendError::invalid_message(provider, "Missing required field: subject"));
        }
        if self.html_body.trim().is_empty() {
            return Err(SendError::invalid_message(provider, "Missing required field: htmlContent"));
        }
        let attached = total_size(&self.attachments);
        if attached > MAX_ATTACHMENT_BYTES {
            return Err(SendError::invalid_message(
                provider,
                format!("Attachments too large: {} bytes (limit {})", attached, MAX_ATTACHMENT_BYTES),
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate("message").is_ok()
    }

    /// The plain-text body, derived from the HTML when none was supplied.
    pub fn plain_text(&self) -> String {
        match &self.text_body {
            Some(text) => text.clone(),
            None => strip_tags(&self.html_body),
        }
    }

    /// Fill in the sender when the message has none.
    pub fn with_default_from(mut self, from: Option<&Address>) -> Self {
        if self.from.is_none() {
            self.from = from.cloned();
        }
        self
    }

    /// Destination email addresses, for logging.
    pub fn destinations(&self) -> Vec<&str> {
        self.to.iter().map(|a| a.email.as_str()).collect()
    }
}

/// Remove markup from an HTML fragment.
pub fn strip_tags(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
    tags.replace_all(html, "").trim().to_string()
}
