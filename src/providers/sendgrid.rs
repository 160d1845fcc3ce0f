//! SendGrid API provider, the primary transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use outreach::providers::SendGridMailer;
//!
//! let mailer = SendGridMailer::new("SG.xxxxx");
//! ```
//!
//! ## Provider Options
//!
//! ```rust,ignore
//! let message = Message::new()
//!     .to("ada@example.org")
//!     .subject("Spring newsletter")
//!     .html_body(html)
//!     .provider_option("template_id", "d-xxxxx")
//!     .provider_option("dynamic_template_data", json!({"DONOR_NAME": "Ada"}))
//!     .provider_option("categories", vec!["newsletter"])
//!     .provider_option("custom_args", json!({"newsletter_id": "42"}));
//! ```

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::error::SendError;
use crate::mailer::{DeliveryReceipt, Mailer};
use crate::message::Message;

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";
const PROVIDER: &str = "sendgrid";

/// SendGrid API email provider.
pub struct SendGridMailer {
    api_key: String,
    client: Client,
    base_url: String,
    compress: bool,
}

impl SendGridMailer {
    /// Create a new SendGrid mailer with the given API key and a default
    /// reqwest client. Each dispatch attempt is still bounded by the
    /// service's attempt timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(api_key, Client::new())
    }

    /// Create a mailer whose requests give up after `timeout`.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(api_key, client))
    }

    /// Create with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: SENDGRID_API_URL.to_string(),
            compress: false,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Enable gzip compression for request bodies.
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    fn build_request(&self, message: &Message) -> Result<SendGridRequest, SendError> {
        message.validate(PROVIDER)?;
        let from = message
            .from
            .as_ref()
            .ok_or_else(|| SendError::invalid_message(PROVIDER, "Missing required field: from"))?;

        let content = vec![
            SendGridContent {
                content_type: "text/plain".to_string(),
                value: message.plain_text(),
            },
            SendGridContent {
                content_type: "text/html".to_string(),
                value: message.html_body.clone(),
            },
        ];

        let mut request = SendGridRequest {
            personalizations: vec![self.build_personalization(message)],
            from: from.into(),
            reply_to: message.reply_to.as_ref().map(SendGridAddress::from),
            subject: message.subject.clone(),
            content,
            attachments: None,
            headers: None,
            template_id: None,
            categories: None,
            tracking_settings: None,
        };

        if !message.attachments.is_empty() {
            request.attachments = Some(
                message
                    .attachments
                    .iter()
                    .map(|a| {
                        let disposition = if a.is_inline() { "inline" } else { "attachment" };
                        SendGridAttachment {
                            content: a.encoded(),
                            filename: a.filename.clone(),
                            content_type: Some(a.mime.clone()),
                            disposition: Some(disposition.to_string()),
                            content_id: a.content_id().map(str::to_string),
                        }
                    })
                    .collect(),
            );
        }

        if !message.headers.is_empty() {
            request.headers = Some(message.headers.clone());
        }

        let options = &message.provider_options;
        if let Some(template_id) = options.get("template_id") {
            request.template_id = template_id.as_str().map(|s| s.to_string());
        }
        if let Some(categories) = options.get("categories") {
            request.categories = serde_json::from_value(categories.clone()).ok();
        }
        if let Some(tracking_settings) = options.get("tracking_settings") {
            request.tracking_settings = Some(tracking_settings.clone());
        }

        Ok(request)
    }

    fn build_personalization(&self, message: &Message) -> SendGridPersonalization {
        let options = &message.provider_options;
        SendGridPersonalization {
            to: message.to.iter().map(SendGridAddress::from).collect(),
            bcc: if message.bcc.is_empty() {
                None
            } else {
                Some(message.bcc.iter().map(SendGridAddress::from).collect())
            },
            dynamic_template_data: options.get("dynamic_template_data").cloned(),
            custom_args: options.get("custom_args").cloned(),
        }
    }

    fn compress_body(&self, body: &[u8]) -> Result<Vec<u8>, SendError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(body)
            .and_then(|_| encoder.finish())
            .map_err(|e| SendError::unavailable(PROVIDER, format!("Failed to compress body: {}", e)))
    }
}

/// Map a non-success status to the adapter's error taxonomy.
///
/// Throttling and server errors mean the provider could not take the message
/// right now; any other client error is a refusal.
fn classify(status: StatusCode, message: String) -> SendError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SendError::unavailable(PROVIDER, message).with_status(status.as_u16())
    } else {
        SendError::rejected(PROVIDER, message, status.as_u16())
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError> {
        let request = self.build_request(message)?;

        let url = format!("{}/mail/send", self.base_url);
        let json_body = serde_json::to_vec(&request)
            .map_err(|e| SendError::invalid_message(PROVIDER, e.to_string()))?;

        let mut req = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("outreach/{}", crate::VERSION));

        let body = if self.compress {
            req = req.header("Content-Encoding", "gzip");
            self.compress_body(&json_body)?
        } else {
            json_body
        };

        let response = req.body(body).send().await?;
        let status = response.status();

        // SendGrid returns 202 Accepted with an empty body on success
        if status.is_success() {
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            return Ok(DeliveryReceipt::new(PROVIDER, message_id));
        }

        let error: SendGridError = response.json().await.unwrap_or_else(|_| SendGridError {
            errors: vec![SendGridErrorDetail {
                message: format!("HTTP {}", status.as_u16()),
            }],
        });

        let error_msg = error
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        Err(classify(status, error_msg))
    }

    async fn verify(&self) -> Result<(), SendError> {
        let response = self
            .client
            .get(format!("{}/scopes", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(classify(status, format!("credential check failed with HTTP {}", status.as_u16())))
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// ============================================================================
// SendGrid API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<SendGridPersonalization>,
    from: SendGridAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<SendGridAddress>,
    subject: String,
    content: Vec<SendGridContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<SendGridAttachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<std::collections::HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_settings: Option<Value>,
}

#[derive(Debug, Serialize)]
struct SendGridPersonalization {
    to: Vec<SendGridAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<Vec<SendGridAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dynamic_template_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_args: Option<Value>,
}

#[derive(Debug, Serialize)]
struct SendGridAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Address> for SendGridAddress {
    fn from(addr: &Address) -> Self {
        Self {
            email: addr.email.clone(),
            name: addr.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendGridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment {
    content: String, // Base64 encoded
    filename: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendGridError {
    errors: Vec<SendGridErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrorDetail {
    message: String,
}
