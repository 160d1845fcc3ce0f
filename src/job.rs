//! Bulk send jobs and send outcomes.

use serde::Serialize;

use crate::address::{Address, ToAddress};
use crate::error::SendError;
use crate::mailer::DeliveryReceipt;
use crate::message::Message;
use crate::template::{render_message, Variables};

/// Which adapter accepted a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Primary,
    Fallback,
}

/// Result of a successful single send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendOutcome {
    pub receipt: DeliveryReceipt,
    pub route: Route,
}

impl SendOutcome {
    pub fn used_fallback(&self) -> bool {
        self.route == Route::Fallback
    }
}

/// One recipient of a bulk job and the values substituted into its copy.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkEntry {
    pub recipient: Address,
    pub variables: Variables,
}

/// A batch of messages sharing subject and body, personalized per recipient.
///
/// ```
/// use outreach::{BulkSendJob, Variables};
///
/// let mut vars = Variables::new();
/// vars.insert("DONOR_NAME".into(), "Ada".into());
///
/// let job = BulkSendJob::new("Thanks, [DONOR_NAME]", "<p>Dear [DONOR_NAME]</p>")
///     .add("ada@example.org", vars);
///
/// let message = job.message_for(&job.entries[0]);
/// assert_eq!(message.subject, "Thanks, Ada");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSendJob {
    /// Processed in this order.
    pub entries: Vec<BulkEntry>,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    /// Provider-side template identifier, passed through to adapters that
    /// understand one.
    pub template_id: Option<String>,
    pub from: Option<Address>,
}

impl BulkSendJob {
    pub fn new(subject: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            html_body: html_body.into(),
            ..Default::default()
        }
    }

    /// Append a recipient with its personalization values.
    pub fn add(mut self, recipient: impl ToAddress, variables: Variables) -> Self {
        self.entries.push(BulkEntry {
            recipient: recipient.to_address(),
            variables,
        });
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    pub fn template_id(mut self, id: impl Into<String>) -> Self {
        self.template_id = Some(id.into());
        self
    }

    pub fn from(mut self, addr: impl ToAddress) -> Self {
        self.from = Some(addr.to_address());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The personalized message for one entry.
    pub fn message_for(&self, entry: &BulkEntry) -> Message {
        let mut template = Message::new()
            .to(&entry.recipient)
            .subject(&self.subject)
            .html_body(&self.html_body);
        template.text_body = self.text_body.clone();
        template.from = self.from.clone();

        let mut message = render_message(&template, &entry.variables);
        if let Some(template_id) = &self.template_id {
            message = message
                .provider_option("template_id", template_id.as_str())
                .provider_option(
                    "dynamic_template_data",
                    serde_json::to_value(&entry.variables).unwrap_or_default(),
                );
        }
        message
    }
}

/// Tally of a bulk run. Every entry is either sent or failed.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub sent: usize,
    pub failed: usize,
    /// Terminal error for each failed recipient, in job order.
    pub per_recipient_errors: Vec<(Address, SendError)>,
    pub receipts: Vec<(Address, SendOutcome)>,
}

impl BulkOutcome {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }

    pub fn all_sent(&self) -> bool {
        self.failed == 0
    }

    pub(crate) fn record(&mut self, recipient: Address, result: Result<SendOutcome, SendError>) {
        match result {
            Ok(outcome) => {
                self.sent += 1;
                self.receipts.push((recipient, outcome));
            }
            Err(e) => {
                self.failed += 1;
                self.per_recipient_errors.push((recipient, e));
            }
        }
    }
}
