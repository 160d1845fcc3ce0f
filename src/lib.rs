//! # Outreach
//!
//! Email dispatch for nonprofit outreach: transactional and bulk sends
//! through a primary provider with an SMTP fallback, bracket-token
//! personalization and delivery webhook reconciliation.
//!
//! ## Quick Start
//!
//! ```bash
//! EMAIL_PROVIDER=sendgrid
//! SENDGRID_API_KEY=SG.xxxxx
//! SMTP_HOST=smtp.example.org
//! SMTP_USERNAME=relay
//! SMTP_PASSWORD=secret
//! EMAIL_FROM=news@foodbank.org
//! EMAIL_FROM_NAME=Food Bank
//! ```
//!
//! ```rust,ignore
//! use outreach::{DispatchConfig, Message};
//!
//! let service = DispatchConfig::from_env()?.into_service()?;
//!
//! let message = Message::new()
//!     .to("ada@example.org")
//!     .subject("Thank you, [DONOR_NAME]")
//!     .html_body("<p>Your gift of [AMOUNT] keeps the pantry open.</p>");
//!
//! let outcome = service.send_one(&outreach::render_message(&message, &vars)).await?;
//! ```
//!
//! The service is an ordinary value. Build one per application and share it;
//! there is no global mailer.
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_PROVIDER` | Primary: `sendgrid`, `smtp`, `logger`, `logger_full`, `local` |
//! | `EMAIL_FALLBACK_PROVIDER` | Fallback: same as above, or `none` |
//! | `SENDGRID_API_KEY` | SendGrid API key |
//! | `SMTP_HOST` | SMTP relay host |
//! | `SMTP_PORT` | SMTP relay port (default: 587) |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |
//! | `EMAIL_FROM` | Default sender email (required when sendgrid or smtp is configured) |
//! | `EMAIL_FROM_NAME` | Default sender name |
//! | `EMAIL_BULK_DELAY_MS` | Delay between bulk recipients (default: 100) |
//! | `EMAIL_TIMEOUT_SECS` | Per-attempt timeout (default: 30) |
//!
//! ## Feature Flags
//!
//! - `sendgrid` - SendGrid v3 API adapter (default)
//! - `smtp` - SMTP relay adapter via lettre (default)
//! - `server` - axum routes for send, verify and webhook (default)
//! - `templates` - Built-in askama transactional templates
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `outreach_emails_total` | Counter | provider, status | Adapter attempts |
//! | `outreach_fallback_total` | Counter | | Primary failures handed to the fallback |
//! | `outreach_bulk_total` | Counter | status | Bulk recipients by result |
//! | `outreach_webhook_events_total` | Counter | kind | Delivery events received |
//! | `outreach_delivery_duration_seconds` | Histogram | provider | Adapter attempt duration |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the outreach crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod attachment;
mod config;
mod dispatch;
mod error;
mod job;
mod mailer;
mod message;
mod newsletter;
mod recipient;
mod storage;
mod template;
mod webhook;

pub mod providers;
pub mod testing;

#[cfg(feature = "server")]
pub mod server;

pub use address::{is_valid_email, Address, ToAddress};
pub use attachment::{Attachment, Disposition, MAX_ATTACHMENT_BYTES};
pub use config::{DispatchConfig, ProviderConfig};
pub use dispatch::{ConfigurationStatus, DispatchService, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_PACING};
pub use error::{
    ConfigError, NewsletterError, ReconcileError, RecipientError, SendError, SendErrorKind,
    StoreError,
};
pub use job::{BulkEntry, BulkOutcome, BulkSendJob, Route, SendOutcome};
pub use mailer::{DeliveryReceipt, Mailer, NoFallback};
pub use message::{strip_tags, Message};
pub use newsletter::{Newsletter, NewsletterStatus};
pub use recipient::{Category, NewRecipient, Recipient, RecipientMetadata, Status};
pub use storage::{import_recipients, ImportReport, MemoryRecipientStore, RecipientStore, RecipientUpdate};
pub use template::{render, render_message, Variables};
pub use webhook::{parse_events, DeliveryEvent, EventKind, ReconcileSummary, Reconciler};

#[cfg(feature = "templates")]
pub use template::{DonationReceipt, TransactionalTemplate, Welcome};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        render, render_message, Address, BulkSendJob, DeliveryReceipt, DispatchConfig,
        DispatchService, Mailer, Message, Recipient, RecipientStore, SendError, SendErrorKind,
        ToAddress, Variables,
    };
}
