//! Transport adapters.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait.
//!
//! | Provider | Feature Flag | Role |
//! |----------|-------------|------|
//! | [`SendGridMailer`] | `sendgrid` | Primary: SendGrid v3 API |
//! | [`SmtpMailer`] | `smtp` | Fallback: SMTP relay via lettre |
//! | [`LocalMailer`] | (none) | In-memory capture for dev/testing |
//! | [`LoggerMailer`] | (none) | Logs messages without sending |

#[cfg(feature = "sendgrid")]
mod sendgrid;
#[cfg(feature = "sendgrid")]
pub use sendgrid::SendGridMailer;

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpBuilder, SmtpMailer, TlsMode};

mod local;
pub use local::{LocalMailer, SentMessage};

mod logger;
pub use logger::LoggerMailer;
