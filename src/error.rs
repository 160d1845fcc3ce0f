//! Error types for outreach.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classification of a failed send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendErrorKind {
    /// Caller-side contract violation (missing destination, subject or body).
    /// Never retried.
    InvalidMessage,
    /// The primary provider answered and refused the message.
    ProviderRejected,
    /// The primary provider could not be reached, timed out or is overloaded.
    ProviderUnavailable,
    /// The fallback relay could not accept the message.
    RelayUnavailable,
}

impl SendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessage => "invalid_message",
            Self::ProviderRejected => "provider_rejected",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::RelayUnavailable => "relay_unavailable",
        }
    }
}

impl fmt::Display for SendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed send attempt through one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({provider}): {message}")]
pub struct SendError {
    pub kind: SendErrorKind,
    /// Name of the adapter that produced the error.
    pub provider: &'static str,
    pub message: String,
    /// HTTP status, when the transport is HTTP-based.
    pub status: Option<u16>,
}

impl SendError {
    pub fn new(kind: SendErrorKind, provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider,
            message: message.into(),
            status: None,
        }
    }

    pub fn invalid_message(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(SendErrorKind::InvalidMessage, provider, message)
    }

    pub fn rejected(provider: &'static str, message: impl Into<String>, status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(SendErrorKind::ProviderRejected, provider, message)
        }
    }

    pub fn unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(SendErrorKind::ProviderUnavailable, provider, message)
    }

    pub fn relay_unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(SendErrorKind::RelayUnavailable, provider, message)
    }

    /// Attach an HTTP status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_invalid_message(&self) -> bool {
        self.kind == SendErrorKind::InvalidMessage
    }
}

#[cfg(feature = "sendgrid")]
impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let error = Self::unavailable("sendgrid", err.to_string());
        match status {
            Some(status) => error.with_status(status),
            None => error,
        }
    }
}

/// Configuration error (missing env var, unknown provider, disabled feature).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("Unknown email provider: {0}")]
    UnknownProvider(String),

    #[error("Provider '{provider}' requires the '{feature}' feature")]
    FeatureDisabled {
        provider: &'static str,
        feature: &'static str,
    },

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    /// The adapter's client could not be constructed.
    #[error("Failed to set up {provider} transport: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
}

/// Recipient store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store rejected or could not complete the write.
    #[error("Recipient store unavailable: {0}")]
    Unavailable(String),

    #[error("Recipient not found: {0}")]
    NotFound(String),

    #[error("Recipient already exists: {0}")]
    Conflict(String),
}

/// Failure while applying a batch of delivery events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The payload is not a sequence of event objects. Nothing was looked up.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// The batch commit failed; no event of the batch was applied.
    #[error("Failed to persist delivery events: {0}")]
    Persistence(#[from] StoreError),
}

/// Rejected recipient create/import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipientError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Illegal newsletter state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NewsletterError {
    #[error("Newsletter can only be edited while in draft (currently {0})")]
    NotDraft(&'static str),

    #[error("Cannot move newsletter from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
