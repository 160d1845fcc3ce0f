//! Local mailer for development and testing.
//!
//! Captures messages in memory instead of sending them, counts every attempt
//! (including failed ones) and can be told to fail, either always or only for
//! specific destinations.
//!
//! ```rust,ignore
//! use outreach::providers::LocalMailer;
//! use outreach::testing::*;
//!
//! #[tokio::test]
//! async fn sends_receipt() {
//!     let mailer = LocalMailer::new();
//!
//!     send_receipt(&mailer, "ada@example.org").await;
//!
//!     assert_email_sent(&mailer);
//!     assert_email_to(&mailer, "ada@example.org");
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{SendError, SendErrorKind};
use crate::mailer::{DeliveryReceipt, Mailer};
use crate::message::Message;

/// A captured message.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: String,
    pub message: Message,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<SentMessage>,
    attempts: Vec<Message>,
    fail_with: Option<(SendErrorKind, String)>,
    fail_for: HashSet<String>,
}

/// Local mailer that stores messages in memory.
///
/// Clones share state, so a test can hand one clone to the dispatch service
/// and keep another for assertions.
#[derive(Debug, Clone)]
pub struct LocalMailer {
    name: &'static str,
    state: Arc<RwLock<State>>,
}

impl LocalMailer {
    pub fn new() -> Self {
        Self::named("local")
    }

    /// Create a mailer reporting `name` as its provider, e.g. to tell a
    /// primary and a fallback apart in tests.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    // =========================================================================
    // Failure Simulation
    // =========================================================================

    /// Fail every send with `kind`.
    pub fn set_failure(&self, kind: SendErrorKind, message: impl Into<String>) {
        self.state.write().fail_with = Some((kind, message.into()));
    }

    /// Fail sends to this destination with the configured failure kind
    /// (or `ProviderUnavailable` when none is set).
    pub fn fail_for(&self, email: impl Into<String>) {
        self.state.write().fail_for.insert(email.into().to_lowercase());
    }

    pub fn clear_failure(&self) {
        let mut state = self.state.write();
        state.fail_with = None;
        state.fail_for.clear();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Successfully captured messages, oldest first.
    pub fn emails(&self) -> Vec<SentMessage> {
        self.state.read().sent.clone()
    }

    pub fn last_email(&self) -> Option<SentMessage> {
        self.state.read().sent.last().cloned()
    }

    pub fn email_count(&self) -> usize {
        self.state.read().sent.len()
    }

    pub fn has_emails(&self) -> bool {
        self.email_count() > 0
    }

    /// Every message handed to [`Mailer::send`], in call order, including
    /// ones that failed validation or simulated failure.
    pub fn attempts(&self) -> Vec<Message> {
        self.state.read().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.state.read().attempts.len()
    }

    /// Check if a message was captured for this destination.
    pub fn sent_to(&self, email: &str) -> bool {
        self.state.read().sent.iter().any(|stored| {
            stored
                .message
                .to
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }

    /// Find captured messages matching a predicate.
    pub fn find_emails<F>(&self, predicate: F) -> Vec<SentMessage>
    where
        F: Fn(&Message) -> bool,
    {
        self.state
            .read()
            .sent
            .iter()
            .filter(|stored| predicate(&stored.message))
            .cloned()
            .collect()
    }

    /// Remove and return all captured messages and attempts.
    pub fn flush(&self) -> Vec<SentMessage> {
        let mut state = self.state.write();
        state.attempts.clear();
        std::mem::take(&mut state.sent)
    }

    fn simulated_failure(&self, state: &State, message: &Message) -> Option<SendError> {
        if let Some((kind, text)) = &state.fail_with {
            if state.fail_for.is_empty() {
                return Some(SendError::new(*kind, self.name, text.clone()));
            }
        }

        let blocked = message
            .to
            .iter()
            .find(|a| state.fail_for.contains(&a.email.to_lowercase()))?;
        let (kind, text) = state.fail_with.clone().unwrap_or((
            SendErrorKind::ProviderUnavailable,
            "simulated failure".to_string(),
        ));
        Some(SendError::new(kind, self.name, format!("{} ({})", text, blocked.email)))
    }
}

impl Default for LocalMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, SendError> {
        let mut state = self.state.write();
        state.attempts.push(message.clone());

        message.validate(self.name)?;
        if let Some(err) = self.simulated_failure(&state, message) {
            return Err(err);
        }

        let id = uuid::Uuid::new_v4().to_string();
        state.sent.push(SentMessage {
            id: id.clone(),
            message: message.clone(),
            sent_at: Utc::now(),
        });

        Ok(DeliveryReceipt::new(self.name, id))
    }

    async fn verify(&self) -> Result<(), SendError> {
        match &self.state.read().fail_with {
            Some((kind, text)) => Err(SendError::new(*kind, self.name, text.clone())),
            None => Ok(()),
        }
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}
