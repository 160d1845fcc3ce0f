//! Delivery webhook reconciliation.
//!
//! Providers post batches of delivery events (opens, unsubscribes, bounces)
//! after a message went out. Each batch is matched against the recipient
//! store by email and committed in one atomic write.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::error::ReconcileError;
use crate::recipient::Status;
use crate::storage::{RecipientStore, RecipientUpdate};

/// What happened to a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Open,
    Unsubscribe,
    /// Parsed but never applied; bounced status is set by explicit user
    /// action only.
    Bounce,
    Other(String),
}

impl EventKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "open" => Self::Open,
            "unsubscribe" => Self::Unsubscribe,
            "bounce" => Self::Bounce,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Unsubscribe => "unsubscribe",
            Self::Bounce => "bounce",
            Self::Other(kind) => kind,
        }
    }
}

/// A single provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub email: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryEvent {
    pub fn new(email: impl Into<String>, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            kind,
            timestamp,
        }
    }

    pub fn open(email: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(email, EventKind::Open, timestamp)
    }

    pub fn unsubscribe(email: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(email, EventKind::Unsubscribe, timestamp)
    }
}

/// Parse a webhook body: a JSON array of objects with string `email` and
/// `event` fields and an optional unix `timestamp`.
///
/// Events without a timestamp are stamped with the current time. Any other
/// shape is rejected as a whole.
pub fn parse_events(body: &[u8]) -> Result<Vec<DeliveryEvent>, ReconcileError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(ReconcileError::MalformedPayload(
            "expected an array of events".into(),
        ));
    };

    let now = Utc::now();
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_event(index, item, now))
        .collect()
}

fn parse_event(index: usize, item: &Value, now: DateTime<Utc>) -> Result<DeliveryEvent, ReconcileError> {
    let malformed = |what: &str| ReconcileError::MalformedPayload(format!("event {}: {}", index, what));

    let object = item.as_object().ok_or_else(|| malformed("not an object"))?;
    let email = object
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing email"))?;
    let kind = object
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing event"))?;

    let timestamp = match object.get("timestamp") {
        None | Some(Value::Null) => now,
        Some(ts) => ts
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| malformed("invalid timestamp"))?,
    };

    Ok(DeliveryEvent::new(email, EventKind::parse(kind), timestamp))
}

/// Counts from one reconciled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Events turned into recipient updates.
    pub applied: usize,
    /// Actionable events with no matching recipient.
    pub unmatched: usize,
    /// Events of a kind that causes no change.
    pub ignored: usize,
}

/// Applies delivery events to the recipient store.
#[derive(Debug, Clone)]
pub struct Reconciler<S> {
    store: S,
}

impl<S: RecipientStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parse and reconcile a raw webhook body.
    pub async fn reconcile_payload(&self, body: &[u8]) -> Result<ReconcileSummary, ReconcileError> {
        let events = parse_events(body)?;
        self.reconcile(&events).await
    }

    /// Apply a batch of events.
    ///
    /// Events for unknown emails are skipped silently. Every resulting update
    /// is committed together; when the commit fails nothing is applied.
    pub async fn reconcile(
        &self,
        events: &[DeliveryEvent],
    ) -> Result<ReconcileSummary, ReconcileError> {
        let span = tracing::info_span!("outreach.reconcile", events = events.len());
        self.apply_batch(events).instrument(span).await
    }

    async fn apply_batch(
        &self,
        events: &[DeliveryEvent],
    ) -> Result<ReconcileSummary, ReconcileError> {
        let mut summary = ReconcileSummary::default();
        let mut updates = Vec::new();
        let mut ids: HashMap<&str, Option<String>> = HashMap::new();

        for event in events {
            #[cfg(feature = "metrics")]
            metrics::counter!("outreach_webhook_events_total", "kind" => event.kind.as_str().to_string())
                .increment(1);

            if !matches!(event.kind, EventKind::Open | EventKind::Unsubscribe) {
                tracing::debug!(kind = event.kind.as_str(), "Ignoring delivery event");
                summary.ignored += 1;
                continue;
            }

            let id = match ids.get(event.email.as_str()) {
                Some(id) => id.clone(),
                None => {
                    let id = self
                        .store
                        .find_by_email(&event.email)
                        .await?
                        .map(|r| r.id);
                    ids.insert(&event.email, id.clone());
                    id
                }
            };

            let Some(id) = id else {
                tracing::debug!(email = %event.email, "No recipient for delivery event");
                summary.unmatched += 1;
                continue;
            };

            updates.push(match event.kind {
                EventKind::Open => RecipientUpdate::RecordOpen {
                    id,
                    at: event.timestamp,
                },
                _ => RecipientUpdate::SetStatus {
                    id,
                    status: Status::Unsubscribed,
                },
            });
            summary.applied += 1;
        }

        if !updates.is_empty() {
            if let Err(e) = self.store.apply(&updates).await {
                tracing::error!(error = %e, "Failed to commit delivery events");
                return Err(e.into());
            }
        }

        tracing::info!(
            applied = summary.applied,
            unmatched = summary.unmatched,
            ignored = summary.ignored,
            "Delivery events reconciled"
        );
        Ok(summary)
    }
}
