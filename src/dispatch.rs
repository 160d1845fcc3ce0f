//! Primary/fallback delivery, paced bulk sends and transport health checks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;

use crate::address::Address;
use crate::error::{NewsletterError, SendError, SendErrorKind};
use crate::job::{BulkOutcome, BulkSendJob, Route, SendOutcome};
use crate::mailer::{DeliveryReceipt, Mailer, NoFallback};
use crate::message::Message;
use crate::newsletter::Newsletter;
use crate::recipient::Recipient;

/// Delay between recipients of a bulk job.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Upper bound on a single adapter attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Readiness of each transport, from [`DispatchService::verify_configuration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    pub primary_ready: bool,
    pub fallback_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
}

impl ConfigurationStatus {
    /// At least one transport can take mail.
    pub fn can_send(&self) -> bool {
        self.primary_ready || self.fallback_ready
    }
}

/// Sends through the primary adapter and hands over to the fallback when the
/// primary fails.
///
/// ```rust,ignore
/// use outreach::{DispatchService, Message};
/// use outreach::providers::{SendGridMailer, SmtpMailer};
///
/// let service = DispatchService::with_mailers(
///     SendGridMailer::new(api_key),
///     SmtpMailer::new("smtp.example.org", 587).credentials(user, pass).build()?,
/// )
/// .default_from(("Food Bank", "news@foodbank.org"));
///
/// let outcome = service.send_one(&message).await?;
/// ```
#[derive(Clone)]
pub struct DispatchService {
    primary: Arc<dyn Mailer>,
    fallback: Arc<dyn Mailer>,
    default_from: Option<Address>,
    pacing: Duration,
    attempt_timeout: Duration,
}

impl DispatchService {
    pub fn new(primary: Arc<dyn Mailer>, fallback: Arc<dyn Mailer>) -> Self {
        Self {
            primary,
            fallback,
            default_from: None,
            pacing: DEFAULT_PACING,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_mailers<P, F>(primary: P, fallback: F) -> Self
    where
        P: Mailer + 'static,
        F: Mailer + 'static,
    {
        Self::new(Arc::new(primary), Arc::new(fallback))
    }

    /// A service with no fallback relay. Primary failures are terminal.
    pub fn primary_only<P: Mailer + 'static>(primary: P) -> Self {
        Self::with_mailers(primary, NoFallback)
    }

    /// Sender applied to messages without one.
    pub fn default_from(mut self, from: impl Into<Address>) -> Self {
        self.default_from = Some(from.into());
        self
    }

    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn primary(&self) -> &Arc<dyn Mailer> {
        &self.primary
    }

    pub fn fallback(&self) -> &Arc<dyn Mailer> {
        &self.fallback
    }

    /// Send one message: primary first, then the fallback if the primary
    /// fails for any reason.
    ///
    /// Invalid messages fail before either adapter is called. When both
    /// adapters fail the fallback's error is returned.
    pub async fn send_one(&self, message: &Message) -> Result<SendOutcome, SendError> {
        message.validate("dispatch")?;
        let message = message.clone().with_default_from(self.default_from.as_ref());

        let span = tracing::info_span!(
            "outreach.send_one",
            primary = self.primary.provider_name(),
            fallback = self.fallback.provider_name(),
            to = ?message.destinations(),
            subject = %message.subject,
        );

        async {
            tracing::debug!("Attempting primary provider");
            let primary_error = match self
                .attempt(self.primary.as_ref(), &message, |p, m| SendError::unavailable(p, m))
                .await
            {
                Ok(receipt) => {
                    tracing::info!(message_id = %receipt.message_id, "Email delivered");
                    return Ok(SendOutcome {
                        receipt,
                        route: Route::Primary,
                    });
                }
                Err(e) => e,
            };

            tracing::warn!(error = %primary_error, "Primary provider failed, trying fallback");
            #[cfg(feature = "metrics")]
            metrics::counter!("outreach_fallback_total").increment(1);

            match self
                .attempt(self.fallback.as_ref(), &message, |p, m| {
                    SendError::relay_unavailable(p, m)
                })
                .await
            {
                Ok(receipt) => {
                    tracing::info!(message_id = %receipt.message_id, "Email delivered via fallback");
                    Ok(SendOutcome {
                        receipt,
                        route: Route::Fallback,
                    })
                }
                Err(e) => {
                    tracing::error!(error = %e, "Email delivery failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Send every entry of the job in order, pausing between recipients.
    ///
    /// A failed recipient never stops the run; its terminal error lands in
    /// [`BulkOutcome::per_recipient_errors`].
    pub async fn send_bulk(&self, job: &BulkSendJob) -> BulkOutcome {
        let span = tracing::info_span!("outreach.send_bulk", count = job.len());

        async {
            let mut outcome = BulkOutcome::default();

            for (index, entry) in job.entries.iter().enumerate() {
                if index > 0 && !self.pacing.is_zero() {
                    tokio::time::sleep(self.pacing).await;
                }

                let message = job.message_for(entry);
                let result = self.send_one(&message).await;
                if let Err(e) = &result {
                    tracing::warn!(
                        recipient = %entry.recipient.email,
                        error = %e,
                        "Bulk recipient failed"
                    );
                }
                outcome.record(entry.recipient.clone(), result);
            }

            #[cfg(feature = "metrics")]
            {
                metrics::counter!("outreach_bulk_total", "status" => "sent")
                    .increment(outcome.sent as u64);
                metrics::counter!("outreach_bulk_total", "status" => "failed")
                    .increment(outcome.failed as u64);
            }

            tracing::info!(sent = outcome.sent, failed = outcome.failed, "Bulk send finished");
            outcome
        }
        .instrument(span)
        .await
    }

    /// Send a newsletter to every active recipient.
    ///
    /// The newsletter ends up `sent` when at least one message went out and
    /// `failed` otherwise. Unsubscribed and bounced recipients are skipped and
    /// do not count toward `recipients_count`.
    pub async fn send_newsletter(
        &self,
        newsletter: &mut Newsletter,
        recipients: &[Recipient],
    ) -> Result<BulkOutcome, NewsletterError> {
        newsletter.ensure_sendable()?;

        let mut job = BulkSendJob::new(&newsletter.subject, &newsletter.html_content);
        job.template_id = newsletter.template_id.clone();
        for recipient in recipients.iter().filter(|r| r.is_active()) {
            job = job.add(recipient, recipient.personalization());
        }

        let skipped = recipients.len() - job.len();
        if skipped > 0 {
            tracing::debug!(skipped, newsletter = %newsletter.id, "Skipping inactive recipients");
        }

        let outcome = self.send_bulk(&job).await;
        if outcome.sent > 0 {
            newsletter.mark_sent(outcome.attempted())?;
        } else {
            newsletter.mark_failed()?;
        }
        Ok(outcome)
    }

    /// Check each transport without sending anything.
    pub async fn verify_configuration(&self) -> ConfigurationStatus {
        let primary = self.check(self.primary.as_ref()).await;
        let fallback = self.check(self.fallback.as_ref()).await;

        if let Err(e) = &primary {
            tracing::warn!(error = %e, "Primary provider not ready");
        }
        if let Err(e) = &fallback {
            tracing::warn!(error = %e, "Fallback provider not ready");
        }

        ConfigurationStatus {
            primary_ready: primary.is_ok(),
            fallback_ready: fallback.is_ok(),
            primary_error: primary.err(),
            fallback_error: fallback.err(),
        }
    }

    async fn check(&self, mailer: &dyn Mailer) -> Result<(), String> {
        match tokio::time::timeout(self.attempt_timeout, mailer.verify()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("{} verification timed out", mailer.provider_name())),
        }
    }

    async fn attempt(
        &self,
        mailer: &dyn Mailer,
        message: &Message,
        unavailable: fn(&'static str, String) -> SendError,
    ) -> Result<DeliveryReceipt, SendError> {
        let provider = mailer.provider_name();

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = bounded(self.attempt_timeout, mailer.send(message))
            .await
            .unwrap_or_else(|| {
                Err(unavailable(
                    provider,
                    format!("timed out after {}s", self.attempt_timeout.as_secs_f64()),
                ))
            })
            // Caller fields were checked before the first attempt, so an
            // adapter refusing the message (e.g. no sender) is a setup fault.
            .map_err(|e| match e.kind {
                SendErrorKind::InvalidMessage => unavailable(provider, e.message),
                _ => e,
            });

        #[cfg(feature = "metrics")]
        {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics::counter!("outreach_emails_total", "provider" => provider, "status" => status)
                .increment(1);
            metrics::histogram!("outreach_delivery_duration_seconds", "provider" => provider)
                .record(start.elapsed().as_secs_f64());
        }

        result
    }
}

impl std::fmt::Debug for DispatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchService")
            .field("primary", &self.primary.provider_name())
            .field("fallback", &self.fallback.provider_name())
            .field("default_from", &self.default_from)
            .field("pacing", &self.pacing)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

async fn bounded<T>(limit: Duration, fut: impl Future<Output = T>) -> Option<T> {
    tokio::time::timeout(limit, fut).await.ok()
}
