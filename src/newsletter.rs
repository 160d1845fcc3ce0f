//! Newsletters: reusable campaign copy with send-state tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NewsletterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsletterStatus {
    #[default]
    Draft,
    Scheduled,
    Sent,
    Failed,
}

impl NewsletterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// A named campaign owned by one author.
///
/// Content changes only while in [`NewsletterStatus::Draft`]. `Sent` is
/// terminal, and `recipients_count` is fixed when the newsletter is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub author_id: String,
    pub status: NewsletterStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipients_count: usize,
    pub open_count: u32,
    pub click_count: u32,
    /// Provider template used instead of `html_content` when set.
    pub template_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Newsletter {
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<String>,
        html_content: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            subject: subject.into(),
            html_content: html_content.into(),
            author_id: author_id.into(),
            status: NewsletterStatus::Draft,
            scheduled_for: None,
            sent_at: None,
            recipients_count: 0,
            open_count: 0,
            click_count: 0,
            template_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_template_id(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Replace subject and content.
    pub fn edit(
        &mut self,
        subject: impl Into<String>,
        html_content: impl Into<String>,
    ) -> Result<(), NewsletterError> {
        if self.status != NewsletterStatus::Draft {
            return Err(NewsletterError::NotDraft(self.status.as_str()));
        }
        self.subject = subject.into();
        self.html_content = html_content.into();
        self.touch();
        Ok(())
    }

    pub fn schedule(&mut self, at: DateTime<Utc>) -> Result<(), NewsletterError> {
        if self.status != NewsletterStatus::Draft {
            return Err(self.transition_error(NewsletterStatus::Scheduled));
        }
        self.status = NewsletterStatus::Scheduled;
        self.scheduled_for = Some(at);
        self.touch();
        Ok(())
    }

    /// Back to draft, dropping the schedule.
    pub fn unschedule(&mut self) -> Result<(), NewsletterError> {
        if self.status != NewsletterStatus::Scheduled {
            return Err(self.transition_error(NewsletterStatus::Draft));
        }
        self.status = NewsletterStatus::Draft;
        self.scheduled_for = None;
        self.touch();
        Ok(())
    }

    /// Fails unless the newsletter can go through a bulk send.
    ///
    /// Draft, scheduled and previously failed newsletters can be sent.
    pub fn ensure_sendable(&self) -> Result<(), NewsletterError> {
        match self.status {
            NewsletterStatus::Sent => Err(self.transition_error(NewsletterStatus::Sent)),
            _ => Ok(()),
        }
    }

    pub fn mark_sent(&mut self, attempted: usize) -> Result<(), NewsletterError> {
        self.ensure_sendable()?;
        let now = Utc::now();
        self.status = NewsletterStatus::Sent;
        self.recipients_count = attempted;
        self.sent_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), NewsletterError> {
        if self.status == NewsletterStatus::Sent {
            return Err(self.transition_error(NewsletterStatus::Failed));
        }
        self.status = NewsletterStatus::Failed;
        self.touch();
        Ok(())
    }

    pub fn record_open(&mut self) {
        self.open_count = self.open_count.saturating_add(1);
        self.touch();
    }

    pub fn record_click(&mut self) {
        self.click_count = self.click_count.saturating_add(1);
        self.touch();
    }

    fn transition_error(&self, to: NewsletterStatus) -> NewsletterError {
        NewsletterError::InvalidTransition {
            from: self.status.as_str(),
            to: to.as_str(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> Newsletter {
        Newsletter::new("Spring appeal", "Spring is here", "<p>Hi [NAME]</p>", "author-1")
    }

    #[test]
    fn test_edit_only_in_draft() {
        let mut newsletter = draft();
        newsletter.edit("New subject", "<p>New</p>").unwrap();
        assert_eq!(newsletter.subject, "New subject");

        newsletter.schedule(Utc::now()).unwrap();
        let err = newsletter.edit("Again", "<p>Again</p>").unwrap_err();
        assert_eq!(err, NewsletterError::NotDraft("scheduled"));
        assert_eq!(newsletter.subject, "New subject");
    }

    #[test]
    fn test_mark_sent_freezes_count() {
        let mut newsletter = draft();
        newsletter.mark_sent(42).unwrap();

        assert_eq!(newsletter.status, NewsletterStatus::Sent);
        assert_eq!(newsletter.recipients_count, 42);
        assert!(newsletter.sent_at.is_some());

        assert!(newsletter.mark_sent(1).is_err());
        assert!(newsletter.mark_failed().is_err());
        assert_eq!(newsletter.recipients_count, 42);
    }

    #[test]
    fn test_failed_can_be_retried() {
        let mut newsletter = draft();
        newsletter.mark_failed().unwrap();
        assert!(newsletter.ensure_sendable().is_ok());
        newsletter.mark_sent(3).unwrap();
        assert_eq!(newsletter.status, NewsletterStatus::Sent);
    }

    #[test]
    fn test_schedule_and_unschedule() {
        let mut newsletter = draft();
        let at = Utc::now();
        newsletter.schedule(at).unwrap();
        assert_eq!(newsletter.scheduled_for, Some(at));
        assert!(newsletter.schedule(at).is_err());

        newsletter.unschedule().unwrap();
        assert_eq!(newsletter.status, NewsletterStatus::Draft);
        assert_eq!(newsletter.scheduled_for, None);
    }

    #[test]
    fn test_counters() {
        let mut newsletter = draft();
        newsletter.record_open();
        newsletter.record_open();
        newsletter.record_click();
        assert_eq!(newsletter.open_count, 2);
        assert_eq!(newsletter.click_count, 1);

        newsletter.open_count = u32::MAX;
        newsletter.click_count = u32::MAX;
        newsletter.record_open();
        newsletter.record_click();
        assert_eq!(newsletter.open_count, u32::MAX);
        assert_eq!(newsletter.click_count, u32::MAX);
    }
}
