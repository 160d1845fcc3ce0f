//! Assertion helpers over [`LocalMailer`].
//!
//! ```rust,ignore
//! use outreach::providers::LocalMailer;
//! use outreach::testing::*;
//!
//! #[tokio::test]
//! async fn receipt_goes_out_through_the_relay() {
//!     let primary = LocalMailer::named("sendgrid");
//!     let relay = LocalMailer::named("smtp");
//!     primary.set_failure(SendErrorKind::ProviderUnavailable, "503");
//!
//!     // ... send a receipt through a DispatchService built on both ...
//!
//!     assert_attempt_count(&primary, 1);
//!     assert_email_to(&relay, "ada@example.org");
//!     assert_email_subject_contains(&relay, "Thank you");
//! }
//! ```
//!
//! "Last" always means the most recently captured message.

use regex::Regex;

use crate::message::Message;
use crate::providers::{LocalMailer, SentMessage};

fn summary(sent: &[SentMessage]) -> String {
    if sent.is_empty() {
        return "  (no emails sent)".to_string();
    }

    sent.iter()
        .enumerate()
        .map(|(i, stored)| {
            let m = &stored.message;
            format!(
                "  {}. To: [{}], From: {}, Subject: \"{}\"",
                i + 1,
                m.destinations().join(", "),
                m.from.as_ref().map(|a| a.email.as_str()).unwrap_or("<none>"),
                m.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn addressed_to(message: &Message, email: &str) -> bool {
    message.to.iter().any(|a| a.email.eq_ignore_ascii_case(email))
}

/// The most recent captured message.
///
/// # Panics
///
/// Panics if nothing was sent.
pub fn last_email(mailer: &LocalMailer) -> SentMessage {
    match mailer.last_email() {
        Some(sent) => sent,
        None => panic!("Expected at least one email to be sent, but none were sent"),
    }
}

/// Assert that at least one email was sent.
pub fn assert_email_sent(mailer: &LocalMailer) {
    assert!(
        mailer.has_emails(),
        "Expected at least one email to be sent, but none were sent"
    );
}

/// Assert that nothing was sent.
pub fn assert_no_emails_sent(mailer: &LocalMailer) {
    let sent = mailer.emails();
    assert!(
        sent.is_empty(),
        "Expected no emails to be sent, but {} were sent.\n\nEmails sent:\n{}",
        sent.len(),
        summary(&sent)
    );
}

/// Assert exactly `expected` messages were captured.
pub fn assert_email_count(mailer: &LocalMailer, expected: usize) {
    let sent = mailer.emails();
    assert!(
        sent.len() == expected,
        "Expected {} email(s) to be sent, but {} were sent.\n\nEmails sent:\n{}",
        expected,
        sent.len(),
        summary(&sent)
    );
}

/// Assert the mailer was called exactly `expected` times, failures included.
pub fn assert_attempt_count(mailer: &LocalMailer, expected: usize) {
    let actual = mailer.attempt_count();
    assert!(
        actual == expected,
        "Expected {} send attempt(s) on '{}', but there were {}.\n\nEmails sent:\n{}",
        expected,
        crate::mailer::Mailer::provider_name(mailer),
        actual,
        summary(&mailer.emails())
    );
}

/// Assert that the mailer was never called.
pub fn assert_not_attempted(mailer: &LocalMailer) {
    assert_attempt_count(mailer, 0);
}

/// Assert that a message was sent to `email` (case-insensitive).
pub fn assert_email_to(mailer: &LocalMailer, email: &str) {
    let sent = mailer.emails();
    assert!(
        sent.iter().any(|s| addressed_to(&s.message, email)),
        "Expected an email to be sent to '{}'.\n\nEmails sent:\n{}",
        email,
        summary(&sent)
    );
}

/// Assert that nothing was sent to `email`.
pub fn refute_email_to(mailer: &LocalMailer, email: &str) {
    let sent = mailer.emails();
    if let Some(found) = sent.iter().find(|s| addressed_to(&s.message, email)) {
        panic!(
            "Expected no email to be sent to '{}', but found one with subject \"{}\".\n\nAll emails:\n{}",
            email,
            found.message.subject,
            summary(&sent)
        );
    }
}

pub fn assert_email_subject(mailer: &LocalMailer, subject: &str) {
    let sent = mailer.emails();
    assert!(
        sent.iter().any(|s| s.message.subject == subject),
        "Expected an email with subject '{}'.\n\nEmails sent:\n{}",
        subject,
        summary(&sent)
    );
}

pub fn assert_email_subject_contains(mailer: &LocalMailer, text: &str) {
    let sent = mailer.emails();
    assert!(
        sent.iter().any(|s| s.message.subject.contains(text)),
        "Expected an email with subject containing '{}'.\n\nEmails sent:\n{}",
        text,
        summary(&sent)
    );
}

/// Assert the last message came from `from_email`.
pub fn assert_email_from(mailer: &LocalMailer, from_email: &str) {
    let last = last_email(mailer);
    let actual = last
        .message
        .from
        .as_ref()
        .map(|a| a.email.as_str())
        .unwrap_or("<none>");

    assert!(
        actual.eq_ignore_ascii_case(from_email),
        "Expected last email from '{}', but was from '{}'",
        from_email,
        actual
    );
}

/// Assert the last message's HTML body contains `text`.
pub fn assert_email_html_contains(mailer: &LocalMailer, text: &str) {
    let last = last_email(mailer);
    let html = &last.message.html_body;
    assert!(
        html.contains(text),
        "Expected HTML body to contain '{}'.\n\nHTML body (first 500 chars):\n{}",
        text,
        html.chars().take(500).collect::<String>()
    );
}

/// Assert the last message's plain text (explicit or derived) contains `text`.
pub fn assert_email_text_contains(mailer: &LocalMailer, text: &str) {
    let body = last_email(mailer).message.plain_text();
    assert!(
        body.contains(text),
        "Expected text body to contain '{}'.\n\nText body (first 500 chars):\n{}",
        text,
        body.chars().take(500).collect::<String>()
    );
}

/// Assert no bracket token survived rendering in the last message.
pub fn assert_fully_rendered(mailer: &LocalMailer) {
    let last = last_email(mailer);
    let token = Regex::new(r"\[[A-Z][A-Z0-9_]*\]").expect("token pattern is valid");

    for (part, text) in [("subject", &last.message.subject), ("HTML body", &last.message.html_body)] {
        if let Some(found) = token.find(text) {
            panic!("Unrendered token {} left in {}: {}", found.as_str(), part, text);
        }
    }
}

pub fn assert_email_subject_matches(mailer: &LocalMailer, pattern: &str) {
    let last = last_email(mailer);
    let re = Regex::new(pattern).expect("Invalid regex pattern");
    assert!(
        re.is_match(&last.message.subject),
        "Expected subject to match pattern '{}', but was '{}'",
        pattern,
        last.message.subject
    );
}

/// Assert a message matching `predicate` was sent.
pub fn assert_email_matches<F>(mailer: &LocalMailer, predicate: F)
where
    F: Fn(&Message) -> bool,
{
    assert!(
        !mailer.find_emails(predicate).is_empty(),
        "Expected an email matching the predicate, but none was found.\n\nEmails sent:\n{}",
        summary(&mailer.emails())
    );
}

/// All messages sent to `email`.
pub fn emails_to(mailer: &LocalMailer, email: &str) -> Vec<SentMessage> {
    mailer.find_emails(|m| addressed_to(m, email))
}
