//! Local adapter tests.

use outreach::providers::LocalMailer;
use outreach::{Mailer, Message, SendErrorKind};

fn message(to: &str) -> Message {
    Message::new()
        .from("news@foodbank.org")
        .to(to)
        .subject("Volunteer shift reminder")
        .html_body("<p>See you Saturday!</p>")
}

#[tokio::test]
async fn captures_sent_messages_in_order() {
    let mailer = LocalMailer::new();

    mailer.send(&message("ada@example.org")).await.unwrap();
    mailer.send(&message("bob@example.org")).await.unwrap();

    let sent = mailer.emails();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].message.to[0].email, "ada@example.org");
    assert_eq!(mailer.last_email().unwrap().message.to[0].email, "bob@example.org");
}

#[tokio::test]
async fn receipt_id_matches_captured_message() {
    let mailer = LocalMailer::new();
    let receipt = mailer.send(&message("ada@example.org")).await.unwrap();

    assert_eq!(receipt.provider, "local");
    assert_eq!(mailer.emails()[0].id, receipt.message_id);
}

#[tokio::test]
async fn invalid_message_is_attempted_but_not_captured() {
    let mailer = LocalMailer::new();

    let err = mailer.send(&message("ada@example.org").subject("")).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::InvalidMessage);
    assert_eq!(mailer.attempt_count(), 1);
    assert_eq!(mailer.email_count(), 0);
}

#[tokio::test]
async fn fail_for_only_blocks_listed_destination() {
    let mailer = LocalMailer::named("smtp");
    mailer.set_failure(SendErrorKind::RelayUnavailable, "mailbox full");
    mailer.fail_for("Bob@Example.org");

    assert!(mailer.send(&message("ada@example.org")).await.is_ok());

    let err = mailer.send(&message("bob@example.org")).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::RelayUnavailable);
    assert_eq!(err.provider, "smtp");
    assert!(err.message.contains("bob@example.org"));

    assert!(mailer.sent_to("ada@example.org"));
    assert!(!mailer.sent_to("bob@example.org"));
}

#[tokio::test]
async fn clones_share_state() {
    let mailer = LocalMailer::new();
    let handle = mailer.clone();

    mailer.send(&message("ada@example.org")).await.unwrap();
    assert_eq!(handle.email_count(), 1);

    let flushed = handle.flush();
    assert_eq!(flushed.len(), 1);
    assert_eq!(mailer.email_count(), 0);
    assert_eq!(mailer.attempt_count(), 0);
}

#[tokio::test]
async fn verify_reflects_failure_mode() {
    let mailer = LocalMailer::new();
    assert!(mailer.verify().await.is_ok());

    mailer.set_failure(SendErrorKind::ProviderUnavailable, "down");
    assert!(mailer.verify().await.is_err());

    mailer.clear_failure();
    assert!(mailer.verify().await.is_ok());
}
