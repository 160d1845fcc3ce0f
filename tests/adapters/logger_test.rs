//! Logger adapter tests.

use outreach::providers::LoggerMailer;
use outreach::{Mailer, Message, SendErrorKind};

fn message() -> Message {
    Message::new()
        .from("news@foodbank.org")
        .to("ada@example.org")
        .bcc("board@foodbank.org")
        .subject("Board meeting notes")
        .html_body("<h1>Notes</h1>")
}

#[tokio::test]
async fn send_returns_receipt() {
    let receipt = LoggerMailer::new().send(&message()).await.unwrap();

    assert!(!receipt.message_id.is_empty());
    assert_eq!(receipt.provider, "logger");
}

#[tokio::test]
async fn full_logging_returns_receipt() {
    let receipt = LoggerMailer::full().send(&message()).await.unwrap();
    assert!(!receipt.message_id.is_empty());
}

#[tokio::test]
async fn missing_destination_is_invalid() {
    let err = LoggerMailer::new()
        .send(&Message::new().subject("Hi").html_body("<p>Hi</p>"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, SendErrorKind::InvalidMessage);
    assert_eq!(err.message, "Missing required field: to");
}

#[tokio::test]
async fn verify_always_succeeds() {
    assert!(LoggerMailer::new().verify().await.is_ok());
}
