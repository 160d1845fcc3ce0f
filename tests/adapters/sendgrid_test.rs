//! SendGrid adapter tests.

use std::time::Duration;

use outreach::providers::{LocalMailer, SendGridMailer};
use outreach::{Attachment, DispatchService, Mailer, Message, Route, SendErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn valid_message() -> Message {
    Message::new()
        .from("news@foodbank.org")
        .to("ada@example.org")
        .subject("Thank you!")
        .html_body("<h1>Thank you</h1>")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(202).insert_header("X-Message-Id", "123-xyz")
}

fn mailer(server: &MockServer) -> SendGridMailer {
    SendGridMailer::new("SG.test-api-key").base_url(server.uri())
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_message_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(header("Authorization", "Bearer SG.test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "from": {"email": "news@foodbank.org"},
            "personalizations": [{"to": [{"email": "ada@example.org"}]}],
            "content": [
                {"type": "text/plain", "value": "Thank you"},
                {"type": "text/html", "value": "<h1>Thank you</h1>"}
            ],
            "subject": "Thank you!"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let receipt = mailer(&server).send(&valid_message()).await.unwrap();
    assert_eq!(receipt.message_id, "123-xyz");
    assert_eq!(receipt.provider, "sendgrid");
}

#[tokio::test]
async fn missing_message_id_header_generates_one() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = mailer(&server).send(&valid_message()).await.unwrap();
    assert!(!receipt.message_id.is_empty());
}

#[tokio::test]
async fn all_fields_are_sent() {
    let server = MockServer::start().await;

    let message = Message::new()
        .from(("Food Bank", "news@foodbank.org"))
        .to(("Ada Lovelace", "ada@example.org"))
        .bcc("board@foodbank.org")
        .reply_to("director@foodbank.org")
        .subject("Your receipt")
        .html_body("<p>Receipt attached</p>")
        .text_body("Receipt attached")
        .header("X-Campaign", "spring")
        .attachment(Attachment::new("receipt.txt", b"Hello".to_vec()))
        .provider_option("categories", vec!["receipt"])
        .provider_option("custom_args", json!({"donation_id": "42"}));

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(body_json(json!({
            "from": {"email": "news@foodbank.org", "name": "Food Bank"},
            "reply_to": {"email": "director@foodbank.org"},
            "personalizations": [{
                "to": [{"email": "ada@example.org", "name": "Ada Lovelace"}],
                "bcc": [{"email": "board@foodbank.org"}],
                "custom_args": {"donation_id": "42"}
            }],
            "subject": "Your receipt",
            "content": [
                {"type": "text/plain", "value": "Receipt attached"},
                {"type": "text/html", "value": "<p>Receipt attached</p>"}
            ],
            "attachments": [{
                "content": "SGVsbG8=",
                "filename": "receipt.txt",
                "type": "text/plain",
                "disposition": "attachment"
            }],
            "headers": {"X-Campaign": "spring"},
            "categories": ["receipt"]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer(&server).send(&message).await.is_ok());
}

#[tokio::test]
async fn template_id_and_dynamic_data_are_sent() {
    let server = MockServer::start().await;

    let message = valid_message()
        .provider_option("template_id", "d-spring")
        .provider_option("dynamic_template_data", json!({"DONOR_NAME": "Ada"}));

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(body_json(json!({
            "from": {"email": "news@foodbank.org"},
            "personalizations": [{
                "to": [{"email": "ada@example.org"}],
                "dynamic_template_data": {"DONOR_NAME": "Ada"}
            }],
            "content": [
                {"type": "text/plain", "value": "Thank you"},
                {"type": "text/html", "value": "<h1>Thank you</h1>"}
            ],
            "subject": "Thank you!",
            "template_id": "d-spring"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer(&server).send(&message).await.is_ok());
}

#[tokio::test]
async fn compressed_body_sets_content_encoding() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(header("Content-Encoding", "gzip"))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let mailer = mailer(&server).compress(true);
    assert!(mailer.send(&valid_message()).await.is_ok());
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn client_error_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                {"message": "The from address does not match a verified Sender Identity"},
                {"message": "Invalid reply_to"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer(&server).send(&valid_message()).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::ProviderRejected);
    assert_eq!(err.status, Some(400));
    assert_eq!(
        err.message,
        "The from address does not match a verified Sender Identity; Invalid reply_to"
    );
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer(&server).send(&valid_message()).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::ProviderUnavailable);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.message, "HTTP 503");
}

#[tokio::test]
async fn throttling_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = mailer(&server).send(&valid_message()).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::ProviderUnavailable);
    assert_eq!(err.status, Some(429));
}

#[tokio::test]
async fn client_timeout_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(success_response().set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mailer = SendGridMailer::with_timeout("SG.test-api-key", Duration::from_millis(100))
        .unwrap()
        .base_url(server.uri());

    let err = mailer.send(&valid_message()).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::ProviderUnavailable);
    assert_eq!(err.provider, "sendgrid");
}

#[tokio::test]
async fn unreachable_host_is_unavailable() {
    let mailer = SendGridMailer::new("SG.test-api-key").base_url("http://127.0.0.1:1");

    let err = mailer.send(&valid_message()).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::ProviderUnavailable);
}

#[tokio::test]
async fn invalid_message_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let no_subject = valid_message().subject("");
    let err = mailer(&server).send(&no_subject).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::InvalidMessage);

    let no_sender = Message::new()
        .to("ada@example.org")
        .subject("Hi")
        .html_body("<p>Hi</p>");
    let err = mailer(&server).send(&no_sender).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::InvalidMessage);
    assert_eq!(err.message, "Missing required field: from");
}

// ============================================================================
// Verification
// ============================================================================

#[tokio::test]
async fn verify_checks_scopes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scopes"))
        .and(header("Authorization", "Bearer SG.test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scopes": ["mail.send"]})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer(&server).verify().await.is_ok());
}

#[tokio::test]
async fn verify_fails_on_bad_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scopes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = mailer(&server).verify().await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::ProviderRejected);
    assert_eq!(err.status, Some(401));
}

// ============================================================================
// Behind the dispatch service
// ============================================================================

#[tokio::test]
async fn outage_hands_over_to_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let relay = LocalMailer::named("smtp");
    let service = DispatchService::with_mailers(mailer(&server), relay.clone())
        .default_from("news@foodbank.org");

    let message = Message::new()
        .to("ada@example.org")
        .subject("Thank you!")
        .html_body("<p>Thanks</p>");
    let outcome = service.send_one(&message).await.unwrap();

    assert_eq!(outcome.route, Route::Fallback);
    assert_eq!(relay.email_count(), 1);
    assert_eq!(
        relay.last_email().unwrap().message.from.unwrap().email,
        "news@foodbank.org"
    );
}
