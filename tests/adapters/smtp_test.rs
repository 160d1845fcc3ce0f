//! SMTP adapter tests against a minimal in-process relay.

use std::sync::{Arc, Mutex};

use outreach::providers::SmtpMailer;
use outreach::{Mailer, Message, SendErrorKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

// ============================================================================
// Fake relay
// ============================================================================

/// Accepts connections forever, answering just enough SMTP for one
/// unauthenticated plaintext delivery. Returns the port and the captured
/// DATA lines.
async fn start_relay() -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let captured = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&captured);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let _ = serve(stream, log).await;
            });
        }
    });

    (port, captured)
}

async fn serve(stream: TcpStream, log: Arc<Mutex<Vec<String>>>) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    write.write_all(b"220 relay.test ESMTP\r\n").await?;

    let mut in_data = false;
    while let Some(line) = lines.next_line().await? {
        if in_data {
            if line == "." {
                in_data = false;
                write.write_all(b"250 2.0.0 Ok: queued as Q123\r\n").await?;
            } else {
                log.lock().unwrap().push(line);
            }
            continue;
        }

        let command = line.to_uppercase();
        if command.starts_with("QUIT") {
            write.write_all(b"221 2.0.0 Bye\r\n").await?;
            break;
        }
        let reply: &[u8] = if command.starts_with("EHLO") || command.starts_with("HELO") {
            b"250 relay.test\r\n"
        } else if command.starts_with("DATA") {
            in_data = true;
            b"354 End data with <CR><LF>.<CR><LF>\r\n"
        } else {
            b"250 2.0.0 OK\r\n"
        };
        write.write_all(reply).await?;
    }
    Ok(())
}

fn valid_message() -> Message {
    Message::new()
        .from(("Food Bank", "news@foodbank.org"))
        .to("ada@example.org")
        .subject("Thank you!")
        .html_body("<p>Your gift arrived.</p>")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn delivery_returns_relay_queue_id() {
    let (port, captured) = start_relay().await;
    let mailer = SmtpMailer::new("127.0.0.1", port).no_tls().build().unwrap();

    let receipt = mailer.send(&valid_message()).await.unwrap();
    assert_eq!(receipt.provider, "smtp");
    assert!(receipt.message_id.contains("Q123"));

    let data = captured.lock().unwrap().join("\n");
    assert!(data.contains("Subject: Thank you!"));
    assert!(data.contains("Your gift arrived."));
}

#[tokio::test]
async fn verify_reaches_relay() {
    let (port, _) = start_relay().await;
    let mailer = SmtpMailer::new("127.0.0.1", port).no_tls().build().unwrap();

    assert!(mailer.verify().await.is_ok());
}

#[tokio::test]
async fn closed_port_is_relay_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mailer = SmtpMailer::new("127.0.0.1", port).no_tls().build().unwrap();

    let err = mailer.send(&valid_message()).await.unwrap_err();
    assert_eq!(err.kind, SendErrorKind::RelayUnavailable);
    assert!(mailer.verify().await.is_err());
}

#[tokio::test]
async fn invalid_message_never_connects() {
    let mailer = SmtpMailer::new("127.0.0.1", 1).no_tls().build().unwrap();

    let err = mailer
        .send(&valid_message().html_body(""))
        .await
        .unwrap_err();
    assert_eq!(err.kind, SendErrorKind::InvalidMessage);
}
