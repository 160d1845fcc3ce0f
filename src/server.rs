//! HTTP endpoints: send one email, report transport readiness, accept
//! delivery webhooks.
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/send-email` | POST | Render and send one message |
//! | `/send-email` | GET | Check primary and fallback transports |
//! | `/webhook` | POST | Reconcile a batch of delivery events |
//!
//! Other methods on these routes get `405 Method Not Allowed`.
//!
//! ```rust,ignore
//! use outreach::{server, DispatchConfig, MemoryRecipientStore};
//!
//! let service = DispatchConfig::from_env()?.into_service()?;
//! let app = axum::Router::new().nest("/api", server::router(service, MemoryRecipientStore::shared()));
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchService;
use crate::error::{ReconcileError, SendError};
use crate::message::Message;
use crate::storage::RecipientStore;
use crate::template::{render_message, Variables};
use crate::webhook::Reconciler;

/// Shared state for routes.
#[derive(Clone)]
struct AppState {
    dispatch: Arc<DispatchService>,
    reconciler: Arc<Reconciler<Arc<dyn RecipientStore>>>,
}

/// Create the router around a dispatch service and the recipient store the
/// webhook writes to.
pub fn router(dispatch: DispatchService, store: Arc<dyn RecipientStore>) -> Router {
    let state = AppState {
        dispatch: Arc::new(dispatch),
        reconciler: Arc::new(Reconciler::new(store)),
    };

    Router::new()
        .route("/send-email", post(send_email).get(verify_configuration))
        .route("/webhook", post(webhook))
        .with_state(state)
}

/// Error body: `{ "error": ..., "details"?: ... }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.error,
                details: self.details,
            }),
        )
            .into_response()
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        if err.is_invalid_message() {
            return Self::bad_request(err.message);
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Failed to send email".into(),
            details: Some(err.to_string()),
        }
    }
}

/// One address or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Destinations {
    One(String),
    Many(Vec<String>),
}

impl Destinations {
    fn into_vec(self) -> Vec<String> {
        let list = match self {
            Self::One(email) => vec![email],
            Self::Many(list) => list,
        };
        list.into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest {
    to: Option<Destinations>,
    subject: Option<String>,
    html_content: Option<String>,
    #[serde(default)]
    variables: Variables,
    /// Message category, e.g. `receipt` or `newsletter`.
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl SendEmailRequest {
    fn into_message(self) -> Result<Message, ApiError> {
        let to = self.to.map(Destinations::into_vec).unwrap_or_default();
        let subject = self.subject.filter(|s| !s.trim().is_empty());
        let html = self.html_content.filter(|h| !h.trim().is_empty());

        let (subject, html) = match (to.is_empty(), subject, html) {
            (false, Some(subject), Some(html)) => (subject, html),
            (_, subject, html) => {
                let missing: Vec<&str> = [
                    to.is_empty().then_some("to"),
                    subject.is_none().then_some("subject"),
                    html.is_none().then_some("htmlContent"),
                ]
                .into_iter()
                .flatten()
                .collect();
                return Err(ApiError::bad_request(format!(
                    "Missing required fields: {}",
                    missing.join(", ")
                )));
            }
        };

        let mut message = to
            .into_iter()
            .fold(Message::new(), |message, email| message.to(email))
            .subject(subject)
            .html_body(html);
        if let Some(kind) = self.kind {
            message = message
                .header("X-Outreach-Type", kind.as_str())
                .provider_option("categories", vec![kind]);
        }

        Ok(render_message(&message, &self.variables))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    success: bool,
    message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<String>,
}

/// POST /send-email
async fn send_email(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SendEmailResponse>, ApiError> {
    let request: SendEmailRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;
    let message = request.into_message()?;

    let outcome = state.dispatch.send_one(&message).await?;

    Ok(Json(SendEmailResponse {
        success: true,
        message_id: outcome.receipt.message_id,
        preview: outcome.receipt.preview,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    success: bool,
    primary_ready: bool,
    fallback_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// GET /send-email
async fn verify_configuration(State(state): State<AppState>) -> (StatusCode, Json<VerifyResponse>) {
    let status = state.dispatch.verify_configuration().await;

    let mut response = VerifyResponse {
        success: status.can_send(),
        primary_ready: status.primary_ready,
        fallback_ready: status.fallback_ready,
        message: None,
        error: None,
        details: None,
    };

    if status.can_send() {
        response.message = Some(match status.fallback_ready {
            true if status.primary_ready => "Email configuration is valid".into(),
            true => "Primary provider unavailable, fallback relay ready".into(),
            false => "Primary provider ready, no fallback relay available".into(),
        });
        (StatusCode::OK, Json(response))
    } else {
        response.error = Some("Email configuration is invalid".into());
        response.details = Some(
            [status.primary_error, status.fallback_error]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("; "),
        );
        (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
    }
}

/// POST /webhook
async fn webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    match state.reconciler.reconcile_payload(&body).await {
        Ok(_) => (StatusCode::OK, "Webhook processed successfully"),
        Err(ReconcileError::MalformedPayload(e)) => {
            tracing::warn!(error = %e, "Rejected malformed webhook payload");
            (StatusCode::BAD_REQUEST, "Invalid webhook payload")
        }
        Err(ReconcileError::Persistence(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing webhook")
        }
    }
}
