//! HTTP handlers for the interception API
//!
//! Provides REST endpoints over the orchestrator:
//! - POST /api/v1/intercept          — scan a payload; process or pause
//! - POST /api/v1/intercept/confirm  — resolve a paused transaction
//! - POST /api/v1/intercept/cancel   — abort a paused transaction
//! - POST /api/v1/scan               — standalone egress text scan
//!
//! Outcome mapping: unknown/expired identifiers are 404, malformed input is
//! 400, and every other failure is an opaque 500 — the detail is logged,
//! never returned.

use crate::error::Error;
use crate::orchestrator::{
    ConfirmChoice, InterceptOutcome, InterceptRequest, Orchestrator, ProcessedResponse, Receipt,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared state for the gateway handlers
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Create the gateway router
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/v1/intercept", post(intercept))
        .route("/api/v1/intercept/confirm", post(confirm))
        .route("/api/v1/intercept/cancel", post(cancel))
        .route("/api/v1/scan", post(scan))
        .with_state(state)
}

// =============================================================================
// Request / Response types
// =============================================================================

/// Request body for the confirm endpoint
#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub pending_id: String,
    pub choice: ConfirmChoice,
}

/// Request body for the cancel endpoint
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub pending_id: String,
}

/// Request body for the scan endpoint
#[derive(Debug, Deserialize)]
pub struct ScanBody {
    pub text: String,
}

/// Receipt metadata in responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptReply {
    pub engine: String,
    pub scrubbed_count: usize,
    pub latency_ms: u64,
}

impl From<Receipt> for ReceiptReply {
    fn from(r: Receipt) -> Self {
        Self {
            engine: r.engine,
            scrubbed_count: r.scrubbed_count,
            latency_ms: r.latency_ms,
        }
    }
}

/// Response from intercept/confirm/cancel
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptReply {
    pub status: String,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ReceiptReply>,
}

impl InterceptReply {
    fn terminal(response: ProcessedResponse) -> Self {
        Self {
            status: response.status.to_string(),
            processed_at: Utc::now(),
            pending_id: None,
            detected: None,
            redacted_payload: Some(response.redacted_payload),
            verdict: Some(response.verdict.to_string()),
            compliance_score: Some(response.compliance_score),
            reasoning: Some(response.reasoning),
            model_response: response.model_response,
            receipt: Some(response.receipt.into()),
        }
    }

    fn pending(pending_id: String, detected: Vec<String>, redacted_payload: Value) -> Self {
        Self {
            status: "requires_confirmation".to_string(),
            processed_at: Utc::now(),
            pending_id: Some(pending_id),
            detected: Some(detected),
            redacted_payload: Some(redacted_payload),
            verdict: None,
            compliance_score: None,
            reasoning: None,
            model_response: None,
            receipt: None,
        }
    }
}

/// A hit in the scan response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHit {
    pub category: String,
    pub value: String,
    pub line: usize,
}

/// Response from the scan endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReply {
    pub redacted: String,
    pub has_sensitive_data: bool,
    pub degraded: bool,
    pub hits: Vec<ScanHit>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/v1/intercept — scan a payload; process it or pause for
/// confirmation
async fn intercept(
    State(state): State<GatewayState>,
    Json(request): Json<InterceptRequest>,
) -> Response {
    match state.orchestrator.intercept(request).await {
        Ok(InterceptOutcome::Processed(response)) => {
            Json(InterceptReply::terminal(*response)).into_response()
        }
        Ok(InterceptOutcome::Pending {
            pending_id,
            detected,
            redacted_payload,
        }) => Json(InterceptReply::pending(
            pending_id,
            detected.iter().map(|c| c.to_string()).collect(),
            redacted_payload,
        ))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/intercept/confirm — resolve a paused transaction
async fn confirm(State(state): State<GatewayState>, Json(body): Json<ConfirmBody>) -> Response {
    match state.orchestrator.confirm(&body.pending_id, body.choice).await {
        Ok(response) => Json(InterceptReply::terminal(response)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/intercept/cancel — abort a paused transaction
async fn cancel(State(state): State<GatewayState>, Json(body): Json<CancelBody>) -> Response {
    match state.orchestrator.cancel(&body.pending_id).await {
        Ok(response) => Json(InterceptReply::terminal(response)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/scan — standalone egress scan (always redact mode, safe
/// defaults)
async fn scan(State(state): State<GatewayState>, Json(body): Json<ScanBody>) -> Response {
    let scrub = state.orchestrator.scan_text(&body.text).await;
    Json(ScanReply {
        redacted: scrub.text,
        has_sensitive_data: !scrub.hits.is_empty(),
        degraded: scrub.degraded,
        hits: scrub
            .hits
            .iter()
            .map(|h| ScanHit {
                category: h.category.to_string(),
                value: h.value.clone(),
                line: h.line,
            })
            .collect(),
    })
    .into_response()
}

fn error_response(error: Error) -> Response {
    match error {
        Error::PendingNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "pending request not found or expired"})),
        )
            .into_response(),
        Error::Validation(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": message})),
        )
            .into_response(),
        other => {
            tracing::error!(error = %other, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Auditor, MemoryTrail};
    use crate::config::GatewayConfig;
    use crate::error::Result;
    use crate::model::{Completion, ModelClient};
    use crate::policy::PolicyResolver;
    use crate::scrub::ScrubEngine;
    use crate::staging::MemoryPendingStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    struct EchoModel;

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn generate(&self, prompt: &str, _system: &str) -> Result<Completion> {
            Ok(Completion {
                text: format!("echo: {}", prompt),
                tokens: 5,
            })
        }
    }

    fn make_app() -> Router {
        let orchestrator = Arc::new(Orchestrator::new(
            ScrubEngine::new(None).unwrap(),
            PolicyResolver::new(None),
            Arc::new(MemoryPendingStore::new()),
            Auditor::new(None),
            Arc::new(EchoModel),
            Arc::new(MemoryTrail::default()),
            GatewayConfig::default(),
        ));
        gateway_router(GatewayState { orchestrator })
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_intercept_clean_payload() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/api/v1/intercept",
                r#"{"payload": {"message": "hello there"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "processed");
        assert_eq!(json["verdict"], "VALID");
        assert_eq!(json["receipt"]["scrubbedCount"], 0);
        assert!(json["modelResponse"].as_str().unwrap().contains("hello there"));
    }

    #[tokio::test]
    async fn test_intercept_sensitive_payload_pauses() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/api/v1/intercept",
                r#"{"payload": {"message": "my email is a@b.com"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "requires_confirmation");
        assert!(!json["pendingId"].as_str().unwrap().is_empty());
        assert_eq!(json["detected"], json!(["email"]));
        assert_eq!(
            json["redactedPayload"]["message"],
            "my email is [EMAIL_REDACTED]"
        );
        assert!(json.get("verdict").is_none());
    }

    #[tokio::test]
    async fn test_confirm_flow_end_to_end() {
        let app = make_app();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/intercept",
                r#"{"payload": {"message": "my email is a@b.com"}}"#,
            ))
            .await
            .unwrap();
        let pending = body_json(resp).await;
        let pending_id = pending["pendingId"].as_str().unwrap().to_string();

        let resp = app
            .oneshot(post_json(
                "/api/v1/intercept/confirm",
                &format!(r#"{{"pending_id": "{}", "choice": "use_redacted"}}"#, pending_id),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "processed");
        assert_eq!(json["receipt"]["scrubbedCount"], 1);
    }

    #[tokio::test]
    async fn test_confirm_unknown_id_is_404() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/api/v1/intercept/confirm",
                r#"{"pending_id": "no-such-id", "choice": "use_original"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_second_resolution_is_404() {
        let app = make_app();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/intercept",
                r#"{"payload": {"message": "my email is a@b.com"}}"#,
            ))
            .await
            .unwrap();
        let pending = body_json(resp).await;
        let pending_id = pending["pendingId"].as_str().unwrap().to_string();

        let confirm_body =
            format!(r#"{{"pending_id": "{}", "choice": "use_redacted"}}"#, pending_id);
        let resp = app
            .clone()
            .oneshot(post_json("/api/v1/intercept/confirm", &confirm_body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // Confirming again, or cancelling, after the first resolution is 404.
        let resp = app
            .clone()
            .oneshot(post_json("/api/v1/intercept/confirm", &confirm_body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(post_json(
                "/api/v1/intercept/cancel",
                &format!(r#"{{"pending_id": "{}"}}"#, pending_id),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_is_404() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/api/v1/intercept/cancel",
                r#"{"pending_id": "gone"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_null_payload_is_400() {
        let app = make_app();
        let resp = app
            .oneshot(post_json("/api/v1/intercept", r#"{"payload": null}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_reports_sensitive_text() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/api/v1/scan",
                r#"{"text": "contact a@b.com please"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["hasSensitiveData"], true);
        assert_eq!(json["redacted"], "contact [EMAIL_REDACTED] please");
        assert_eq!(json["hits"][0]["category"], "email");
    }

    #[tokio::test]
    async fn test_scan_clean_text() {
        let app = make_app();
        let resp = app
            .oneshot(post_json("/api/v1/scan", r#"{"text": "nothing here"}"#))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["hasSensitiveData"], false);
        assert_eq!(json["hits"].as_array().unwrap().len(), 0);
    }
}
