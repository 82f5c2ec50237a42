//! HTTP service surface.
//!
//! Exposes the assistant via a JSON HTTP API suitable for a Slack
//! slash-command integration.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask-it` | Answer a query (also handles the `reload` command) |
//! | `POST` | `/feedback` | Record 👍/👎 feedback for a trace id |
//! | `POST` | `/admin/reload` | Rescan the document directory |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/metrics` | Prometheus text exposition |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "rate_limited", "message": "rate limit exceeded" } }
//! ```
//!
//! Error codes: `bad_signature` (401), `bad_request` (400), `rate_limited`
//! (429), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::answer::AnswerGenerator;
use crate::config::Config;
use crate::docstore::DocStore;
use crate::limiter::RateLimiter;
use crate::message::build_slack_message;
use crate::metrics::Metrics;
use crate::retriever;
use crate::verify::verify_slack_signature;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor. Everything is behind `Arc` for cheap cloning per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub docs: Arc<DocStore>,
    pub limiter: Arc<RateLimiter>,
    pub answerer: Arc<dyn AnswerGenerator>,
    pub metrics: Arc<Metrics>,
}

/// Incoming `/ask-it` slash-command payload.
#[derive(Debug, Deserialize)]
pub struct AskPayload {
    pub user: String,
    pub channel: String,
    pub text: String,
}

/// User feedback (👍/👎) for an earlier answer.
#[derive(Debug, Deserialize)]
pub struct FeedbackPayload {
    pub trace_id: String,
    pub helpful: bool,
}

/// Starts the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("askdesk listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the router; split out from [`run_server`] so tests can mount it on
/// an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ask-it", post(handle_ask))
        .route("/feedback", post(handle_feedback))
        .route("/admin/reload", post(handle_admin_reload))
        .route("/metrics", get(handle_metrics))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn bad_signature(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "bad_signature".to_string(),
        message: message.into(),
    }
}

fn rate_limited(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::TOO_MANY_REQUESTS,
        code: "rate_limited".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask-it ============

/// Handler for `POST /ask-it`.
///
/// Takes the raw body because the Slack signature covers the exact bytes on
/// the wire; JSON parsing happens after verification. The `reload` command
/// short-circuits before the rate limiter, matching the slash-command
/// contract where reload is an operator action.
async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let started = Instant::now();

    let timestamp = header_str(&headers, "X-Slack-Request-Timestamp");
    let signature = header_str(&headers, "X-Slack-Signature");
    if !verify_slack_signature(
        &state.config.slack.signing_secret,
        timestamp,
        body.as_bytes(),
        signature,
    ) {
        return Err(bad_signature("bad signature"));
    }

    let payload: AskPayload = serde_json::from_str(&body)
        .map_err(|e| bad_request(format!("invalid payload: {}", e)))?;

    let command = payload.text.trim().to_lowercase();
    if command == "reload" || command == "/ask-it reload" {
        let count = state.docs.reload();
        return Ok(Json(serde_json::json!({ "ok": true, "reloaded_docs": count })));
    }

    let identity = format!("{}:{}", payload.user, payload.channel);
    if !state.limiter.allow(&identity).await {
        debug!("rate limited: {}", identity);
        return Err(rate_limited("rate limit exceeded"));
    }

    let trace_id = new_trace_id();
    state
        .metrics
        .requests
        .inc(&[payload.user.as_str(), payload.channel.as_str()]);

    let ranked = retriever::retrieve(&state.docs, &payload.text, state.config.retrieval.top_k);
    let context = retriever::compose(
        &state.docs,
        &ranked,
        &payload.text,
        state.config.retrieval.excerpt_chars,
    );

    let out = state
        .answerer
        .answer(&context)
        .await
        .map_err(|e| internal(format!("answer generation failed: {}", e)))?;

    state.metrics.ai_tokens.inc_by(
        &[payload.user.as_str(), out.model.as_str(), "prompt"],
        out.tokens_prompt as f64,
    );
    state.metrics.ai_tokens.inc_by(
        &[payload.user.as_str(), out.model.as_str(), "completion"],
        out.tokens_completion as f64,
    );
    state
        .metrics
        .ai_cost_usd
        .inc_by(&[payload.user.as_str(), out.model.as_str()], 0.0);

    let msg = build_slack_message(&out.answer, &out.sources, &trace_id);
    state.metrics.latency.observe(started.elapsed().as_secs_f64());

    Ok(Json(
        serde_json::json!({ "trace_id": trace_id, "slack_message": msg }),
    ))
}

// ============ POST /feedback ============

async fn handle_feedback(
    State(state): State<AppState>,
    Json(payload): Json<FeedbackPayload>,
) -> Json<serde_json::Value> {
    let helpful = if payload.helpful { "true" } else { "false" };
    state.metrics.helpful.inc(&[helpful]);
    Json(serde_json::json!({ "ok": true, "trace_id": payload.trace_id }))
}

// ============ POST /admin/reload ============

async fn handle_admin_reload(State(state): State<AppState>) -> Json<serde_json::Value> {
    let count = state.docs.reload();
    Json(serde_json::json!({ "ok": true, "reloaded_docs": count }))
}

// ============ GET /metrics ============

async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

// ============ Helpers ============

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Short hex trace id, enough to correlate a reply with its feedback.
fn new_trace_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
