//! End-to-end HTTP tests: the real router mounted on an ephemeral port,
//! driven with reqwest.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use askdesk::answer::CannedAnswerer;
use askdesk::config::Config;
use askdesk::docstore::DocStore;
use askdesk::limiter::RateLimiter;
use askdesk::metrics::Metrics;
use askdesk::server::{build_router, AppState};
use askdesk::verify;

async fn spawn_app(config: Config) -> SocketAddr {
    let docs = Arc::new(DocStore::new(&config.docs).unwrap());
    let limiter = Arc::new(RateLimiter::connect(&config.rate_limit).await);
    let state = AppState {
        config: Arc::new(config),
        docs,
        limiter,
        answerer: Arc::new(CannedAnswerer),
        metrics: Arc::new(Metrics::new()),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    addr
}

fn config_for(docs_dir: &Path) -> Config {
    let mut config = Config::default();
    config.docs.dir = docs_dir.to_path_buf();
    config
}

fn write_docs(dir: &Path) {
    fs::write(
        dir.join("okta-mfa.md"),
        "okta okta okta okta okta\nSteps to reset MFA in Okta: open the admin console...",
    )
    .unwrap();
    fs::write(dir.join("vpn.md"), "Connecting to the VPN from home.").unwrap();
    fs::write(dir.join("printers.txt"), "Fixing common printer jams.").unwrap();
}

async fn post_ask(addr: SocketAddr, user: &str, channel: &str, text: &str) -> reqwest::Response {
    let body = serde_json::json!({ "user": user, "channel": channel, "text": text }).to_string();
    reqwest::Client::new()
        .post(format!("http://{}/ask-it", addr))
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_app(config_for(tmp.path())).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn test_ask_answers_with_top_ranked_source() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let addr = spawn_app(config_for(tmp.path())).await;

    let resp = post_ask(addr, "U123", "C1", "reset okta mfa").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();

    let trace_id = body["trace_id"].as_str().unwrap();
    assert_eq!(trace_id.len(), 12);

    let blocks = body["slack_message"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 4);
    let sources_text = blocks[2]["text"]["text"].as_str().unwrap();
    assert!(
        sources_text.contains("okta-mfa.md"),
        "expected the okta runbook among sources, got: {}",
        sources_text
    );
}

#[tokio::test]
async fn test_ask_reload_command_rescans() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let addr = spawn_app(config_for(tmp.path())).await;

    // prime the cache, then add a document behind its back
    let resp = post_ask(addr, "U123", "C1", "vpn").await;
    assert_eq!(resp.status(), 200);
    fs::write(tmp.path().join("onboarding.md"), "Laptop onboarding checklist.").unwrap();

    let resp = post_ask(addr, "U123", "C1", "reload").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["reloaded_docs"], 4);

    // the new document is retrievable now
    let resp = post_ask(addr, "U123", "C1", "onboarding checklist").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    let sources_text = body["slack_message"]["blocks"][2]["text"]["text"]
        .as_str()
        .unwrap();
    assert!(sources_text.contains("onboarding.md"));
}

#[tokio::test]
async fn test_admin_reload() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let addr = spawn_app(config_for(tmp.path())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/admin/reload", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["reloaded_docs"], 3);
}

#[tokio::test]
async fn test_rate_limit_returns_429_past_burst() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let mut config = config_for(tmp.path());
    config.rate_limit.capacity = 2.0;
    config.rate_limit.refill_rate = 0.0;
    let addr = spawn_app(config).await;

    assert_eq!(post_ask(addr, "U1", "C1", "vpn").await.status(), 200);
    assert_eq!(post_ask(addr, "U1", "C1", "vpn").await.status(), 200);

    let resp = post_ask(addr, "U1", "C1", "vpn").await;
    assert_eq!(resp.status(), 429);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "rate_limited");

    // another identity still has a full bucket
    assert_eq!(post_ask(addr, "U2", "C1", "vpn").await.status(), 200);
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let addr = spawn_app(config_for(tmp.path())).await;

    let body = serde_json::json!({ "user": "U1", "channel": "C1", "text": "vpn" }).to_string();
    let resp = reqwest::Client::new()
        .post(format!("http://{}/ask-it", addr))
        .header("X-Slack-Request-Timestamp", "1700000000")
        .header("X-Slack-Signature", "v0=deadbeef")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_signature");
}

#[tokio::test]
async fn test_valid_signature_is_accepted() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let config = config_for(tmp.path());
    let secret = config.slack.signing_secret.clone();
    let addr = spawn_app(config).await;

    let body = serde_json::json!({ "user": "U1", "channel": "C1", "text": "vpn" }).to_string();
    let timestamp = "1700000000";
    let signature = verify::sign(&secret, timestamp, body.as_bytes());

    let resp = reqwest::Client::new()
        .post(format!("http://{}/ask-it", addr))
        .header("X-Slack-Request-Timestamp", timestamp)
        .header("X-Slack-Signature", signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_invalid_payload_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_app(config_for(tmp.path())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/ask-it", addr))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_feedback_shows_up_in_metrics() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let addr = spawn_app(config_for(tmp.path())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/feedback", addr))
        .json(&serde_json::json!({ "trace_id": "abc123def456", "helpful": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["trace_id"], "abc123def456");

    post_ask(addr, "U1", "C1", "vpn").await;

    let metrics = reqwest::get(format!("http://{}/metrics", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("askdesk_helpful_total{helpful=\"true\"} 1"));
    assert!(metrics.contains("askdesk_requests_total{user=\"U1\",channel=\"C1\"} 1"));
    assert!(metrics.contains("ai_tokens_total{user=\"U1\",model=\"mock\",type=\"prompt\"} 100"));
    assert!(metrics.contains("askdesk_latency_seconds_count 1"));
}
