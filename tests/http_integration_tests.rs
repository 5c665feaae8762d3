//! HTTP integration tests for the relay gateway
//! 中继网关的HTTP集成测试
//!
//! These tests drive the real provider adapters end to end against
//! in-process mock upstream servers.
//! 这些测试使用进程内模拟上游服务器端到端地驱动真实的提供商适配器。

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use prompt_relay::relay::config::RelayConfig;
use prompt_relay::relay::http_gateway::{build_router, new_app_state, SECRET_HEADER};
use prompt_relay::relay::providers::gemini_generate::GeminiGenerateAdapter;
use prompt_relay::relay::providers::openai_chat::OpenAiChatAdapter;
use prompt_relay::relay::providers::ProviderAdapter;
use prompt_relay::relay::race::RaceDispatcher;

const TEST_SECRET: &str = "integration-secret";

// Test utilities for mock upstream servers / 模拟上游服务器的测试工具
mod upstream {
    use super::*;
    use axum::extract::Request;
    use axum::response::Json;
    use std::net::SocketAddr;

    /// Serve a fixed JSON response on every path, after an optional delay
    /// 在所有路径上提供固定的JSON响应，可附加延迟
    pub async fn spawn_fixed(status: StatusCode, body: Value, delay: Duration) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new().fallback(move || {
            let body = body.clone();
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (status, Json(body))
            }
        });

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        addr
    }

    /// Chat-completions upstream that echoes the prompt it received
    /// 回显所收到提示的chat-completions上游
    pub async fn spawn_openai_echo(delay: Duration) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new().fallback(move |request: Request| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            let prompt = body["messages"][0]["content"].as_str().unwrap().to_string();
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": format!("echo: {}", prompt) } }]
            }))
        });

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        addr
    }
}

fn openai_adapter(addr: std::net::SocketAddr) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiChatAdapter::new(
        "openai",
        format!("http://{}/v1", addr),
        "test-key",
        "gpt-4o-mini",
    ))
}

fn gemini_adapter(addr: std::net::SocketAddr) -> Arc<dyn ProviderAdapter> {
    Arc::new(GeminiGenerateAdapter::new(
        "gemini",
        format!("http://{}/v1beta", addr),
        "test-key",
        "gemini-1.5-flash",
    ))
}

fn openai_reply(text: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] })
}

fn gemini_reply(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

/// Create a test relay server over the given adapters / 基于给定适配器创建测试中继服务器
fn create_relay_server(adapters: Vec<Arc<dyn ProviderAdapter>>) -> TestServer {
    let config = Arc::new(RelayConfig {
        shared_secret: TEST_SECRET.to_string(),
        ..Default::default()
    });
    let dispatcher = Arc::new(RaceDispatcher::new(adapters, Duration::from_secs(5)));
    TestServer::new(build_router(new_app_state(config, dispatcher))).unwrap()
}

fn secret_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(SECRET_HEADER),
        HeaderValue::from_static(TEST_SECRET),
    )
}

#[tokio::test]
async fn test_fastest_upstream_wins() {
    let openai_addr = upstream::spawn_fixed(
        StatusCode::OK,
        openai_reply("openai wins"),
        Duration::from_millis(10),
    )
    .await;
    let gemini_addr = upstream::spawn_fixed(
        StatusCode::OK,
        gemini_reply("gemini wins"),
        Duration::from_millis(300),
    )
    .await;

    let server = create_relay_server(vec![
        openai_adapter(openai_addr),
        gemini_adapter(gemini_addr),
    ]);

    let (name, value) = secret_header();
    let response = server
        .post("/completions")
        .add_header(name, value)
        .json(&json!({ "userMessage": "hi" }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["response"], "openai wins");
}

#[tokio::test]
async fn test_failing_upstream_loses_to_the_healthy_one() {
    let openai_addr = upstream::spawn_fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "type": "server_error", "message": "boom" } }),
        Duration::ZERO,
    )
    .await;
    let gemini_addr = upstream::spawn_fixed(
        StatusCode::OK,
        gemini_reply("gemini wins"),
        Duration::from_millis(20),
    )
    .await;

    let server = create_relay_server(vec![
        openai_adapter(openai_addr),
        gemini_adapter(gemini_addr),
    ]);

    let (name, value) = secret_header();
    let response = server
        .post("/completions")
        .add_header(name, value)
        .json(&json!({ "userMessage": "hi" }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["response"], "gemini wins");
}

#[tokio::test]
async fn test_all_upstreams_failing_is_a_race_failure() {
    let openai_addr = upstream::spawn_fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "message": "boom" } }),
        Duration::ZERO,
    )
    .await;
    let gemini_addr = upstream::spawn_fixed(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "status": "UNAVAILABLE", "message": "overloaded" } }),
        Duration::from_millis(10),
    )
    .await;

    let server = create_relay_server(vec![
        openai_adapter(openai_addr),
        gemini_adapter(gemini_addr),
    ]);

    let (name, value) = secret_header();
    let response = server
        .post("/completions")
        .add_header(name, value)
        .json(&json!({ "userMessage": "hi" }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "AI Race Failed");
    assert!(body["details"].as_str().unwrap().contains("upstream status"));
}

#[tokio::test]
async fn test_combined_prompt_reaches_the_upstream() {
    let openai_addr = upstream::spawn_openai_echo(Duration::ZERO).await;

    let server = create_relay_server(vec![openai_adapter(openai_addr)]);

    let (name, value) = secret_header();
    let response = server
        .post("/completions")
        .add_header(name, value)
        .json(&json!({ "systemPrompt": "You are terse.", "userMessage": "Say hi" }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["response"], "echo: You are terse.\n\nUser: Say hi");
}

#[tokio::test]
async fn test_wrong_secret_never_reaches_an_upstream() {
    // No upstream is spawned; a rejected call would error loudly if dispatched
    // 未启动任何上游；被拒绝的调用如果被分发将立即报错
    let server = create_relay_server(vec![openai_adapter("127.0.0.1:1".parse().unwrap())]);

    let response = server
        .post("/completions")
        .add_header(
            HeaderName::from_static(SECRET_HEADER),
            HeaderValue::from_static("wrong"),
        )
        .json(&json!({ "userMessage": "hi" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "Unauthorized");
}
