//! HTTP gateway implementation for the relay
//! 中继的HTTP gateway实现

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::relay::config::RelayConfig;
use crate::relay::race::RaceDispatcher;
use crate::relay::types::CompletionRequest;

/// Shared-secret header compared against the configured value
/// 与配置值比较的共享密钥请求头
pub const SECRET_HEADER: &str = "x-ai-secret";

/// HTTP gateway server / HTTP网关服务器
pub struct HttpGateway {
    /// Server configuration / 服务器配置
    config: Arc<RelayConfig>,
    /// Race dispatcher / 竞速分发器
    dispatcher: Arc<RaceDispatcher>,
}

/// Application state / 应用状态
#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    dispatcher: Arc<RaceDispatcher>,
}

pub fn new_app_state(config: Arc<RelayConfig>, dispatcher: Arc<RaceDispatcher>) -> AppState {
    AppState { config, dispatcher }
}

pub fn build_router(state: AppState) -> Router {
    let cors_enabled = state.config.http.cors_enabled;

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/completions", post(complete))
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state);

    if cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

impl HttpGateway {
    /// Create new HTTP gateway / 创建新的HTTP网关
    pub fn new(config: Arc<RelayConfig>, dispatcher: Arc<RaceDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Start HTTP gateway server / 启动HTTP网关服务器
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (listener, app) = self.prepare().await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start HTTP gateway with shutdown signal / 使用关闭信号启动HTTP网关
    pub async fn start_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let (listener, app) = self.prepare().await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    async fn prepare(
        self,
    ) -> Result<(tokio::net::TcpListener, Router), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.http.server.addr;
        info!("Starting HTTP gateway on {}", addr);

        let state = new_app_state(self.config, self.dispatcher);
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("HTTP gateway listening on {}", addr);

        Ok((listener, app))
    }
}

type JsonError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, error: &str, details: Option<String>) -> JsonError {
    let mut body = json!({ "error": error });
    if let Some(details) = details {
        body["details"] = Value::String(details);
    }
    (status, Json(body))
}

fn secret_matches(configured: &str, presented: Option<&str>) -> bool {
    // An empty configured secret fails closed / 空的配置密钥将拒绝所有调用
    !configured.is_empty() && presented == Some(configured)
}

/// Fallback for write-style-only routes hit with another verb
/// 以其他动词访问仅限写式路由时的回退
async fn method_not_allowed() -> JsonError {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed. Use POST.",
        None,
    )
}

/// Health check endpoint / 健康检查端点
/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "relayd",
        "providers": state.dispatcher.provider_names(),
    }))
}

/// Completion race endpoint / 补全竞速端点
/// POST /completions
///
/// The shared secret is checked before the body is parsed; neither failure
/// contacts any provider.
/// 在解析请求体之前检查共享密钥；两种失败都不会联系任何提供商。
async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, JsonError> {
    let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !secret_matches(&state.config.shared_secret, presented) {
        return Err(error_response(StatusCode::FORBIDDEN, "Unauthorized", None));
    }

    let request: CompletionRequest = serde_json::from_slice(&body).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            "Malformed Request",
            Some(e.to_string()),
        )
    })?;

    if request.user_message.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Malformed Request",
            Some("userMessage must not be empty".to_string()),
        ));
    }

    let request_id = Uuid::new_v4().to_string();
    let prompt = request.combined_prompt();
    debug!(%request_id, prompt_len = prompt.len(), "POST /completions");

    match state.dispatcher.dispatch(&request_id, &prompt).await {
        Ok(win) => {
            info!(%request_id, provider = %win.provider, "race resolved");
            Ok(Json(json!({ "response": win.text })))
        }
        Err(e) => {
            error!(%request_id, provider = %e.provider, code = %e.code, "race failed: {}", e.message);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "AI Race Failed",
                Some(e.message),
            ))
        }
    }
}
