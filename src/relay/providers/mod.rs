pub mod gemini_generate;
pub mod openai_chat;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::relay::config::ProviderConfig;
use crate::relay::providers::gemini_generate::GeminiGenerateAdapter;
use crate::relay::providers::openai_chat::OpenAiChatAdapter;
use crate::relay::providers::stub::StubAdapter;

/// Failure of a single provider call. Absorbed by the race while other calls
/// are still outstanding; only the last one surfaces to the caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider}: {code}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

/// One upstream completion service. Each adapter owns its endpoint, its
/// credential, its request payload shape, and its response text extraction.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Run one full round trip: build the provider-specific request for the
    /// combined prompt, send it, and extract the completion text.
    async fn complete(
        &self,
        client: &reqwest::Client,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}

/// Build the adapter described by one provider configuration entry.
pub fn build_adapter(cfg: &ProviderConfig) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
    match cfg.kind.as_str() {
        "openai_chat" => Ok(Arc::new(OpenAiChatAdapter::new(
            &cfg.name,
            &cfg.base_url,
            resolve_api_key(cfg),
            &cfg.model,
        ))),
        "gemini_generate" => Ok(Arc::new(GeminiGenerateAdapter::new(
            &cfg.name,
            &cfg.base_url,
            resolve_api_key(cfg),
            &cfg.model,
        ))),
        "stub" => Ok(Arc::new(StubAdapter::new(&cfg.name))),
        other => anyhow::bail!("unknown provider kind: {:?} (provider {})", other, cfg.name),
    }
}

/// Credentials are named indirectly: the config carries the name of an
/// environment variable, never the key itself. An unset variable yields an
/// empty key and the adapter fails with `invalid_configuration` at call time.
fn resolve_api_key(cfg: &ProviderConfig) -> String {
    let Some(env_name) = cfg.api_key_env.as_deref().filter(|s| !s.is_empty()) else {
        return String::new();
    };
    match std::env::var(env_name) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            warn!(provider = %cfg.name, env = env_name, "provider api key env unset or empty");
            String::new()
        }
    }
}

/// Send a provider request and parse the response body as JSON. Transport
/// errors are retryable; a body that is not JSON is retryable only when the
/// upstream itself was failing.
pub(crate) async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<(u16, Value), ProviderError> {
    let resp = request.send().await.map_err(|e| ProviderError {
        provider: provider.to_string(),
        code: "network_error".to_string(),
        message: e.to_string(),
        retryable: true,
    })?;

    let status = resp.status().as_u16();
    let body = resp.bytes().await.map_err(|e| ProviderError {
        provider: provider.to_string(),
        code: "network_error".to_string(),
        message: e.to_string(),
        retryable: true,
    })?;

    let parsed = serde_json::from_slice::<Value>(&body).map_err(|e| ProviderError {
        provider: provider.to_string(),
        code: "invalid_response".to_string(),
        message: e.to_string(),
        retryable: status >= 500,
    })?;

    Ok((status, parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_cfg(kind: &str) -> ProviderConfig {
        ProviderConfig {
            name: "p1".to_string(),
            kind: kind.to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            api_key_env: None,
            model: "m1".to_string(),
        }
    }

    #[test]
    fn test_build_adapter_known_kinds() {
        for kind in ["openai_chat", "gemini_generate", "stub"] {
            let adapter = build_adapter(&provider_cfg(kind)).unwrap();
            assert_eq!(adapter.name(), "p1");
        }
    }

    #[test]
    fn test_build_adapter_unknown_kind() {
        let err = build_adapter(&provider_cfg("carrier_pigeon")).unwrap_err();
        assert!(err.to_string().contains("carrier_pigeon"));
    }

    #[test]
    fn test_resolve_api_key_without_env_name() {
        assert_eq!(resolve_api_key(&provider_cfg("openai_chat")), "");
    }
}
