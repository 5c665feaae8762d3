use serde_json::{json, Value};

use async_trait::async_trait;

use crate::relay::providers::{send_json, ProviderAdapter, ProviderError};

/// Chat-completions provider with bearer-token authentication. The request
/// carries a model identifier and a single user-role message; the completion
/// text is the first choice's message content.
pub struct OpenAiChatAdapter {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn join_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let p = path.trim_start_matches('/');
        format!("{}/{}", base, p)
    }

    fn completions_url(&self) -> String {
        if self.base_url.contains("/v1") {
            self.join_url("chat/completions")
        } else {
            self.join_url("v1/chat/completions")
        }
    }

    fn build_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }

    fn extract_text(json: &Value) -> Option<String> {
        json.get("choices")
            .and_then(|x| x.get(0))
            .and_then(|x| x.get("message"))
            .and_then(|x| x.get("content"))
            .and_then(|x| x.as_str())
            .map(|s| s.to_string())
    }

    fn extract_error_message(json: &Value) -> Option<String> {
        let e = json.get("error")?;
        let msg = e.get("message").and_then(|v| v.as_str()).unwrap_or("");
        let ty = e.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let code_owned = if let Some(s) = e.get("code").and_then(|v| v.as_str()) {
            s.to_string()
        } else if let Some(n) = e.get("code").and_then(|v| v.as_i64()) {
            n.to_string()
        } else {
            String::new()
        };

        let mut parts: Vec<String> = Vec::new();
        if !ty.is_empty() {
            parts.push(ty.to_string());
        }
        if !code_owned.is_empty() {
            parts.push(code_owned);
        }
        if !msg.is_empty() {
            parts.push(msg.to_string());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(": "))
        }
    }

    fn error(&self, code: &str, message: String, retryable: bool) -> ProviderError {
        ProviderError {
            provider: self.name.clone(),
            code: code.to_string(),
            message,
            retryable,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiChatAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        client: &reqwest::Client,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(self.error("invalid_configuration", "missing api key".to_string(), false));
        }

        let request = client
            .post(self.completions_url())
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", api_key))
            .json(&self.build_body(prompt));

        let (status, parsed) = send_json(&self.name, request).await?;

        if !(200..300).contains(&status) {
            let extra = Self::extract_error_message(&parsed);
            return Err(self.error(
                "upstream_error",
                match extra {
                    Some(m) => format!("upstream status: {}: {}", status, m),
                    None => format!("upstream status: {}", status),
                },
                status == 429 || status >= 500,
            ));
        }

        match Self::extract_text(&parsed) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(self.error(
                "invalid_response",
                "no completion text in first choice".to_string(),
                false,
            )),
        }
    }
}
