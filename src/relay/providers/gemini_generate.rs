use serde_json::{json, Value};

use async_trait::async_trait;

use crate::relay::providers::{send_json, ProviderAdapter, ProviderError};

/// Generate-content provider authenticated through an API key passed as a
/// query parameter. The request carries a single content part with the
/// combined prompt; the completion text is the first candidate's first part.
pub struct GeminiGenerateAdapter {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiGenerateAdapter {
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

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        })
    }

    fn extract_text(json: &Value) -> Option<String> {
        json.get("candidates")
            .and_then(|x| x.get(0))
            .and_then(|x| x.get("content"))
            .and_then(|x| x.get("parts"))
            .and_then(|x| x.get(0))
            .and_then(|x| x.get("text"))
            .and_then(|x| x.as_str())
            .map(|s| s.to_string())
    }

    fn extract_error_message(json: &Value) -> Option<String> {
        let e = json.get("error")?;
        let status = e.get("status").and_then(|v| v.as_str()).unwrap_or("");
        let msg = e.get("message").and_then(|v| v.as_str()).unwrap_or("");

        let mut parts: Vec<String> = Vec::new();
        if !status.is_empty() {
            parts.push(status.to_string());
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
impl ProviderAdapter for GeminiGenerateAdapter {
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
            .post(self.generate_url())
            .query(&[("key", api_key)])
            .header("content-type", "application/json")
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
                "no completion text in first candidate".to_string(),
                false,
            )),
        }
    }
}
