use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::relay::providers::{ProviderAdapter, ProviderError};

/// In-process provider with configurable reply, latency and failure mode.
/// Available through config `kind = "stub"` for local runs without upstream
/// credentials; the race and gateway tests lean on it heavily.
pub struct StubAdapter {
    name: String,
    reply: Option<String>,
    delay: Duration,
    fail: bool,
    calls: Arc<AtomicUsize>,
    completions: Arc<AtomicUsize>,
}

impl StubAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reply: None,
            delay: Duration::ZERO,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Counter incremented when a call starts.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Counter incremented when a call runs to completion. Stays behind
    /// `calls` for a call aborted mid-flight.
    pub fn completions(&self) -> Arc<AtomicUsize> {
        self.completions.clone()
    }
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        _client: &reqwest::Client,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completions.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(ProviderError {
                provider: self.name.clone(),
                code: "stub_failure".to_string(),
                message: format!("{} is configured to fail", self.name),
                retryable: false,
            });
        }

        Ok(match &self.reply {
            Some(reply) => reply.clone(),
            None => format!("stub completion: {}", prompt),
        })
    }
}
