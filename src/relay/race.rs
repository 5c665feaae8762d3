use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::debug;

use crate::relay::providers::{ProviderAdapter, ProviderError};
use crate::relay::types::RaceWin;

/// Fans one combined prompt out to every configured provider concurrently and
/// resolves to the first successful completion. Individual failures are
/// absorbed while at least one call is still racing; once a winner resolves,
/// every outstanding call is aborted.
pub struct RaceDispatcher {
    client: reqwest::Client,
    providers: Vec<Arc<dyn ProviderAdapter>>,
    call_timeout: Duration,
}

impl RaceDispatcher {
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, call_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            providers,
            call_timeout,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Run one race. Tie-break is completion order of the underlying tasks;
    /// configuration order confers no priority. A provider slower than the
    /// per-call timeout counts as failed.
    pub async fn dispatch(
        &self,
        request_id: &str,
        prompt: &str,
    ) -> Result<RaceWin, ProviderError> {
        let mut set = JoinSet::new();

        for adapter in &self.providers {
            let adapter = adapter.clone();
            let client = self.client.clone();
            let prompt = prompt.to_string();
            let call_timeout = self.call_timeout;
            set.spawn(async move {
                let started = Instant::now();
                let result =
                    match tokio::time::timeout(call_timeout, adapter.complete(&client, &prompt))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError {
                            provider: adapter.name().to_string(),
                            code: "timeout".to_string(),
                            message: format!("no response within {}ms", call_timeout.as_millis()),
                            retryable: true,
                        }),
                    };
                (adapter.name().to_string(), started.elapsed(), result)
            });
        }

        let mut last_err: Option<ProviderError> = None;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((provider, elapsed, Ok(text))) => {
                    debug!(
                        request_id,
                        provider = %provider,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "race winner"
                    );
                    set.abort_all();
                    return Ok(RaceWin { provider, text });
                }
                Ok((provider, elapsed, Err(e))) => {
                    debug!(
                        request_id,
                        provider = %provider,
                        code = %e.code,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "provider out of the race: {}",
                        e.message
                    );
                    last_err = Some(e);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        continue;
                    }
                    last_err = Some(ProviderError {
                        provider: "race".to_string(),
                        code: "task_failed".to_string(),
                        message: join_err.to_string(),
                        retryable: false,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError {
            provider: "race".to_string(),
            code: "no_providers".to_string(),
            message: "no completion providers configured".to_string(),
            retryable: false,
        }))
    }
}
