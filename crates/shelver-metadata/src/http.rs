use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use shelver_core::RetryConfig;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

const USER_AGENT: &str = "shelver/0.1 (+https://github.com/papayka/shelver)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── RateGate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct GateState {
    last_request: Option<Instant>,
    consecutive_rate_limits: u32,
}

/// Per-provider serialization point for outbound requests.
///
/// Callers queue on the mutex and the holder sleeps until the interval since
/// the previous request has passed, so requests leave one at a time. The
/// interval widens with every consecutive rate-limit answer and snaps back
/// on the next success.
#[derive(Debug)]
pub struct RateGate {
    provider: String,
    min_interval: Duration,
    state: Mutex<GateState>,
}

impl RateGate {
    pub fn new(provider: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            provider: provider.into(),
            min_interval,
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Interval the next request has to respect.
    pub async fn current_interval(&self) -> Duration {
        let state = self.state.lock().await;
        self.widened(state.consecutive_rate_limits)
    }

    pub async fn consecutive_rate_limits(&self) -> u32 {
        self.state.lock().await.consecutive_rate_limits
    }

    /// Block until this caller may send a request.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled()),
            guard = self.state.lock() => guard,
        };

        if let Some(last) = state.last_request {
            let interval = self.widened(state.consecutive_rate_limits);
            let elapsed = last.elapsed();
            if elapsed < interval {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.cancelled()),
                    _ = sleep(interval - elapsed) => {}
                }
            }
        }
        state.last_request = Some(Instant::now());
        Ok(())
    }

    /// Count a 429/403 answer; returns the new streak length.
    pub async fn record_rate_limited(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.consecutive_rate_limits = state.consecutive_rate_limits.saturating_add(1);
        state.consecutive_rate_limits
    }

    pub async fn record_success(&self) {
        self.state.lock().await.consecutive_rate_limits = 0;
    }

    fn widened(&self, consecutive_rate_limits: u32) -> Duration {
        self.min_interval
            .saturating_mul(consecutive_rate_limits.saturating_add(1))
    }

    fn cancelled(&self) -> ProviderError {
        ProviderError::Cancelled {
            provider: self.provider.clone(),
        }
    }
}

// ─── RetryPolicy ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// JSON-over-HTTPS client that funnels every request through a [`RateGate`]
/// and retries rate-limit answers with exponential backoff.
pub struct RateLimitedClient {
    provider: String,
    client: reqwest::Client,
    gate: RateGate,
    retry: RetryPolicy,
}

impl RateLimitedClient {
    pub fn new(provider: &str, min_interval: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ProviderError::Network {
                provider: provider.to_string(),
                source,
            })?;
        Ok(Self {
            provider: provider.to_string(),
            client,
            gate: RateGate::new(provider, min_interval),
            retry,
        })
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// GET `url` and decode the JSON body.
    ///
    /// 404 maps to [`ProviderError::NotFound`]; callers decide whether that
    /// is an empty result.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            self.gate.wait(cancel).await?;
            debug!(provider = %self.provider, %url, attempt, "GET");

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                resp = self.client.get(url.clone()).send() => resp.map_err(|e| self.network(e))?,
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
                let streak = self.gate.record_rate_limited().await;
                if attempt + 1 >= self.retry.max_attempts {
                    warn!(provider = %self.provider, attempts = attempt + 1, streak, "rate limited, giving up");
                    return Err(ProviderError::RateLimited {
                        provider: self.provider.clone(),
                        attempts: attempt + 1,
                    });
                }

                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or_default();
                let delay = self.retry.backoff(attempt).max(retry_after);
                warn!(provider = %self.provider, %status, streak, ?delay, "rate limited, backing off");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.cancelled()),
                    _ = sleep(delay) => {}
                }
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(self.status_error(status, url, body));
            }

            self.gate.record_success().await;
            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                text = response.text() => text.map_err(|e| self.network(e))?,
            };
            return serde_json::from_str(&text).map_err(|e| ProviderError::Decode {
                provider: self.provider.clone(),
                reason: e.to_string(),
            });
        }
    }

    fn status_error(&self, status: StatusCode, url: &Url, body: String) -> ProviderError {
        let provider = self.provider.clone();
        if status == StatusCode::NOT_FOUND {
            ProviderError::NotFound {
                provider,
                query: url.to_string(),
            }
        } else if status.is_client_error() {
            ProviderError::InvalidRequest {
                provider,
                reason: format!("HTTP {}: {}", status.as_u16(), truncate(&body)),
            }
        } else {
            ProviderError::ServerError {
                provider,
                status: status.as_u16(),
                message: truncate(&body),
            }
        }
    }

    fn network(&self, source: reqwest::Error) -> ProviderError {
        ProviderError::Network {
            provider: self.provider.clone(),
            source,
        }
    }

    fn cancelled(&self) -> ProviderError {
        ProviderError::Cancelled {
            provider: self.provider.clone(),
        }
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
