use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The query itself is malformed; retrying cannot help.
    #[error("invalid request to {provider}: {reason}")]
    InvalidRequest { provider: String, reason: String },

    /// Valid query without a match. Providers turn this into an empty result.
    #[error("{provider}: no match for {query}")]
    NotFound { provider: String, query: String },

    #[error("rate limited by {provider} after {attempts} attempt(s)")]
    RateLimited { provider: String, attempts: u32 },

    #[error("server error from {provider}: HTTP {status}: {message}")]
    ServerError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("network error talking to {provider}: {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unreadable response from {provider}: {reason}")]
    Decode { provider: String, reason: String },

    #[error("request to {provider} cancelled")]
    Cancelled { provider: String },
}

impl ProviderError {
    /// Only rate limiting is retried, and only inside the HTTP client.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Hard failures of [`crate::Resolver::resolve`]. Provider errors never show up here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no metadata providers configured")]
    NoProviders,

    #[error("resolution cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
