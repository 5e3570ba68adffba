//! Error taxonomy for a single search lookup.
//!
//! Every variant is per-item: the orchestrator turns it into a sentinel
//! record. Only [`SearchError::RateLimited`] stops the run.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The input item cannot be searched (e.g. empty name)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider throttled or blocked this session (HTTP 429 or a bot challenge page)
    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    /// Network failure, DNS failure or timeout before any response arrived
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Any other unsuccessful response from the provider
    #[error("Provider error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    ProviderError {
        status: Option<u16>,
        message: String,
    },
}

impl SearchError {
    /// Map a transport-level reqwest error onto the taxonomy.
    ///
    /// Errors carrying a status code are classified by status, everything
    /// else (connect, timeout, body read) counts as the provider being unavailable.
    pub fn from_transport(err: &reqwest::Error, provider: &str) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), provider, &err.to_string()),
            None => Self::ProviderUnavailable(format!("{}: {}", provider, err)),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, provider: &str, message: &str) -> Self {
        if status == 429 {
            Self::RateLimited {
                provider: provider.to_string(),
            }
        } else {
            Self::ProviderError {
                status: Some(status),
                message: format!("{}: {}", provider, message),
            }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
