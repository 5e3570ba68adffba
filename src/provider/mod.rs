//! Search provider adapters
//!
//! Every variant issues one search per call and hands back either raw result
//! markup or structured hits. Failures are mapped onto [`SearchError`] so the
//! orchestrator can apply one policy regardless of the provider in use.

pub mod browser;
pub mod http;
pub mod wrapper;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::{AppConfig, Engine, HttpConfig, ProviderKind};
use crate::error::SearchError;
use crate::extract::{RawResultSet, SelectorSet};
use crate::query::SearchQuery;

pub use browser::{BrowserProvider, BrowserSession};
pub use http::HttpScrapeProvider;
pub use wrapper::WrapperProvider;

/// Markers of the interstitial pages engines serve to clients they have blocked
const CHALLENGE_MARKERS: &[&str] = &[
    // Google
    "detected unusual traffic from your computer network",
    "id=\"captcha-form\"",
    "/sorry/index",
    // DuckDuckGo
    "anomaly-modal",
    "challenge-form",
    "Unfortunately, bots use DuckDuckGo too",
];

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search. `max_results` is a hint; extraction enforces the bound.
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<RawResultSet, SearchError>;

    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// Selectors for parsing this provider's markup
    fn selectors(&self) -> &SelectorSet;
}

/// URL of an engine's result page for `query`
pub fn engine_search_url(base_url: &str, engine: Engine, query: &SearchQuery) -> String {
    format!(
        "{}{}{}",
        base_url.trim_end_matches('/'),
        engine.search_path(),
        urlencoding::encode(query.as_str())
    )
}

/// True when the page is a bot challenge rather than a result page
pub fn is_challenge_page(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| html.contains(marker))
}

/// True when the engine redirected to its block interstitial
pub fn is_challenge_url(url: &str) -> bool {
    url.contains("/sorry/")
}

/// HTTP client shared by the HTTP and wrapper providers
pub(crate) fn build_client(http: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(http.request_timeout())
        .user_agent(http.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")
}

/// Turn a non-success response status into the matching error
pub(crate) fn check_status(response: reqwest::Response, provider: &str) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SearchError::from_status(
            status.as_u16(),
            provider,
            status.canonical_reason().unwrap_or("unexpected status"),
        ))
    }
}

/// Create the provider selected by configuration.
///
/// The browser variant launches Chrome here; a launch failure is returned to
/// the caller, which aborts the run before any item is processed.
pub fn build_provider(config: &AppConfig) -> Result<Box<dyn SearchProvider>> {
    let engine = config.search.engine;
    let selectors = config.selector_set(engine);

    info!(
        provider = %config.search.provider,
        engine = %engine,
        "Initializing search provider"
    );

    let provider: Box<dyn SearchProvider> = match config.search.provider {
        ProviderKind::Http => Box::new(HttpScrapeProvider::new(
            &config.http,
            engine,
            config.search.effective_base_url(),
            selectors,
        )?),
        ProviderKind::Browser => {
            let session = BrowserSession::launch().context("Failed to start headless browser session")?;
            Box::new(BrowserProvider::new(
                session,
                &config.http,
                engine,
                config.search.effective_base_url(),
                config.pacing.browser_settle(),
                selectors,
            )?)
        }
        ProviderKind::Wrapper => {
            let wrapper_url = config
                .search
                .wrapper_url
                .as_deref()
                .context("search.wrapper_url is required for the wrapper provider")?;
            Box::new(WrapperProvider::new(&config.http, wrapper_url, selectors)?)
        }
    };

    Ok(provider)
}
