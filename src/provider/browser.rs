//! Result pages rendered by headless Chrome
//!
//! A [`BrowserSession`] owns one Chrome process. It is created once by the
//! caller and moved into the [`BrowserProvider`], which reuses a single tab for
//! every query. Dropping the provider drops the session, which kills Chrome.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{engine_search_url, is_challenge_page, is_challenge_url, SearchProvider};
use crate::config::{Engine, HttpConfig};
use crate::error::SearchError;
use crate::extract::{RawResultSet, SelectorSet};
use crate::query::SearchQuery;

/// An exclusively owned headless Chrome process
pub struct BrowserSession {
    browser: Browser,
}

impl BrowserSession {
    /// Launch Chrome.
    ///
    /// The sandbox is disabled inside containers (detected via /.dockerenv or
    /// the SITEFINDER_CONTAINER env var). CHROME_PATH selects the binary.
    pub fn launch() -> Result<Self> {
        let is_container = std::env::var("SITEFINDER_CONTAINER").is_ok() || Path::new("/.dockerenv").exists();
        let chrome_path: Option<PathBuf> = std::env::var("CHROME_PATH").ok().map(PathBuf::from);

        debug!(
            "Launching headless Chrome (container: {}, path: {})",
            is_container,
            chrome_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "auto".to_string())
        );

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(!is_container)
            .path(chrome_path)
            .build()
            .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;

        let browser = Browser::new(options).map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?;

        Ok(Self { browser })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }
}

pub struct BrowserProvider {
    // Keeps Chrome alive for as long as the provider exists
    _session: BrowserSession,
    tab: Arc<Tab>,
    engine: Engine,
    base_url: String,
    settle: Duration,
    selectors: SelectorSet,
}

impl BrowserProvider {
    pub fn new(
        session: BrowserSession,
        http: &HttpConfig,
        engine: Engine,
        base_url: &str,
        settle: Duration,
        selectors: SelectorSet,
    ) -> Result<Self> {
        let tab = session
            .browser()
            .new_tab()
            .map_err(|e| anyhow!("Failed to create browser tab: {}", e))?;

        tab.set_default_timeout(http.request_timeout());
        tab.set_user_agent(&http.user_agent, None, None)
            .map_err(|e| anyhow!("Failed to set browser user agent: {}", e))?;

        Ok(Self {
            _session: session,
            tab,
            engine,
            base_url: base_url.to_string(),
            settle,
            selectors,
        })
    }
}

/// Navigate, let client-side rendering settle, then read the page
fn render_page(tab: &Tab, url: &str, settle: Duration) -> Result<(String, String)> {
    tab.navigate_to(url)
        .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;
    tab.wait_until_navigated()
        .map_err(|e| anyhow!("Navigation to {} did not finish: {}", url, e))?;

    std::thread::sleep(settle);

    let content = tab.get_content()
        .map_err(|e| anyhow!("Failed to read page content: {}", e))?;

    Ok((tab.get_url(), content))
}

#[async_trait]
impl SearchProvider for BrowserProvider {
    async fn search(&self, query: &SearchQuery, _max_results: usize) -> Result<RawResultSet, SearchError> {
        let url = engine_search_url(&self.base_url, self.engine, query);
        debug!("Browser navigating to {}", url);

        let tab = Arc::clone(&self.tab);
        let settle = self.settle;
        let (final_url, content) = tokio::task::spawn_blocking(move || render_page(&tab, &url, settle))
            .await
            .map_err(|e| SearchError::ProviderError {
                status: None,
                message: format!("browser task failed: {}", e),
            })?
            .map_err(|e| SearchError::ProviderUnavailable(format!("browser: {}", e)))?;

        if is_challenge_url(&final_url) || is_challenge_page(&content) {
            warn!(provider = self.name(), "Search engine served a bot challenge to the browser");
            return Err(SearchError::RateLimited {
                provider: self.name().to_string(),
            });
        }

        Ok(RawResultSet::Markup(content))
    }

    fn name(&self) -> &str {
        self.engine.name()
    }

    fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }
}
