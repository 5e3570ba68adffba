//! Plain HTTP scraping of a search engine result page

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{build_client, check_status, engine_search_url, is_challenge_page, is_challenge_url, SearchProvider};
use crate::config::{Engine, HttpConfig};
use crate::error::SearchError;
use crate::extract::{RawResultSet, SelectorSet};
use crate::query::SearchQuery;

pub struct HttpScrapeProvider {
    client: reqwest::Client,
    engine: Engine,
    base_url: String,
    selectors: SelectorSet,
}

impl HttpScrapeProvider {
    pub fn new(http: &HttpConfig, engine: Engine, base_url: &str, selectors: SelectorSet) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            engine,
            base_url: base_url.to_string(),
            selectors,
        })
    }

    pub fn search_url(&self, query: &SearchQuery) -> String {
        engine_search_url(&self.base_url, self.engine, query)
    }
}

#[async_trait]
impl SearchProvider for HttpScrapeProvider {
    async fn search(&self, query: &SearchQuery, _max_results: usize) -> Result<RawResultSet, SearchError> {
        let url = self.search_url(query);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::from_transport(&e, self.name()))?;
        let response = check_status(response, self.name())?;

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::from_transport(&e, self.name()))?;

        if is_challenge_url(&final_url) || is_challenge_page(&body) {
            warn!(provider = self.name(), "Search engine answered with a bot challenge page");
            return Err(SearchError::RateLimited {
                provider: self.name().to_string(),
            });
        }

        debug!("Received {} bytes of result markup for {}", body.len(), query);
        Ok(RawResultSet::Markup(body))
    }

    fn name(&self) -> &str {
        self.engine.name()
    }

    fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }
}
