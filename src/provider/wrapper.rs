//! Structured search through a SearxNG-compatible JSON endpoint
//!
//! `GET {base}/search?q=<query>&format=json` answers with
//! `{"results": [{"url": "...", "title": "..."}, ...]}`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{build_client, check_status, SearchProvider};
use crate::config::HttpConfig;
use crate::error::SearchError;
use crate::extract::{RawResultSet, SelectorSet, StructuredHit};
use crate::query::SearchQuery;

const PROVIDER_NAME: &str = "wrapper";

#[derive(Debug, Deserialize)]
struct WrapperResponse {
    #[serde(default)]
    results: Vec<StructuredHit>,
}

pub struct WrapperProvider {
    client: reqwest::Client,
    base_url: String,
    selectors: SelectorSet,
}

impl WrapperProvider {
    pub fn new(http: &HttpConfig, base_url: &str, selectors: SelectorSet) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            selectors,
        })
    }

    pub fn search_url(&self, query: &SearchQuery) -> String {
        format!("{}/search?q={}&format=json", self.base_url, urlencoding::encode(query.as_str()))
    }
}

#[async_trait]
impl SearchProvider for WrapperProvider {
    async fn search(&self, query: &SearchQuery, _max_results: usize) -> Result<RawResultSet, SearchError> {
        let url = self.search_url(query);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::from_transport(&e, PROVIDER_NAME))?;
        let response = check_status(response, PROVIDER_NAME)?;

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::from_transport(&e, PROVIDER_NAME))?;

        let parsed: WrapperResponse = serde_json::from_str(&body).map_err(|e| SearchError::ProviderError {
            status: None,
            message: format!("{}: invalid JSON response: {}", PROVIDER_NAME, e),
        })?;

        debug!("Wrapper returned {} hits for {}", parsed.results.len(), query);
        Ok(RawResultSet::Structured(parsed.results))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }
}
