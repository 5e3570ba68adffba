//! Batch orchestration
//!
//! Items are processed strictly one at a time in input order. For each item
//! the orchestrator builds its queries, calls the provider through the pacer,
//! extracts and normalizes candidates, and assembles result records. Every
//! item yields at least one record, so a run over N items produces at least
//! N records in input order.

use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::batch::{
    finalize_batch_summary, new_batch_summary, BatchResult, RecordOutcome, ResultRecord, SearchItem,
    SEARCH_FAILED, SUGGESTION_NOT_FOUND,
};
use crate::config::{AppConfig, PacingConfig};
use crate::error::SearchError;
use crate::extract::{extract_links, RawResultSet};
use crate::normalize::{normalize, NormalizedLink};
use crate::pacing::{FailureAction, FailurePolicy, Pacer, RunStatus};
use crate::provider::SearchProvider;
use crate::query::{build_query, QueryMode, QueryTemplate, SearchQuery};

/// Observer of run progress. Calls are fire-and-forget.
pub trait ProgressReporter: Send + Sync {
    /// An item is about to be searched (`index` is 1-based)
    fn item_started(&self, _index: usize, _total: usize, _name: &str) {}

    /// An item has its records
    fn item_finished(&self, completed: usize, total: usize, name: &str);

    /// The run reached a terminal status
    fn finish(&self, status: RunStatus);
}

/// Reporter that ignores every event
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn item_finished(&self, _completed: usize, _total: usize, _name: &str) {}
    fn finish(&self, _status: RunStatus) {}
}

/// Per-run search behaviour
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_results: usize,
    pub suggest_official_site: bool,
    pub template: QueryTemplate,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_results: config.search.max_results,
            suggest_official_site: config.search.suggest_official_site,
            template: config.query.template(),
        }
    }
}

struct ItemResult {
    records: Vec<ResultRecord>,
    outcome: RecordOutcome,
}

pub struct Orchestrator {
    provider: Box<dyn SearchProvider>,
    settings: RunSettings,
    pacer: Pacer,
    policy: FailurePolicy,
    progress: Arc<dyn ProgressReporter>,
    status: RunStatus,
}

impl Orchestrator {
    pub fn new(provider: Box<dyn SearchProvider>, settings: RunSettings, pacing: &PacingConfig) -> Self {
        Self {
            provider,
            settings,
            pacer: Pacer::new(pacing.request_delay()),
            policy: FailurePolicy::new(pacing),
            progress: Arc::new(SilentProgress),
            status: RunStatus::Idle,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Provider calls issued so far
    pub fn provider_calls(&self) -> u64 {
        self.pacer.calls()
    }

    /// Process every item in order and return the ordered records
    pub async fn run(&mut self, items: &[SearchItem]) -> BatchResult {
        let started = Instant::now();
        let mut summary = new_batch_summary();
        let total = items.len();

        self.status = RunStatus::Running;
        info!(
            "Starting batch of {} items with provider '{}' (max {} results per item)",
            total,
            self.provider.name(),
            self.settings.max_results
        );
        self.policy.log_config();

        let mut records = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);

        for (idx, item) in items.iter().enumerate() {
            let result = if self.status == RunStatus::RateLimited {
                ItemResult {
                    records: vec![ResultRecord::sentinel(item, None, RecordOutcome::NotSearched)],
                    outcome: RecordOutcome::NotSearched,
                }
            } else {
                self.progress.item_started(idx + 1, total, &item.name);
                let result = self.process_item(item).await;
                if result.outcome == RecordOutcome::Blocked {
                    warn!(
                        "Provider '{}' blocked further requests at item {}/{} ({}); remaining items will not be searched",
                        self.provider.name(),
                        idx + 1,
                        total,
                        item.name
                    );
                    self.status = RunStatus::RateLimited;
                }
                result
            };

            debug!("[{}/{}] {} -> {:?} ({} records)", idx + 1, total, item.name, result.outcome, result.records.len());
            records.extend(result.records.into_iter().map(|record| record.with_item_index(idx)));
            outcomes.push(result.outcome);
            self.progress.item_finished(idx + 1, total, &item.name);
        }

        if self.status == RunStatus::Running {
            self.status = RunStatus::Completed;
        }

        finalize_batch_summary(&mut summary, &outcomes, &records);
        summary.total_duration_secs = started.elapsed().as_secs_f64();

        info!(
            "Batch {}: {} items, {} records, {} provider calls in {:.1}s",
            self.status,
            total,
            records.len(),
            self.pacer.calls(),
            summary.total_duration_secs
        );
        self.progress.finish(self.status);

        BatchResult {
            status: self.status,
            summary,
            records,
        }
    }

    async fn process_item(&mut self, item: &SearchItem) -> ItemResult {
        let general = match build_query(item, QueryMode::General, &self.settings.template) {
            Ok(query) => query,
            Err(err) => return self.failed_item(item, None, &err),
        };

        let suggested_site = if self.settings.suggest_official_site {
            let official = match build_query(item, QueryMode::OfficialSite, &self.settings.template) {
                Ok(query) => query,
                Err(err) => return self.failed_item(item, None, &err),
            };

            match self.lookup(&official).await {
                Ok(links) => Some(
                    links
                        .into_iter()
                        .next()
                        .map(|link| link.url)
                        .unwrap_or_else(|| SUGGESTION_NOT_FOUND.to_string()),
                ),
                Err(err) if err.is_rate_limited() => return self.failed_item(item, None, &err),
                Err(err) => {
                    warn!("Official site lookup failed for '{}': {}", item.name, err);
                    Some(SEARCH_FAILED.to_string())
                }
            }
        } else {
            None
        };

        match self.lookup(&general).await {
            Ok(links) if links.is_empty() => ItemResult {
                records: vec![ResultRecord::sentinel(item, suggested_site, RecordOutcome::NotFound)],
                outcome: RecordOutcome::NotFound,
            },
            Ok(links) => ItemResult {
                records: links
                    .into_iter()
                    .map(|link| ResultRecord::found(item, suggested_site.clone(), link.domain, link.url))
                    .collect(),
                outcome: RecordOutcome::Found,
            },
            Err(err) => self.failed_item(item, suggested_site, &err),
        }
    }

    /// One sentinel record for an item whose lookup could not complete
    fn failed_item(&self, item: &SearchItem, suggested_site: Option<String>, err: &SearchError) -> ItemResult {
        let outcome = match self.policy.classify(err, u32::MAX) {
            FailureAction::Halt => RecordOutcome::Blocked,
            FailureAction::Skip => {
                warn!("Skipping item {:?}: {}", item.name, err);
                RecordOutcome::InvalidInput
            }
            FailureAction::Retry(_) | FailureAction::RecordFailure => {
                warn!("Search failed for '{}': {}", item.name, err);
                RecordOutcome::Failed
            }
        };

        ItemResult {
            records: vec![ResultRecord::sentinel(item, suggested_site, outcome)],
            outcome,
        }
    }

    /// Paced provider call with retries for transient failures, returning normalized candidates
    async fn lookup(&mut self, query: &SearchQuery) -> Result<Vec<NormalizedLink>, SearchError> {
        let mut retries_used = 0;

        loop {
            self.pacer.before_call().await;
            debug!("Searching {} for {}", self.provider.name(), query);

            let error = match self.provider.search(query, self.settings.max_results).await {
                Ok(raw) => return Ok(self.candidates(raw, query)),
                Err(error) => error,
            };

            match self.policy.classify(&error, retries_used) {
                FailureAction::Retry(backoff) => {
                    retries_used += 1;
                    warn!(
                        "{} (retry {}/{} in {:?})",
                        error,
                        retries_used,
                        self.policy.max_retries(),
                        backoff
                    );
                    sleep(backoff).await;
                }
                _ => return Err(error),
            }
        }
    }

    /// Extract and normalize candidates. Parsed markup never outlives this call.
    fn candidates(&self, raw: RawResultSet, query: &SearchQuery) -> Vec<NormalizedLink> {
        let links = extract_links(raw, self.provider.selectors(), query, self.settings.max_results);
        links.iter().map(|link| normalize(&link)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::batch::{BLOCKED_BY_PROVIDER, NOT_SEARCHED, NO_RESULTS};
    use crate::extract::{SelectorSet, StructuredHit};

    /// Answers every query with the same result and records what was asked
    struct EchoProvider {
        urls: Vec<&'static str>,
        fail_with: Option<SearchError>,
        queries: Mutex<Vec<String>>,
        selectors: SelectorSet,
    }

    impl EchoProvider {
        fn new(urls: Vec<&'static str>) -> Self {
            Self {
                urls,
                fail_with: None,
                queries: Mutex::new(Vec::new()),
                selectors: SelectorSet::google(),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for EchoProvider {
        async fn search(&self, query: &SearchQuery, _max_results: usize) -> Result<RawResultSet, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(RawResultSet::Structured(
                self.urls.iter().map(|u| StructuredHit { url: u.to_string(), title: None }).collect(),
            ))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn selectors(&self) -> &SelectorSet {
            &self.selectors
        }
    }

    fn settings(suggest: bool, max_results: usize) -> RunSettings {
        RunSettings {
            max_results,
            suggest_official_site: suggest,
            template: QueryTemplate::default(),
        }
    }

    fn no_delay() -> PacingConfig {
        PacingConfig {
            request_delay_ms: 0,
            ..PacingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_records_carry_suggested_site_and_respect_max_results() {
        let provider = EchoProvider::new(vec![
            "https://www.exemplonews.com.br/",
            "https://facebook.com/exemplonews",
            "https://instagram.com/exemplonews",
        ]);
        let mut orchestrator = Orchestrator::new(Box::new(provider), settings(true, 2), &no_delay());

        let result = orchestrator.run(&[SearchItem::new("Exemplo News")]).await;

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.records.len(), 2);
        for record in &result.records {
            assert_eq!(record.suggested_site.as_deref(), Some("https://www.exemplonews.com.br/"));
        }
        assert_eq!(result.records[0].domain, "exemplonews.com.br");
        assert_eq!(orchestrator.provider_calls(), 2);
    }

    #[tokio::test]
    async fn test_suggestion_disabled_issues_one_call_per_item() {
        let provider = EchoProvider::new(vec![]);
        let mut orchestrator = Orchestrator::new(Box::new(provider), settings(false, 5), &no_delay());

        let items = vec![SearchItem::new("A"), SearchItem::new("B")];
        let result = orchestrator.run(&items).await;

        assert_eq!(orchestrator.provider_calls(), 2);
        assert_eq!(result.records.len(), 2);
        assert!(result.records.iter().all(|r| r.url == NO_RESULTS && r.suggested_site.is_none()));
    }

    #[tokio::test]
    async fn test_invalid_item_makes_no_provider_call() {
        let provider = EchoProvider::new(vec!["https://exemplo.com"]);
        let mut orchestrator = Orchestrator::new(Box::new(provider), settings(true, 5), &no_delay());

        let result = orchestrator.run(&[SearchItem::new("   ")]).await;

        assert_eq!(orchestrator.provider_calls(), 0);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].outcome, RecordOutcome::InvalidInput);
        assert_eq!(result.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_rate_limit_during_official_lookup_blocks_item() {
        let mut provider = EchoProvider::new(vec![]);
        provider.fail_with = Some(SearchError::RateLimited { provider: "echo".to_string() });
        let mut orchestrator = Orchestrator::new(Box::new(provider), settings(true, 5), &no_delay());

        let items = vec![SearchItem::new("A"), SearchItem::new("B")];
        let result = orchestrator.run(&items).await;

        assert_eq!(result.status, RunStatus::RateLimited);
        assert_eq!(orchestrator.status(), RunStatus::RateLimited);
        assert_eq!(orchestrator.provider_calls(), 1);
        assert_eq!(result.records[0].url, BLOCKED_BY_PROVIDER);
        assert_eq!(result.records[1].url, NOT_SEARCHED);
    }

    #[tokio::test]
    async fn test_retries_transient_failures_when_configured() {
        let mut provider = EchoProvider::new(vec![]);
        provider.fail_with = Some(SearchError::ProviderUnavailable("timeout".to_string()));
        let pacing = PacingConfig {
            request_delay_ms: 0,
            max_retries: 2,
            backoff_base_delay_ms: 0,
            ..PacingConfig::default()
        };
        let mut orchestrator = Orchestrator::new(Box::new(provider), settings(false, 5), &pacing);

        let result = orchestrator.run(&[SearchItem::new("A")]).await;

        assert_eq!(orchestrator.provider_calls(), 3);
        assert_eq!(result.records[0].outcome, RecordOutcome::Failed);
        assert_eq!(result.status, RunStatus::Completed);
    }
}
