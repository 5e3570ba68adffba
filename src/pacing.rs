//! Request pacing and failure policy for a batch run
//!
//! The pacer inserts a fixed delay between every pair of consecutive provider
//! calls. The failure policy decides, per error, whether the run halts, the
//! call is retried with backoff, or the item is recorded as failed.

use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::PacingConfig;
use crate::error::SearchError;

/// Lifecycle of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    /// Every item was processed
    Completed,
    /// The provider blocked the session; later items were not searched
    RateLimited,
    /// The run could not start (e.g. the provider failed to initialize)
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::RateLimited | RunStatus::Aborted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::RateLimited => "rate limited",
            RunStatus::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// Fixed inter-request throttle
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    calls: u64,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, calls: 0 }
    }

    /// Wait as required before the next provider call. The first call of the run goes out immediately.
    pub async fn before_call(&mut self) {
        if self.calls > 0 && !self.delay.is_zero() {
            debug!("Pacing: waiting {:?} before next provider call", self.delay);
            sleep(self.delay).await;
        }
        self.calls += 1;
    }

    /// Provider calls made so far
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

/// What to do after a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Stop issuing provider calls for the rest of the run
    Halt,
    /// Try the same call again after the given backoff
    Retry(Duration),
    /// Record the failure sentinel for this item and continue
    RecordFailure,
    /// Record the invalid-input sentinel and continue without calling the provider
    Skip,
}

#[derive(Debug, Clone)]
pub struct FailurePolicy {
    config: PacingConfig,
}

impl FailurePolicy {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Classify an error given how many retries this call has already used.
    ///
    /// Only network-level failures are retried, and only while retries remain.
    /// Rate limiting is never retried within a run.
    pub fn classify(&self, error: &SearchError, retries_used: u32) -> FailureAction {
        match error {
            SearchError::RateLimited { .. } => FailureAction::Halt,
            SearchError::ProviderUnavailable(_) if retries_used < self.config.max_retries => {
                FailureAction::Retry(self.config.calculate_backoff_delay(retries_used + 1))
            }
            SearchError::ProviderUnavailable(_) | SearchError::ProviderError { .. } => FailureAction::RecordFailure,
            SearchError::InvalidInput(_) => FailureAction::Skip,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Log pacing configuration
    pub fn log_config(&self) {
        let retries = if self.config.max_retries > 0 {
            format!(
                "{} ({:?} backoff, {}ms base, {}ms cap)",
                self.config.max_retries,
                self.config.backoff_strategy,
                self.config.backoff_base_delay_ms,
                self.config.backoff_max_delay_ms
            )
        } else {
            "disabled".to_string()
        };

        info!(
            "Pacing: {}ms between provider calls, retries: {}",
            self.config.request_delay_ms, retries
        );
    }
}
