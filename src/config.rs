//! Configuration management for sitefinder
//!
//! Configuration is loaded from `./config/sitefinder.toml` unless another path
//! is given. The default file shipped with the binary is the template written
//! by `--init`.

use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::extract::SelectorSet;
use crate::normalize::is_http_url;
use crate::query::QueryTemplate;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/sitefinder.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/sitefinder.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Configuration file already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid CSS selector in '{field}': {error}\n  Selector: {selector}")]
    InvalidSelector {
        field: String,
        selector: String,
        error: String,
    },

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    ZeroValue { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub search: SearchConfig,
    pub query: QueryConfig,
    pub pacing: PacingConfig,
    #[serde(default)]
    pub selectors: SelectorsConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which adapter issues the searches
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Fetch the engine's result page over HTTP
    Http,
    /// Render the result page in headless Chrome
    Browser,
    /// Query a SearxNG-compatible JSON search service
    Wrapper,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Http => write!(f, "http"),
            ProviderKind::Browser => write!(f, "browser"),
            ProviderKind::Wrapper => write!(f, "wrapper"),
        }
    }
}

/// Search engine whose result pages are fetched and parsed
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Google,
    Duckduckgo,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Google => "google",
            Engine::Duckduckgo => "duckduckgo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Engine::Google => "https://www.google.com",
            Engine::Duckduckgo => "https://html.duckduckgo.com",
        }
    }

    /// Path and query-string prefix appended to the base URL
    pub fn search_path(&self) -> &'static str {
        match self {
            Engine::Google => "/search?q=",
            Engine::Duckduckgo => "/html/?q=",
        }
    }

    pub fn default_selectors(&self) -> SelectorSet {
        match self {
            Engine::Google => SelectorSet::google(),
            Engine::Duckduckgo => SelectorSet::duckduckgo(),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Search behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub provider: ProviderKind,
    pub engine: Engine,
    /// Overrides the engine's endpoint (used to point at a mirror or a test server)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Base URL of the JSON search service for the wrapper provider
    #[serde(default)]
    pub wrapper_url: Option<String>,
    pub max_results: usize,
    pub suggest_official_site: bool,
}

impl SearchConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.engine.default_base_url())
    }
}

/// Qualifier phrases used by the query builder
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub official_qualifier: String,
    #[serde(default)]
    pub general_qualifier: Option<String>,
}

impl QueryConfig {
    pub fn template(&self) -> QueryTemplate {
        QueryTemplate {
            official_qualifier: self.official_qualifier.clone(),
            general_qualifier: self.general_qualifier.clone(),
        }
    }
}

/// Backoff strategy between retries of a failed provider call
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    Exponential,
}

/// Request pacing and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Fixed wait between consecutive provider calls
    pub request_delay_ms: u64,
    /// Settle interval after browser navigation
    pub browser_settle_ms: u64,
    /// Extra attempts for transient failures
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_strategy")]
    pub backoff_strategy: BackoffStrategy,
    #[serde(default = "default_backoff_base_delay_ms")]
    pub backoff_base_delay_ms: u64,
    #[serde(default = "default_backoff_max_delay_ms")]
    pub backoff_max_delay_ms: u64,
}

fn default_backoff_strategy() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_backoff_base_delay_ms() -> u64 {
    2000
}

fn default_backoff_max_delay_ms() -> u64 {
    30000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 7000,
            browser_settle_ms: 1500,
            max_retries: 0,
            backoff_strategy: default_backoff_strategy(),
            backoff_base_delay_ms: default_backoff_base_delay_ms(),
            backoff_max_delay_ms: default_backoff_max_delay_ms(),
        }
    }
}

impl PacingConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn browser_settle(&self) -> Duration {
        Duration::from_millis(self.browser_settle_ms)
    }

    /// Delay before retry number `attempt` (1-based); attempt 0 waits nothing
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = match self.backoff_strategy {
            BackoffStrategy::Linear => self.backoff_base_delay_ms.saturating_mul(attempt as u64),
            BackoffStrategy::Exponential => {
                let factor = 2u64.checked_pow(attempt - 1).unwrap_or(u64::MAX);
                self.backoff_base_delay_ms.saturating_mul(factor)
            }
        };

        Duration::from_millis(delay_ms.min(self.backoff_max_delay_ms))
    }
}

/// Per-engine selector overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorsConfig {
    #[serde(default)]
    pub google: Option<SelectorOverride>,
    #[serde(default)]
    pub duckduckgo: Option<SelectorOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorOverride {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub fallbacks: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_hosts: Option<Vec<String>>,
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Selector set for an engine, with configured overrides applied
    pub fn selector_set(&self, engine: Engine) -> SelectorSet {
        let mut set = engine.default_selectors();
        let overrides = match engine {
            Engine::Google => self.selectors.google.as_ref(),
            Engine::Duckduckgo => self.selectors.duckduckgo.as_ref(),
        };

        if let Some(overrides) = overrides {
            if let Some(primary) = &overrides.primary {
                set.primary = primary.clone();
            }
            if let Some(fallbacks) = &overrides.fallbacks {
                set.fallbacks = fallbacks.clone();
            }
            if let Some(hosts) = &overrides.excluded_hosts {
                set.excluded_hosts = hosts.clone();
            }
        }

        set
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::ZeroValue {
                field: "search.max_results".to_string(),
            });
        }

        if let Some(base_url) = &self.search.base_url {
            Self::validate_url("search.base_url", base_url)?;
        }

        match (&self.search.provider, &self.search.wrapper_url) {
            (ProviderKind::Wrapper, None) => {
                return Err(ConfigError::EmptyRequired {
                    field: "search.wrapper_url (required when provider = 'wrapper')".to_string(),
                });
            }
            (_, Some(url)) => Self::validate_url("search.wrapper_url", url)?,
            _ => {}
        }

        if self.query.official_qualifier.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "query.official_qualifier".to_string(),
            });
        }

        for engine in [Engine::Google, Engine::Duckduckgo] {
            let set = self.selector_set(engine);
            if set.primary.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("selectors.{}.primary", engine),
                });
            }
            set.validate().map_err(|(selector, error)| ConfigError::InvalidSelector {
                field: format!("selectors.{}", engine),
                selector,
                error,
            })?;
        }

        Ok(())
    }

    fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
        if is_http_url(url) {
            Ok(())
        } else {
            Err(ConfigError::InvalidUrl {
                field: field.to_string(),
                url: url.to_string(),
            })
        }
    }

    /// Write the default configuration file to `path`, creating its directory
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config at {}? [Y/n] ", path.display());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config_at(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}
