use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::{AppConfig, Engine, ProviderKind};
use crate::export::CsvLayout;

#[derive(Parser, Debug)]
#[command(name = "sitefinder")]
#[command(about = "Finds the official websites of a list of organizations through web search")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/sitefinder.toml
    #[arg(long)]
    pub init: bool,

    /// Items to search: .csv with a 'nome,regiao' header, .txt with one name per line, or .json
    #[arg(short, long, value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    /// Configuration file (defaults to ./config/sitefinder.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format: 'csv' (default) or 'json'
    #[arg(short = 'f', long, default_value = "csv")]
    pub output_format: String,

    /// CSV column layout
    #[arg(long, value_enum, default_value = "rich")]
    pub layout: CsvLayout,

    /// Output directory for the results file (defaults to Desktop)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Output filename without extension
    #[arg(short, long, default_value = "sites_encontrados")]
    pub output: String,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export execution logs to a file (specify file path)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Milliseconds to wait between provider calls (overrides config)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Candidate links kept per organization (overrides config)
    #[arg(long, value_name = "N")]
    pub max_results: Option<usize>,

    /// Search engine (overrides config)
    #[arg(long, value_enum)]
    pub engine: Option<Engine>,

    /// Search provider (overrides config)
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Skip the official-site query (one provider call per item)
    #[arg(long)]
    pub no_suggest: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if !self.init {
            match &self.input_file {
                None => return Err("Input file is required (use --input-file <FILE>)".to_string()),
                Some(path) if path.as_os_str().is_empty() => return Err("Input file cannot be empty".to_string()),
                _ => {}
            }
        }

        if !["csv", "json"].contains(&self.output_format.as_str()) {
            return Err("Output format must be 'csv' or 'json'".to_string());
        }

        if self.output.trim().is_empty() {
            return Err("Output filename cannot be empty".to_string());
        }

        if self.max_results == Some(0) {
            return Err("Max results must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(delay_ms) = self.delay_ms {
            config.pacing.request_delay_ms = delay_ms;
        }
        if let Some(max_results) = self.max_results {
            config.search.max_results = max_results;
        }
        if let Some(engine) = self.engine {
            config.search.engine = engine;
        }
        if let Some(provider) = self.provider {
            config.search.provider = provider;
        }
        if self.no_suggest {
            config.search.suggest_official_site = false;
        }
    }

    pub fn get_default_output_dir() -> String {
        dirs::desktop_dir()
            .map(|dir| dir.to_string_lossy().to_string())
            // Fallback to current directory if Desktop can't be found
            .unwrap_or_else(|| ".".to_string())
    }

    pub fn get_output_dir(&self) -> String {
        self.output_dir.clone().unwrap_or_else(Self::get_default_output_dir)
    }

    /// Full path of the results file, extension set from the output format
    pub fn output_path(&self) -> PathBuf {
        Path::new(&self.get_output_dir())
            .join(&self.output)
            .with_extension(&self.output_format)
    }
}
