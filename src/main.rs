use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use sitefinder::batch::parse_items_file;
use sitefinder::cli::Cli;
use sitefinder::config::{self, AppConfig, CONFIG_PATH};
use sitefinder::export::{export_csv, export_json, print_batch_summary};
use sitefinder::logger::{RunLogger, VerbosityLevel};
use sitefinder::orchestrator::{Orchestrator, RunSettings};
use sitefinder::pacing::RunStatus;
use sitefinder::provider::build_provider;

/// Startup, configuration or export failure
const EXIT_FAILURE: u8 = 1;
/// The provider blocked the run before every item was searched
const EXIT_RATE_LIMITED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone().unwrap_or_else(|| Path::new(CONFIG_PATH).to_path_buf());

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config_at(&config_path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run sitefinder again.");
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        }
    }

    // Config must be settled before the progress bar starts, or an interactive prompt would be hidden
    let mut app_config = match AppConfig::load_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config(&path) {
            Ok(Some(created_path)) => {
                println!("✅ Created default configuration file at: {}", created_path.display());
                println!("   Edit this file to customize settings, then run sitefinder again.");
                return Ok(ExitCode::SUCCESS);
            }
            Ok(None) => {
                eprintln!("❌ Configuration file not found at: {}", path.display());
                eprintln!("   Run with --init to create a default configuration file.");
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        },
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    if let Err(e) = cli.validate() {
        eprintln!("❌ Invalid arguments: {}", e);
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    cli.apply_overrides(&mut app_config);
    if let Err(e) = app_config.validate() {
        eprintln!("❌ Configuration error: {}", e);
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path.clone()),
        None => RunLogger::new(verbosity),
    };

    let input_path = cli
        .input_file
        .as_deref()
        .context("Input file is required")?;
    let items = match parse_items_file(input_path) {
        Ok(items) => items,
        Err(e) => {
            logger.error(&format!("{:#}", e));
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };
    logger.log_input_loaded(&input_path.display().to_string(), items.len());

    if items.is_empty() {
        logger.error("No items to search in the input file");
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    let provider = match build_provider(&app_config) {
        Ok(provider) => provider,
        Err(e) => {
            logger.error(&format!("Search provider failed to initialize: {:#}", e));
            eprintln!("❌ Search {} before any item was processed", RunStatus::Aborted);
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    let output_dir = cli.get_output_dir();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", output_dir))?;

    logger.start_progress(items.len() as u64, provider.name());
    let mut orchestrator = Orchestrator::new(provider, RunSettings::from_config(&app_config), &app_config.pacing)
        .with_progress(Arc::new(logger.clone()));
    let result = orchestrator.run(&items).await;
    // Release the provider (and a browser session with it) before exporting
    drop(orchestrator);

    let output_path = cli.output_path();
    let output_str = output_path.to_string_lossy().to_string();
    let export_result = match cli.output_format.as_str() {
        "json" => export_json(&result, &output_str),
        _ => export_csv(&result, cli.layout, &output_str),
    };
    let exported = match export_result {
        Ok(()) => {
            logger.log_export_success(&output_str);
            true
        }
        Err(e) => {
            logger.error(&format!("Export failed: {:#}", e));
            false
        }
    };

    print_batch_summary(&result);
    logger.print_final_summary();

    if let Err(e) = logger.export_logs() {
        eprintln!("⚠️  Failed to write log file: {}", e);
    }

    if !exported {
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    if result.status == RunStatus::RateLimited {
        return Ok(ExitCode::from(EXIT_RATE_LIMITED));
    }

    Ok(ExitCode::SUCCESS)
}
