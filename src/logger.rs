use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::orchestrator::ProgressReporter;
use crate::pacing::RunStatus;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only progress bar and final summary
    Summary = 1,   // Run milestones (default)
    Detailed = 2,  // Per-item results and warnings
    Debug = 3,     // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    provider: String,
    items_processed: usize,
    total_items: usize,
    status: Option<RunStatus>,
    output_files: Vec<String>,
}

/// Operator-facing run log with a progress bar
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<Mutex<Option<ProgressBar>>>,
    metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(Mutex::new(None)),
            metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    /// Errors are shown at every verbosity
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print above an active progress bar so it is not overwritten
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub fn start_progress(&self, total_items: u64, provider: &str) {
        let pb = ProgressBar::new(total_items);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Iniciando...");

        if let Ok(mut guard) = self.progress_bar.lock() {
            *guard = Some(pb);
        }

        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.start_time = Some(Instant::now());
            metadata.total_items = total_items as usize;
            metadata.provider = provider.to_string();
        }
    }

    fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }

        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.end_time = Some(Instant::now());
        }

        self.info(final_message);
    }

    pub fn log_input_loaded(&self, path: &str, count: usize) {
        self.info(&format!("Loaded {} items from {}", count, path));
    }

    pub fn log_export_success(&self, path: &str) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.output_files.push(path.to_string());
        }
        self.info(&format!("Export completed: {}", path));
    }

    pub fn print_final_summary(&self) {
        let metadata = match self.metadata.lock() {
            Ok(metadata) => metadata.clone(),
            Err(_) => return,
        };

        println!("\n=== RESUMO DA BUSCA ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            println!("Duração: {:.2}s", end.duration_since(start).as_secs_f64());
        }
        println!("Provedor: {}", metadata.provider);
        println!("Itens processados: {}/{}", metadata.items_processed, metadata.total_items);
        for file in &metadata.output_files {
            println!("Resultados exportados: {}", file);
        }
        println!("=======================\n");

        match metadata.status {
            Some(RunStatus::Completed) => println!("✅ Busca concluída!"),
            Some(RunStatus::RateLimited) => println!(
                "⛔ O provedor bloqueou novas buscas. Os itens restantes foram marcados como não pesquisados; tente novamente mais tarde."
            ),
            Some(status) => println!("❌ Busca interrompida ({})", status),
            None => {}
        }
    }

    /// Write all buffered messages to the log file, if one was requested
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(log_file_path) = &self.log_file_path else {
            return Ok(());
        };

        let buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer,
            Err(_) => return Ok(()),
        };

        if let Some(parent) = Path::new(log_file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;

        for entry in buffer.iter() {
            writeln!(file, "{}", entry)?;
        }

        file.flush()
    }
}

impl ProgressReporter for RunLogger {
    fn item_started(&self, index: usize, total: usize, name: &str) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(format!("Buscando por: {}... ({}/{})", name, index, total));
            }
        }
        self.debug(&format!("Searching for '{}' ({}/{})", name, index, total));
    }

    fn item_finished(&self, completed: usize, _total: usize, _name: &str) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(completed as u64);
            }
        }
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.items_processed = completed;
        }
    }

    fn finish(&self, status: RunStatus) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.status = Some(status);
        }
        self.finish_progress(&format!("Run finished: {}", status));
    }
}
