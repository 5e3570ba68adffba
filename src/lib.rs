pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod logger;
pub mod normalize;
pub mod orchestrator;
pub mod pacing;
pub mod provider;
pub mod query;

pub use batch::{BatchResult, ResultRecord, SearchItem};
pub use error::SearchError;
pub use orchestrator::{Orchestrator, ProgressReporter, RunSettings};
pub use pacing::RunStatus;
pub use provider::SearchProvider;
