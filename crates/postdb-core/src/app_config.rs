use std::path::PathBuf;

use crate::clean_config::CleanConfig;

/// Process-wide settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file; created on first connect.
    pub database_path: PathBuf,
    /// Raw CSV produced by the scraper.
    pub raw_path: PathBuf,
    /// Cleaned CSV written by `clean` and read by `load`.
    pub cleaned_path: PathBuf,
    pub log_level: String,
    pub db_acquire_timeout_secs: u64,
    pub clean: CleanConfig,
}
