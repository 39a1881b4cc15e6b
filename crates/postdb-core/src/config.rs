use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::app_config::AppConfig;
use crate::clean_config::{CleanConfig, DedupPolicy, EngagementThresholds};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is malformed or the resulting cleaning
/// configuration fails validation.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is malformed or fails validation.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        if raw.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "value is empty".to_string(),
            });
        }
        Ok(raw)
    };

    let database_path = PathBuf::from(parse("POSTDB_DATABASE_PATH", "data/output.db")?);
    let raw_path = PathBuf::from(parse("POSTDB_RAW_PATH", "data/tumblr_posts.csv")?);
    let cleaned_path = PathBuf::from(parse(
        "POSTDB_CLEANED_PATH",
        "data/cleaned_tumblr_data.csv",
    )?);
    let log_level = or_default("POSTDB_LOG_LEVEL", "info");

    let db_acquire_timeout_secs: u64 =
        parse_value(&lookup, "POSTDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let clean = CleanConfig {
        min_word_count: parse_value(&lookup, "POSTDB_MIN_WORD_COUNT", "5")?,
        max_word_count: parse_value(&lookup, "POSTDB_MAX_WORD_COUNT", "10000")?,
        min_records_required: parse_value(&lookup, "POSTDB_MIN_RECORDS_REQUIRED", "100")?,
        engagement_thresholds: parse_value::<EngagementThresholds, _>(
            &lookup,
            "POSTDB_ENGAGEMENT_THRESHOLDS",
            "1,10,100",
        )?,
        dedup_policy: parse_value::<DedupPolicy, _>(&lookup, "POSTDB_DEDUP_POLICY", "keep-first")?,
    };
    clean.validate()?;

    Ok(AppConfig {
        database_path,
        raw_path,
        cleaned_path,
        log_level,
        db_acquire_timeout_secs,
        clean,
    })
}

/// Read `var` through `lookup`, falling back to `default`, and parse it.
fn parse_value<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Load and validate a cleaning configuration from a YAML file.
///
/// Keys missing from the file take their defaults.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_clean_config(path: &Path) -> Result<CleanConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let config: CleanConfig = serde_yaml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
