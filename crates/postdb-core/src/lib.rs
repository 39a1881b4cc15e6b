pub mod app_config;
pub mod clean_config;
pub mod config;
pub mod posts;

pub use app_config::AppConfig;
pub use clean_config::{CleanConfig, DedupPolicy, EngagementThresholds};
pub use config::{load_app_config, load_app_config_from_env, load_clean_config};
pub use posts::{CleanedPost, EngagementLevel, PostType, RawPost};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    ConfigFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ConfigFileParse(#[from] serde_yaml::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
