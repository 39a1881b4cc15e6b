use std::path::Path;
use std::time::Duration;

use postdb_core::AppConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/postdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            acquire_timeout_secs: config.db_acquire_timeout_secs,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// A unique, foreign-key, check or not-null constraint rejected a row.
    /// The load transaction has been rolled back.
    #[error("constraint violated while inserting {context}: {source}")]
    Constraint {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database already holds {existing} posts; reload in replace mode to overwrite them")]
    AlreadyLoaded { existing: i64 },

    #[error("{field} of {post_url} does not fit in an SQLite integer")]
    ValueOutOfRange {
        post_url: String,
        field: &'static str,
    },

    /// Post-commit verification found the stored data inconsistent with the
    /// cleaned set that was loaded.
    #[error("integrity check '{check}' failed: expected {expected}, found {actual}")]
    IntegrityCheck {
        check: &'static str,
        expected: i64,
        actual: i64,
    },

    #[error("database holds {actual} posts, {required} required")]
    TooFewPosts { actual: i64, required: i64 },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Open a pool on the SQLite file at `path`, creating the file and its
/// parent directory if needed. Foreign keys are enforced on every
/// connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the directory cannot be created or the
/// connection cannot be established.
pub async fn connect_pool(path: &Path, config: PoolConfig) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat that as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

pub mod integrity;
pub mod load;
pub mod queries;
pub mod summary;

pub use integrity::{
    validate_loaded, verify_integrity, ExpectedCounts, LoadValidation, MIN_QUALITY_RATIO,
};
pub use load::{load, LoadMode, LoadReport};
pub use queries::{
    count_rows, latest_summary, sample_posts, top_tags, PostRow, SummaryRow, TableCounts,
    TagCount,
};
pub use summary::{compute_summary, SummaryStatistics};
