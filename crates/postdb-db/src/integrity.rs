//! Read-only verification run after a load commits.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::summary::SummaryStatistics;
use crate::LoadError;

/// Row counts a successful load must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedCounts {
    pub posts: i64,
    pub tags: i64,
    pub post_tags: i64,
}

impl ExpectedCounts {
    #[must_use]
    pub fn from_summary(summary: &SummaryStatistics) -> Self {
        Self {
            posts: summary.total_posts,
            tags: summary.distinct_tags,
            post_tags: summary.total_post_tags,
        }
    }
}

/// Checks the stored tables against `expected`.
///
/// Verifies row counts of `posts`, `tags` and `post_tags`, that no
/// `post_tags` row points at a missing post or tag, and that the latest
/// summary row describes the posts actually stored.
///
/// # Errors
///
/// Returns [`LoadError::IntegrityCheck`] for the first check that fails, or
/// [`LoadError::Database`] if a query fails.
pub async fn verify_integrity(pool: &SqlitePool, expected: &ExpectedCounts) -> Result<(), LoadError> {
    let posts = count(pool, "SELECT COUNT(*) FROM posts").await?;
    ensure("posts row count", expected.posts, posts)?;

    let tags = count(pool, "SELECT COUNT(*) FROM tags").await?;
    ensure("tags row count", expected.tags, tags)?;

    let post_tags = count(pool, "SELECT COUNT(*) FROM post_tags").await?;
    ensure("post_tags row count", expected.post_tags, post_tags)?;

    let orphans = count(
        pool,
        "SELECT COUNT(*) FROM post_tags pt \
         LEFT JOIN posts p ON p.id = pt.post_id \
         LEFT JOIN tags t ON t.id = pt.tag_id \
         WHERE p.id IS NULL OR t.id IS NULL",
    )
    .await?;
    ensure("orphaned post_tags rows", 0, orphans)?;

    let latest_total: Option<i64> =
        sqlx::query_scalar("SELECT total_posts FROM summary_statistics ORDER BY id DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    let Some(latest_total) = latest_total else {
        return Err(LoadError::IntegrityCheck {
            check: "summary row present",
            expected: 1,
            actual: 0,
        });
    };
    ensure("latest summary total_posts", posts, latest_total)?;

    tracing::debug!(posts, tags, post_tags, "integrity check passed");
    Ok(())
}

/// Share of posts with a non-zero word count below which
/// [`validate_loaded`] warns.
pub const MIN_QUALITY_RATIO: f64 = 0.8;

/// What the database holds after a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadValidation {
    pub posts: i64,
    pub tags: i64,
    pub posts_with_words: i64,
    /// `posts_with_words / posts`, or 0 when no posts are stored.
    pub quality_ratio: f64,
}

impl LoadValidation {
    #[must_use]
    pub fn is_low_quality(&self) -> bool {
        self.quality_ratio < MIN_QUALITY_RATIO
    }
}

/// Checks that the database holds at least `min_records` posts and reports
/// how many of them have any words. A low quality ratio is logged as a
/// warning, not an error.
///
/// # Errors
///
/// Returns [`LoadError::TooFewPosts`] below `min_records`, or
/// [`LoadError::Database`] if a query fails.
#[allow(clippy::cast_precision_loss)]
pub async fn validate_loaded(
    pool: &SqlitePool,
    min_records: usize,
) -> Result<LoadValidation, LoadError> {
    let posts = count(pool, "SELECT COUNT(*) FROM posts").await?;
    let tags = count(pool, "SELECT COUNT(*) FROM tags").await?;

    let required = i64::try_from(min_records).unwrap_or(i64::MAX);
    if posts < required {
        tracing::error!(posts, required, "too few posts in database");
        return Err(LoadError::TooFewPosts {
            actual: posts,
            required,
        });
    }

    let posts_with_words = count(pool, "SELECT COUNT(*) FROM posts WHERE word_count > 0").await?;
    let quality_ratio = if posts > 0 {
        posts_with_words as f64 / posts as f64
    } else {
        0.0
    };
    let validation = LoadValidation {
        posts,
        tags,
        posts_with_words,
        quality_ratio,
    };

    if validation.is_low_quality() {
        tracing::warn!(quality_ratio, posts, posts_with_words, "low data quality ratio");
    } else {
        tracing::info!(quality_ratio, posts, tags, "pipeline validation passed");
    }
    Ok(validation)
}

async fn count(pool: &SqlitePool, sql: &'static str) -> Result<i64, LoadError> {
    let n: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
    Ok(n)
}

fn ensure(check: &'static str, expected: i64, actual: i64) -> Result<(), LoadError> {
    if expected == actual {
        Ok(())
    } else {
        tracing::error!(check, expected, actual, "integrity check failed");
        Err(LoadError::IntegrityCheck {
            check,
            expected,
            actual,
        })
    }
}
