//! Read-side queries used by `postdb db stats` and the load summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::summary::SummaryStatistics;
use crate::LoadError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `summary_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SummaryRow {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: SummaryStatistics,
    pub loaded_at: DateTime<Utc>,
}

/// A tag and the number of posts carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TagCount {
    pub tag_name: String,
    pub post_count: i64,
}

/// Abbreviated view of a stored post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub post_url: String,
    pub post_type: String,
    pub notes_count: i64,
    pub word_count: i64,
    pub engagement_level: String,
    pub tag_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub posts: i64,
    pub tags: i64,
    pub post_tags: i64,
    pub summary_statistics: i64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the summary row of the most recent load, if any.
///
/// # Errors
///
/// Returns [`LoadError::Database`] if the query fails.
pub async fn latest_summary(pool: &SqlitePool) -> Result<Option<SummaryRow>, LoadError> {
    let row = sqlx::query_as::<_, SummaryRow>(
        "SELECT id, total_posts, distinct_tags, total_post_tags, avg_word_count, avg_notes, \
                posts_with_images, most_common_type, engagement_no_engagement, engagement_low, \
                engagement_medium, engagement_high, loaded_at \
         FROM summary_statistics \
         ORDER BY id DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the `limit` most used tags, most used first, ties by name.
///
/// # Errors
///
/// Returns [`LoadError::Database`] if the query fails.
pub async fn top_tags(pool: &SqlitePool, limit: i64) -> Result<Vec<TagCount>, LoadError> {
    let rows = sqlx::query_as::<_, TagCount>(
        "SELECT t.tag_name, COUNT(pt.post_id) AS post_count \
         FROM tags t \
         JOIN post_tags pt ON pt.tag_id = t.id \
         GROUP BY t.id, t.tag_name \
         ORDER BY post_count DESC, t.tag_name ASC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the first `limit` stored posts in insertion order.
///
/// # Errors
///
/// Returns [`LoadError::Database`] if the query fails.
pub async fn sample_posts(pool: &SqlitePool, limit: i64) -> Result<Vec<PostRow>, LoadError> {
    let rows = sqlx::query_as::<_, PostRow>(
        "SELECT id, post_url, post_type, notes_count, word_count, engagement_level, tag_count \
         FROM posts \
         ORDER BY id ASC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Counts rows in every table of the schema.
///
/// # Errors
///
/// Returns [`LoadError::Database`] if a query fails.
pub async fn count_rows(pool: &SqlitePool) -> Result<TableCounts, LoadError> {
    let (posts, tags, post_tags, summary_statistics): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT \
             (SELECT COUNT(*) FROM posts), \
             (SELECT COUNT(*) FROM tags), \
             (SELECT COUNT(*) FROM post_tags), \
             (SELECT COUNT(*) FROM summary_statistics)",
    )
    .fetch_one(pool)
    .await?;

    Ok(TableCounts {
        posts,
        tags,
        post_tags,
        summary_statistics,
    })
}
