//! Transactional load of a cleaned set into the normalized schema.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use postdb_core::CleanedPost;
use serde::Serialize;
use sqlx::error::ErrorKind;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::integrity::{verify_integrity, ExpectedCounts};
use crate::summary::{compute_summary, SummaryStatistics};
use crate::LoadError;

/// What to do when the database already holds posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Refuse to load on top of existing posts.
    #[default]
    Strict,
    /// Delete existing posts, tags and links in the same transaction as the
    /// new load. Summary rows are kept as run history.
    Replace,
}

/// Outcome of a committed and verified load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    /// Id of the `summary_statistics` row written by this run.
    pub run_id: i64,
    pub posts_inserted: usize,
    pub tags_inserted: usize,
    pub post_tags_inserted: usize,
    pub summary: SummaryStatistics,
}

/// Loads `posts` inside one transaction, then verifies the stored counts.
///
/// Either every post, tag, link and the summary row is committed, or
/// nothing is.
///
/// # Errors
///
/// Returns [`LoadError::AlreadyLoaded`] in [`LoadMode::Strict`] when posts
/// already exist, [`LoadError::Constraint`] when a row violates the schema
/// (for example a duplicate `post_url`), [`LoadError::IntegrityCheck`] when
/// the committed data does not match the input, or
/// [`LoadError::Database`] on any other database failure.
pub async fn load(
    pool: &SqlitePool,
    posts: &[CleanedPost],
    mode: LoadMode,
    loaded_at: DateTime<Utc>,
) -> Result<LoadReport, LoadError> {
    let summary = compute_summary(posts);
    let mut tx = pool.begin().await?;

    match mode {
        LoadMode::Strict => {
            let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
                .fetch_one(&mut *tx)
                .await?;
            if existing > 0 {
                return Err(LoadError::AlreadyLoaded { existing });
            }
        }
        LoadMode::Replace => clear_posts(&mut tx).await?,
    }

    let mut post_ids = Vec::with_capacity(posts.len());
    for post in posts {
        post_ids.push(insert_post(&mut tx, post).await?);
    }

    let tag_names: BTreeSet<&str> = posts
        .iter()
        .flat_map(|p| p.tags.iter().map(String::as_str))
        .collect();
    let mut tag_ids: HashMap<&str, i64> = HashMap::with_capacity(tag_names.len());
    for &name in &tag_names {
        let id = insert_or_get_tag(&mut tx, name).await?;
        tag_ids.insert(name, id);
    }

    let mut post_tags_inserted = 0usize;
    for (post, post_id) in posts.iter().zip(&post_ids) {
        for tag in &post.tags {
            let tag_id = tag_ids[tag.as_str()];
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(*post_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    classify(
                        format!("post_tags link {} -> '{tag}'", post.post_url),
                        e,
                    )
                })?;
            post_tags_inserted += 1;
        }
    }

    let run_id = insert_summary(&mut tx, &summary, loaded_at).await?;

    tx.commit().await?;
    tracing::info!(
        run_id,
        posts = post_ids.len(),
        tags = tag_names.len(),
        post_tags = post_tags_inserted,
        ?mode,
        "load committed"
    );

    verify_integrity(pool, &ExpectedCounts::from_summary(&summary)).await?;

    Ok(LoadReport {
        run_id,
        posts_inserted: post_ids.len(),
        tags_inserted: tag_names.len(),
        post_tags_inserted,
        summary,
    })
}

async fn clear_posts(tx: &mut Transaction<'_, Sqlite>) -> Result<(), LoadError> {
    let links = sqlx::query("DELETE FROM post_tags")
        .execute(&mut **tx)
        .await?
        .rows_affected();
    let tags = sqlx::query("DELETE FROM tags")
        .execute(&mut **tx)
        .await?
        .rows_affected();
    let posts = sqlx::query("DELETE FROM posts")
        .execute(&mut **tx)
        .await?
        .rows_affected();
    tracing::info!(posts, tags, post_tags = links, "cleared previous load");
    Ok(())
}

async fn insert_post(
    tx: &mut Transaction<'_, Sqlite>,
    post: &CleanedPost,
) -> Result<i64, LoadError> {
    let out_of_range = |field: &'static str| LoadError::ValueOutOfRange {
        post_url: post.post_url.clone(),
        field,
    };
    let notes_count = i64::try_from(post.notes_count).map_err(|_| out_of_range("notes_count"))?;
    let word_count = i64::try_from(post.word_count).map_err(|_| out_of_range("word_count"))?;
    let char_count = i64::try_from(post.char_count).map_err(|_| out_of_range("char_count"))?;
    let tag_count = i64::try_from(post.tag_count()).map_err(|_| out_of_range("tag_count"))?;

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO posts (post_url, post_text, post_text_clean, post_type, notes_count, \
             word_count, char_count, has_image, image_url, tag_count, engagement_level, \
             timestamp, scrape_date) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(&post.post_url)
    .bind(&post.post_text)
    .bind(&post.post_text_clean)
    .bind(post.post_type.as_str())
    .bind(notes_count)
    .bind(word_count)
    .bind(char_count)
    .bind(post.has_image)
    .bind(&post.image_url)
    .bind(tag_count)
    .bind(post.engagement_level.as_str())
    .bind(post.timestamp)
    .bind(post.scrape_date)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| classify(format!("post {}", post.post_url), e))
}

async fn insert_or_get_tag(tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<i64, LoadError> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO tags (tag_name) VALUES (?) \
         ON CONFLICT (tag_name) DO UPDATE SET tag_name = excluded.tag_name \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| classify(format!("tag '{name}'"), e))
}

async fn insert_summary(
    tx: &mut Transaction<'_, Sqlite>,
    summary: &SummaryStatistics,
    loaded_at: DateTime<Utc>,
) -> Result<i64, LoadError> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO summary_statistics (total_posts, distinct_tags, total_post_tags, \
             avg_word_count, avg_notes, posts_with_images, most_common_type, \
             engagement_no_engagement, engagement_low, engagement_medium, engagement_high, \
             loaded_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(summary.total_posts)
    .bind(summary.distinct_tags)
    .bind(summary.total_post_tags)
    .bind(summary.avg_word_count)
    .bind(summary.avg_notes)
    .bind(summary.posts_with_images)
    .bind(&summary.most_common_type)
    .bind(summary.engagement_no_engagement)
    .bind(summary.engagement_low)
    .bind(summary.engagement_medium)
    .bind(summary.engagement_high)
    .bind(loaded_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| classify("summary_statistics row".to_string(), e))
}

/// Maps constraint violations to [`LoadError::Constraint`]; anything else is
/// a plain database error.
fn classify(context: String, err: sqlx::Error) -> LoadError {
    let is_constraint = matches!(
        &err,
        sqlx::Error::Database(db) if matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::CheckViolation
                | ErrorKind::NotNullViolation
        )
    );
    if is_constraint {
        LoadError::Constraint {
            context,
            source: err,
        }
    } else {
        LoadError::Database(err)
    }
}
