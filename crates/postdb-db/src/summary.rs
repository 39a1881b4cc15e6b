//! Aggregate statistics stored with every load run.

use std::collections::{BTreeMap, BTreeSet};

use postdb_core::{CleanedPost, EngagementLevel, PostType};
use serde::Serialize;

/// Aggregates over one cleaned set, as stored in `summary_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SummaryStatistics {
    pub total_posts: i64,
    pub distinct_tags: i64,
    pub total_post_tags: i64,
    pub avg_word_count: f64,
    pub avg_notes: f64,
    pub posts_with_images: i64,
    /// `None` only for an empty set. Ties go to the type that sorts first.
    pub most_common_type: Option<String>,
    pub engagement_no_engagement: i64,
    pub engagement_low: i64,
    pub engagement_medium: i64,
    pub engagement_high: i64,
}

impl SummaryStatistics {
    #[must_use]
    pub fn engagement_count(&self, level: EngagementLevel) -> i64 {
        match level {
            EngagementLevel::NoEngagement => self.engagement_no_engagement,
            EngagementLevel::Low => self.engagement_low,
            EngagementLevel::Medium => self.engagement_medium,
            EngagementLevel::High => self.engagement_high,
        }
    }
}

/// Computes the summary of `posts` without touching the database.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_summary(posts: &[CleanedPost]) -> SummaryStatistics {
    let distinct_tags: BTreeSet<&str> = posts
        .iter()
        .flat_map(|p| p.tags.iter().map(String::as_str))
        .collect();
    let total_post_tags: usize = posts.iter().map(CleanedPost::tag_count).sum();

    let (avg_word_count, avg_notes) = if posts.is_empty() {
        (0.0, 0.0)
    } else {
        let n = posts.len() as f64;
        let words: f64 = posts.iter().map(|p| p.word_count as f64).sum();
        let notes: f64 = posts.iter().map(|p| p.notes_count as f64).sum();
        (words / n, notes / n)
    };

    let mut by_type: BTreeMap<PostType, usize> = BTreeMap::new();
    let mut by_level: BTreeMap<EngagementLevel, usize> = BTreeMap::new();
    for post in posts {
        *by_type.entry(post.post_type).or_default() += 1;
        *by_level.entry(post.engagement_level).or_default() += 1;
    }

    let mut most_common: Option<(PostType, usize)> = None;
    for (&post_type, &count) in &by_type {
        match most_common {
            Some((_, best)) if best >= count => {}
            _ => most_common = Some((post_type, count)),
        }
    }

    let level = |l: EngagementLevel| to_i64(by_level.get(&l).copied().unwrap_or(0));

    SummaryStatistics {
        total_posts: to_i64(posts.len()),
        distinct_tags: to_i64(distinct_tags.len()),
        total_post_tags: to_i64(total_post_tags),
        avg_word_count,
        avg_notes,
        posts_with_images: to_i64(posts.iter().filter(|p| p.has_image).count()),
        most_common_type: most_common.map(|(t, _)| t.to_string()),
        engagement_no_engagement: level(EngagementLevel::NoEngagement),
        engagement_low: level(EngagementLevel::Low),
        engagement_medium: level(EngagementLevel::Medium),
        engagement_high: level(EngagementLevel::High),
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
