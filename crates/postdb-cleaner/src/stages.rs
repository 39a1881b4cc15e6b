//! The individual cleaning stages, in the order [`crate::clean`] runs them.
//!
//! Each stage consumes the previous stage's output and may rely on its
//! guarantees: after [`drop_empty_text`] every post has text, after
//! [`fill_missing`] no field is optional except `image_url` and `timestamp`.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use postdb_core::{CleanedPost, DedupPolicy, EngagementThresholds, PostType, RawPost};

use crate::text::{clean_text, collapse_whitespace, normalize_tag, word_count};

/// A post whose missing values have been filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilledPost {
    pub post_url: String,
    pub post_text: String,
    pub post_type: PostType,
    pub notes_count: u64,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A filled post plus its normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NormalizedPost {
    pub post: FilledPost,
    pub post_text_clean: String,
}

/// Stage 1: keep one record per `post_url`.
///
/// Survivors keep the position of their URL's first occurrence, so output
/// order does not depend on which duplicate won. Returns the survivors and
/// the number of records removed.
pub(crate) fn deduplicate(posts: Vec<RawPost>, policy: DedupPolicy) -> (Vec<RawPost>, usize) {
    let input_len = posts.len();
    let mut index_by_url: HashMap<String, usize> = HashMap::with_capacity(input_len);
    let mut survivors: Vec<RawPost> = Vec::with_capacity(input_len);

    for post in posts {
        match index_by_url.get(&post.post_url) {
            None => {
                index_by_url.insert(post.post_url.clone(), survivors.len());
                survivors.push(post);
            }
            Some(&idx) => {
                if policy == DedupPolicy::HighestNotes
                    && post.notes_count.unwrap_or(0) > survivors[idx].notes_count.unwrap_or(0)
                {
                    survivors[idx] = post;
                }
            }
        }
    }

    let removed = input_len - survivors.len();
    (survivors, removed)
}

/// Stage 2: drop records with no text once whitespace is ignored.
pub(crate) fn drop_empty_text(posts: Vec<RawPost>) -> (Vec<RawPost>, usize) {
    let input_len = posts.len();
    let kept: Vec<RawPost> = posts
        .into_iter()
        .filter(|p| p.post_text.as_deref().is_some_and(|t| !t.trim().is_empty()))
        .collect();
    let removed = input_len - kept.len();
    (kept, removed)
}

/// Stage 3: fill absent notes count, post type and tags.
pub(crate) fn fill_missing(posts: Vec<RawPost>) -> Vec<FilledPost> {
    posts
        .into_iter()
        .map(|p| FilledPost {
            post_url: p.post_url,
            post_text: p.post_text.unwrap_or_default(),
            post_type: p.post_type.unwrap_or(PostType::Unknown),
            notes_count: p.notes_count.unwrap_or(0),
            tags: p.tags.unwrap_or_default(),
            image_url: p.image_url,
            timestamp: p.timestamp,
        })
        .collect()
}

/// Stage 4: whitespace-normalize the original text and compute the clean
/// text. Posts whose clean text is empty (pure markup, links or emoji) are
/// dropped and counted.
pub(crate) fn normalize_text(posts: Vec<FilledPost>) -> (Vec<NormalizedPost>, usize) {
    let input_len = posts.len();
    let kept: Vec<NormalizedPost> = posts
        .into_iter()
        .filter_map(|mut post| {
            post.post_text = collapse_whitespace(&post.post_text);
            let post_text_clean = clean_text(&post.post_text);
            if post_text_clean.is_empty() {
                tracing::debug!(post_url = %post.post_url, "dropping post with no text after normalization");
                return None;
            }
            Some(NormalizedPost {
                post,
                post_text_clean,
            })
        })
        .collect();
    let removed = input_len - kept.len();
    (kept, removed)
}

/// Stage 5: derive counts, flags, the engagement bucket and the tag set.
pub(crate) fn derive_features(
    posts: Vec<NormalizedPost>,
    thresholds: &EngagementThresholds,
    scrape_date: DateTime<Utc>,
) -> Vec<CleanedPost> {
    posts
        .into_iter()
        .map(|NormalizedPost { post, post_text_clean }| {
            let tags: BTreeSet<String> = post.tags.iter().filter_map(|t| normalize_tag(t)).collect();
            CleanedPost {
                word_count: word_count(&post_text_clean),
                char_count: post_text_clean.chars().count(),
                has_image: post.image_url.is_some(),
                engagement_level: thresholds.classify(post.notes_count),
                post_url: post.post_url,
                post_text: post.post_text,
                post_text_clean,
                post_type: post.post_type,
                notes_count: post.notes_count,
                image_url: post.image_url,
                tags,
                timestamp: post.timestamp,
                scrape_date,
            }
        })
        .collect()
}

/// Stage 6: keep posts whose word count lies in `[min, max]`.
pub(crate) fn filter_word_count(
    posts: Vec<CleanedPost>,
    min: usize,
    max: usize,
) -> (Vec<CleanedPost>, usize) {
    let input_len = posts.len();
    let kept: Vec<CleanedPost> = posts
        .into_iter()
        .filter(|p| (min..=max).contains(&p.word_count))
        .collect();
    let removed = input_len - kept.len();
    (kept, removed)
}

#[cfg(test)]
#[path = "stages_test.rs"]
mod tests;
