//! The cleaning pipeline: dedup, content filter, missing values, text
//! normalization, feature derivation, quality filter, minimum-size gate.

use chrono::{DateTime, Utc};
use postdb_core::{CleanConfig, CleanedPost, RawPost};
use serde::Serialize;

use crate::error::CleanError;
use crate::files::RawFile;
use crate::record::coerce_record;
use crate::stages::{
    deduplicate, derive_features, drop_empty_text, fill_missing, filter_word_count,
    normalize_text,
};

/// How many records each stage removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub raw_records: usize,
    /// Rows that could not be decoded or coerced at the file boundary.
    pub invalid_records: usize,
    pub duplicates_removed: usize,
    pub empty_removed: usize,
    pub empty_after_normalization: usize,
    pub quality_filtered: usize,
    pub kept: usize,
}

/// Output of a successful cleaning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedSet {
    pub posts: Vec<CleanedPost>,
    pub report: CleanReport,
}

/// Cleans coerced raw posts.
///
/// `scrape_date` is stamped on every output post; nothing in here reads the
/// clock, so identical inputs always give identical output.
///
/// # Errors
///
/// Returns [`CleanError::Config`] if `config` is invalid, or
/// [`CleanError::InsufficientRecords`] if fewer than
/// `config.min_records_required` posts survive.
pub fn clean(
    raw_posts: Vec<RawPost>,
    config: &CleanConfig,
    scrape_date: DateTime<Utc>,
) -> Result<CleanedSet, CleanError> {
    let report = CleanReport {
        raw_records: raw_posts.len(),
        ..CleanReport::default()
    };
    run_stages(raw_posts, config, scrape_date, report)
}

/// Coerces file rows and cleans the result.
///
/// Rows that failed to decode or fail coercion are logged, counted in
/// [`CleanReport::invalid_records`] and dropped.
///
/// # Errors
///
/// Same as [`clean`].
pub fn clean_records(
    file: impl Into<RawFile>,
    config: &CleanConfig,
    scrape_date: DateTime<Utc>,
) -> Result<CleanedSet, CleanError> {
    let RawFile {
        records,
        unreadable,
    } = file.into();
    let mut report = CleanReport {
        raw_records: records.len() + unreadable,
        invalid_records: unreadable,
        ..CleanReport::default()
    };

    let mut raw_posts = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        match coerce_record(idx + 1, record) {
            Ok(post) => raw_posts.push(post),
            Err(e) => {
                tracing::warn!(error = %e, "dropping invalid raw record");
                report.invalid_records += 1;
            }
        }
    }

    run_stages(raw_posts, config, scrape_date, report)
}

fn run_stages(
    raw_posts: Vec<RawPost>,
    config: &CleanConfig,
    scrape_date: DateTime<Utc>,
    mut report: CleanReport,
) -> Result<CleanedSet, CleanError> {
    config.validate()?;

    let (posts, removed) = deduplicate(raw_posts, config.dedup_policy);
    report.duplicates_removed = removed;
    tracing::info!(removed, policy = %config.dedup_policy, "removed duplicate posts");

    let (posts, removed) = drop_empty_text(posts);
    report.empty_removed = removed;
    tracing::info!(removed, "removed posts without text");

    let posts = fill_missing(posts);

    let (posts, removed) = normalize_text(posts);
    report.empty_after_normalization = removed;
    tracing::info!(removed, "removed posts with no text after normalization");

    let posts = derive_features(posts, &config.engagement_thresholds, scrape_date);

    let (posts, removed) =
        filter_word_count(posts, config.min_word_count, config.max_word_count);
    report.quality_filtered = removed;
    tracing::info!(
        removed,
        min_word_count = config.min_word_count,
        max_word_count = config.max_word_count,
        "removed posts outside word count range"
    );

    report.kept = posts.len();

    if posts.len() < config.min_records_required {
        tracing::error!(
            kept = posts.len(),
            required = config.min_records_required,
            ?report,
            "cleaned set below minimum size"
        );
        return Err(CleanError::InsufficientRecords {
            actual: posts.len(),
            required: config.min_records_required,
        });
    }

    tracing::info!(kept = report.kept, raw = report.raw_records, "cleaning complete");
    Ok(CleanedSet { posts, report })
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
