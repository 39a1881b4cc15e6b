//! `postdb clean`: raw scraper file in, cleaned file out.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use postdb_cleaner::CleanedSet;
use postdb_core::{AppConfig, CleanConfig, CleanedPost};

use crate::CleanArgs;

/// Resolve the cleaning settings: the YAML file if given, else the
/// environment, with individual flags applied on top.
pub(crate) fn build_clean_config(
    base: &CleanConfig,
    args: &CleanArgs,
) -> anyhow::Result<CleanConfig> {
    let mut config = match &args.config {
        Some(path) => postdb_core::load_clean_config(path)
            .with_context(|| format!("failed to load cleaning config {}", path.display()))?,
        None => base.clone(),
    };

    if let Some(n) = args.min_word_count {
        config.min_word_count = n;
    }
    if let Some(n) = args.max_word_count {
        config.max_word_count = n;
    }
    if let Some(n) = args.min_records {
        config.min_records_required = n;
    }
    if let Some(thresholds) = args.engagement_thresholds {
        config.engagement_thresholds = thresholds;
    }
    if let Some(policy) = args.dedup_policy {
        config.dedup_policy = policy;
    }

    config.validate()?;
    Ok(config)
}

/// What `postdb run` carries from cleaning into loading.
pub(crate) struct CleanRun {
    pub(crate) posts: Vec<CleanedPost>,
    pub(crate) min_records: usize,
}

/// Run the cleaner over `args.input` (or the configured raw path) and write
/// the result.
pub(crate) fn run_clean(config: &AppConfig, args: &CleanArgs) -> anyhow::Result<CleanRun> {
    let clean_config = build_clean_config(&config.clean, args)?;
    let input = args.input.as_deref().unwrap_or(&config.raw_path);
    let output = args.output.as_deref().unwrap_or(&config.cleaned_path);

    let set = clean_file(input, output, &clean_config, Utc::now())?;

    let report = &set.report;
    println!(
        "cleaned {} raw records into {} posts ({} invalid, {} duplicates, {} empty, {} empty after normalization, {} outside word range) -> {}",
        report.raw_records,
        report.kept,
        report.invalid_records,
        report.duplicates_removed,
        report.empty_removed,
        report.empty_after_normalization,
        report.quality_filtered,
        output.display()
    );

    Ok(CleanRun {
        posts: set.posts,
        min_records: clean_config.min_records_required,
    })
}

/// Read, clean and write. Nothing is written unless cleaning succeeds.
pub(crate) fn clean_file(
    input: &Path,
    output: &Path,
    config: &CleanConfig,
    scrape_date: DateTime<Utc>,
) -> anyhow::Result<CleanedSet> {
    let records = postdb_cleaner::read_raw_records(input)
        .with_context(|| format!("failed to read raw records from {}", input.display()))?;

    let set = postdb_cleaner::clean_records(records, config, scrape_date)?;

    postdb_cleaner::write_cleaned(output, &set.posts)
        .with_context(|| format!("failed to write cleaned records to {}", output.display()))?;

    Ok(set)
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use chrono::TimeZone;
    use postdb_cleaner::CleanError;
    use postdb_core::DedupPolicy;

    use super::*;

    fn no_flags() -> CleanArgs {
        CleanArgs {
            input: None,
            output: None,
            config: None,
            min_word_count: None,
            max_word_count: None,
            min_records: None,
            engagement_thresholds: None,
            dedup_policy: None,
        }
    }

    fn raw_csv(rows: usize) -> String {
        let mut csv = String::from("post_url,post_text,post_type,notes_count,tags\n");
        for i in 0..rows {
            writeln!(
                csv,
                "https://a.tumblr.com/post/{i},\"<p>Sunset number {i} over the harbor</p>\",photo,{i},\"['sunset', 'Harbor']\""
            )
            .unwrap();
        }
        csv
    }

    fn scrape_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    #[test]
    fn flags_override_base_config() {
        let args = CleanArgs {
            min_records: Some(3),
            dedup_policy: Some(DedupPolicy::HighestNotes),
            ..no_flags()
        };
        let config = build_clean_config(&CleanConfig::default(), &args).unwrap();
        assert_eq!(config.min_records_required, 3);
        assert_eq!(config.dedup_policy, DedupPolicy::HighestNotes);
        assert_eq!(config.min_word_count, CleanConfig::default().min_word_count);
    }

    #[test]
    fn yaml_config_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.yaml");
        std::fs::write(&path, "min_word_count: 2\nmin_records_required: 7\n").unwrap();
        let args = CleanArgs {
            config: Some(path),
            min_records: Some(9),
            ..no_flags()
        };
        let config = build_clean_config(&CleanConfig::default(), &args).unwrap();
        assert_eq!(config.min_word_count, 2);
        assert_eq!(config.min_records_required, 9);
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let args = CleanArgs {
            min_word_count: Some(50),
            max_word_count: Some(10),
            ..no_flags()
        };
        assert!(build_clean_config(&CleanConfig::default(), &args).is_err());
    }

    #[test]
    fn clean_file_writes_output_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("out").join("cleaned.csv");
        std::fs::write(&input, raw_csv(12)).unwrap();
        let config = CleanConfig {
            min_records_required: 10,
            ..CleanConfig::default()
        };

        let set = clean_file(&input, &output, &config, scrape_date()).unwrap();

        assert_eq!(set.posts.len(), 12);
        let written = postdb_cleaner::read_cleaned(&output).unwrap();
        assert_eq!(written, set.posts);
        assert_eq!(written[0].post_text_clean, "Sunset number 0 over the harbor");
        assert_eq!(
            written[0].tags.iter().cloned().collect::<Vec<_>>(),
            vec!["harbor".to_string(), "sunset".to_string()]
        );
    }

    #[test]
    fn clean_file_writes_nothing_when_gate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("cleaned.csv");
        std::fs::write(&input, raw_csv(80)).unwrap();

        let err = clean_file(&input, &output, &CleanConfig::default(), scrape_date()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CleanError>(),
            Some(CleanError::InsufficientRecords {
                actual: 80,
                required: 100
            })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn clean_file_leaves_previous_output_untouched_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("cleaned.csv");
        std::fs::write(&input, raw_csv(5)).unwrap();
        std::fs::write(&output, "previous run").unwrap();

        assert!(clean_file(&input, &output, &CleanConfig::default(), scrape_date()).is_err());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous run");
    }

    #[test]
    fn clean_is_repeatable_for_fixed_scrape_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        std::fs::write(&input, raw_csv(15)).unwrap();
        let config = CleanConfig {
            min_records_required: 1,
            ..CleanConfig::default()
        };
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");

        clean_file(&input, &first, &config, scrape_date()).unwrap();
        clean_file(&input, &second, &config, scrape_date()).unwrap();

        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }
}
