use std::collections::HashSet;

use chrono::TimeZone;
use postdb_core::{DedupPolicy, PostType};

use super::*;
use crate::record::RawRecord;

fn scrape_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
}

fn valid_post(i: usize) -> RawPost {
    RawPost {
        post_url: format!("https://blog.tumblr.com/post/{i}"),
        post_text: Some(format!(
            "Post number {i} talks about film photography and light"
        )),
        post_type: Some(PostType::Photo),
        notes_count: Some(u64::try_from(i).unwrap()),
        tags: Some(vec!["photography".to_string(), format!("tag{}", i % 7)]),
        image_url: None,
        timestamp: None,
    }
}

fn valid_posts(n: usize) -> Vec<RawPost> {
    (0..n).map(valid_post).collect()
}

#[test]
fn scenario_duplicates_and_empty_text_leave_120() {
    // 120 unique valid posts, 20 exact duplicates of existing URLs, 10
    // posts with empty text.
    let mut raw = valid_posts(120);
    for i in 0..20 {
        raw.push(valid_post(i * 3));
    }
    for i in 0..10 {
        let mut empty = valid_post(1000 + i);
        empty.post_text = Some(if i % 2 == 0 { String::new() } else { "   ".to_string() });
        raw.push(empty);
    }
    assert_eq!(raw.len(), 150);

    let set = clean(raw, &CleanConfig::default(), scrape_date()).unwrap();

    assert_eq!(set.posts.len(), 120);
    assert_eq!(set.report.raw_records, 150);
    assert_eq!(set.report.duplicates_removed, 20);
    assert_eq!(set.report.empty_removed, 10);
    assert_eq!(set.report.kept, 120);
    assert!(set.posts.iter().all(|p| !p.post_text_clean.is_empty()));
}

#[test]
fn scenario_eighty_valid_records_fail_quality_gate() {
    let err = clean(valid_posts(80), &CleanConfig::default(), scrape_date()).unwrap_err();
    assert!(
        matches!(
            err,
            CleanError::InsufficientRecords {
                actual: 80,
                required: 100
            }
        ),
        "got: {err:?}"
    );
    assert!(err.to_string().contains("80"));
    assert!(err.to_string().contains("100"));
}

#[test]
fn clean_is_deterministic() {
    let mut raw = valid_posts(130);
    raw.push(valid_post(5));
    let config = CleanConfig {
        dedup_policy: DedupPolicy::HighestNotes,
        ..CleanConfig::default()
    };
    let first = clean(raw.clone(), &config, scrape_date()).unwrap();
    let second = clean(raw, &config, scrape_date()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn output_urls_are_unique() {
    let mut raw = valid_posts(110);
    raw.extend(valid_posts(110));
    let set = clean(raw, &CleanConfig::default(), scrape_date()).unwrap();
    let urls: HashSet<&str> = set.posts.iter().map(|p| p.post_url.as_str()).collect();
    assert_eq!(urls.len(), set.posts.len());
    assert_eq!(set.posts.len(), 110);
}

#[test]
fn output_word_counts_are_within_bounds() {
    let mut raw = valid_posts(100);
    let mut short = valid_post(500);
    short.post_text = Some("too short".to_string());
    raw.push(short);
    let mut long = valid_post(501);
    long.post_text = Some(vec!["word"; 40].join(" "));
    raw.push(long);

    let config = CleanConfig {
        min_word_count: 5,
        max_word_count: 30,
        ..CleanConfig::default()
    };
    let set = clean(raw, &config, scrape_date()).unwrap();
    assert_eq!(set.report.quality_filtered, 2);
    assert!(set
        .posts
        .iter()
        .all(|p| (config.min_word_count..=config.max_word_count).contains(&p.word_count)));
}

#[test]
fn gate_counts_posts_after_every_filter() {
    // 100 unique posts, but one cleans to nothing: the gate must see 99.
    let mut raw = valid_posts(99);
    let mut markup_only = valid_post(900);
    markup_only.post_text = Some("<img src=\"a.png\"> https://t.co/x".to_string());
    raw.push(markup_only);

    let err = clean(raw, &CleanConfig::default(), scrape_date()).unwrap_err();
    assert!(matches!(
        err,
        CleanError::InsufficientRecords {
            actual: 99,
            required: 100
        }
    ));
}

#[test]
fn clean_rejects_invalid_config() {
    let config = CleanConfig {
        min_word_count: 10,
        max_word_count: 1,
        ..CleanConfig::default()
    };
    let err = clean(valid_posts(120), &config, scrape_date()).unwrap_err();
    assert!(matches!(err, CleanError::Config(_)));
}

#[test]
fn clean_stamps_injected_scrape_date_on_every_post() {
    let set = clean(valid_posts(100), &CleanConfig::default(), scrape_date()).unwrap();
    assert!(set.posts.iter().all(|p| p.scrape_date == scrape_date()));
}

#[test]
fn clean_records_counts_invalid_rows() {
    let mut records: Vec<RawRecord> = (0..100)
        .map(|i| RawRecord {
            post_url: Some(format!("https://blog.tumblr.com/post/{i}")),
            post_text: Some(format!("Record {i} has enough words to pass the filter")),
            notes_count: Some(i.to_string()),
            ..RawRecord::default()
        })
        .collect();
    records.push(RawRecord {
        post_url: None,
        post_text: Some("no url on this one at all".to_string()),
        ..RawRecord::default()
    });
    records.push(RawRecord {
        post_url: Some("https://blog.tumblr.com/post/bad".to_string()),
        post_text: Some("notes count here is garbage text".to_string()),
        notes_count: Some("many".to_string()),
        ..RawRecord::default()
    });

    let set = clean_records(records, &CleanConfig::default(), scrape_date()).unwrap();
    assert_eq!(set.report.raw_records, 102);
    assert_eq!(set.report.invalid_records, 2);
    assert_eq!(set.posts.len(), 100);
    assert!(set.posts.iter().all(|p| p.post_type == PostType::Unknown));
}

#[test]
fn clean_records_fails_gate_when_invalid_rows_leave_too_few() {
    let records: Vec<RawRecord> = (0..5)
        .map(|i| RawRecord {
            post_url: Some(format!("https://blog.tumblr.com/post/{i}")),
            post_text: Some("five words in this text".to_string()),
            ..RawRecord::default()
        })
        .collect();
    let config = CleanConfig {
        min_records_required: 6,
        ..CleanConfig::default()
    };
    let err = clean_records(records, &config, scrape_date()).unwrap_err();
    assert!(matches!(
        err,
        CleanError::InsufficientRecords {
            actual: 5,
            required: 6
        }
    ));
}

#[test]
fn clean_records_counts_unreadable_rows_as_invalid() {
    let records: Vec<RawRecord> = (0..3)
        .map(|i| RawRecord {
            post_url: Some(format!("https://blog.tumblr.com/post/{i}")),
            post_text: Some("five words in this text".to_string()),
            ..RawRecord::default()
        })
        .collect();
    let file = RawFile {
        records,
        unreadable: 2,
    };
    let config = CleanConfig {
        min_records_required: 3,
        ..CleanConfig::default()
    };

    let set = clean_records(file, &config, scrape_date()).unwrap();
    assert_eq!(set.report.raw_records, 5);
    assert_eq!(set.report.invalid_records, 2);
    assert_eq!(set.report.kept, 3);
}
