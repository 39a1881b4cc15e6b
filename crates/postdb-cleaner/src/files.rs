//! CSV boundary for raw scraper output and the cleaned record file.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use postdb_core::{CleanedPost, EngagementLevel, PostType};
use serde::{Deserialize, Serialize};

use crate::error::CleanError;
use crate::record::RawRecord;

/// Rows of a raw scraper file, decoded one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFile {
    pub records: Vec<RawRecord>,
    /// Rows that could not be decoded at all (bad UTF-8, malformed fields).
    pub unreadable: usize,
}

impl From<Vec<RawRecord>> for RawFile {
    fn from(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            unreadable: 0,
        }
    }
}

/// Reads every row of a raw scraper file.
///
/// Each row is decoded on its own; a row that cannot be decoded is logged
/// and counted in [`RawFile::unreadable`] instead of failing the file.
///
/// # Errors
///
/// Returns [`CleanError::InvalidInput`] if the header has no `post_url` (or
/// `url`) column, or [`CleanError::Csv`] if the file or its header cannot
/// be read.
pub fn read_raw_records(path: &Path) -> Result<RawFile, CleanError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| csv_err(path, source))?;

    let headers = resolve_headers(reader.headers().map_err(|source| csv_err(path, source))?);
    if !headers.iter().any(|h| h == "post_url") {
        return Err(CleanError::InvalidInput(format!(
            "{} has no post_url column",
            path.display()
        )));
    }

    let mut file = RawFile::default();
    for (idx, row) in reader.byte_records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(source) if matches!(source.kind(), csv::ErrorKind::Io(_)) => {
                return Err(csv_err(path, source));
            }
            Err(e) => {
                tracing::warn!(row = idx + 1, error = %e, "skipping unreadable raw row");
                file.unreadable += 1;
                continue;
            }
        };
        match decode_row(row, &headers) {
            Ok(record) => file.records.push(record),
            Err(reason) => {
                tracing::warn!(row = idx + 1, %reason, "skipping unreadable raw row");
                file.unreadable += 1;
            }
        }
    }

    tracing::info!(
        path = %path.display(),
        rows = file.records.len(),
        unreadable = file.unreadable,
        "read raw records"
    );
    Ok(file)
}

/// Trims header names and maps the `url`/`text` aliases onto their
/// canonical names. An alias column is ignored when the canonical column is
/// also present.
fn resolve_headers(raw: &csv::StringRecord) -> csv::StringRecord {
    let names: Vec<&str> = raw.iter().map(str::trim).collect();
    names
        .iter()
        .map(|&name| match name {
            "url" if !names.contains(&"post_url") => "post_url",
            "text" if !names.contains(&"post_text") => "post_text",
            "url" | "text" => "",
            other => other,
        })
        .collect()
}

fn decode_row(row: csv::ByteRecord, headers: &csv::StringRecord) -> Result<RawRecord, String> {
    let row = csv::StringRecord::from_byte_record(row).map_err(|e| e.to_string())?;
    row.deserialize(Some(headers)).map_err(|e| e.to_string())
}

/// One line of the cleaned file.
#[derive(Debug, Serialize, Deserialize)]
struct CleanedRow {
    post_url: String,
    post_text: String,
    post_text_clean: String,
    post_type: String,
    notes_count: u64,
    word_count: usize,
    char_count: usize,
    has_image: bool,
    image_url: Option<String>,
    /// JSON array of tag names.
    tags: String,
    tag_count: usize,
    engagement_level: String,
    timestamp: Option<String>,
    scrape_date: String,
}

impl CleanedRow {
    fn from_post(post: &CleanedPost) -> Self {
        let tags: Vec<&str> = post.tags.iter().map(String::as_str).collect();
        Self {
            post_url: post.post_url.clone(),
            post_text: post.post_text.clone(),
            post_text_clean: post.post_text_clean.clone(),
            post_type: post.post_type.to_string(),
            notes_count: post.notes_count,
            word_count: post.word_count,
            char_count: post.char_count,
            has_image: post.has_image,
            image_url: post.image_url.clone(),
            // A list of strings always serializes.
            tags: serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string()),
            tag_count: post.tag_count(),
            engagement_level: post.engagement_level.to_string(),
            timestamp: post.timestamp.map(format_timestamp),
            scrape_date: format_timestamp(post.scrape_date),
        }
    }

    fn into_post(self, row: usize) -> Result<CleanedPost, CleanError> {
        let malformed = |reason: String| CleanError::MalformedRow { row, reason };

        if self.post_text_clean.trim().is_empty() {
            return Err(malformed("post_text_clean is empty".to_string()));
        }
        let post_type: PostType = self.post_type.parse().map_err(malformed)?;
        let engagement_level: EngagementLevel =
            self.engagement_level.parse().map_err(malformed)?;
        let tags: BTreeSet<String> = serde_json::from_str::<Vec<String>>(&self.tags)
            .map_err(|e| malformed(format!("tags is not a JSON array: {e}")))?
            .into_iter()
            .collect();
        if tags.len() != self.tag_count {
            return Err(malformed(format!(
                "tag_count {} does not match {} tags",
                self.tag_count,
                tags.len()
            )));
        }
        let timestamp = self
            .timestamp
            .filter(|t| !t.trim().is_empty())
            .map(|t| parse_timestamp(&t))
            .transpose()
            .map_err(malformed)?;
        let scrape_date = parse_timestamp(&self.scrape_date).map_err(malformed)?;

        Ok(CleanedPost {
            post_url: self.post_url,
            post_text: self.post_text,
            post_text_clean: self.post_text_clean,
            post_type,
            notes_count: self.notes_count,
            word_count: self.word_count,
            char_count: self.char_count,
            has_image: self.has_image,
            image_url: self.image_url.filter(|u| !u.is_empty()),
            tags,
            engagement_level,
            timestamp,
            scrape_date,
        })
    }
}

/// RFC 3339 in UTC; fractional seconds appear only when non-zero.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("timestamp '{raw}' is not RFC 3339: {e}"))
}

/// Writes a cleaned set to `path`, creating parent directories.
///
/// The rows go to a temporary file in the destination directory, which is
/// renamed into place only after every row is written. On failure the
/// temporary file is removed and any previous file at `path` is untouched.
///
/// # Errors
///
/// Returns [`CleanError::Io`] or [`CleanError::Csv`] on write failure.
pub fn write_cleaned(path: &Path, posts: &[CleanedPost]) -> Result<(), CleanError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
            parent
        }
        None => Path::new("."),
    };

    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| io_err(dir, source))?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        for post in posts {
            writer
                .serialize(CleanedRow::from_post(post))
                .map_err(|source| csv_err(tmp.path(), source))?;
        }
        writer.flush().map_err(|source| io_err(tmp.path(), source))?;
    }
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;

    tracing::info!(path = %path.display(), rows = posts.len(), "wrote cleaned records");
    Ok(())
}

/// Reads a file produced by [`write_cleaned`].
///
/// # Errors
///
/// Returns [`CleanError::Csv`] if the file cannot be parsed, or
/// [`CleanError::MalformedRow`] if a row does not describe a valid cleaned
/// post.
pub fn read_cleaned(path: &Path) -> Result<Vec<CleanedPost>, CleanError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| csv_err(path, source))?;

    let mut posts = Vec::new();
    for (idx, row) in reader.deserialize::<CleanedRow>().enumerate() {
        let row = row.map_err(|source| csv_err(path, source))?;
        posts.push(row.into_post(idx + 1)?);
    }

    tracing::info!(path = %path.display(), rows = posts.len(), "read cleaned records");
    Ok(posts)
}

fn csv_err(path: &Path, source: csv::Error) -> CleanError {
    CleanError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn io_err(path: &Path, source: std::io::Error) -> CleanError {
    CleanError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn post(url: &str, tags: &[&str]) -> CleanedPost {
        CleanedPost {
            post_url: url.to_string(),
            post_text: "<p>Hello, world of \"quotes\"</p>".to_string(),
            post_text_clean: "Hello, world of quotes".to_string(),
            post_type: PostType::Quote,
            notes_count: 12,
            word_count: 4,
            char_count: 22,
            has_image: false,
            image_url: None,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            engagement_level: EngagementLevel::Medium,
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
            scrape_date: Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn read_raw_records_accepts_url_alias_and_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            "url,text,notes_count\nhttps://a.tumblr.com/post/1,hello there,\"1,204\"\n",
        )
        .unwrap();

        let file = read_raw_records(&path).unwrap();
        assert_eq!(file.unreadable, 0);
        let records = file.records;
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].post_url.as_deref(),
            Some("https://a.tumblr.com/post/1")
        );
        assert_eq!(records[0].post_text.as_deref(), Some("hello there"));
        assert_eq!(records[0].notes_count.as_deref(), Some("1,204"));
        assert_eq!(records[0].tags, None);
    }

    #[test]
    fn read_raw_records_skips_row_with_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            b"post_url,post_text\n\
              https://a.tumblr.com/post/1,first post\n\
              https://a.tumblr.com/post/2,bad \xff\xfe bytes\n\
              https://a.tumblr.com/post/3,third post\n",
        )
        .unwrap();

        let file = read_raw_records(&path).unwrap();
        assert_eq!(file.unreadable, 1);
        let urls: Vec<_> = file
            .records
            .iter()
            .map(|r| r.post_url.as_deref().unwrap())
            .collect();
        assert_eq!(
            urls,
            vec!["https://a.tumblr.com/post/1", "https://a.tumblr.com/post/3"]
        );
    }

    #[test]
    fn read_raw_records_prefers_canonical_column_over_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            "url,post_url,post_text\nhttps://old.example/1,https://a.tumblr.com/post/1,hello\n",
        )
        .unwrap();

        let file = read_raw_records(&path).unwrap();
        assert_eq!(file.unreadable, 0);
        assert_eq!(
            file.records[0].post_url.as_deref(),
            Some("https://a.tumblr.com/post/1")
        );
    }

    #[test]
    fn read_raw_records_rejects_file_without_url_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "post_text,notes_count\nhello,3\n").unwrap();

        let err = read_raw_records(&path).unwrap_err();
        assert!(matches!(err, CleanError::InvalidInput(_)), "got: {err:?}");
    }

    #[test]
    fn read_raw_records_missing_file_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_raw_records(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, CleanError::Csv { .. }));
    }

    #[test]
    fn write_then_read_cleaned_preserves_posts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("cleaned.csv");
        let mut second = post("https://a.tumblr.com/post/2", &[]);
        second.image_url = Some("https://64.media.tumblr.com/x.jpg".to_string());
        second.has_image = true;
        second.timestamp = None;
        let posts = vec![post("https://a.tumblr.com/post/1", &["art", "photo"]), second];

        write_cleaned(&path, &posts).unwrap();
        let siblings = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(siblings, 1);

        let read_back = read_cleaned(&path).unwrap();
        assert_eq!(read_back, posts);
    }

    #[test]
    fn write_cleaned_keeps_subsecond_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let mut precise = post("https://a.tumblr.com/post/1", &[]);
        precise.timestamp = Some(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
                + chrono::Duration::milliseconds(250),
        );

        write_cleaned(&path, &[precise.clone()]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("2024-03-01T12:30:00.250Z"), "{contents}");
        assert!(contents.contains("2026-10-16T09:00:00Z"), "{contents}");
        assert_eq!(read_cleaned(&path).unwrap(), vec![precise]);
    }

    #[test]
    fn write_cleaned_failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by the renamed file.
        let path = dir.path().join("cleaned.csv");
        std::fs::create_dir(&path).unwrap();

        let err = write_cleaned(&path, &[post("https://a.tumblr.com/post/1", &[])]).unwrap_err();
        assert!(matches!(err, CleanError::Io { .. }), "got: {err:?}");

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("cleaned.csv")]);
    }

    #[test]
    fn write_cleaned_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        std::fs::write(&path, "stale").unwrap();

        write_cleaned(&path, &[post("https://a.tumblr.com/post/1", &["art"])]).unwrap();
        assert_eq!(read_cleaned(&path).unwrap().len(), 1);
    }

    #[test]
    fn read_cleaned_rejects_tag_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_cleaned(&path, &[post("https://a.tumblr.com/post/1", &["art"])]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let tampered = contents.replace("[\"\"art\"\"]", "[\"\"art\"\",\"\"photo\"\"]");
        assert_ne!(contents, tampered);
        std::fs::write(&path, tampered).unwrap();

        let err = read_cleaned(&path).unwrap_err();
        assert!(
            matches!(err, CleanError::MalformedRow { row: 1, .. }),
            "got: {err:?}"
        );
    }

    #[test]
    fn read_cleaned_rejects_unknown_engagement_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_cleaned(&path, &[post("https://a.tumblr.com/post/1", &[])]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replace(",medium,", ",viral,")).unwrap();

        let err = read_cleaned(&path).unwrap_err();
        assert!(matches!(err, CleanError::MalformedRow { .. }));
    }
}
