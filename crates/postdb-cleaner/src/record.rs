//! Boundary coercion from loosely-typed scraper rows to [`RawPost`].
//!
//! Every column of a scraped file is read as an optional string. Coercion
//! rejects rows that cannot be interpreted (no URL, a negative or garbled
//! notes count, an unparseable timestamp); the caller counts and reports
//! them instead of loading partial data.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postdb_core::{PostType, RawPost};
use serde::{Deserialize, Serialize};

use crate::error::CleanError;

/// One row of the scraper's output file, exactly as read.
///
/// Missing columns deserialize as `None`. `url` and `text` are accepted as
/// alternate column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "url")]
    pub post_url: Option<String>,
    #[serde(default, alias = "text")]
    pub post_text: Option<String>,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub notes_count: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Coerces a [`RawRecord`] into a [`RawPost`].
///
/// `row` is the 1-based data row number, used only for error context.
///
/// # Errors
///
/// Returns [`CleanError::InvalidRecord`] if the URL is missing, the notes
/// count is not a non-negative integer, the tag list is malformed, or the
/// timestamp cannot be parsed.
pub fn coerce_record(row: usize, record: RawRecord) -> Result<RawPost, CleanError> {
    let invalid = |reason: String| CleanError::InvalidRecord { row, reason };

    let post_url = non_empty(record.post_url)
        .map(|u| u.trim().to_string())
        .ok_or_else(|| invalid("missing post_url".to_string()))?;

    let notes_count = non_empty(record.notes_count)
        .map(|raw| parse_notes_count(&raw))
        .transpose()
        .map_err(invalid)?;

    let tags = non_empty(record.tags)
        .map(|raw| parse_tag_list(&raw))
        .transpose()
        .map_err(invalid)?;

    let timestamp = non_empty(record.timestamp)
        .map(|raw| parse_timestamp(&raw))
        .transpose()
        .map_err(invalid)?;

    Ok(RawPost {
        post_url,
        post_text: record.post_text,
        post_type: record.post_type.as_deref().and_then(PostType::from_raw),
        notes_count,
        tags,
        image_url: non_empty(record.image_url).map(|u| u.trim().to_string()),
        timestamp,
    })
}

/// Treats absent and whitespace-only values alike.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses a notes count such as `"1,204"` or `"57"`.
///
/// Whole-number floats (`"12.0"`) are accepted because spreadsheet exports
/// write integer columns that way once any cell in them was blank.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn parse_notes_count(raw: &str) -> Result<u64, String> {
    let digits: String = raw.trim().chars().filter(|c| !matches!(c, ',' | '_')).collect();
    if let Ok(n) = digits.parse::<u64>() {
        return Ok(n);
    }
    match digits.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(format!("notes_count '{}' is not a non-negative integer", raw.trim())),
    }
}

/// Parses a tag cell.
///
/// Accepts a JSON array (`["art","photo"]`), a Python-style list literal
/// (`['art', 'photo']`) or a bare comma-separated list (`art, photo`). Tags
/// are returned in input order, duplicates and blanks included; the cleaner
/// normalizes them later.
pub(crate) fn parse_tag_list(raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();

    if let Some(rest) = trimmed.strip_prefix('[') {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(format!("unterminated tag list '{trimmed}'"));
        };
        if let Ok(tags) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Ok(tags);
        }
        return split_list_literal(inner);
    }

    Ok(trimmed
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Splits the inside of a list literal into items. Quoted items may contain
/// commas and backslash escapes; unquoted items run to the next comma.
fn split_list_literal(inner: &str) -> Result<Vec<String>, String> {
    let mut tags = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        let Some(&first) = chars.peek() else {
            return Ok(tags);
        };

        let tag = if first == '\'' || first == '"' {
            chars.next();
            let mut tag = String::new();
            loop {
                match chars.next() {
                    Some('\\') if chars.peek().is_some() => tag.extend(chars.next()),
                    Some(c) if c == first => break,
                    Some(c) => tag.push(c),
                    None => return Err(format!("unterminated quote in tag list '[{inner}]'")),
                }
            }
            let trailing: String = chars.by_ref().take_while(|c| *c != ',').collect();
            if !trailing.trim().is_empty() {
                return Err(format!("unexpected '{}' after quoted tag", trailing.trim()));
            }
            tag
        } else {
            let bare: String = chars.by_ref().take_while(|c| *c != ',').collect();
            bare.trim().to_string()
        };

        if !tag.trim().is_empty() {
            tags.push(tag);
        }
    }
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(format!("timestamp '{raw}' is not ISO-8601"))
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
