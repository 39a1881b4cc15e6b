use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post format as reported by the scraper, after synonym mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Photo,
    Text,
    Quote,
    /// A type string the scraper produced that is not one of the known formats.
    Other,
    /// No type was reported at all; filled in by the cleaner.
    Unknown,
}

impl PostType {
    /// Map a raw scraper value onto a known post type.
    ///
    /// Matching is case-insensitive and accepts the synonyms seen in scraped
    /// data (`"image"`, `"pic"`, `"txt"`, ...). Returns `None` for an empty
    /// value so the caller can treat it as missing; anything unrecognized is
    /// [`PostType::Other`].
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let post_type = match lower.as_str() {
            "photo" | "image" | "picture" | "pic" => PostType::Photo,
            "text" | "txt" => PostType::Text,
            "quote" | "quotation" => PostType::Quote,
            "unknown" => PostType::Unknown,
            _ => PostType::Other,
        };
        Some(post_type)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Photo => "photo",
            PostType::Text => "text",
            PostType::Quote => "quote",
            PostType::Other => "other",
            PostType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(PostType::Photo),
            "text" => Ok(PostType::Text),
            "quote" => Ok(PostType::Quote),
            "other" => Ok(PostType::Other),
            "unknown" => Ok(PostType::Unknown),
            other => Err(format!("unrecognized post type '{other}'")),
        }
    }
}

/// Engagement bucket derived from a post's notes count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    NoEngagement,
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub const ALL: [EngagementLevel; 4] = [
        EngagementLevel::NoEngagement,
        EngagementLevel::Low,
        EngagementLevel::Medium,
        EngagementLevel::High,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLevel::NoEngagement => "no_engagement",
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

impl std::fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngagementLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_engagement" => Ok(EngagementLevel::NoEngagement),
            "low" => Ok(EngagementLevel::Low),
            "medium" => Ok(EngagementLevel::Medium),
            "high" => Ok(EngagementLevel::High),
            other => Err(format!("unrecognized engagement level '{other}'")),
        }
    }
}

/// A scraped post after boundary coercion, before any cleaning.
///
/// Every field except `post_url` may be missing; the cleaner decides how
/// missing values are filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    pub post_url: String,
    pub post_text: Option<String>,
    pub post_type: Option<PostType>,
    pub notes_count: Option<u64>,
    /// Tags in the order the scraper reported them, duplicates included.
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A validated, normalized, feature-augmented post eligible for loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedPost {
    /// Unique within a cleaned set.
    pub post_url: String,
    /// Original text with surrounding whitespace trimmed and runs collapsed.
    pub post_text: String,
    /// Markup, URLs and stray symbols removed. Never empty.
    pub post_text_clean: String,
    pub post_type: PostType,
    pub notes_count: u64,
    pub word_count: usize,
    /// Length of `post_text_clean` in Unicode scalar values.
    pub char_count: usize,
    pub has_image: bool,
    pub image_url: Option<String>,
    pub tags: BTreeSet<String>,
    pub engagement_level: EngagementLevel,
    pub timestamp: Option<DateTime<Utc>>,
    /// Processing-time stamp shared by every post of one cleaning run.
    pub scrape_date: DateTime<Utc>,
}

impl CleanedPost {
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}
