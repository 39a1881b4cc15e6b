use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::posts::EngagementLevel;
use crate::ConfigError;

pub const DEFAULT_MIN_WORD_COUNT: usize = 5;
pub const DEFAULT_MAX_WORD_COUNT: usize = 10_000;
pub const DEFAULT_MIN_RECORDS_REQUIRED: usize = 100;
pub const DEFAULT_ENGAGEMENT_THRESHOLDS: [u64; 3] = [1, 10, 100];

/// Which record survives when several raw records share a `post_url`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// The first occurrence in input order wins.
    #[default]
    KeepFirst,
    /// The record with the largest notes count wins; ties go to the earliest.
    HighestNotes,
}

impl std::fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupPolicy::KeepFirst => write!(f, "keep-first"),
            DedupPolicy::HighestNotes => write!(f, "highest-notes"),
        }
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "keep-first" => Ok(DedupPolicy::KeepFirst),
            "highest-notes" => Ok(DedupPolicy::HighestNotes),
            other => Err(format!(
                "unknown dedup policy '{other}'; expected 'keep-first' or 'highest-notes'"
            )),
        }
    }
}

/// Ascending lower bounds for the `low`, `medium` and `high` engagement
/// buckets. A notes count below the first bound has no engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngagementThresholds(pub [u64; 3]);

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self(DEFAULT_ENGAGEMENT_THRESHOLDS)
    }
}

impl EngagementThresholds {
    #[must_use]
    pub fn classify(&self, notes_count: u64) -> EngagementLevel {
        let [low, medium, high] = self.0;
        match notes_count {
            n if n < low => EngagementLevel::NoEngagement,
            n if n < medium => EngagementLevel::Low,
            n if n < high => EngagementLevel::Medium,
            _ => EngagementLevel::High,
        }
    }

    fn is_ascending(&self) -> bool {
        self.0.windows(2).all(|w| w[0] < w[1])
    }
}

impl FromStr for EngagementThresholds {
    type Err = String;

    /// Parses a comma-separated triple such as `"1,10,100"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u64>().map_err(|e| format!("'{}': {e}", p.trim())))
            .collect::<Result<Vec<_>, _>>()?;
        let values: [u64; 3] = parts
            .try_into()
            .map_err(|v: Vec<u64>| format!("expected 3 thresholds, got {}", v.len()))?;
        let thresholds = Self(values);
        if !thresholds.is_ascending() {
            return Err(format!("thresholds must be strictly ascending, got {s}"));
        }
        Ok(thresholds)
    }
}

/// Tunables for the cleaning stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    pub min_word_count: usize,
    pub max_word_count: usize,
    /// Quality gate: fewer surviving records than this rejects the whole set.
    pub min_records_required: usize,
    pub engagement_thresholds: EngagementThresholds,
    pub dedup_policy: DedupPolicy,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            min_word_count: DEFAULT_MIN_WORD_COUNT,
            max_word_count: DEFAULT_MAX_WORD_COUNT,
            min_records_required: DEFAULT_MIN_RECORDS_REQUIRED,
            engagement_thresholds: EngagementThresholds::default(),
            dedup_policy: DedupPolicy::default(),
        }
    }
}

impl CleanConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the word-count range is empty or
    /// the engagement thresholds are not strictly ascending.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_word_count > self.max_word_count {
            return Err(ConfigError::Validation(format!(
                "min_word_count ({}) exceeds max_word_count ({})",
                self.min_word_count, self.max_word_count
            )));
        }
        if !self.engagement_thresholds.is_ascending() {
            return Err(ConfigError::Validation(format!(
                "engagement_thresholds must be strictly ascending, got {:?}",
                self.engagement_thresholds.0
            )));
        }
        Ok(())
    }
}
