use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanError {
    /// Quality gate: too few records survived cleaning to be worth loading.
    #[error("quality gate failed: {actual} records after cleaning, {required} required")]
    InsufficientRecords { actual: usize, required: usize },

    /// The input is structurally unusable, e.g. it has no URL column.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A single raw row could not be coerced into a post.
    #[error("invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    /// A row of a cleaned file does not describe a valid cleaned post.
    #[error("malformed cleaned row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error(transparent)]
    Config(#[from] postdb_core::ConfigError),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
