//! Turns raw scraped Tumblr posts into a validated, normalized, feature-rich
//! cleaned set, or rejects the whole batch when too little survives.

pub mod error;
pub mod files;
pub mod pipeline;
pub mod record;
mod stages;
pub mod text;

pub use error::CleanError;
pub use files::{read_cleaned, read_raw_records, write_cleaned, RawFile};
pub use pipeline::{clean, clean_records, CleanReport, CleanedSet};
pub use record::{coerce_record, RawRecord};
