// src/error.rs
//! Error taxonomy for the feed pipeline.
//!
//! None of these are fatal: source failures are swallowed by the fetcher,
//! invalid entries are dropped by the normalizer, and a short pool is padded
//! by the slot allocator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// One configured source could not be fetched or parsed.
    #[error("source '{source_name}' failed: {reason}")]
    SourceFetch { source_name: String, reason: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("fetch of {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("malformed xml: {0}")]
    Xml(String),

    #[error("document has no <item> or <entry> elements")]
    NotAFeed,

    /// Entry lacks a required field; dropped, never surfaced.
    #[error("entry dropped: missing {field}")]
    ItemValidation { field: &'static str },

    #[error("unparsable publish date '{0}'")]
    DateParse(String),
}

impl FeedError {
    /// Wrap any failure into the per-source variant the aggregator records.
    pub fn for_source(source_name: &str, err: FeedError) -> Self {
        match err {
            FeedError::SourceFetch { .. } => err,
            other => FeedError::SourceFetch {
                source_name: source_name.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("expected exactly 4 layout regions, got {0}")]
    RegionCount(usize),

    #[error("layout regions hold no slots")]
    EmptyLayout,

    #[error("region #{index} has an empty name")]
    EmptyRegionName { index: usize },

    #[error("preload multiplier must be at least 1")]
    PreloadMultiplier,

    #[error("rotation interval must be positive")]
    ZeroInterval,

    #[error(
        "transition delay ({delay_ms}ms) must be shorter than the rotation interval ({interval_ms}ms)"
    )]
    TransitionTooLong { delay_ms: u64, interval_ms: u64 },

    #[error("source #{index} has an empty name")]
    EmptySourceName { index: usize },

    #[error("source '{name}' has unsupported url '{url}'")]
    BadSourceUrl { name: String, url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_source_wraps_once() {
        let e = FeedError::for_source("BBC", FeedError::NotAFeed);
        let again = FeedError::for_source("Other", e);
        match again {
            FeedError::SourceFetch {
                source_name,
                reason,
            } => {
                assert_eq!(source_name, "BBC");
                assert!(reason.contains("<item>"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
