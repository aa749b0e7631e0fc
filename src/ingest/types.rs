// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title shown in slots that the pool cannot fill.
pub const PLACEHOLDER_TITLE: &str = "updating";
pub const PLACEHOLDER_LINK: &str = "#";
pub const PLACEHOLDER_SOURCE: &str = "system";

/// Normalized representation of one feed entry.
///
/// `link` doubles as the identity key. Items are only ever built by the
/// normalizer with a non-empty title, a non-empty link and a parsed date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
}

impl CanonicalItem {
    pub fn has_media(&self) -> bool {
        self.media_url.as_deref().is_some_and(|m| !m.trim().is_empty())
    }

    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.link.trim().is_empty()
    }

    /// Filler for display slots the pool cannot cover.
    pub fn placeholder() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            link: PLACEHOLDER_LINK.to_string(),
            description: None,
            media_url: None,
            source_name: PLACEHOLDER_SOURCE.to_string(),
            published_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.link == PLACEHOLDER_LINK && self.source_name == PLACEHOLDER_SOURCE
    }
}

/// Configured syndication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}
