// src/ingest/transport.rs
//! Transport primitive: URL in, raw document text out.
//!
//! The rest of the pipeline only sees [`FeedTransport`]; HTTP, local files
//! and in-memory fixtures are interchangeable behind it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;

use crate::error::FeedError;

/// URL prefix that maps a source onto a local file (`fixture:path/to/feed.xml`).
pub const FIXTURE_SCHEME: &str = "fixture:";

const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FeedError>;
}

/// reqwest for http(s) sources, the filesystem for `fixture:` sources.
pub struct LiveTransport {
    client: reqwest::Client,
}

impl LiveTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| FeedError::Transport {
                url: String::new(),
                message: format!("building http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedTransport for LiveTransport {
    async fn fetch_text(&self, url: &str) -> Result<String, FeedError> {
        if let Some(path) = url.strip_prefix(FIXTURE_SCHEME) {
            return tokio::fs::read_to_string(path)
                .await
                .map_err(|e| FeedError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                });
        }

        let resp = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_FEEDS)
            .send()
            .await
            .map_err(|e| FeedError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| FeedError::Transport {
            url: url.to_string(),
            message: format!("reading body: {e}"),
        })
    }
}

/// In-memory documents keyed by exact URL. Unknown URLs fail like a dead host.
#[derive(Debug, Clone, Default)]
pub struct FixtureTransport {
    docs: HashMap<String, String>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<String>) {
        self.docs.insert(url.into(), body.into());
    }
}

#[async_trait]
impl FeedTransport for FixtureTransport {
    async fn fetch_text(&self, url: &str) -> Result<String, FeedError> {
        self.docs
            .get(url)
            .cloned()
            .ok_or_else(|| FeedError::Transport {
                url: url.to_string(),
                message: "no fixture registered".to_string(),
            })
    }
}
