// src/ingest/fetcher.rs
//! Source fetcher: transport -> document -> normalizer for one source.
//!
//! Failures stop here. `fetch` always yields a (possibly empty) item list
//! and leaves a warning plus an error counter behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::ingest::dom::Document;
use crate::ingest::normalize::{normalize_document, Normalized};
use crate::ingest::transport::FeedTransport;
use crate::ingest::types::{CanonicalItem, FeedSource};

pub struct SourceFetcher {
    transport: Arc<dyn FeedTransport>,
    timeout: Duration,
    max_items: usize,
}

impl SourceFetcher {
    /// `max_items` caps the normalizer output per source.
    pub fn new(transport: Arc<dyn FeedTransport>, timeout: Duration, max_items: usize) -> Self {
        Self {
            transport,
            timeout,
            max_items,
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Fetch and normalize one source. Never fails.
    pub async fn fetch(&self, source: &FeedSource) -> Vec<CanonicalItem> {
        super::ensure_metrics_described();
        let t0 = Instant::now();

        let result = self.try_fetch(source).await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_fetch_ms").record(ms);

        match result {
            Ok(normalized) => {
                for reason in &normalized.rejected {
                    debug!(source = %source.name, %reason, "entry dropped");
                }
                counter!("feed_items_parsed_total").increment(normalized.items.len() as u64);
                counter!("feed_items_dropped_total").increment(normalized.rejected.len() as u64);
                info!(
                    source = %source.name,
                    items = normalized.items.len(),
                    dropped = normalized.rejected.len(),
                    ms = ms as u64,
                    "feed source fetched"
                );
                normalized.items
            }
            Err(e) => {
                warn!(source = %source.name, url = %source.url, error = %e, "feed source failed");
                counter!("feed_source_errors_total", "source" => source.name.clone()).increment(1);
                Vec::new()
            }
        }
    }

    /// Fallible core of [`fetch`](Self::fetch), bounded by the configured timeout.
    pub async fn try_fetch(&self, source: &FeedSource) -> Result<Normalized, FeedError> {
        let body = tokio::time::timeout(self.timeout, self.transport.fetch_text(&source.url))
            .await
            .map_err(|_| FeedError::Timeout {
                url: source.url.clone(),
                secs: self.timeout.as_secs(),
            })
            .and_then(|r| r)
            .map_err(|e| FeedError::for_source(&source.name, e))?;

        let doc = Document::parse(&body).map_err(|e| FeedError::for_source(&source.name, e))?;
        if doc.entries().is_empty() && !looks_like_feed(&doc) {
            return Err(FeedError::for_source(&source.name, FeedError::NotAFeed));
        }

        Ok(normalize_document(&doc, &source.name, self.max_items))
    }
}

/// An empty `<rss>`/`<feed>` is a valid feed with nothing in it; an HTML
/// error page is not.
fn looks_like_feed(doc: &Document) -> bool {
    doc.root()
        .children()
        .iter()
        .any(|el| matches!(el.name(), "rss" | "feed" | "rdf:RDF"))
}
