// src/aggregator.rs
//! # Aggregator
//! Runs every source fetcher concurrently, waits for all of them, then turns
//! the combined output into the preload pool:
//!
//! 1. concatenate (config order) and drop incomplete items,
//! 2. stable sort by `published_at`, newest first,
//! 3. split into with/without media,
//! 4. round-robin interleave up to `preload_count`,
//! 5. fall back to the plain sorted list when the interleave is too thin.
//!
//! The pool is never edited in place. Each load cycle publishes a fresh
//! `Arc<Pool>` through a watch channel; readers hold whichever snapshot they
//! cloned.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::ingest::{CanonicalItem, FeedSource, SourceFetcher};

/// Pool sizing derived from the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub preload_count: usize,
    pub total_displayed: usize,
}

/// Immutable result of one load cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Pool {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub items: Vec<CanonicalItem>,
}

impl Pool {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            built_at: DateTime::<Utc>::UNIX_EPOCH,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What readers observe: the current pool and whether a load is in flight.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub pool: Arc<Pool>,
    pub loading: bool,
}

pub struct Aggregator {
    sources: Vec<FeedSource>,
    fetcher: Arc<SourceFetcher>,
    settings: PoolSettings,
    state: watch::Sender<PoolState>,
    // Load cycles are serialized so the pool has a single writer.
    cycle: Mutex<()>,
}

impl Aggregator {
    pub fn new(sources: Vec<FeedSource>, fetcher: SourceFetcher, settings: PoolSettings) -> Self {
        let (state, _) = watch::channel(PoolState {
            pool: Arc::new(Pool::empty()),
            loading: true,
        });
        Self {
            sources,
            fetcher: Arc::new(fetcher),
            settings,
            state,
            cycle: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    pub fn current(&self) -> PoolState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PoolState> {
        self.state.subscribe()
    }

    /// Run one load cycle and publish the resulting pool.
    ///
    /// If this future is dropped mid-cycle the previous pool stays published
    /// and `loading` is cleared again.
    pub async fn load(&self) -> Arc<Pool> {
        let _cycle = self.cycle.lock().await;
        self.state.send_modify(|s| s.loading = true);
        let mut loading = LoadingGuard {
            state: &self.state,
            armed: true,
        };

        let batches = self.fetch_all().await;
        let sources_ok = batches.iter().filter(|b| !b.is_empty()).count();
        let items = build_pool(batches, self.settings);

        let generation = self.state.borrow().pool.generation + 1;
        let pool = Arc::new(Pool {
            generation,
            built_at: Utc::now(),
            items,
        });
        self.state.send_replace(PoolState {
            pool: Arc::clone(&pool),
            loading: false,
        });
        loading.armed = false;

        counter!("feed_load_cycles_total").increment(1);
        gauge!("feed_pool_size").set(pool.len() as f64);
        info!(
            generation,
            pool = pool.len(),
            sources = self.sources.len(),
            sources_ok,
            "pool published"
        );
        pool
    }

    /// Join barrier over every source. Output keeps config order so the
    /// later stable sort breaks ties deterministically.
    async fn fetch_all(&self) -> Vec<Vec<CanonicalItem>> {
        let mut set = JoinSet::new();
        for (idx, source) in self.sources.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            set.spawn(async move { (idx, fetcher.fetch(&source).await) });
        }

        let mut batches = vec![Vec::new(); self.sources.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, items)) => batches[idx] = items,
                Err(e) => warn!(error = %e, "fetch task did not complete"),
            }
        }
        batches
    }
}

/// Clears `loading` when a load cycle is abandoned before publishing.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<PoolState>,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(|s| s.loading = false);
            warn!("load cycle abandoned, previous pool kept");
        }
    }
}

/// Steps 1-2: concatenate, drop incomplete items, stable sort newest first.
/// Repeated links keep their first (newest) occurrence, so one link never
/// appears twice in a pool.
pub fn merge_and_sort(batches: Vec<Vec<CanonicalItem>>) -> Vec<CanonicalItem> {
    let mut all: Vec<CanonicalItem> = batches
        .into_iter()
        .flatten()
        .filter(CanonicalItem::is_complete)
        .collect();
    all.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut seen = HashSet::new();
    all.retain(|item| seen.insert(item.link.clone()));
    all
}

/// Steps 3-4: alternate media / non-media items, draining whichever list
/// outlasts the other, up to `limit` items.
pub fn balance(sorted: &[CanonicalItem], limit: usize) -> Vec<CanonicalItem> {
    let (with_media, without_media): (Vec<&CanonicalItem>, Vec<&CanonicalItem>) =
        sorted.iter().partition(|item| item.has_media());

    let mut media = with_media.into_iter();
    let mut plain = without_media.into_iter();
    let mut out = Vec::with_capacity(limit.min(sorted.len()));

    while out.len() < limit {
        let m = media.next();
        let took_media = m.is_some();
        if let Some(item) = m {
            out.push(item.clone());
            if out.len() == limit {
                break;
            }
        }
        let p = plain.next();
        let took_plain = p.is_some();
        if let Some(item) = p {
            out.push(item.clone());
        }
        if !took_media && !took_plain {
            break;
        }
    }
    out
}

/// Full pool construction (steps 1-5).
///
/// Besides dropping incomplete items, step 1 also drops repeated links
/// (see [`merge_and_sort`]), so the pool can be shorter than the raw input
/// even when every item is complete. A window can still show the same item
/// twice, but only when it wraps around a short pool.
pub fn build_pool(batches: Vec<Vec<CanonicalItem>>, settings: PoolSettings) -> Vec<CanonicalItem> {
    let sorted = merge_and_sort(batches);
    let balanced = balance(&sorted, settings.preload_count);
    if balanced.len() <= settings.total_displayed {
        return sorted.into_iter().take(settings.preload_count).collect();
    }
    balanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(tag: &str, t: i64, media: bool) -> CanonicalItem {
        CanonicalItem {
            title: tag.to_string(),
            link: format!("https://x.test/{tag}"),
            description: None,
            media_url: media.then(|| format!("https://cdn.test/{tag}.jpg")),
            source_name: "S".to_string(),
            published_at: Utc.timestamp_opt(t, 0).unwrap(),
        }
    }

    fn titles(items: &[CanonicalItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    struct Hang;

    #[async_trait::async_trait]
    impl crate::ingest::FeedTransport for Hang {
        async fn fetch_text(&self, _url: &str) -> Result<String, crate::error::FeedError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_load_clears_loading_flag() {
        let fetcher = SourceFetcher::new(Arc::new(Hang), std::time::Duration::from_secs(60), 10);
        let agg = Aggregator::new(
            vec![FeedSource::new("slow", "https://slow.test/rss")],
            fetcher,
            PoolSettings {
                preload_count: 10,
                total_displayed: 2,
            },
        );

        let cut = tokio::time::timeout(std::time::Duration::from_secs(1), agg.load()).await;
        assert!(cut.is_err(), "load should still be running");

        let state = agg.current();
        assert!(!state.loading, "loading must not stay set after a dropped cycle");
        assert_eq!(state.pool.generation, 0);
    }

    #[test]
    fn balance_interleaves_then_drains() {
        let sorted = vec![
            item("i1", 9, true),
            item("n1", 8, false),
            item("n2", 7, false),
            item("i2", 6, true),
            item("n3", 5, false),
        ];
        assert_eq!(titles(&balance(&sorted, 100)), vec!["i1", "n1", "i2", "n2", "n3"]);
    }

    #[test]
    fn balance_respects_limit() {
        let sorted: Vec<_> = (0..10).map(|i| item(&format!("m{i}"), 100 - i, i % 3 == 0)).collect();
        assert_eq!(balance(&sorted, 3).len(), 3);
        assert_eq!(balance(&sorted, 0).len(), 0);
        assert_eq!(balance(&[], 5).len(), 0);
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let a = vec![item("a5", 5, false), item("tieA", 3, false), item("a1", 1, false)];
        let b = vec![item("b4", 4, false), item("tieB", 3, false)];
        let sorted = merge_and_sort(vec![a, b]);
        assert_eq!(titles(&sorted), vec!["a5", "b4", "tieA", "tieB", "a1"]);
        assert!(sorted
            .windows(2)
            .all(|w| w[0].published_at >= w[1].published_at));
    }

    #[test]
    fn incomplete_and_duplicate_items_are_dropped() {
        let mut blank = item("blank", 9, false);
        blank.title = "   ".to_string();
        let mut nolink = item("nolink", 8, false);
        nolink.link.clear();
        let newer = item("dup", 7, false);
        let mut older = item("dup", 2, true);
        older.title = "dup-older".to_string();

        let sorted = merge_and_sort(vec![vec![blank, nolink, older], vec![newer]]);
        assert_eq!(titles(&sorted), vec!["dup"]);
    }

    #[test]
    fn repeated_links_shorten_the_pool() {
        let settings = PoolSettings {
            preload_count: 10,
            total_displayed: 2,
        };
        let a = vec![item("s1", 9, true), item("s2", 8, false), item("s3", 7, true)];
        let mut b = vec![item("s1", 6, false), item("s2", 5, true), item("s4", 4, false)];
        b[0].source_name = "T".to_string();
        b[1].source_name = "T".to_string();

        let pool = build_pool(vec![a, b], settings);
        assert_eq!(pool.len(), 4, "six complete items, two repeated links");
        assert_eq!(titles(&pool), vec!["s1", "s2", "s3", "s4"]);
        assert!(pool.iter().all(|i| i.source_name == "S"));
    }

    #[test]
    fn thin_balanced_pool_falls_back_to_sorted_order() {
        let settings = PoolSettings {
            preload_count: 10,
            total_displayed: 4,
        };
        let batch = vec![
            item("m1", 9, true),
            item("m2", 8, true),
            item("n1", 7, false),
        ];
        // 3 <= 4: keep plain recency order instead of the interleave.
        assert_eq!(titles(&build_pool(vec![batch], settings)), vec!["m1", "m2", "n1"]);
    }

    #[test]
    fn pool_is_balanced_and_capped() {
        let settings = PoolSettings {
            preload_count: 6,
            total_displayed: 2,
        };
        let batch: Vec<_> = (0..20)
            .map(|i| item(&format!("x{i}"), 100 - i, i < 3))
            .collect();
        let pool = build_pool(vec![batch], settings);
        assert_eq!(titles(&pool), vec!["x0", "x3", "x1", "x4", "x2", "x5"]);
    }
}
