// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod carousel;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod rotation;
pub mod slots;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::carousel::{Carousel, PoolSummary, WindowSnapshot};
pub use crate::config::CarouselConfig;
pub use crate::error::{ConfigError, FeedError};
pub use crate::ingest::{CanonicalItem, FeedSource, FeedTransport, FixtureTransport, LiveTransport};
pub use crate::rotation::{Phase, RotationState};
pub use crate::slots::{Allocation, RegionSpec, SlotLayout};

/// Build the carousel and its HTTP router without starting any background
/// work. Callers decide when to run the first load and the refresh loop.
pub fn build_app(
    config: &CarouselConfig,
    transport: Arc<dyn FeedTransport>,
) -> anyhow::Result<(Arc<Carousel>, Router)> {
    let carousel = Arc::new(Carousel::new(config, transport).context("invalid carousel config")?);
    let router = api::router(api::AppState::new(Arc::clone(&carousel)));
    Ok((carousel, router))
}

/// Build the app for serving: install the metrics recorder, then start the
/// first load cycle and the refresh loop in the background.
///
/// A recorder that cannot be installed (one already exists) only disables
/// `/metrics`.
pub fn start_app(
    config: &CarouselConfig,
    transport: Arc<dyn FeedTransport>,
) -> anyhow::Result<(Arc<Carousel>, Router)> {
    let (carousel, router) = build_app(config, transport)?;

    // Recorder first: the first load cycle registers metric descriptions.
    let router = match metrics::Metrics::init(config.total_displayed()) {
        Ok(m) => router.merge(m.router()),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            router
        }
    };

    // /window serves placeholders until the first cycle publishes.
    let first = Arc::clone(&carousel);
    tokio::spawn(async move {
        first.reload().await;
        first.spawn_refresh();
    });

    Ok((carousel, router))
}
