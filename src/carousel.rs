// src/carousel.rs
//! Wires the aggregator, rotation scheduler and slot allocator together.
//!
//! A load cycle publishes a new pool and then re-attaches the scheduler,
//! which retires the old timer and resets rotation to `{0, Idle}`. The cycle
//! runs on its own task, so a caller that stops waiting (a timed-out request,
//! an aborted refresh loop) does not cut it short. Readers only ever get
//! owned snapshots.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, Pool};
use crate::config::CarouselConfig;
use crate::error::ConfigError;
use crate::ingest::{FeedTransport, SourceFetcher};
use crate::rotation::{Phase, RotationScheduler, RotationState};
use crate::slots::{Region, SlotLayout};

/// Immutable projection handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub offset: usize,
    pub phase: Phase,
    pub loading: bool,
    pub generation: u64,
    pub pool_size: usize,
    pub padded: usize,
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolSummary {
    pub loading: bool,
    pub generation: u64,
    pub size: usize,
    pub with_media: usize,
    pub sources: BTreeMap<String, usize>,
}

pub struct Carousel {
    aggregator: Arc<Aggregator>,
    scheduler: Arc<Mutex<RotationScheduler>>,
    layout: SlotLayout,
    refresh: Option<Duration>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl Carousel {
    pub fn new(config: &CarouselConfig, transport: Arc<dyn FeedTransport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = config.layout()?;

        let fetcher = SourceFetcher::new(
            transport,
            config.fetch_timeout(),
            config.max_items_per_source(),
        );
        let aggregator = Aggregator::new(config.sources.clone(), fetcher, config.pool_settings());
        let scheduler = RotationScheduler::new(config.rotation_timing(), layout.total());

        Ok(Self {
            aggregator: Arc::new(aggregator),
            scheduler: Arc::new(Mutex::new(scheduler)),
            layout,
            refresh: config.refresh_interval(),
            refresh_task: Mutex::new(None),
        })
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn rotation(&self) -> RotationState {
        self.scheduler().state()
    }

    pub fn subscribe_rotation(&self) -> tokio::sync::watch::Receiver<RotationState> {
        self.scheduler().subscribe()
    }

    /// One full load cycle: fetch, aggregate, publish, restart rotation.
    ///
    /// Dropping the returned future does not cancel the cycle; it still
    /// publishes and re-attaches the scheduler.
    pub async fn reload(&self) -> Arc<Pool> {
        let aggregator = Arc::clone(&self.aggregator);
        let scheduler = Arc::clone(&self.scheduler);
        let cycle = tokio::spawn(async move {
            let pool = aggregator.load().await;
            let state = aggregator.current();
            lock_scheduler(&scheduler).attach(&state);
            pool
        });
        match cycle.await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "load cycle task failed");
                self.aggregator.current().pool
            }
        }
    }

    /// Current window partitioned into regions.
    pub fn snapshot(&self) -> WindowSnapshot {
        let pool_state = self.aggregator.current();
        let rotation = self.rotation();
        let alloc = self.layout.allocate(&pool_state.pool.items, rotation.offset);

        WindowSnapshot {
            offset: rotation.offset,
            phase: rotation.phase,
            loading: pool_state.loading,
            generation: pool_state.pool.generation,
            pool_size: pool_state.pool.len(),
            padded: alloc.padded,
            regions: alloc.regions,
        }
    }

    pub fn pool_summary(&self) -> PoolSummary {
        let state = self.aggregator.current();
        let mut sources = BTreeMap::new();
        for item in &state.pool.items {
            *sources.entry(item.source_name.clone()).or_insert(0) += 1;
        }
        PoolSummary {
            loading: state.loading,
            generation: state.pool.generation,
            size: state.pool.len(),
            with_media: state.pool.items.iter().filter(|i| i.has_media()).count(),
            sources,
        }
    }

    /// Start the periodic reload loop. The first cycle is left to the caller.
    /// Returns `false` when refreshing is disabled or already running.
    pub fn spawn_refresh(self: &Arc<Self>) -> bool {
        let Some(period) = self.refresh else {
            return false;
        };
        let mut slot = self.refresh_task.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        // Weak so the loop does not keep the carousel alive on its own.
        let weak = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(carousel) = weak.upgrade() else {
                    break;
                };
                let pool = carousel.reload().await;
                debug!(generation = pool.generation, "scheduled refresh done");
            }
        }));
        info!(period_secs = period.as_secs(), "refresh loop started");
        true
    }

    /// Stop background work: refresh loop and rotation timer.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.scheduler().cancel();
        info!("carousel stopped");
    }

    fn scheduler(&self) -> MutexGuard<'_, RotationScheduler> {
        lock_scheduler(&self.scheduler)
    }
}

fn lock_scheduler(m: &Mutex<RotationScheduler>) -> MutexGuard<'_, RotationScheduler> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for Carousel {
    fn drop(&mut self) {
        let task = self
            .refresh_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}
