// src/rotation.rs
//! # Rotation Scheduler
//! Moves the display window through the pool on a fixed timer.
//!
//! ```text
//! Idle --(pool >= 2 x window, not loading)--> Displaying
//! Displaying --(interval tick)--> Fading
//! Fading --(transition delay)--> Displaying, offset += window (wraps to 0)
//! ```
//!
//! The scheduler is the only writer of [`RotationState`]; readers subscribe
//! to a watch channel. The timer task is cancelled whenever a new pool is
//! attached and when the scheduler is dropped.

use std::time::Duration;

use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::aggregator::PoolState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Displaying,
    Fading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RotationState {
    pub offset: usize,
    pub phase: Phase,
}

impl Default for RotationState {
    fn default() -> Self {
        Self::initial()
    }
}

impl RotationState {
    pub const fn initial() -> Self {
        Self {
            offset: 0,
            phase: Phase::Idle,
        }
    }

    /// Rotation only starts on a settled pool holding at least two windows.
    pub fn can_start(pool_len: usize, loading: bool, window: usize) -> bool {
        !loading && window > 0 && pool_len >= 2 * window
    }

    /// Timer fired: `Displaying -> Fading`. Other phases are left alone.
    pub fn begin_fade(self) -> Self {
        match self.phase {
            Phase::Displaying => Self {
                phase: Phase::Fading,
                ..self
            },
            _ => self,
        }
    }

    /// Transition delay elapsed: `Fading -> Displaying` with the next offset.
    pub fn commit(self, pool_len: usize, window: usize) -> Self {
        match self.phase {
            Phase::Fading => Self {
                offset: next_offset(self.offset, window, pool_len),
                phase: Phase::Displaying,
            },
            _ => self,
        }
    }
}

/// Advance by one window; wrap to 0 once the offset runs past the pool.
pub fn next_offset(offset: usize, window: usize, pool_len: usize) -> usize {
    let next = offset + window;
    if next >= pool_len {
        0
    } else {
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationTiming {
    pub interval: Duration,
    pub transition: Duration,
}

impl Default for RotationTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            transition: Duration::from_millis(500),
        }
    }
}

pub struct RotationScheduler {
    timing: RotationTiming,
    window: usize,
    state: watch::Sender<RotationState>,
    task: Option<JoinHandle<()>>,
}

impl RotationScheduler {
    pub fn new(timing: RotationTiming, window: usize) -> Self {
        let (state, _) = watch::channel(RotationState::initial());
        Self {
            timing,
            window,
            state,
            task: None,
        }
    }

    pub fn state(&self) -> RotationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Point the scheduler at a (new) pool: retire any running timer, reset to
    /// `{0, Idle}`, then start rotating if the pool qualifies.
    ///
    /// Must be called from within a Tokio runtime. Returns whether a timer was armed.
    pub fn attach(&mut self, pool: &PoolState) -> bool {
        self.cancel();
        self.state.send_replace(RotationState::initial());

        let pool_len = pool.pool.len();
        if !RotationState::can_start(pool_len, pool.loading, self.window) {
            debug!(
                pool = pool_len,
                window = self.window,
                loading = pool.loading,
                "rotation stays idle"
            );
            return false;
        }

        self.state.send_replace(RotationState {
            offset: 0,
            phase: Phase::Displaying,
        });
        let task = tokio::spawn(run_timer(
            self.state.clone(),
            self.timing,
            self.window,
            pool_len,
        ));
        self.task = Some(task);
        info!(
            pool = pool_len,
            window = self.window,
            interval_ms = self.timing.interval.as_millis() as u64,
            "rotation armed"
        );
        true
    }

    /// Stop the timer. State is left as-is; `attach` resets it.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("rotation timer cancelled");
        }
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_timer(
    state: watch::Sender<RotationState>,
    timing: RotationTiming,
    window: usize,
    pool_len: usize,
) {
    let mut ticker = interval_at(Instant::now() + timing.interval, timing.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        state.send_modify(|s| *s = s.begin_fade());

        // Sole suspension point between fade-out and the offset commit.
        sleep(timing.transition).await;
        state.send_modify(|s| *s = s.commit(pool_len, window));

        let now = *state.borrow();
        counter!("feed_rotation_ticks_total").increment(1);
        gauge!("feed_rotation_offset").set(now.offset as f64);
        debug!(offset = now.offset, pool = pool_len, "window rotated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Pool;
    use crate::ingest::CanonicalItem;
    use std::sync::Arc;

    fn pool_of(n: usize, loading: bool) -> PoolState {
        let mut pool = Pool::empty();
        pool.items = (0..n)
            .map(|i| {
                let mut it = CanonicalItem::placeholder();
                it.link = format!("https://x.test/{i}");
                it
            })
            .collect();
        PoolState {
            pool: Arc::new(pool),
            loading,
        }
    }

    #[test]
    fn guard_needs_two_windows_and_settled_pool() {
        assert!(!RotationState::can_start(43, false, 22));
        assert!(RotationState::can_start(44, false, 22));
        assert!(!RotationState::can_start(100, true, 22));
        assert!(!RotationState::can_start(100, false, 0));
    }

    #[test]
    fn transitions_ignore_wrong_phase() {
        let idle = RotationState::initial();
        assert_eq!(idle.begin_fade(), idle);
        assert_eq!(idle.commit(10, 2), idle);

        let shown = RotationState {
            offset: 4,
            phase: Phase::Displaying,
        };
        assert_eq!(shown.commit(10, 2), shown);
        let fading = shown.begin_fade();
        assert_eq!(fading.phase, Phase::Fading);
        assert_eq!(fading.offset, 4);
        assert_eq!(
            fading.commit(10, 2),
            RotationState {
                offset: 6,
                phase: Phase::Displaying
            }
        );
    }

    #[test]
    fn full_cycle_returns_to_zero() {
        for (pool_len, window) in [(44usize, 22usize), (45, 22), (110, 22), (5, 2), (10, 3)] {
            let ticks = pool_len.div_ceil(window);
            let mut offset = 0;
            for _ in 0..ticks {
                offset = next_offset(offset, window, pool_len);
            }
            assert_eq!(offset, 0, "pool={pool_len} window={window}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn small_pool_stays_idle() {
        let mut s = RotationScheduler::new(RotationTiming::default(), 22);
        assert!(!s.attach(&pool_of(43, false)));
        sleep(Duration::from_secs(600)).await;
        assert_eq!(s.state(), RotationState::initial());
        assert!(!s.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fades_then_commits() {
        let mut s = RotationScheduler::new(RotationTiming::default(), 2);
        assert!(s.attach(&pool_of(5, false)));
        assert_eq!(s.state().phase, Phase::Displaying);

        sleep(Duration::from_millis(120_200)).await;
        assert_eq!(
            s.state(),
            RotationState {
                offset: 0,
                phase: Phase::Fading
            }
        );

        sleep(Duration::from_millis(400)).await;
        assert_eq!(
            s.state(),
            RotationState {
                offset: 2,
                phase: Phase::Displaying
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reattach_resets_and_retires_old_timer() {
        let mut s = RotationScheduler::new(RotationTiming::default(), 2);
        s.attach(&pool_of(6, false));
        sleep(Duration::from_secs(121)).await;
        assert_eq!(s.state().offset, 2);

        assert!(!s.attach(&pool_of(3, false)));
        assert_eq!(s.state(), RotationState::initial());
        sleep(Duration::from_secs(600)).await;
        assert_eq!(s.state(), RotationState::initial());
    }
}
