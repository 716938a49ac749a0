//! Clock and ticker abstractions.
//!
//! Both are injection points: production code uses [`SystemClock`] and
//! [`Ticker::every`], tests substitute [`ManualClock`] and
//! [`Ticker::manual`] to drive time deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Provides the current wall time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> SystemTime;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Settable clock for tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    epoch_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    /// Move the clock to `t`. Times before the unix epoch clamp to it.
    pub fn set(&self, t: SystemTime) {
        let nanos = t
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.epoch_nanos.store(nanos, Ordering::SeqCst);
    }

    /// Advance the clock by `d`.
    pub fn advance(&self, d: Duration) {
        self.epoch_nanos
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.epoch_nanos.load(Ordering::SeqCst))
    }
}

/// A periodic stream of tick timestamps with an idempotent stop handle.
pub struct Ticker {
    ticks: mpsc::Receiver<SystemTime>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Ticker that fires every `period`, stamping ticks with the wall
    /// time. The first tick arrives after one full period; ticks missed
    /// while the consumer is busy are skipped, not queued up.
    ///
    /// Must be called within a tokio runtime. `period` must be non-zero.
    pub fn every(period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(SystemTime::now()).await.is_err() {
                    return;
                }
            }
        });
        Self {
            ticks,
            handle: Some(handle),
        }
    }

    /// Hand-driven ticker for tests: every timestamp sent on the
    /// returned sender comes out of [`Ticker::recv`].
    pub fn manual() -> (mpsc::Sender<SystemTime>, Self) {
        let (tx, ticks) = mpsc::channel(1);
        (
            tx,
            Self {
                ticks,
                handle: None,
            },
        )
    }

    /// Ticker that never fires.
    pub fn idle() -> Self {
        let (_tx, ticks) = mpsc::channel(1);
        Self {
            ticks,
            handle: None,
        }
    }

    /// Wait for the next tick. Pends forever once the tick source is
    /// gone, so a stopped or idle ticker parks its select branch instead
    /// of spinning.
    pub async fn recv(&mut self) -> SystemTime {
        match self.ticks.recv().await {
            Some(t) => t,
            None => std::future::pending().await,
        }
    }

    /// Release the ticker's timer resources. Safe to call any number of
    /// times; dropping the ticker has the same effect.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds tickers on demand; the injection point for periodic work.
pub type TickerFactory = Arc<dyn Fn() -> Ticker + Send + Sync>;
