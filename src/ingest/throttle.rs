//! Fixed-interval throttle for feed consumption

use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};

/// Ticker spacing consecutive messages by a fixed period.
///
/// The underlying interval is created on first use, so a throttle can be
/// built outside a runtime. Missed ticks are skipped rather than bursted.
pub struct Throttle {
    period: Duration,
    interval: Mutex<Option<Interval>>,
}

impl Throttle {
    /// Throttle allowing `rate` ticks per second
    pub fn per_second(rate: NonZeroU32) -> Self {
        Self::every(Duration::from_secs(1) / rate.get())
    }

    /// Throttle ticking every `period`. A zero period is raised to 1ns.
    pub fn every(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_nanos(1)),
            interval: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick. The first tick completes immediately.
    pub async fn tick(&self) {
        let mut guard = self.interval.lock().await;
        let interval = guard.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;
    }
}
