//! Periodic task driver
//!
//! An engine splits its period into `occurrences` ticks and calls its task on
//! each of them except the first `skipped_occurrences`. The first period starts
//! on the next multiple of the period so that engines sharing a period tick in
//! phase, and every task receives the current time rounded to the tick.

use crate::clock::{round_timestamp, Clock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

pub struct Engine {
    name: &'static str,
    clock: Arc<dyn Clock>,
    timer: Duration,
    occurrences: u32,
    skipped_occurrences: u32,
}

impl Engine {
    pub fn new(
        name: &'static str,
        clock: Arc<dyn Clock>,
        period: Duration,
        occurrences: u32,
        skipped_occurrences: u32,
    ) -> Self {
        let occurrences = occurrences.max(1);
        let timer = (period / occurrences).max(Duration::from_nanos(1));
        Self {
            name,
            clock,
            timer,
            occurrences,
            skipped_occurrences,
        }
    }

    /// Interval between two ticks
    pub fn timer(&self) -> Duration {
        self.timer
    }

    /// Spawn the loop calling `task` with the tick timestamp. A slow task
    /// delays the following ticks instead of overlapping with them.
    pub fn start<F, Fut>(self, task: F) -> JoinHandle<()>
    where
        F: Fn(i64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let timer_ns = i64::try_from(self.timer.as_nanos()).unwrap_or(i64::MAX);
            let period_ns = timer_ns.saturating_mul(i64::from(self.occurrences));
            let now = self.clock.now();
            let first_tick = now
                .div_euclid(period_ns)
                .saturating_add(1)
                .saturating_mul(period_ns);
            let deadline = Duration::from_nanos(u64::try_from(first_tick - now).unwrap_or(0));
            let mut ticker = interval_at(Instant::now() + deadline, self.timer);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                engine = self.name,
                timer_ms = self.timer.as_millis() as u64,
                occurrences = self.occurrences,
                "engine started"
            );
            loop {
                for occurrence in 0..self.occurrences {
                    ticker.tick().await;
                    if occurrence < self.skipped_occurrences {
                        continue;
                    }
                    let timestamp = round_timestamp(self.clock.now(), timer_ns);
                    debug!(engine = self.name, timestamp, "tick");
                    task(timestamp).await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ElapsedClock {
        start: Instant,
    }

    impl Clock for ElapsedClock {
        fn now(&self) -> i64 {
            self.start.elapsed().as_nanos() as i64
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_skips_first_occurrences() {
        let clock = Arc::new(ElapsedClock {
            start: Instant::now(),
        });
        let engine = Engine::new("test", clock, Duration::from_millis(20), 2, 1);
        assert_eq!(engine.timer(), Duration::from_millis(10));
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let handle = engine.start(move |timestamp| {
            let sender = sender.clone();
            async move {
                let _ = sender.send(timestamp);
            }
        });

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        handle.abort();

        assert_eq!(first, 30_000_000);
        assert_eq!(second, 50_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_without_skips_ticks_every_period() {
        let clock = Arc::new(ElapsedClock {
            start: Instant::now(),
        });
        let engine = Engine::new("test", clock, Duration::from_millis(10), 1, 0);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let handle = engine.start(move |timestamp| {
            let sender = sender.clone();
            async move {
                let _ = sender.send(timestamp);
            }
        });

        let mut timestamps = Vec::new();
        for _ in 0..3 {
            timestamps.push(receiver.recv().await.unwrap());
        }
        handle.abort();

        assert_eq!(timestamps, vec![10_000_000, 20_000_000, 30_000_000]);
    }
}
