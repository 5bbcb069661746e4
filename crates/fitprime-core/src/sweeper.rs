use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A store that can evict its own stale entries
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Evict entries that are stale at `now`; returns how many were removed
    fn sweep(&self, now: DateTime<Utc>) -> usize;
}

/// Background task that calls [`Sweep::sweep`] on a fixed period
///
/// The first sweep runs one full period after `start`. Dropping a `Sweeper`
/// without calling `stop` aborts the task.
pub struct Sweeper {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime
    pub fn start<S: Sweep>(target: S, period: Duration) -> Self {
        let name = target.name();
        let period = period.max(MIN_PERIOD);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let evicted = target.sweep(Utc::now());
                        debug!("Sweeper {} evicted {} entries", name, evicted);
                    }
                }
            }
        });

        info!("Sweeper {} started with period {:?}", name, period);

        Self {
            name,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the loop to exit and wait for it
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Sweeper {} terminated abnormally: {}", self.name, e);
            }
        }
        info!("Sweeper {} stopped", self.name);
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct CountingSweep {
        calls: Arc<AtomicUsize>,
        tx: mpsc::UnboundedSender<usize>,
    }

    impl Sweep for CountingSweep {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn sweep(&self, _now: DateTime<Utc>) -> usize {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = self.tx.send(n);
            0
        }
    }

    fn counting() -> (CountingSweep, Arc<AtomicUsize>, mpsc::UnboundedReceiver<usize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            CountingSweep {
                calls: calls.clone(),
                tx,
            },
            calls,
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_each_period() {
        let (target, calls, mut rx) = counting();
        let sweeper = Sweeper::start(target, Duration::from_secs(600));
        assert_eq!(sweeper.name(), "counting");
        assert!(sweeper.is_running());

        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));

        sweeper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stop_ends_task() {
        let (target, calls, mut rx) = counting();
        let sweeper = Sweeper::start(target, Duration::from_secs(300));

        sweeper.stop().await;

        // The task owned the only sender, so the channel closes once it exits
        assert_eq!(rx.recv().await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_drop_aborts_task() {
        let (target, _calls, mut rx) = counting();
        let sweeper = Sweeper::start(target, Duration::from_secs(60));
        drop(sweeper);

        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_drives_rate_limiter_cleanup() {
        use crate::{RateLimitConfig, RateLimiter};

        let limiter = RateLimiter::with_retention(chrono::Duration::zero());
        let config = RateLimitConfig::new(3, 60_000, 60_000);
        limiter.check_at("k", &config, Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(limiter.len(), 1);

        let sweeper = Sweeper::start(limiter.clone(), Duration::from_secs(600));
        tokio::time::sleep(Duration::from_secs(601)).await;

        assert!(limiter.is_empty());
        sweeper.stop().await;
    }
}
