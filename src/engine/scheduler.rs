//! engine::scheduler
//!
//! Background pulls on a fixed cadence, plus on demand.
//!
//! The scheduler never touches the repository itself. It calls the pull
//! closure on a blocking worker, and the closure goes through the
//! transaction coordinator like any other caller.
//!
//! A pull runs when:
//! - the interval elapses (the immediate first tick is skipped), or
//! - something raises the [`RemoteChangeSignal`], e.g. a registry watch
//!   noticing that another node pushed.
//!
//! Signals raised while a pull is running coalesce into one follow-up pull.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Wakes the scheduler for an immediate pull.
#[derive(Debug, Clone, Default)]
pub struct RemoteChangeSignal {
    notify: Arc<Notify>,
}

impl RemoteChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pull as soon as the scheduler is idle.
    pub fn raise(&self) {
        self.notify.notify_one();
    }

    async fn raised(&self) {
        self.notify.notified().await
    }
}

/// Spawns the background pull loop.
#[derive(Debug)]
pub struct PullScheduler;

impl PullScheduler {
    /// Start pulling every `interval` on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn spawn<F>(interval: Duration, signal: RemoteChangeSignal, pull: F) -> SchedulerHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let runs = Arc::new(AtomicU64::new(0));
        let pull = Arc::new(pull);

        let task_runs = Arc::clone(&runs);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("pull scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        debug!("scheduled pull");
                    }
                    _ = signal.raised() => {
                        debug!("remote change signalled, pulling");
                    }
                }

                let pull = Arc::clone(&pull);
                if let Err(e) = tokio::task::spawn_blocking(move || pull()).await {
                    warn!(error = %e, "background pull panicked");
                }
                task_runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task,
            runs,
        }
    }
}

/// Handle to a running [`PullScheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    runs: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Number of pulls completed so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for an in-flight pull to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "pull scheduler task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Arc<AtomicU64>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicU64::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn pulls_on_interval() {
        let (count, pull) = counter();
        let handle = PullScheduler::spawn(
            Duration::from_millis(20),
            RemoteChangeSignal::new(),
            pull,
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn signal_triggers_immediate_pull() {
        let (count, pull) = counter();
        let signal = RemoteChangeSignal::new();
        let handle = PullScheduler::spawn(Duration::from_secs(3600), signal.clone(), pull);

        signal.raise();
        for _ in 0..100 {
            if handle.runs() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(handle.runs(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_pulling() {
        let (count, pull) = counter();
        let handle = PullScheduler::spawn(
            Duration::from_millis(10),
            RemoteChangeSignal::new(),
            pull,
        );
        handle.shutdown().await;

        let stopped_at = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }
}
