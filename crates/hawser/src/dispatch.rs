//! Bounded worker pool for running result closures.
//!
//! Closure execution is decoupled from transport I/O contexts so a slow or
//! faulty user closure cannot stall the transport's event loop, and from the
//! invoking caller so a closure never runs under a lock the caller still
//! holds.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Unit of work accepted by the pool.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct DispatchCounters {
    submitted: AtomicU64,
    executed: AtomicU64,
    overflowed: AtomicU64,
}

/// Point-in-time view of the pool's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchMetrics {
    /// Jobs handed to the pool.
    pub submitted: u64,
    /// Jobs that finished running (including overflow fallbacks).
    pub executed: u64,
    /// Jobs that missed the queue and ran on a dedicated task instead.
    pub overflowed: u64,
}

/// Bounded pool of worker tasks draining a shared job queue.
///
/// Workers share one receiver behind an async mutex; each takes the lock
/// just long enough to pull the next job, then runs it unlocked. Dropping
/// the pool closes the queue, lets workers drain what was accepted, and
/// exits them.
pub struct DispatchPool {
    tx: mpsc::Sender<Job>,
    metrics: Arc<DispatchCounters>,
}

impl DispatchPool {
    /// Spawn `workers` tasks draining a queue of `queue_capacity` jobs.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let metrics = Arc::new(DispatchCounters::default());

        for worker in 0..workers.max(1) {
            let rx = rx.clone();
            let counters = metrics.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };
                    run_guarded(job);
                    counters.executed.fetch_add(1, Ordering::Relaxed);
                }
                tracing::trace!(worker, "dispatch worker exiting");
            });
        }

        Self { tx, metrics }
    }

    /// Hand a job to the pool.
    ///
    /// A full or closed queue falls back to a dedicated task rather than
    /// rejecting: single-shot delivery guarantees outrank strict bounding.
    pub(crate) fn execute(&self, job: Job) {
        self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                self.metrics.overflowed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    capacity = self.tx.max_capacity(),
                    "dispatch queue full, running closure on a dedicated task"
                );
                self.spawn_fallback(job);
            }
            Err(TrySendError::Closed(job)) => {
                // Shutdown raced with a late transport callback.
                tracing::warn!("dispatch pool closed, running closure on a dedicated task");
                self.spawn_fallback(job);
            }
        }
    }

    fn spawn_fallback(&self, job: Job) {
        let counters = self.metrics.clone();
        tokio::spawn(async move {
            run_guarded(job);
            counters.executed.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Snapshot the pool's counters.
    pub fn metrics(&self) -> DispatchMetrics {
        DispatchMetrics {
            submitted: self.metrics.submitted.load(Ordering::Relaxed),
            executed: self.metrics.executed.load(Ordering::Relaxed),
            overflowed: self.metrics.overflowed.load(Ordering::Relaxed),
        }
    }
}

/// Run a job, isolating panics from the worker that executes it.
pub(crate) fn run_guarded(job: Job) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(panic = %panic_message(panic.as_ref()), "response closure panicked");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    async fn wait_until(deadline: Duration, check: impl Fn() -> bool) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        check()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_submitted_jobs() {
        let pool = DispatchPool::new(4, 16);
        let counter = Arc::new(AtomicU64::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(wait_until(Duration::from_secs(2), || counter.load(Ordering::SeqCst) == 10).await);
        assert_eq!(pool.metrics().submitted, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_job_does_not_kill_workers() {
        let pool = DispatchPool::new(1, 16);
        pool.execute(Box::new(|| panic!("boom")));
        let survived = Arc::new(AtomicBool::new(false));
        let observer = survived.clone();
        pool.execute(Box::new(move || {
            observer.store(true, Ordering::SeqCst);
        }));
        assert!(wait_until(Duration::from_secs(2), || survived.load(Ordering::SeqCst)).await);
        assert_eq!(pool.metrics().executed, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn full_queue_falls_back_to_dedicated_task() {
        let pool = DispatchPool::new(1, 1);

        // Occupy the single worker until released.
        let gate = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));
        let hold = gate.clone();
        let announce = started.clone();
        pool.execute(Box::new(move || {
            announce.store(true, Ordering::SeqCst);
            while !hold.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
        }));
        assert!(wait_until(Duration::from_secs(2), || started.load(Ordering::SeqCst)).await);
        // Fill the single queue slot.
        pool.execute(Box::new(|| {}));

        // This one cannot fit and must still run.
        let ran = Arc::new(AtomicBool::new(false));
        let observer = ran.clone();
        pool.execute(Box::new(move || {
            observer.store(true, Ordering::SeqCst);
        }));

        assert!(wait_until(Duration::from_secs(2), || ran.load(Ordering::SeqCst)).await);
        assert_eq!(pool.metrics().overflowed, 1);

        gate.store(true, Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(2), || pool.metrics().executed == 3).await);
    }
}
