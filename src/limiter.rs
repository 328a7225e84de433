//! Admission gate bounding how many scoring calls run at once

use crate::error::{Canceled, MatchError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};

/// Bounds concurrent task execution to a fixed number of slots.
///
/// Waiters are admitted in FIFO order as soon as a running task releases its
/// slot. Slots are released on drop, so a task that errors or is abandoned
/// never holds one past its own lifetime. Build one per batch; after
/// [`CancelHandle::cancel`] the limiter refuses all further work.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    max: usize,
    cancel_tx: Arc<watch::Sender<bool>>,
}

/// Cancels the batch that owns a limiter
#[derive(Debug, Clone)]
pub struct CancelHandle {
    permits: Arc<Semaphore>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl ConcurrencyLimiter {
    /// Largest slot count a limiter accepts
    pub const MAX_SLOTS: usize = Semaphore::MAX_PERMITS;

    pub fn new(max: usize) -> Result<Self, MatchError> {
        if max == 0 || max > Self::MAX_SLOTS {
            return Err(MatchError::InvalidConcurrency(max));
        }
        let (cancel_tx, _) = watch::channel(false);
        Ok(Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
            cancel_tx: Arc::new(cancel_tx),
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max
    }

    /// Slots currently held by running tasks
    pub fn in_flight(&self) -> usize {
        self.max - self.permits.available_permits()
    }

    pub fn is_canceled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            permits: Arc::clone(&self.permits),
            cancel_tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Wait for a slot, then run `task` while holding it.
    ///
    /// The task's own output, success or error, is passed through untouched.
    /// `Err(Canceled)` means the task was either never started or abandoned
    /// mid-flight because the batch was canceled.
    pub async fn run<F, Fut, T>(&self, task: F) -> Result<T, Canceled>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut cancel_rx = self.cancel_tx.subscribe();
        if *cancel_rx.borrow_and_update() {
            return Err(Canceled);
        }

        // Closed semaphore means canceled
        let _permit = self.permits.acquire().await.map_err(|_| Canceled)?;

        tokio::select! {
            biased;
            _ = cancel_rx.wait_for(|canceled| *canceled) => Err(Canceled),
            out = task() => Ok(out),
        }
    }
}

impl CancelHandle {
    /// Stop admitting queued tasks and abandon running ones
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = assert_err!(ConcurrencyLimiter::new(0));
        assert!(matches!(err, MatchError::InvalidConcurrency(0)));
    }

    #[test]
    fn test_oversized_concurrency_rejected() {
        let err = assert_err!(ConcurrencyLimiter::new(usize::MAX));
        assert!(matches!(err, MatchError::InvalidConcurrency(usize::MAX)));

        let err = assert_err!(ConcurrencyLimiter::new(ConcurrencyLimiter::MAX_SLOTS + 1));
        assert!(matches!(err, MatchError::InvalidConcurrency(_)));

        let limiter = assert_ok!(ConcurrencyLimiter::new(ConcurrencyLimiter::MAX_SLOTS));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_bound_is_respected() {
        let limiter = ConcurrencyLimiter::new(3).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..20).map(|_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            limiter.run(move || async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fifo_admission() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let tasks = (0..5).map(|i| {
            let order = Arc::clone(&order);
            limiter.run(move || async move {
                tokio::task::yield_now().await;
                order.lock().unwrap().push(i);
            })
        });
        futures::future::join_all(tasks).await;

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_task_error_does_not_block_queue() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();

        let failing = limiter.run(|| async { Err::<u32, &str>("boom") });
        let next = limiter.run(|| async { Ok::<u32, &str>(7) });
        let (a, b) = tokio::join!(failing, next);

        assert_eq!(assert_ok!(a), Err("boom"));
        assert_eq!(assert_ok!(b), Ok(7));
    }

    #[tokio::test]
    async fn test_cancel_abandons_running_and_queued() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let handle = limiter.cancel_handle();

        let stuck = limiter.run(|| std::future::pending::<()>());
        let queued = limiter.run(|| async {});
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        };
        let (a, b, _) = tokio::join!(stuck, queued, canceller);

        assert_eq!(a, Err(Canceled));
        assert_eq!(b, Err(Canceled));
        assert!(limiter.is_canceled());
        assert_eq!(limiter.run(|| async { 1 }).await, Err(Canceled));
    }
}
