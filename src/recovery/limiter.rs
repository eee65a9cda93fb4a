//! Global bound on concurrently running guarded attempts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds how many guarded attempts run at once.
///
/// Callers beyond the bound wait in FIFO order. A caller with a deadline
/// gives up once the deadline passes.
#[derive(Debug)]
pub struct RecoveryLimiter {
    /// Maximum number of concurrent attempts.
    max_concurrent: usize,
    semaphore: Semaphore,
    /// Current number of held slots.
    active: AtomicUsize,
    /// Current number of callers waiting for a slot.
    waiting: AtomicUsize,
}

/// A held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct RecoveryPermit<'a> {
    _permit: SemaphorePermit<'a>,
    active: &'a AtomicUsize,
}

impl Drop for RecoveryPermit<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecoveryLimiter {
    /// Creates a limiter with the given bound (at least 1).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Semaphore::new(max_concurrent),
            active: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Returns the bound.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the number of held slots.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns the number of callers waiting for a slot.
    pub fn waiting_count(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Returns `true` if every slot is held.
    pub fn is_full(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// Waits for a slot, giving up after `deadline` if one is given.
    ///
    /// Returns `None` when the deadline passed first.
    pub async fn acquire(&self, deadline: Option<Duration>) -> Option<RecoveryPermit<'_>> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let waiting = Waiting(&self.waiting);

        let permit = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.semaphore.acquire())
                .await
                .ok()?
                .ok()?,
            // The semaphore is never closed.
            None => self.semaphore.acquire().await.ok()?,
        };
        drop(waiting);

        self.active.fetch_add(1, Ordering::SeqCst);
        Some(RecoveryPermit {
            _permit: permit,
            active: &self.active,
        })
    }
}

impl Default for RecoveryLimiter {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = RecoveryLimiter::new(2);
        assert_eq!(limiter.max_concurrent(), 2);

        let first = limiter.acquire(None).await.unwrap();
        let second = limiter.acquire(None).await.unwrap();
        assert_eq!(limiter.active_count(), 2);
        assert!(limiter.is_full());

        drop(first);
        assert_eq!(limiter.active_count(), 1);
        assert!(!limiter.is_full());
        drop(second);
        assert_eq!(limiter.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires_when_full() {
        let limiter = RecoveryLimiter::new(1);
        let _held = limiter.acquire(None).await.unwrap();

        let result = limiter.acquire(Some(Duration::from_millis(50))).await;
        assert!(result.is_none());
        assert_eq!(limiter.waiting_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_served_in_arrival_order() {
        let limiter = std::sync::Arc::new(RecoveryLimiter::new(1));
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let held = limiter.acquire(None).await.unwrap();

        let mut waiters = Vec::new();
        for id in 0..3 {
            let limiter = limiter.clone();
            let order = order.clone();
            waiters.push(tokio::spawn(async move {
                let _slot = limiter.acquire(None).await.unwrap();
                order.lock().unwrap().push(id);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }));
            // Let each waiter queue before the next one arrives.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(limiter.waiting_count(), 3);

        drop(held);
        for waiter in waiters {
            waiter.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(limiter.active_count(), 0);
    }

    #[test]
    fn test_zero_bound_is_raised() {
        assert_eq!(RecoveryLimiter::new(0).max_concurrent(), 1);
    }
}
