//! Admission control for network probes.
//!
//! Bounds how many probes hold an open connection at once, independent of
//! the worker count. A granted [`AdmissionSlot`] returns its permit when
//! dropped, so every exit path of a probe attempt releases it exactly once.

use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

/// Counting gate over `max_connections` permits.
#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Semaphore,
    capacity: usize,
    acquire_timeout: Duration,
    acquire_retries: u32,
}

/// A held admission permit. Dropping it releases the slot.
#[derive(Debug)]
pub struct AdmissionSlot<'a> {
    _permit: SemaphorePermit<'a>,
}

impl AdmissionController {
    #[must_use]
    pub fn new(capacity: usize, acquire_timeout: Duration, acquire_retries: u32) -> Self {
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            acquire_timeout,
            acquire_retries,
        }
    }

    /// Try up to `acquire_retries` times, each waiting up to
    /// `acquire_timeout`, for a free slot. `None` means the slot was not
    /// obtainable for this attempt.
    pub async fn acquire(&self) -> Option<AdmissionSlot<'_>> {
        for retry in 0..self.acquire_retries {
            match tokio::time::timeout(self.acquire_timeout, self.semaphore.acquire()).await {
                Ok(Ok(permit)) => return Some(AdmissionSlot { _permit: permit }),
                // Closed semaphore: nothing will ever be granted again.
                Ok(Err(_)) => return None,
                Err(_) => debug!(retry = retry + 1, "admission slot wait timed out"),
            }
        }
        None
    }

    /// Single non-blocking attempt.
    pub fn try_acquire(&self) -> Option<AdmissionSlot<'_>> {
        self.semaphore
            .try_acquire()
            .ok()
            .map(|permit| AdmissionSlot { _permit: permit })
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn slot_is_released_on_drop() {
        let gate = AdmissionController::new(1, Duration::from_millis(10), 1);
        {
            let _slot = gate.acquire().await.unwrap();
            assert_eq!(gate.in_flight(), 1);
            assert!(gate.try_acquire().is_none());
        }
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.acquire().await.is_some());
    }

    #[tokio::test]
    async fn starvation_gives_up_after_retries() {
        let gate = AdmissionController::new(1, Duration::from_millis(20), 3);
        let _held = gate.acquire().await.unwrap();

        let started = std::time::Instant::now();
        assert!(gate.acquire().await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn waiter_is_granted_once_a_slot_frees_up() {
        let gate = Arc::new(AdmissionController::new(1, Duration::from_secs(1), 1));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_capacity() {
        let gate = Arc::new(AdmissionController::new(2, Duration::from_millis(500), 10));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..24)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let Some(_slot) = gate.acquire().await else {
                        return;
                    };
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    assert!(gate.in_flight() <= gate.capacity());
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.in_flight(), 0);
    }
}
