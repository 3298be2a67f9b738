//! Cooperative cancellation for the publisher.
//!
//! A single-shot flag shared across one publisher instance. Every wait
//! point in the gate, submitter, and confirmer goes through
//! [`InterruptHandle::sleep_or_interrupted`] instead of a bare
//! `tokio::time::sleep`, so raising the flag unwinds any in-progress
//! `publish` within one tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// The interrupt primitive. Cheap to clone; clones share the same flag.
#[derive(Clone)]
pub struct InterruptHandle {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Idempotent. Wakes any outstanding `sleep_or_interrupted`.
    pub fn interrupt(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Must be called before the next `publish` can proceed.
    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleeps for `dur`, or returns early the moment the flag is raised.
    /// Returns `true` if the sleep ran to completion, `false` if it was
    /// cut short by an interrupt.
    pub async fn sleep_or_interrupted(&self, dur: Duration) -> bool {
        if self.is_set() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(dur) => true,
            _ = self.notify.notified() => false,
        }
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn sleep_runs_to_completion_without_interrupt() {
        let handle = InterruptHandle::new();
        let completed = handle.sleep_or_interrupted(Duration::from_millis(20)).await;
        assert!(completed);
    }

    #[tokio::test]
    async fn interrupt_cuts_sleep_short() {
        let handle = InterruptHandle::new();
        let waiter = handle.clone();

        let start = Instant::now();
        let sleeper = tokio::spawn(async move {
            waiter.sleep_or_interrupted(Duration::from_secs(60)).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.interrupt();

        let completed = sleeper.await.unwrap();
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_set_flag_short_circuits_immediately() {
        let handle = InterruptHandle::new();
        handle.interrupt();
        let start = Instant::now();
        let completed = handle.sleep_or_interrupted(Duration::from_secs(60)).await;
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn clear_allows_fresh_sleep() {
        let handle = InterruptHandle::new();
        handle.interrupt();
        handle.clear();
        assert!(!handle.is_set());
        let completed = handle.sleep_or_interrupted(Duration::from_millis(10)).await;
        assert!(completed);
    }
}
