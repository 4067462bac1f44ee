//! Bounded channel carrying background eviction failures to the foreground
//!
//! Evictions run outside of any caller's call stack, so their failures are
//! parked here and raised by the next `lock`/`flush` on the cache, whatever
//! key that caller is working on.
//!
//! The queue is bounded. When it is full the newest failure is dropped and
//! counted, which keeps the oldest failure (the one that will be reported)
//! intact under a sustained backend outage.

use crate::error::PersistError;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::warn;

/// Default capacity of the async error channel
pub const DEFAULT_ERROR_QUEUE_CAPACITY: usize = 1024;

/// A failure captured on the eviction path
#[derive(Debug)]
pub struct CapturedError {
    /// Debug rendering of the key that failed to flush
    pub key: String,
    pub source: PersistError,
}

pub struct ErrorQueue {
    tx: Sender<CapturedError>,
    rx: Receiver<CapturedError>,
}

impl ErrorQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Record a failure. Returns false if the queue was full and the failure
    /// was dropped.
    pub fn push(&self, error: CapturedError) -> bool {
        match self.tx.try_send(error) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    key = %dropped.key,
                    error = %dropped.source,
                    "Async error queue full, dropping eviction failure"
                );
                false
            }
            // Both ends live in `self`
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Empty the queue and return the oldest failure.
    ///
    /// Every queued failure is removed but only the first is returned; the
    /// rest are logged and discarded. Callers see one failure per drain and
    /// later callers do not see the same backlog again.
    pub fn drain_first(&self) -> Option<CapturedError> {
        let mut drained = self.rx.try_iter();
        let first = drained.next()?;
        let discarded = drained
            .inspect(|e| warn!(key = %e.key, error = %e.source, "Discarding queued eviction failure"))
            .count();
        if discarded > 0 {
            warn!(
                key = %first.key,
                discarded,
                "Reporting first of several queued eviction failures"
            );
        }
        Some(first)
    }

    /// Number of failures waiting to be reported
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(key: &str) -> CapturedError {
        CapturedError {
            key: key.to_string(),
            source: PersistError::backend(format!("failed {key}")),
        }
    }

    #[test]
    fn test_drain_returns_first_and_empties() {
        let queue = ErrorQueue::new(8);
        queue.push(captured("a"));
        queue.push(captured("b"));
        queue.push(captured("c"));
        assert_eq!(queue.len(), 3);

        let first = queue.drain_first().unwrap();
        assert_eq!(first.key, "a");
        assert_eq!(queue.len(), 0);
        assert!(queue.drain_first().is_none());
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let queue = ErrorQueue::new(2);
        assert!(queue.push(captured("a")));
        assert!(queue.push(captured("b")));
        assert!(!queue.push(captured("c")));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain_first().unwrap().key, "a");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let queue = ErrorQueue::new(0);
        assert!(queue.push(captured("a")));
        assert!(!queue.push(captured("b")));
    }
}
