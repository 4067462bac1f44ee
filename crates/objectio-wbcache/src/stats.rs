//! Cache statistics for monitoring

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheStats {
    /// Point lookups that found an entry
    pub hits: AtomicU64,
    /// Point lookups that found nothing
    pub misses: AtomicU64,
    /// New keys inserted
    pub inserts: AtomicU64,
    /// Entries removed because a bound was exceeded
    pub evictions: AtomicU64,
    /// Successful evictor calls
    pub writebacks: AtomicU64,
    /// Failed evictor calls
    pub flush_failures: AtomicU64,
    /// Entries overwritten by a put
    pub replaced: AtomicU64,
    /// Entries removed by the caller
    pub explicit_removals: AtomicU64,
    /// Eviction failures dropped because the error queue was full
    pub dropped_errors: AtomicU64,
    /// Eviction sweeps run
    pub sweeps: AtomicU64,
}

impl CacheStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    /// Reset all statistics
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.inserts,
            &self.evictions,
            &self.writebacks,
            &self.flush_failures,
            &self.replaced,
            &self.explicit_removals,
            &self.dropped_errors,
            &self.sweeps,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            writebacks: self.writebacks.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            explicit_removals: self.explicit_removals.load(Ordering::Relaxed),
            dropped_errors: self.dropped_errors.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            hit_ratio: self.hit_ratio(),
        }
    }
}

/// Serializable copy of [`CacheStats`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub writebacks: u64,
    pub flush_failures: u64,
    pub replaced: u64,
    pub explicit_removals: u64,
    pub dropped_errors: u64,
    pub sweeps: u64,
    pub hit_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_ratio(), 0.0);

        CacheStats::incr(&stats.hits);
        CacheStats::incr(&stats.hits);
        CacheStats::incr(&stats.misses);
        CacheStats::incr(&stats.misses);
        assert!((stats.hit_ratio() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_reset_and_snapshot() {
        let stats = CacheStats::default();
        CacheStats::incr(&stats.evictions);
        CacheStats::incr(&stats.writebacks);
        assert_eq!(stats.snapshot().evictions, 1);

        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.evictions, 0);
        assert_eq!(snap.writebacks, 0);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["sweeps"], 0);
    }
}
