//! Striped write-back cache
//!
//! Overlays a slow backing store with bounded local state. Callers work on
//! one key at a time under that key's stripe lock; dirty entries are written
//! back through the [`Evictor`] when they are evicted or when the cache is
//! flushed.
//!
//! ```text
//!   lock(key, f) ──► drain error queue ──► stripe[hash(key)] ──► f(view)
//!                                                                  │
//!                         Store (bounded, LRU + access expiry) ◄───┘
//!                         + sorted key index
//!                                  │ victims
//!   scavenger tick ──► sweep ──────┤
//!   end of lock()  ──► sweep ──────┘
//!                        │ stripe[hash(victim)]
//!                        ▼
//!                  Evictor::flush ──(error)──► error queue ──► next caller
//! ```
//!
//! Evictions always run under the victim's stripe lock, so a foreground
//! operation can never observe a key half way through eviction, and the
//! store and its index stay identical.

use crate::config::CacheConfig;
use crate::entry::RemovalCause;
use crate::error::{CacheError, CacheResult};
use crate::errors_queue::{CapturedError, ErrorQueue};
use crate::evictor::Evictor;
use crate::scavenger::Scavenger;
use crate::stats::CacheStats;
use crate::store::Store;
use crate::stripe::StripeLocks;
use crate::view::OrderedView;

use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How a sweep treats victims whose stripe is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    /// Wait for every victim's stripe
    Full,
    /// Stop at the first busy stripe and leave the rest to the scavenger
    Opportunistic,
}

/// State shared between callers and the scavenger thread
pub(crate) struct Shared<K, V> {
    pub(crate) name: String,
    pub(crate) locks: StripeLocks,
    pub(crate) store: Mutex<Store<K, V>>,
    pub(crate) stats: CacheStats,
    evictor: Box<dyn Evictor<K, V>>,
    errors: ErrorQueue,
}

impl<K, V> Shared<K, V>
where
    K: Hash + Ord + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub(crate) fn record_removal(&self, key: &K, cause: RemovalCause) {
        let counter = match cause {
            RemovalCause::Explicit => &self.stats.explicit_removals,
            RemovalCause::Replaced => &self.stats.replaced,
            RemovalCause::Evicted => &self.stats.evictions,
        };
        CacheStats::incr(counter);
        debug!(cache = %self.name, key = ?key, %cause, "Entry removed");
    }

    /// Evict `key`, writing it back first if it is dirty.
    ///
    /// The caller must hold the key's stripe lock. The entry is dropped even
    /// if the write-back fails; the failure goes to the error queue.
    pub(crate) fn evict_held(&self, key: &K) {
        let Some(entry) = self.store.lock().peek(key).cloned() else {
            return;
        };

        if entry.needs_flush() {
            match self.evictor.flush(key, &entry) {
                Ok(()) => {
                    CacheStats::incr(&self.stats.writebacks);
                    debug!(cache = %self.name, key = ?key, "Wrote back evicted entry");
                }
                Err(source) => {
                    CacheStats::incr(&self.stats.flush_failures);
                    warn!(
                        cache = %self.name,
                        key = ?key,
                        error = %source,
                        "Write-back of evicted entry failed, queueing error"
                    );
                    let captured = CapturedError {
                        key: format!("{key:?}"),
                        source,
                    };
                    if !self.errors.push(captured) {
                        CacheStats::incr(&self.stats.dropped_errors);
                    }
                }
            }
        }

        if self.store.lock().remove(key).is_some() {
            self.record_removal(key, RemovalCause::Evicted);
        }
    }

    /// Evict everything over the size or time bound. Never fails; write-back
    /// errors are queued. Returns the number of entries evicted.
    fn run_pending_evictions(&self, mode: Sweep) -> usize {
        CacheStats::incr(&self.stats.sweeps);
        let mut evicted = 0;

        loop {
            let Some(victim) = self.store.lock().next_victim() else {
                break;
            };

            let _stripe = match mode {
                Sweep::Full => self.locks.lock(&victim),
                Sweep::Opportunistic => match self.locks.try_lock(&victim) {
                    Some(guard) => guard,
                    None => break,
                },
            };

            if !self.store.lock().is_victim(&victim) {
                continue;
            }
            self.evict_held(&victim);
            evicted += 1;
        }

        if evicted > 0 {
            debug!(cache = %self.name, evicted, ?mode, "Eviction sweep finished");
        }
        evicted
    }

    /// Raise the oldest queued background failure, discarding the rest.
    ///
    /// Only the first failure is reported even when several were queued.
    /// This matches the established contract of the cache: one error per
    /// drain, and the backlog is not replayed to later callers.
    fn raise_pending(&self) -> CacheResult<()> {
        match self.errors.drain_first() {
            Some(CapturedError { key, source }) => Err(CacheError::AsyncFlush {
                cache: self.name.clone(),
                key,
                source,
            }),
            None => Ok(()),
        }
    }
}

/// Striped write-back cache over a slow backing store.
///
/// ```ignore
/// let cache = WriteBackCache::new(evictor, "nfs-inodes", 100_000, Duration::from_secs(30));
/// cache.start()?;
///
/// let attrs = cache.lock(&path, |view| match view.get(&path) {
///     Some(entry) if entry.missing => None,
///     Some(entry) => Some(entry.value),
///     None => {
///         let loaded = backend.stat(&path);
///         match &loaded {
///             Some(attrs) => view.insert_clean(path.clone(), attrs.clone()),
///             None => view.insert_missing(path.clone()),
///         };
///         loaded
///     }
/// })?;
/// ```
pub struct WriteBackCache<K, V> {
    shared: Arc<Shared<K, V>>,
    config: CacheConfig,
    scavenger: Mutex<Option<Scavenger>>,
}

impl<K, V> WriteBackCache<K, V>
where
    K: Hash + Ord + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with default stripe count, scavenger cadence and error
    /// queue capacity
    pub fn new(
        evictor: impl Evictor<K, V> + 'static,
        name: impl Into<String>,
        max_size: usize,
        eviction_interval: Duration,
    ) -> Self {
        Self::build(evictor, CacheConfig::new(name, max_size, eviction_interval))
    }

    /// Create a cache from an explicit configuration
    pub fn with_config(
        evictor: impl Evictor<K, V> + 'static,
        config: CacheConfig,
    ) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self::build(evictor, config))
    }

    fn build(evictor: impl Evictor<K, V> + 'static, config: CacheConfig) -> Self {
        info!(
            cache = %config.name,
            max_size = config.max_size,
            eviction_interval = ?config.eviction_interval,
            stripes = config.stripes,
            "Write-back cache initialized"
        );

        let shared = Shared {
            name: config.name.clone(),
            locks: StripeLocks::new(config.stripes),
            store: Mutex::new(Store::new(config.max_size, config.eviction_interval)),
            stats: CacheStats::default(),
            evictor: Box::new(evictor),
            errors: ErrorQueue::new(config.error_queue_capacity),
        };

        Self {
            shared: Arc::new(shared),
            config,
            scavenger: Mutex::new(None),
        }
    }

    /// Launch the background scavenger. Calling it again while the
    /// scavenger runs only logs a warning.
    pub fn start(&self) -> CacheResult<()> {
        let mut slot = self.scavenger.lock();
        if slot.is_some() {
            warn!(cache = %self.shared.name, "Scavenger already running");
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let scavenger = Scavenger::spawn(
            &self.shared.name,
            self.config.scavenge_interval,
            move || {
                shared.run_pending_evictions(Sweep::Full);
            },
        )
        .map_err(|e| CacheError::Scavenger(e.to_string()))?;

        *slot = Some(scavenger);
        Ok(())
    }

    /// Stop the scavenger and wait for it to exit. Must not be called from
    /// inside a [`lock`](Self::lock) callback.
    pub fn stop(&self) {
        let scavenger = self.scavenger.lock().take();
        if let Some(scavenger) = scavenger {
            scavenger.stop();
        }
    }

    /// Run `f` while holding the stripe lock for `key`.
    ///
    /// A background write-back failure that has not been reported yet is
    /// raised here before `f` runs, whatever key it was for. After `f`
    /// returns and the stripe is released, entries over the cache bounds are
    /// evicted on this thread where their stripes are free. Dirty victims are
    /// written back before `lock` returns, so a caller can pay backend
    /// latency for keys it never touched.
    ///
    /// `f` must not call back into this cache.
    pub fn lock<R>(&self, key: &K, f: impl FnOnce(&OrderedView<'_, K, V>) -> R) -> CacheResult<R> {
        self.shared.raise_pending()?;

        let result = {
            let _stripe = self.shared.locks.lock(key);
            let view = OrderedView::new(&self.shared, self.shared.locks.stripe_of(key));
            f(&view)
        };

        self.shared.run_pending_evictions(Sweep::Opportunistic);
        Ok(result)
    }

    /// Write back every dirty entry.
    ///
    /// Each key is handled under its own stripe lock. The first failure stops
    /// the flush and is returned; entries already written stay clean.
    /// Returns the number of entries written.
    pub fn flush(&self) -> CacheResult<usize> {
        self.shared.raise_pending()?;

        let keys = self.shared.store.lock().keys();
        let mut flushed = 0;

        for key in keys {
            let _stripe = self.shared.locks.lock(&key);
            let Some(entry) = self.shared.store.lock().peek(&key).cloned() else {
                continue;
            };
            if !entry.needs_flush() {
                continue;
            }

            if let Err(source) = self.shared.evictor.flush(&key, &entry) {
                CacheStats::incr(&self.shared.stats.flush_failures);
                error!(
                    cache = %self.shared.name,
                    key = ?key,
                    error = %source,
                    "Flush failed"
                );
                return Err(CacheError::Flush {
                    cache: self.shared.name.clone(),
                    key: format!("{key:?}"),
                    source,
                });
            }

            self.shared.store.lock().mark_clean(&key);
            CacheStats::incr(&self.shared.stats.writebacks);
            flushed += 1;
        }

        if flushed > 0 {
            info!(cache = %self.shared.name, flushed, "Flushed dirty entries");
        }
        Ok(flushed)
    }

    /// Run one eviction sweep on the calling thread, waiting for busy
    /// stripes. Returns the number of entries evicted.
    pub fn clean_up(&self) -> usize {
        self.shared.run_pending_evictions(Sweep::Full)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }

    /// Number of cached entries, tombstones included
    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.lock().is_empty()
    }

    /// Stripe that `key` is routed to
    pub fn stripe_of(&self, key: &K) -> usize {
        self.shared.locks.stripe_of(key)
    }

    /// Background failures waiting to be raised
    pub fn pending_errors(&self) -> usize {
        self.shared.errors.len()
    }
}

impl<K, V> Drop for WriteBackCache<K, V> {
    fn drop(&mut self) {
        if let Some(scavenger) = self.scavenger.get_mut().take() {
            scavenger.stop();
        }
    }
}
