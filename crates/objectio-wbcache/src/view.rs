//! Ordered view handed to [`WriteBackCache::lock`](crate::WriteBackCache::lock)
//! callbacks
//!
//! Point operations and range scans both go through here. Membership
//! queries reflect the store's current entries; range scans walk the sorted
//! key index. Every call takes the store's internal mutex for the duration
//! of that call only, so a callback never blocks unrelated stripes.
//!
//! Only the key the callback was opened for (and any other key on the same
//! stripe) is protected by the stripe lock. Reads of other keys see a
//! consistent snapshot per call but may race with their owners.

use crate::cache::Shared;
use crate::entry::{CacheEntry, RemovalCause};
use crate::stats::CacheStats;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::{Bound, RangeBounds};
use tracing::debug;

pub struct OrderedView<'a, K, V> {
    shared: &'a Shared<K, V>,
    stripe: usize,
}

impl<'a, K, V> OrderedView<'a, K, V>
where
    K: Hash + Ord + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub(crate) fn new(shared: &'a Shared<K, V>, stripe: usize) -> Self {
        Self { shared, stripe }
    }

    /// Stripe whose lock the callback holds
    pub fn stripe(&self) -> usize {
        self.stripe
    }

    /// True if `key` is covered by the stripe lock this view was opened under
    pub fn owns(&self, key: &K) -> bool {
        self.shared.locks.stripe_of(key) == self.stripe
    }

    /// Look up `key`, counting it as an access.
    ///
    /// A key on the held stripe that has outlived the eviction interval is
    /// evicted here (written back first if dirty) and reported as absent.
    pub fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        if self.expire_if_stale(key) {
            CacheStats::incr(&self.shared.stats.misses);
            return None;
        }

        let entry = self.shared.store.lock().get(key).cloned();
        match entry {
            Some(_) => CacheStats::incr(&self.shared.stats.hits),
            None => CacheStats::incr(&self.shared.stats.misses),
        }
        entry
    }

    /// Look up `key` without refreshing its access time
    pub fn peek(&self, key: &K) -> Option<CacheEntry<V>> {
        self.shared.store.lock().peek(key).cloned()
    }

    /// Mutate the entry for `key`, counting it as an access.
    ///
    /// `f` runs on a copy with no internal lock held, so it may read this
    /// view. The copy is stored back without counting as a replacement. If
    /// `f` removed the key, the update is dropped.
    pub fn update<R>(&self, key: &K, f: impl FnOnce(&mut CacheEntry<V>) -> R) -> Option<R> {
        if self.expire_if_stale(key) {
            return None;
        }
        let mut entry = self.shared.store.lock().get(key).cloned()?;
        let result = f(&mut entry);
        self.shared.store.lock().set_entry(key, entry);
        Some(result)
    }

    /// Write `value` locally; the entry is dirty until written back
    pub fn put(&self, key: K, value: V) -> Option<CacheEntry<V>> {
        self.insert(key, CacheEntry::dirty(value))
    }

    /// Cache a value loaded from the backing store
    pub fn insert_clean(&self, key: K, value: V) -> Option<CacheEntry<V>> {
        self.insert(key, CacheEntry::clean(value))
    }

    /// Cache the fact that `key` does not exist in the backing store
    pub fn insert_missing(&self, key: K) -> Option<CacheEntry<V>>
    where
        V: Default,
    {
        self.insert(key, CacheEntry::missing())
    }

    /// Insert `entry` as is. An existing entry is replaced without being
    /// written back.
    pub fn insert(&self, key: K, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        let old = self.shared.store.lock().insert(key.clone(), entry);
        match old {
            Some(_) => self.shared.record_removal(&key, RemovalCause::Replaced),
            None => {
                CacheStats::incr(&self.shared.stats.inserts);
                debug!(cache = %self.shared.name, key = ?key, "Inserted entry");
            }
        }
        old
    }

    /// Remove `key` without writing it back
    pub fn remove(&self, key: &K) -> Option<CacheEntry<V>> {
        let old = self.shared.store.lock().remove(key);
        if old.is_some() {
            self.shared.record_removal(key, RemovalCause::Explicit);
        }
        old
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.store.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.lock().is_empty()
    }

    /// All keys in ascending order
    pub fn keys(&self) -> Vec<K> {
        self.shared.store.lock().keys()
    }

    /// All values in ascending key order
    pub fn values(&self) -> Vec<CacheEntry<V>> {
        self.range(..).into_iter().map(|(_, entry)| entry).collect()
    }

    /// All entries in ascending key order
    pub fn entries(&self) -> Vec<(K, CacheEntry<V>)> {
        self.range(..)
    }

    /// Entries with keys inside `range`, ascending
    pub fn range<R: RangeBounds<K>>(&self, range: R) -> Vec<(K, CacheEntry<V>)> {
        self.shared
            .store
            .lock()
            .range(range)
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Keys in `[from, to)`
    pub fn sub_map(&self, from: &K, to: &K) -> Vec<(K, CacheEntry<V>)> {
        self.range((Bound::Included(from.clone()), Bound::Excluded(to.clone())))
    }

    /// Keys strictly below `to`
    pub fn head_map(&self, to: &K) -> Vec<(K, CacheEntry<V>)> {
        self.range((Bound::Unbounded, Bound::Excluded(to.clone())))
    }

    /// Keys at or above `from`
    pub fn tail_map(&self, from: &K) -> Vec<(K, CacheEntry<V>)> {
        self.range((Bound::Included(from.clone()), Bound::Unbounded))
    }

    pub fn first_key(&self) -> Option<K> {
        self.shared.store.lock().first_key().cloned()
    }

    pub fn last_key(&self) -> Option<K> {
        self.shared.store.lock().last_key().cloned()
    }

    fn expire_if_stale(&self, key: &K) -> bool {
        if !self.owns(key) {
            return false;
        }
        let expired = self.shared.store.lock().is_expired(key);
        if expired {
            self.shared.evict_held(key);
        }
        expired
    }
}
