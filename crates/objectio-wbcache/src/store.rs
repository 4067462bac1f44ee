//! Eviction-managed store with an ordered key index
//!
//! Entries live in a hash map bounded by entry count and by time since last
//! access. A second, sorted index holds exactly the same key set so range
//! scans can walk keys in order. Both are updated together by every
//! operation here, so they never disagree.
//!
//! The store does not evict on its own. It only reports the next victim;
//! the cache takes the victim's stripe lock, writes it back if needed and
//! then calls [`Store::remove`].
//!
//! Access recency is tracked with a logical clock. The oldest tick is also
//! the oldest wall-clock access because both are taken under the same
//! mutex, so expiry only ever has to look at the front of the access order.

use crate::entry::CacheEntry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::ops::{Bound, RangeBounds};
use std::time::{Duration, Instant};

struct Slot<V> {
    entry: CacheEntry<V>,
    last_access: Instant,
    tick: u64,
}

pub(crate) struct Store<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Sorted view of the keys in `entries`
    index: BTreeSet<K>,
    /// Access order, least recently used first
    access: BTreeMap<u64, K>,
    clock: u64,
    max_size: usize,
    eviction_interval: Duration,
}

impl<K, V> Store<K, V>
where
    K: Hash + Ord + Clone,
{
    pub fn new(max_size: usize, eviction_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            index: BTreeSet::new(),
            access: BTreeMap::new(),
            clock: 0,
            max_size,
            eviction_interval,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up without counting as an access
    pub fn peek(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    /// Look up and refresh the key's access time
    pub fn get(&mut self, key: &K) -> Option<&CacheEntry<V>> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.peek(key)
    }

    /// Overwrite the entry of an existing key without touching its access
    /// time. Returns false if the key is not cached.
    pub fn set_entry(&mut self, key: &K, entry: CacheEntry<V>) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.entry = entry;
                true
            }
            None => false,
        }
    }

    /// Insert or replace. A replaced key keeps its place in the index.
    pub fn insert(&mut self, key: K, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        if let Some(slot) = self.entries.get_mut(&key) {
            let old = std::mem::replace(&mut slot.entry, entry);
            self.touch(&key);
            return Some(old);
        }

        let tick = self.next_tick();
        self.entries.insert(
            key.clone(),
            Slot {
                entry,
                last_access: Instant::now(),
                tick,
            },
        );
        self.access.insert(tick, key.clone());
        self.index.insert(key);
        None
    }

    /// Remove the key from the store and the index
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let slot = self.entries.remove(key)?;
        self.access.remove(&slot.tick);
        self.index.remove(key);
        Some(slot.entry)
    }

    /// Clear the dirty flag after a successful write-back
    pub fn mark_clean(&mut self, key: &K) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) if slot.entry.dirty => {
                slot.entry.dirty = false;
                true
            }
            _ => false,
        }
    }

    /// True if the key exists and has not been accessed within the
    /// eviction interval
    pub fn is_expired(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|slot| self.slot_expired(slot, now))
    }

    /// The key that should be evicted next, if any bound is exceeded
    pub fn next_victim(&self) -> Option<K> {
        let (_, oldest) = self.access.first_key_value()?;
        if self.entries.len() > self.max_size || self.is_expired(oldest) {
            Some(oldest.clone())
        } else {
            None
        }
    }

    /// Re-check a victim picked by [`Store::next_victim`] once its stripe
    /// lock is held. It may have been touched or removed in between.
    pub fn is_victim(&self, key: &K) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }
        if self.is_expired(key) {
            return true;
        }
        self.entries.len() > self.max_size
            && self
                .access
                .first_key_value()
                .is_some_and(|(_, oldest)| oldest == key)
    }

    /// All keys in ascending order
    pub fn keys(&self) -> Vec<K> {
        self.index.iter().cloned().collect()
    }

    pub fn first_key(&self) -> Option<&K> {
        self.index.first()
    }

    pub fn last_key(&self) -> Option<&K> {
        self.index.last()
    }

    /// Entries whose keys fall within `range`, in ascending key order.
    /// Inverted bounds yield nothing.
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = (&K, &CacheEntry<V>)>
    where
        R: RangeBounds<K>,
    {
        let keys = if is_empty_range(&range) {
            None
        } else {
            Some(self.index.range::<K, R>(range))
        };
        keys.into_iter()
            .flatten()
            .filter_map(move |key| self.peek(key).map(|entry| (key, entry)))
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, key: &K) {
        let tick = self.next_tick();
        if let Some(slot) = self.entries.get_mut(key) {
            self.access.remove(&slot.tick);
            slot.tick = tick;
            slot.last_access = Instant::now();
            self.access.insert(tick, key.clone());
        }
    }

    fn slot_expired(&self, slot: &Slot<V>, now: Instant) -> bool {
        now.saturating_duration_since(slot.last_access) >= self.eviction_interval
    }
}

/// Ranges `BTreeSet::range` would panic on
fn is_empty_range<K: Ord, R: RangeBounds<K>>(range: &R) -> bool {
    match (range.start_bound(), range.end_bound()) {
        (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
            s > e
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn store(max_size: usize) -> Store<String, u32> {
        Store::new(max_size, Duration::from_secs(60))
    }

    fn key(k: &str) -> String {
        k.to_string()
    }

    #[test]
    fn test_insert_keeps_index_in_sync() {
        let mut s = store(10);
        s.insert(key("b"), CacheEntry::dirty(2));
        s.insert(key("a"), CacheEntry::clean(1));
        s.insert(key("c"), CacheEntry::clean(3));

        assert_eq!(s.len(), 3);
        assert_eq!(s.keys(), vec![key("a"), key("b"), key("c")]);
        assert_eq!(s.first_key(), Some(&key("a")));
        assert_eq!(s.last_key(), Some(&key("c")));

        s.remove(&key("b"));
        assert_eq!(s.keys(), vec![key("a"), key("c")]);
        assert!(!s.contains_key(&key("b")));
    }

    #[test]
    fn test_replace_returns_old_entry() {
        let mut s = store(10);
        assert!(s.insert(key("a"), CacheEntry::clean(1)).is_none());
        let old = s.insert(key("a"), CacheEntry::dirty(2)).unwrap();
        assert_eq!(old.value, 1);
        assert_eq!(s.peek(&key("a")).unwrap().value, 2);
        assert_eq!(s.len(), 1);
        assert_eq!(s.keys(), vec![key("a")]);
    }

    #[test]
    fn test_size_victim_is_least_recently_used() {
        let mut s = store(2);
        s.insert(key("a"), CacheEntry::clean(1));
        s.insert(key("b"), CacheEntry::clean(2));
        assert!(s.next_victim().is_none());

        // Refresh "a" so "b" becomes the oldest
        s.get(&key("a"));
        s.insert(key("c"), CacheEntry::clean(3));

        assert_eq!(s.next_victim(), Some(key("b")));
        assert!(s.is_victim(&key("b")));
        assert!(!s.is_victim(&key("a")));

        s.remove(&key("b"));
        assert!(s.next_victim().is_none());
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut s = store(1);
        s.insert(key("a"), CacheEntry::clean(1));
        s.insert(key("b"), CacheEntry::clean(2));
        s.peek(&key("a"));
        assert_eq!(s.next_victim(), Some(key("a")));
    }

    #[test]
    fn test_expiry_after_access_interval() {
        let mut s: Store<String, u32> = Store::new(100, Duration::from_millis(50));
        s.insert(key("a"), CacheEntry::dirty(1));
        assert!(s.next_victim().is_none());

        thread::sleep(Duration::from_millis(80));
        assert!(s.is_expired(&key("a")));
        assert_eq!(s.next_victim(), Some(key("a")));

        // An access resets the clock
        s.get(&key("a"));
        assert!(!s.is_expired(&key("a")));
    }

    #[test]
    fn test_set_entry_only_overwrites_cached_keys() {
        let mut s = store(10);
        s.insert(key("a"), CacheEntry::clean(1));
        assert!(s.set_entry(&key("a"), CacheEntry::dirty(2)));
        assert_eq!(s.peek(&key("a")), Some(&CacheEntry::dirty(2)));
        assert_eq!(s.keys(), vec![key("a")]);

        assert!(!s.set_entry(&key("b"), CacheEntry::dirty(3)));
        assert!(!s.contains_key(&key("b")));
        assert_eq!(s.keys(), vec![key("a")]);
    }

    #[test]
    fn test_mark_clean() {
        let mut s = store(10);
        s.insert(key("a"), CacheEntry::dirty(1));
        assert!(s.mark_clean(&key("a")));
        assert!(!s.peek(&key("a")).unwrap().dirty);
        assert!(!s.mark_clean(&key("a")));
        assert!(!s.mark_clean(&key("missing")));
    }

    #[test]
    fn test_range_queries() {
        let mut s = store(100);
        for k in ["apple", "apricot", "banana", "blueberry", "cherry"] {
            s.insert(key(k), CacheEntry::clean(0));
        }

        let under_a: Vec<_> = s
            .range(key("a")..key("b"))
            .map(|(k, _)| k.clone())
            .collect();
        assert_eq!(under_a, vec![key("apple"), key("apricot")]);

        let tail: Vec<_> = s.range(key("blueberry")..).map(|(k, _)| k.clone()).collect();
        assert_eq!(tail, vec![key("blueberry"), key("cherry")]);

        // Inverted bounds are empty rather than a panic
        assert_eq!(s.range(key("c")..key("a")).count(), 0);
        let excluded = (Bound::Excluded(key("b")), Bound::Excluded(key("b")));
        assert_eq!(s.range(excluded).count(), 0);
    }
}
