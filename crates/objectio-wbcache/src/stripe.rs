//! Striped lock table
//!
//! A fixed array of mutexes. Each key is routed to one stripe by a seeded
//! xxh64 hash, so unrelated keys rarely contend while the table itself stays
//! a constant size. Two keys on the same stripe serialize against each other.

use parking_lot::{Mutex, MutexGuard};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh64::Xxh64;

/// Stripe count used by ObjectIO gateways
pub const DEFAULT_STRIPES: usize = 32768;

/// Fixed seed so routing is stable for the lifetime of the process and
/// across instances
const STRIPE_SEED: u64 = 0;

/// Immutable table of stripe locks
pub struct StripeLocks {
    locks: Box<[Mutex<()>]>,
}

impl StripeLocks {
    /// Create a table with `count` stripes (clamped to at least one)
    pub fn new(count: usize) -> Self {
        let locks = (0..count.max(1)).map(|_| Mutex::new(())).collect();
        Self { locks }
    }

    /// Number of stripes
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Never true; a table always has at least one stripe
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Stripe index for `key`
    pub fn stripe_of<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = Xxh64::new(STRIPE_SEED);
        key.hash(&mut hasher);
        (hasher.finish() % self.locks.len() as u64) as usize
    }

    /// Block until the stripe owning `key` is held
    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.locks[self.stripe_of(key)].lock()
    }

    /// Take the stripe owning `key` only if it is free
    pub fn try_lock<K: Hash + ?Sized>(&self, key: &K) -> Option<MutexGuard<'_, ()>> {
        self.locks[self.stripe_of(key)].try_lock()
    }
}
