//! Write-back hook into the backing store
//!
//! The evictor is the single place where a dirty entry leaves the cache for
//! durable storage. It is called for dirty, non-missing entries on eviction
//! and for every dirty entry during an explicit flush.

use crate::entry::CacheEntry;
use crate::error::PersistError;

/// Persists dirty cache entries to the backing store.
///
/// Implementations must tolerate being called again for a key that was
/// already written (there is no at-most-once guarantee across restarts) and
/// report failure through [`PersistError`]. The cache captures errors from
/// background evictions and reports them to a later caller.
pub trait Evictor<K, V>: Send + Sync {
    /// Write `entry` for `key` to the backing store
    fn flush(&self, key: &K, entry: &CacheEntry<V>) -> Result<(), PersistError>;
}

impl<K, V, F> Evictor<K, V> for F
where
    F: Fn(&K, &CacheEntry<V>) -> Result<(), PersistError> + Send + Sync,
{
    fn flush(&self, key: &K, entry: &CacheEntry<V>) -> Result<(), PersistError> {
        self(key, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recording {
        seen: Mutex<Vec<(String, u32)>>,
    }

    impl Evictor<String, u32> for Recording {
        fn flush(&self, key: &String, entry: &CacheEntry<u32>) -> Result<(), PersistError> {
            self.seen.lock().push((key.clone(), entry.value));
            Ok(())
        }
    }

    #[test]
    fn test_closure_evictor() {
        let evictor = |key: &String, _entry: &CacheEntry<u32>| {
            if key == "bad" {
                Err(PersistError::backend("rejected"))
            } else {
                Ok(())
            }
        };

        assert!(evictor.flush(&"good".to_string(), &CacheEntry::dirty(1)).is_ok());
        assert!(evictor.flush(&"bad".to_string(), &CacheEntry::dirty(1)).is_err());
    }

    #[test]
    fn test_struct_evictor() {
        let evictor = Recording {
            seen: Mutex::new(Vec::new()),
        };
        evictor.flush(&"a".to_string(), &CacheEntry::dirty(3)).unwrap();
        assert_eq!(evictor.seen.lock().as_slice(), &[("a".to_string(), 3)]);
    }
}
