//! Cache entries and removal causes

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cached value together with its write-back state.
///
/// `dirty` entries hold data that has not been confirmed persisted yet.
/// `missing` entries are cached negative lookups: the key is known not to
/// exist in the backing store. Missing entries are never flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub dirty: bool,
    pub missing: bool,
}

impl<V> CacheEntry<V> {
    /// Entry loaded from the backing store (nothing to write back)
    pub fn clean(value: V) -> Self {
        Self {
            value,
            dirty: false,
            missing: false,
        }
    }

    /// Entry written locally and not yet persisted
    pub fn dirty(value: V) -> Self {
        Self {
            value,
            dirty: true,
            missing: false,
        }
    }

    /// Tombstone for a key known to be absent from the backing store
    pub fn missing() -> Self
    where
        V: Default,
    {
        Self {
            value: V::default(),
            dirty: false,
            missing: true,
        }
    }

    /// True if eviction of this entry must go through the evictor
    pub fn needs_flush(&self) -> bool {
        self.dirty && !self.missing
    }
}

/// Why an entry left the eviction-managed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalCause {
    /// The caller removed the key
    Explicit,
    /// The caller overwrote the key with a new entry
    Replaced,
    /// The size or access-time bound was exceeded
    Evicted,
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Replaced => write!(f, "replaced"),
            Self::Evicted => write!(f, "evicted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_constructors() {
        let clean = CacheEntry::clean(7u32);
        assert!(!clean.dirty && !clean.missing);

        let dirty = CacheEntry::dirty(7u32);
        assert!(dirty.needs_flush());

        let missing: CacheEntry<Vec<u8>> = CacheEntry::missing();
        assert!(missing.missing);
        assert!(missing.value.is_empty());
        assert!(!missing.needs_flush());
    }

    #[test]
    fn test_missing_never_needs_flush() {
        let mut tombstone: CacheEntry<String> = CacheEntry::missing();
        tombstone.dirty = true;
        assert!(!tombstone.needs_flush());
    }

    #[test]
    fn test_removal_cause_display() {
        assert_eq!(RemovalCause::Explicit.to_string(), "explicit");
        assert_eq!(RemovalCause::Replaced.to_string(), "replaced");
        assert_eq!(RemovalCause::Evicted.to_string(), "evicted");
    }
}
