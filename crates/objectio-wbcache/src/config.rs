//! Write-back cache configuration

use crate::error::{CacheError, CacheResult};
use crate::errors_queue::DEFAULT_ERROR_QUEUE_CAPACITY;
use crate::stripe::DEFAULT_STRIPES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Write-back cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache name, used in logs and errors
    pub name: String,
    /// Maximum number of entries before the least recently accessed are evicted
    pub max_size: usize,
    /// Entries not accessed for this long are evicted
    pub eviction_interval: Duration,
    /// Number of stripe locks
    pub stripes: usize,
    /// Cadence of the background scavenger
    pub scavenge_interval: Duration,
    /// Capacity of the async error channel
    pub error_queue_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "wbcache".to_string(),
            max_size: 10_000,
            eviction_interval: Duration::from_secs(60),
            stripes: DEFAULT_STRIPES,
            scavenge_interval: Duration::from_secs(1),
            error_queue_capacity: DEFAULT_ERROR_QUEUE_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Config with the given bounds and defaults for everything else
    pub fn new(name: impl Into<String>, max_size: usize, eviction_interval: Duration) -> Self {
        Self {
            name: name.into(),
            max_size,
            eviction_interval,
            ..Default::default()
        }
    }

    pub fn with_stripes(mut self, stripes: usize) -> Self {
        self.stripes = stripes;
        self
    }

    pub fn with_scavenge_interval(mut self, interval: Duration) -> Self {
        self.scavenge_interval = interval;
        self
    }

    pub fn with_error_queue_capacity(mut self, capacity: usize) -> Self {
        self.error_queue_capacity = capacity;
        self
    }

    /// Reject settings the cache cannot run with
    pub fn validate(&self) -> CacheResult<()> {
        if self.stripes == 0 {
            return Err(CacheError::Configuration(
                "stripes must be non-zero".to_string(),
            ));
        }
        if self.error_queue_capacity == 0 {
            return Err(CacheError::Configuration(
                "error_queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.scavenge_interval.is_zero() {
            return Err(CacheError::Configuration(
                "scavenge_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
