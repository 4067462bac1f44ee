//! ObjectIO Write-Back Cache
//!
//! Deferred write-back cache used by the file gateways to overlay the
//! distributed object store with bounded local state.
//!
//! # Features
//!
//! - **Striped locking**: keys are routed to a fixed table of stripe locks,
//!   so unrelated keys proceed concurrently
//! - **Bounded state**: entry-count limit plus expire-after-access
//! - **Write-back on eviction**: dirty entries go through a caller-supplied
//!   [`Evictor`] before they leave the cache
//! - **Ordered view**: range scans (prefix listings) over the cached keys
//! - **Async error reporting**: background write-back failures are raised
//!   to the next caller instead of being lost
//! - **Scavenger**: a background thread forces eviction sweeps
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  File Gateway   │  (NFS / S3 listing / Swift)
//! └────────┬────────┘
//!          │ lock(key, f)
//! ┌────────▼────────┐
//! │ WriteBackCache  │
//! │  - StripeLocks  │
//! │  - Store+Index  │
//! │  - Scavenger    │
//! └────────┬────────┘
//!          │ Evictor::flush
//! ┌────────▼────────┐
//! │  ObjectIO OSDs  │  (backing store)
//! └─────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
mod errors_queue;
pub mod evictor;
mod scavenger;
mod store;
pub mod stats;
pub mod stripe;
pub mod view;

pub use cache::WriteBackCache;
pub use config::CacheConfig;
pub use entry::{CacheEntry, RemovalCause};
pub use error::{CacheError, CacheResult, PersistError};
pub use errors_queue::DEFAULT_ERROR_QUEUE_CAPACITY;
pub use evictor::Evictor;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use stripe::{DEFAULT_STRIPES, StripeLocks};
pub use view::OrderedView;
