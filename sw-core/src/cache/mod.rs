//! Persistent resolution cache
//!
//! - `fingerprint` - order-independent summary of the top-level hardware set
//! - `store` - the in-memory map, its on-disk format and migrations

pub mod fingerprint;
pub mod store;

pub use fingerprint::HardwareFingerprint;
pub use store::{cache_key, unix_now, CacheStatistics, CacheStore, ResolutionCache};
