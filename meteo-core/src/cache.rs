//! In-memory caches used by the API clients.
//!
//! [`TtlCache`] expires entries lazily after a fixed time-to-live.
//! [`EtagCache`] keeps the last validator and payload per URL for conditional GETs.
//! Neither cache has a capacity bound.

pub mod etag;
pub mod ttl;

pub use etag::{EtagCache, EtagEntry};
pub use ttl::{CacheInfo, TtlCache};
