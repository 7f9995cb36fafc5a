//! TTL file cache: directory resolution, the on-disk store, and the
//! caching step wrapper.

mod cached;
mod location;
mod store;

pub use cached::{CachedStep, CACHE_AGE_KEY, CACHE_HIT_KEY};
pub use location::{CacheLocation, CacheStrategy, CACHE_DIR_ENV, LOCAL_CACHE_DIR};
pub use store::{CacheStats, CacheStore};
