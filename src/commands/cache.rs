//! The `cache` command: inspect or clear the step output cache.

use std::time::Duration;

use anyhow::Result;

use crate::cache::{CacheLocation, CacheStore};

/// Print entry count, total size, and age range for the cache at `location`.
pub fn cache_stats(location: &CacheLocation) -> Result<()> {
    let store = CacheStore::new(location.resolve());
    let stats = store.stats()?;
    println!("Cache directory: {}", store.dir().display());
    println!("{stats}");
    Ok(())
}

/// Delete cached entries, optionally only those older than `older_than`.
pub fn cache_clear(location: &CacheLocation, older_than: Option<Duration>) -> Result<()> {
    let store = CacheStore::new(location.resolve());
    let removed = store.clear(older_than)?;
    match older_than {
        Some(age) => println!(
            "Removed {removed} cache entries older than {}s from {}",
            age.as_secs(),
            store.dir().display()
        ),
        None => println!(
            "Removed {removed} cache entries from {}",
            store.dir().display()
        ),
    }
    Ok(())
}
