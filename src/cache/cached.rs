//! Transparent caching wrapper around any step.
//!
//! A `CachedStep` memoizes its inner step's output keyed by the step name,
//! its configured arguments, and the exact input payload. Persistence is
//! best effort: a store that cannot be written to degrades the wrapper into
//! a pass-through, never into a failure.

use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::cache::CacheStore;
use crate::step::{Context, Step};

/// Context key set to `true` on a cache hit, `false` after a recompute.
pub const CACHE_HIT_KEY: &str = "cache_hit";
/// Context key holding the entry's age in whole seconds. Hits only.
pub const CACHE_AGE_KEY: &str = "cache_age";

pub struct CachedStep {
    inner: Box<dyn Step>,
    ttl: Duration,
    fingerprint: String,
    store: CacheStore,
}

impl CachedStep {
    pub fn new(
        inner: Box<dyn Step>,
        ttl: Duration,
        fingerprint: impl Into<String>,
        store: CacheStore,
    ) -> Self {
        Self {
            inner,
            ttl,
            fingerprint: fingerprint.into(),
            store,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key = sha256 over step name, configured arguments, and input payload,
    /// NUL-separated so no component can bleed into the next.
    fn cache_key(&self, data: &Value) -> String {
        let rendered = serde_json::to_string(data).unwrap_or_else(|_| format!("{data:?}"));
        let mut hasher = Sha256::new();
        hasher.update(self.inner.name().as_bytes());
        hasher.update([0]);
        hasher.update(self.fingerprint.as_bytes());
        hasher.update([0]);
        hasher.update(rendered.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Step for CachedStep {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn run(&self, data: Value, context: &mut Context) -> anyhow::Result<Value> {
        let key = self.cache_key(&data);

        if let Some((value, age)) = self.store.read(&key) {
            if age <= self.ttl {
                log::debug!(
                    "Cache hit for step '{}' (age {}s, ttl {}s)",
                    self.name(),
                    age.as_secs(),
                    self.ttl.as_secs()
                );
                context.insert(CACHE_HIT_KEY.to_string(), Value::Bool(true));
                context.insert(CACHE_AGE_KEY.to_string(), Value::from(age.as_secs()));
                return Ok(value);
            }
            log::debug!(
                "Cache entry for step '{}' expired (age {}s, ttl {}s)",
                self.name(),
                age.as_secs(),
                self.ttl.as_secs()
            );
        }

        let output = self.inner.run(data, context)?;

        if let Err(e) = self.store.write(&key, &output) {
            log::warn!("Failed to cache output of step '{}': {}", self.name(), e);
        }
        context.insert(CACHE_HIT_KEY.to_string(), Value::Bool(false));
        context.remove(CACHE_AGE_KEY);

        Ok(output)
    }
}
