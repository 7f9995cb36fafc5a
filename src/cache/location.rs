//! Cache directory resolution.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "STEPLINE_CACHE_DIR";

/// Directory name used by the local strategy, relative to the working
/// directory.
pub const LOCAL_CACHE_DIR: &str = ".stepline_cache";

/// Where cache entries live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStrategy {
    /// `.stepline_cache` under the working directory.
    Local,
    /// Per-user cache directory, shared across working directories.
    Shared,
    /// Explicit path from a CLI flag or the environment.
    Custom(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CacheLocation {
    strategy: CacheStrategy,
}

impl CacheLocation {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self { strategy }
    }

    /// Location from the environment: `STEPLINE_CACHE_DIR` when set, the
    /// local directory otherwise.
    pub fn from_env() -> Self {
        match env::var(CACHE_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => Self::new(CacheStrategy::Custom(PathBuf::from(dir))),
            _ => Self::new(CacheStrategy::Local),
        }
    }

    /// Resolution order for CLI invocations: explicit path flag, shared
    /// flag, environment, local default.
    pub fn from_cli(cache_dir: Option<PathBuf>, shared: bool) -> Self {
        match cache_dir {
            Some(path) => Self::custom(path),
            None if shared => Self::shared(),
            None => Self::from_env(),
        }
    }

    pub fn shared() -> Self {
        Self::new(CacheStrategy::Shared)
    }

    pub fn custom(path: impl Into<PathBuf>) -> Self {
        Self::new(CacheStrategy::Custom(path.into()))
    }

    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Resolve to a concrete directory.
    pub fn resolve(&self) -> PathBuf {
        match &self.strategy {
            CacheStrategy::Local => PathBuf::from(LOCAL_CACHE_DIR),
            CacheStrategy::Shared => shared_cache_dir(),
            CacheStrategy::Custom(path) => path.clone(),
        }
    }
}

/// Per-user cache directory, falling back to the local directory when the
/// platform offers none.
fn shared_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("stepline"))
        .unwrap_or_else(|| PathBuf::from(LOCAL_CACHE_DIR))
}
