//! Flat on-disk store: one JSON file per cache key.
//!
//! The file's modification time is the entry's age signal; content is an
//! opaque serialized blob. Reads on the hot path fail open (a corrupt
//! entry is a miss, never an error).

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::error::CacheError;

const ENTRY_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Read a raw entry: value plus age since last write. Corrupt or
    /// unreadable entries count as absent.
    pub fn read(&self, key: &str) -> Option<(Value, Duration)> {
        let path = self.entry_path(key);
        let metadata = fs::metadata(&path).ok()?;
        let age = entry_age(&metadata).unwrap_or(Duration::ZERO);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some((value, age)),
            Err(e) => {
                log::warn!(
                    "Corrupt cache entry {} treated as a miss: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist `value` under `key`. Writes go through a unique temp file in
    /// the same directory plus a rename, so a reader never observes a torn
    /// entry; concurrent writers race with last-rename-wins.
    pub fn write(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let blob = serde_json::to_vec(value)
            .map_err(|source| CacheError::Serialize { source })?;
        let path = self.entry_path(key);
        let tmp = self.dir.join(format!(".{key}.{}.tmp", process::id()));
        fs::write(&tmp, &blob).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CacheError::Io { path, source })?;
        Ok(())
    }

    /// Delete entries: all of them, or only those older than `older_than`.
    /// Returns the number removed; a missing directory holds zero entries.
    pub fn clear(&self, older_than: Option<Duration>) -> Result<usize, CacheError> {
        let mut removed = 0;
        for (path, metadata) in self.entries()? {
            if let Some(min_age) = older_than {
                let age = entry_age(&metadata).unwrap_or(Duration::ZERO);
                if age <= min_age {
                    continue;
                }
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    log::warn!("Failed to remove cache entry {}: {}", path.display(), e)
                }
            }
        }
        Ok(removed)
    }

    /// Entry count, aggregate size, and oldest/newest entry ages.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        for (_, metadata) in self.entries()? {
            stats.entries += 1;
            stats.total_bytes += metadata.len();
            if let Some(age) = entry_age(&metadata) {
                stats.oldest = Some(stats.oldest.map_or(age, |oldest| oldest.max(age)));
                stats.newest = Some(stats.newest.map_or(age, |newest| newest.min(age)));
            }
        }
        Ok(stats)
    }

    fn entries(&self) -> Result<Vec<(PathBuf, fs::Metadata)>, CacheError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    entries.push((path, metadata));
                }
            }
        }
        Ok(entries)
    }
}

fn entry_age(metadata: &fs::Metadata) -> Option<Duration> {
    let modified = metadata.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

/// Aggregate view over the persisted entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub oldest: Option<Duration>,
    pub newest: Option<Duration>,
}

impl CacheStats {
    pub fn total_size_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries == 0 {
            return write!(f, "Cache is empty");
        }
        write!(
            f,
            "Cache statistics:\n  Entries: {}\n  Total size: {:.2} MB",
            self.entries,
            self.total_size_mb()
        )?;
        if let Some(oldest) = self.oldest {
            write!(f, "\n  Oldest entry: {}s old", oldest.as_secs())?;
        }
        if let Some(newest) = self.newest {
            write!(f, "\n  Newest entry: {}s old", newest.as_secs())?;
        }
        Ok(())
    }
}
