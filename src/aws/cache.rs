//! Day-keyed file cache for region lookups.
//!
//! Avoids repeated AWS calls while iterating on a plan. A fresh file per day
//! means the "latest image" still moves forward between days.

use super::lookup::{ImageFilter, Lookup, LookupError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
struct CacheFile {
    #[serde(default)]
    zones: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    images: BTreeMap<String, String>,
}

/// Wraps another [`Lookup`] and persists every answer to a JSON file.
pub struct CachedLookup<L: Lookup> {
    inner: L,
    path: PathBuf,
    entries: Mutex<CacheFile>,
}

/// Default cache file name for today, e.g. `lookup_cache_2024-10-16.json`.
pub fn default_cache_file() -> String {
    format!(
        "lookup_cache_{}.json",
        chrono::Utc::now().format("%Y-%m-%d")
    )
}

impl<L: Lookup> CachedLookup<L> {
    /// Load the cache from `cache_file` (or today's default file). A missing
    /// or unreadable file starts an empty cache.
    pub fn new(inner: L, cache_file: Option<&str>) -> CachedLookup<L> {
        let path = PathBuf::from(cache_file.map_or_else(default_cache_file, str::to_string));
        let entries = match read_cache(&path) {
            Ok(entries) => {
                log::info!("Reading from cache file: {}", path.display());
                entries
            }
            Err(e) => {
                log::warn!("Cache file not used: {} ({e})", path.display());
                CacheFile::default()
            }
        };
        CachedLookup {
            inner,
            path,
            entries: Mutex::new(entries),
        }
    }

    fn update<F>(&self, change: F) -> Result<(), LookupError>
    where
        F: FnOnce(&mut CacheFile),
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| format!("Cache lock poisoned: {e}"))?;
        change(&mut entries);
        let json = serde_json::to_string_pretty(&*entries)
            .map_err(|e| format!("Error serializing cache JSON: {e}"))?;
        log::debug!("Writing data to cache file: {}", self.path.display());
        std::fs::write(&self.path, json)
            .map_err(|e| format!("Error writing cache file {}: {e}", self.path.display()))?;
        Ok(())
    }

    fn cached<T, F>(&self, read: F) -> Result<Option<T>, LookupError>
    where
        F: FnOnce(&CacheFile) -> Option<T>,
    {
        let entries = self
            .entries
            .lock()
            .map_err(|e| format!("Cache lock poisoned: {e}"))?;
        Ok(read(&entries))
    }
}

fn read_cache(path: &Path) -> Result<CacheFile, LookupError> {
    let json = std::fs::read_to_string(path)?;
    let entries = serde_json::from_str(&json)
        .map_err(|e| format!("Error parsing cache JSON: {e}"))?;
    Ok(entries)
}

impl<L: Lookup> Lookup for CachedLookup<L> {
    fn availability_zones(&self, region: &str) -> Result<Vec<String>, LookupError> {
        if let Some(zones) = self.cached(|c| c.zones.get(region).cloned())? {
            log::debug!("cache hit: zones for {region}");
            return Ok(zones);
        }
        let zones = self.inner.availability_zones(region)?;
        self.update(|c| {
            c.zones.insert(region.to_string(), zones.clone());
        })?;
        Ok(zones)
    }

    fn latest_image(&self, region: &str, filter: &ImageFilter) -> Result<String, LookupError> {
        let key = filter.cache_key(region);
        if let Some(image) = self.cached(|c| c.images.get(&key).cloned())? {
            log::debug!("cache hit: image for {key}");
            return Ok(image);
        }
        let image = self.inner.latest_image(region, filter)?;
        self.update(|c| {
            c.images.insert(key, image.clone());
        })?;
        Ok(image)
    }
}
