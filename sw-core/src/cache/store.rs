//! Resolution cache storage
//!
//! The cache is a flat JSON object mapping `"{hardware_id}_{METRIC}"` keys to
//! sensor identifiers. Keys starting with `_` carry metadata (version,
//! timestamps, fingerprint). Loading never fails: a missing or damaged file
//! yields a fresh cache, and damaged files are backed up first.

use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::cache::fingerprint::HardwareFingerprint;
use crate::constants::cache::*;

/// Current unix time in whole seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cache key for a metric on a hardware node; bare metric name without an id
pub fn cache_key(hardware_id: &str, metric_name: &str) -> String {
    if hardware_id.is_empty() {
        metric_name.to_string()
    } else {
        format!("{}_{}", hardware_id, metric_name)
    }
}

fn is_metadata_key(key: &str) -> bool {
    key.starts_with(METADATA_PREFIX)
}

// ============================================================================
// In-memory cache
// ============================================================================

/// In-memory resolution cache: opaque string keys to sensor ids, plus metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionCache {
    map: Map<String, Value>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionCache {
    /// Fresh cache carrying only metadata
    pub fn new() -> Self {
        let now = unix_now();
        let mut map = Map::new();
        map.insert(KEY_VERSION.to_string(), Value::from(CACHE_VERSION));
        map.insert(KEY_CREATED.to_string(), Value::from(now));
        map.insert(KEY_LAST_UPDATED.to_string(), Value::from(now));
        map.insert(KEY_SENSOR_COUNT.to_string(), Value::from(0u64));
        Self { map }
    }

    /// Wrap a raw JSON object without any checks
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// Cached sensor id for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        if is_metadata_key(key) {
            return None;
        }
        self.map.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, sensor_id: impl Into<String>) {
        let key = key.into();
        if is_metadata_key(&key) {
            warn!(key = %key, "Refusing to store a sensor mapping under a metadata key");
            return;
        }
        self.map.insert(key, Value::from(sensor_id.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        if is_metadata_key(key) {
            return None;
        }
        self.map.remove(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Non-metadata entries as `(key, value)`
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.map
            .iter()
            .filter(|(k, _)| !is_metadata_key(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Number of non-metadata entries
    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }

    /// Drop every mapping, keeping metadata
    pub fn clear_entries(&mut self) {
        self.map.retain(|k, _| is_metadata_key(k));
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Format version, `1.0` when unstamped
    pub fn version(&self) -> &str {
        self.map
            .get(KEY_VERSION)
            .and_then(Value::as_str)
            .unwrap_or(LEGACY_VERSION)
    }

    pub fn fingerprint(&self) -> Option<HardwareFingerprint> {
        self.map
            .get(KEY_FINGERPRINT)
            .and_then(Value::as_str)
            .map(HardwareFingerprint::from_stored)
    }

    pub fn set_fingerprint(&mut self, fingerprint: &HardwareFingerprint) {
        self.map
            .insert(KEY_FINGERPRINT.to_string(), Value::from(fingerprint.as_str()));
    }

    /// Creation time in unix seconds; any JSON number is accepted
    pub fn created_timestamp(&self) -> Option<f64> {
        self.map.get(KEY_CREATED).and_then(Value::as_f64)
    }

    pub fn last_updated(&self) -> Option<f64> {
        self.map.get(KEY_LAST_UPDATED).and_then(Value::as_f64)
    }

    /// Age in days, 0 when the creation stamp is missing
    pub fn age_days(&self) -> f64 {
        match self.created_timestamp() {
            Some(created) if created > 0.0 => (unix_now() as f64 - created).max(0.0) / 86_400.0,
            _ => 0.0,
        }
    }

    /// Copy every mapping into a fresh current-version cache
    pub fn migrate(old: &ResolutionCache, old_version: &str) -> ResolutionCache {
        let mut migrated = ResolutionCache::new();
        for (key, value) in old.entries() {
            migrated.map.insert(key.to_string(), value.clone());
        }
        if let Some(created) = old.map.get(KEY_CREATED).filter(|v| v.is_number()) {
            migrated.map.insert(KEY_CREATED.to_string(), created.clone());
        }
        let count = migrated.entry_count();
        migrated
            .map
            .insert(KEY_SENSOR_COUNT.to_string(), Value::from(count as u64));
        migrated
            .map
            .insert(KEY_MIGRATED_FROM.to_string(), Value::from(old_version));

        info!(from = %old_version, to = CACHE_VERSION, entries = count, "Migrated sensor cache");
        migrated
    }

    /// Structural check: required metadata present and plausible sensor ids.
    ///
    /// A stale `_sensor_count` is logged but tolerated.
    pub fn validate(&self) -> bool {
        for key in REQUIRED_METADATA {
            if !self.map.contains_key(key) {
                warn!(key = %key, "Sensor cache is missing metadata");
                return false;
            }
        }

        for (key, value) in self.entries() {
            match value.as_str() {
                Some(id) if id.len() >= MIN_SENSOR_ID_LEN => {}
                _ => {
                    warn!(key = %key, value = %value, "Invalid sensor cache entry");
                    return false;
                }
            }
        }

        let expected = self.entry_count() as u64;
        let stored = self.map.get(KEY_SENSOR_COUNT).and_then(Value::as_u64);
        if stored != Some(expected) {
            warn!(expected, stored = ?stored, "Sensor cache count mismatch");
        }
        true
    }

    /// Stamp version, timestamps and entry count ahead of a write
    fn stamp(&mut self) {
        let now = unix_now();
        self.map
            .insert(KEY_VERSION.to_string(), Value::from(CACHE_VERSION));
        self.map.insert(KEY_LAST_UPDATED.to_string(), Value::from(now));
        if !self.map.contains_key(KEY_CREATED) {
            self.map.insert(KEY_CREATED.to_string(), Value::from(now));
        }
        let count = self.entry_count() as u64;
        self.map
            .insert(KEY_SENSOR_COUNT.to_string(), Value::from(count));
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// File-level cache statistics
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CacheStatistics {
    pub exists: bool,
    pub file_size: u64,
    pub version: String,
    pub sensor_count: usize,
    pub created_timestamp: f64,
    pub last_updated: f64,
    pub age_days: f64,
}

/// Durable home of the resolution cache
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache, falling back to a fresh one on any problem
    pub fn load(&self) -> ResolutionCache {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(_) => {
                info!(path = ?self.path, "No sensor cache found, starting fresh");
                return ResolutionCache::new();
            }
        };

        if metadata.len() > MAX_CACHE_FILE_SIZE {
            error!(
                path = ?self.path,
                size = metadata.len(),
                max = MAX_CACHE_FILE_SIZE,
                "Sensor cache file too large"
            );
            self.backup();
            return ResolutionCache::new();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                error!(path = ?self.path, error = %e, "Failed to read sensor cache");
                self.backup();
                return ResolutionCache::new();
            }
        };

        if content.trim().is_empty() {
            warn!(path = ?self.path, "Sensor cache file is empty, starting fresh");
            return ResolutionCache::new();
        }

        let value: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                error!(path = ?self.path, error = %e, "Sensor cache is corrupt");
                self.backup();
                return ResolutionCache::new();
            }
        };

        let Value::Object(map) = value else {
            warn!(path = ?self.path, "Sensor cache is not a JSON object, starting fresh");
            return ResolutionCache::new();
        };

        let mut cache = ResolutionCache::from_map(map);
        let version = cache.version().to_string();
        if version != CACHE_VERSION {
            cache = ResolutionCache::migrate(&cache, &version);
            // migrated entries are only validated once they are written back
            let mut to_persist = cache.clone();
            if self.save(&mut to_persist) {
                cache = to_persist;
            }
        } else if !cache.validate() {
            warn!(path = ?self.path, "Sensor cache structure invalid, starting fresh");
            return ResolutionCache::new();
        }

        let age_days = cache.age_days();
        if age_days > STALE_AFTER_DAYS {
            info!(age_days, "Sensor cache is stale, keeping it");
        }

        info!(entries = cache.entry_count(), version = %version, "Loaded sensor cache");
        cache
    }

    /// Stamp metadata, validate and write atomically.
    ///
    /// Returns false on any validation or I/O failure; the in-memory cache stays usable.
    pub fn save(&self, cache: &mut ResolutionCache) -> bool {
        cache.stamp();
        if !cache.validate() {
            error!(path = ?self.path, "Refusing to save invalid sensor cache");
            return false;
        }

        match self.write_atomic(cache.as_map()) {
            Ok(()) => {
                debug!(path = ?self.path, entries = cache.entry_count(), "Saved sensor cache");
                true
            }
            Err(e) => {
                error!(path = ?self.path, error = %e, "Failed to save sensor cache");
                false
            }
        }
    }

    fn write_atomic(&self, map: &Map<String, Value>) -> sw_error::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(map)?;
        let temp_path = self.path.with_extension("json.tmp");

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, &self.path)
        };
        if let Err(source) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(sw_error::SensorwatchError::FileWrite {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Reset `cache` when the hardware set changed.
    ///
    /// A missing stored fingerprint counts as a change unless the new one is
    /// empty too. Returns true when a reset happened; the reset cache is persisted.
    pub fn invalidate_for_hardware(
        &self,
        cache: &mut ResolutionCache,
        fingerprint: &HardwareFingerprint,
    ) -> bool {
        let previous = cache
            .metadata(KEY_FINGERPRINT)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if previous == fingerprint.as_str() {
            return false;
        }

        info!(
            previous = %HardwareFingerprint::from_stored(previous.as_str()).digest(),
            current = %fingerprint.digest(),
            "Hardware fingerprint changed, invalidating sensor cache"
        );

        let mut fresh = ResolutionCache::new();
        fresh.set_fingerprint(fingerprint);
        fresh
            .map
            .insert(KEY_INVALIDATED_REASON.to_string(), Value::from(REASON_HARDWARE_CHANGE));
        fresh
            .map
            .insert(KEY_PREVIOUS_FINGERPRINT.to_string(), Value::from(previous));
        self.save(&mut fresh);
        *cache = fresh;
        true
    }

    /// Path for a backup copy taken now
    pub fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sensor_cache");
        let now = unix_now();
        let first = self
            .path
            .with_file_name(format!("{}_corrupted_{}.json.bak", stem, now));
        if !first.exists() {
            return first;
        }
        // same second as an earlier backup
        (1u32..)
            .map(|n| {
                self.path
                    .with_file_name(format!("{}_corrupted_{}_{}.json.bak", stem, now, n))
            })
            .find(|p| !p.exists())
            .unwrap_or(first)
    }

    /// Copy the current file aside; returns the backup path on success
    pub fn backup(&self) -> Option<PathBuf> {
        if !self.path.exists() {
            return None;
        }
        let backup = self.backup_path();
        match fs::copy(&self.path, &backup) {
            Ok(_) => {
                info!(backup = ?backup, "Backed up sensor cache");
                Some(backup)
            }
            Err(e) => {
                error!(path = ?self.path, error = %e, "Failed to back up sensor cache");
                None
            }
        }
    }

    /// Back up and delete the cache file; false when there is nothing to delete
    pub fn clear(&self) -> bool {
        if !self.path.exists() {
            info!(path = ?self.path, "No sensor cache to clear");
            return false;
        }
        self.backup();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = ?self.path, "Sensor cache cleared");
                true
            }
            Err(e) => {
                error!(path = ?self.path, error = %e, "Failed to clear sensor cache");
                false
            }
        }
    }

    pub fn statistics(&self) -> CacheStatistics {
        let file_size = fs::metadata(&self.path).map(|m| m.len()).ok();
        let cache = self.load();
        CacheStatistics {
            exists: file_size.is_some(),
            file_size: file_size.unwrap_or(0),
            version: cache.version().to_string(),
            sensor_count: cache.entry_count(),
            created_timestamp: cache.created_timestamp().unwrap_or(0.0),
            last_updated: cache.last_updated().unwrap_or(0.0),
            age_days: cache.age_days(),
        }
    }
}
