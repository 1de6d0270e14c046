//! # Registry Store
//!
//! Owns the in-memory key registry and its staleness mark, and persists both
//! to storage.
//!
//! The registry file holds the JSON document described in [`crate::record`];
//! the staleness file holds the clock reading of the last successful refresh
//! as a single decimal integer.

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::MonotonicClock;
use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::record::Registry;

/// Milliseconds elapsed from `mark` to `now` on a wrapping 32-bit clock.
///
/// A reading smaller than the mark means the counter wrapped once.
pub fn clock_age(mark: u32, now: u32) -> u32 {
    if now < mark {
        (u32::MAX - mark) + now + 1
    } else {
        now - mark
    }
}

/// Whether a registry needs refreshing.
///
/// Empty registries and unknown marks are always stale.
pub fn is_stale(registry_len: usize, mark: Option<u32>, now: u32, validity_millis: u32) -> bool {
    if registry_len == 0 {
        return true;
    }
    match mark {
        None => true,
        Some(mark) => clock_age(mark, now) > validity_millis,
    }
}

/// Registry read back from storage.
#[derive(Debug)]
pub struct LoadedRegistry {
    pub entries: usize,
    /// `None` when the staleness file is missing or unreadable
    pub mark: Option<u32>,
    /// Records lost to the capacity bound
    pub dropped: usize,
}

/// In-memory registry plus its on-disk copy.
pub struct RegistryStore {
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn MonotonicClock>,
    registry_file: PathBuf,
    staleness_file: PathBuf,
    registry: Registry,
    mark: Option<u32>,
}

impl RegistryStore {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn MonotonicClock>,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            fs,
            clock,
            registry_file: config.registry_file.clone(),
            staleness_file: config.staleness_file.clone(),
            registry: Registry::new(config.max_registry_entries),
            mark: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn mark(&self) -> Option<u32> {
        self.mark
    }

    pub fn set_mark(&mut self, mark: Option<u32>) {
        self.mark = mark;
    }

    /// Swap in a new registry; the previous one is dropped.
    pub fn replace(&mut self, registry: Registry) {
        debug!(
            old_entries = self.registry.len(),
            new_entries = registry.len(),
            "Replacing key registry"
        );
        self.registry = registry;
    }

    /// Read the cached registry and staleness mark from storage.
    ///
    /// On success the in-memory registry and mark are replaced.
    ///
    /// # Errors
    ///
    /// - `Storage` if the medium is unavailable or the read fails
    /// - `NotFound` if no registry has been cached yet
    /// - `Parse` if the cached document is malformed
    pub async fn load(&mut self) -> Result<LoadedRegistry> {
        if !self.fs.is_available().await {
            return Err(CatalogError::Storage("storage not available".to_string()));
        }

        let bytes = match self.fs.read_file(&self.registry_file).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                return Err(CatalogError::NotFound(
                    self.registry_file.display().to_string(),
                ))
            }
            Err(e) => return Err(CatalogError::Storage(e.to_string())),
        };

        let decoded = Registry::decode(&bytes, self.registry.capacity())?;
        let mark = self.read_mark().await;

        let loaded = LoadedRegistry {
            entries: decoded.registry.len(),
            mark,
            dropped: decoded.dropped,
        };

        self.registry = decoded.registry;
        self.mark = mark;

        info!(
            entries = loaded.entries,
            has_mark = mark.is_some(),
            "Key registry loaded from storage"
        );
        Ok(loaded)
    }

    async fn read_mark(&self) -> Option<u32> {
        let bytes = match self.fs.read_file(&self.staleness_file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if !e.is_not_found() {
                    warn!(error = %e, "Failed to read staleness mark");
                }
                return None;
            }
        };

        let parsed = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.trim().parse::<u32>().ok());
        if parsed.is_none() {
            warn!("Ignoring malformed staleness mark");
        }
        parsed
    }

    /// Write `registry` to storage, then the current clock reading as mark.
    ///
    /// Returns the written mark, or `None` if only the mark write failed.
    pub async fn save(&self, registry: &Registry) -> Result<Option<u32>> {
        let bytes = registry.encode()?;
        self.fs
            .write_file(&self.registry_file, Bytes::from(bytes))
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;

        let now = self.clock.millis();
        match self
            .fs
            .write_file(&self.staleness_file, Bytes::from(now.to_string()))
            .await
        {
            Ok(()) => {
                debug!(entries = registry.len(), mark = now, "Key registry saved");
                Ok(Some(now))
            }
            Err(e) => {
                warn!(error = %e, "Registry saved but staleness mark was not");
                Ok(None)
            }
        }
    }

    /// Drop the registry and mark, and remove both files.
    pub async fn clear(&mut self) -> Result<()> {
        self.registry = Registry::new(self.registry.capacity());
        self.mark = None;

        for path in [&self.registry_file, &self.staleness_file] {
            match self.fs.delete_file(path).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(CatalogError::Storage(e.to_string())),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RegistryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryStore")
            .field("registry_file", &self.registry_file)
            .field("entries", &self.registry.len())
            .field("mark", &self.mark)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{KeyKind, KeyRecord};
    use bridge_traits::testing::{ManualClock, MemoryFileSystem};

    fn store(fs: &MemoryFileSystem, clock: &ManualClock) -> RegistryStore {
        RegistryStore::new(
            Arc::new(fs.clone()),
            Arc::new(clock.clone()),
            &CatalogConfig::default(),
        )
    }

    fn sample_registry() -> Registry {
        let mut registry = Registry::new(50);
        registry
            .insert(KeyRecord::new("123", "Intro", KeyKind::Audio, "/audio/intro.mp3"))
            .unwrap();
        registry
            .insert(KeyRecord::new("911", "Operator", KeyKind::Service, ""))
            .unwrap();
        registry
    }

    #[test]
    fn test_clock_age_without_wrap() {
        assert_eq!(clock_age(100, 350), 250);
        assert_eq!(clock_age(7, 7), 0);
    }

    #[test]
    fn test_clock_age_across_wrap() {
        assert_eq!(clock_age(u32::MAX - 9, 5), 15);
        assert_eq!(clock_age(u32::MAX, 0), 1);
    }

    #[test]
    fn test_staleness_rules() {
        assert!(is_stale(0, Some(10), 10, 1000));
        assert!(is_stale(3, None, 10, 1000));
        assert!(!is_stale(3, Some(10), 1010, 1000));
        assert!(is_stale(3, Some(10), 1011, 1000));
        assert!(!is_stale(3, Some(u32::MAX - 9), 5, 1000));
    }

    #[tokio::test]
    async fn test_load_missing_registry_is_not_found() {
        let fs = MemoryFileSystem::new();
        let mut store = store(&fs, &ManualClock::new(0));

        assert!(matches!(store.load().await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_unavailable_storage() {
        let fs = MemoryFileSystem::new();
        fs.set_available(false);
        let mut store = store(&fs, &ManualClock::new(0));

        assert!(matches!(store.load().await, Err(CatalogError::Storage(_))));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let fs = MemoryFileSystem::new();
        let clock = ManualClock::new(4242);
        let store_a = store(&fs, &clock);

        assert_eq!(store_a.save(&sample_registry()).await.unwrap(), Some(4242));
        assert_eq!(fs.file("/known_cache_time.txt"), Some(b"4242".to_vec()));

        let mut store_b = store(&fs, &clock);
        let loaded = store_b.load().await.unwrap();
        assert_eq!(loaded.entries, 2);
        assert_eq!(loaded.mark, Some(4242));
        assert_eq!(store_b.registry(), &sample_registry());
    }

    #[tokio::test]
    async fn test_missing_or_garbled_mark_is_unknown_age() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/audio_files.json", br#"{"1": {"type": "audio"}}"#.to_vec());

        let mut store = store(&fs, &ManualClock::new(0));
        assert_eq!(store.load().await.unwrap().mark, None);

        fs.insert_file("/known_cache_time.txt", b"soon".to_vec());
        assert_eq!(store.load().await.unwrap().mark, None);
    }

    #[tokio::test]
    async fn test_mark_write_failure_is_tolerated() {
        let fs = MemoryFileSystem::new();
        fs.fail_writes_to("/known_cache_time.txt");
        let store = store(&fs, &ManualClock::new(9));

        assert_eq!(store.save(&sample_registry()).await.unwrap(), None);
        assert!(fs.contains("/audio_files.json"));
    }

    #[tokio::test]
    async fn test_registry_write_failure_is_storage_error() {
        let fs = MemoryFileSystem::new();
        fs.fail_writes_to("/audio_files.json");
        let store = store(&fs, &ManualClock::new(9));

        assert!(matches!(
            store.save(&sample_registry()).await,
            Err(CatalogError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_removes_files() {
        let fs = MemoryFileSystem::new();
        let clock = ManualClock::new(1);
        let mut store = store(&fs, &clock);
        store.save(&sample_registry()).await.unwrap();
        store.load().await.unwrap();

        store.clear().await.unwrap();

        assert!(store.registry().is_empty());
        assert_eq!(store.mark(), None);
        assert!(!fs.contains("/audio_files.json"));
        assert!(!fs.contains("/known_cache_time.txt"));

        // Clearing twice is fine
        store.clear().await.unwrap();
    }
}
