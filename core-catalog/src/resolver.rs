//! # Cache Resolver
//!
//! Turns a dialled key into something playable.
//!
//! Remote audio that is not on storage yet is queued for download and
//! reported as unavailable; the same key resolves to the local copy once the
//! queue has finished with it.

use std::fmt;
use std::path::{Path, PathBuf};

use core_runtime::logging::redact_locator;
use tracing::{debug, info, instrument, warn};

use crate::catalog::KeyCatalog;
use crate::error::CatalogError;
use crate::record::KeyKind;

/// Result of resolving a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Audio ready on local storage
    LocalPath(PathBuf),
    /// Key exists but does not play audio
    NotAudio(KeyKind),
    Unavailable(UnavailableReason),
}

impl ResolveOutcome {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            ResolveOutcome::LocalPath(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, ResolveOutcome::LocalPath(_))
    }
}

/// Why a key could not be resolved to a local path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    UnknownKey,
    /// Audio key with an empty locator
    MissingLocator,
    /// Download queued or already in flight
    Queued,
    QueueFull,
    LocatorTooLong,
    StorageUnavailable,
    /// No usable local path could be derived or probed
    PathUnavailable,
}

impl UnavailableReason {
    /// Whether dialling the key again later can succeed without a registry
    /// change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UnavailableReason::Queued
                | UnavailableReason::QueueFull
                | UnavailableReason::StorageUnavailable
        )
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnavailableReason::UnknownKey => "unknown key",
            UnavailableReason::MissingLocator => "no locator",
            UnavailableReason::Queued => "download pending",
            UnavailableReason::QueueFull => "download queue full",
            UnavailableReason::LocatorTooLong => "locator too long",
            UnavailableReason::StorageUnavailable => "storage unavailable",
            UnavailableReason::PathUnavailable => "no local path",
        };
        f.write_str(text)
    }
}

/// `http://` and `https://` locators are fetched; anything else is a local path.
pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

impl KeyCatalog {
    /// Resolve `key` to a playable local path.
    ///
    /// Remote audio missing from storage is queued for download (repeated
    /// lookups do not queue it twice) and reported as `Unavailable(Queued)`.
    #[instrument(skip(self))]
    pub async fn resolve(&mut self, key: &str) -> ResolveOutcome {
        let Some(record) = self.store.registry().get(key) else {
            debug!("Unknown key");
            return ResolveOutcome::Unavailable(UnavailableReason::UnknownKey);
        };

        if record.kind != KeyKind::Audio {
            match &record.kind {
                KeyKind::Service => info!(description = %record.description, "Service key"),
                KeyKind::Shortcut => info!(description = %record.description, "Shortcut key"),
                KeyKind::Link => info!(
                    description = %record.description,
                    locator = %redact_locator(&record.locator),
                    "Link key"
                ),
                other => debug!(kind = %other, "Key of unrecognised type"),
            }
            return ResolveOutcome::NotAudio(record.kind.clone());
        }

        if record.locator.is_empty() {
            warn!(description = %record.description, "Audio key has no locator");
            return ResolveOutcome::Unavailable(UnavailableReason::MissingLocator);
        }

        if !is_remote(&record.locator) {
            return ResolveOutcome::LocalPath(PathBuf::from(&record.locator));
        }

        let locator = record.locator.clone();
        let label = record.description.clone();
        self.resolve_remote(&locator, &label).await
    }

    async fn resolve_remote(&mut self, locator: &str, label: &str) -> ResolveOutcome {
        // Checked before mapping so no name is claimed for it
        if locator.len() > self.config.max_locator_len {
            warn!(
                locator = %redact_locator(locator),
                len = locator.len(),
                max = self.config.max_locator_len,
                "Locator too long to download"
            );
            return ResolveOutcome::Unavailable(UnavailableReason::LocatorTooLong);
        }

        if !self.fs.is_available().await {
            debug!("Storage unavailable");
            return ResolveOutcome::Unavailable(UnavailableReason::StorageUnavailable);
        }

        let path = match self.codec.map(locator).await {
            Ok(path) => path,
            Err(e) => {
                warn!(locator = %redact_locator(locator), error = %e, "No local path for locator");
                return ResolveOutcome::Unavailable(UnavailableReason::PathUnavailable);
            }
        };

        let exists = self.fs.exists(&path).await;
        match exists {
            Ok(true) => return ResolveOutcome::LocalPath(path),
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to probe local copy");
                return ResolveOutcome::Unavailable(UnavailableReason::PathUnavailable);
            }
        }

        match self.queue.enqueue(locator, path, label) {
            Ok(()) => ResolveOutcome::Unavailable(UnavailableReason::Queued),
            Err(CatalogError::QueueFull { .. }) => {
                ResolveOutcome::Unavailable(UnavailableReason::QueueFull)
            }
            Err(CatalogError::LocatorTooLong { .. }) => {
                ResolveOutcome::Unavailable(UnavailableReason::LocatorTooLong)
            }
            Err(e) => {
                warn!(error = %e, "Failed to queue download");
                ResolveOutcome::Unavailable(UnavailableReason::PathUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use bridge_traits::testing::{
        ManualClock, MemoryFileSystem, StaticHttpClient, StaticNetworkMonitor,
    };
    use core_runtime::config::CoreConfig;
    use std::sync::Arc;

    const REGISTRY: &[u8] = br#"{
        "100": {"description": "Local intro", "type": "audio", "path": "/audio/intro.mp3"},
        "200": {"description": "Remote", "type": "audio", "path": "https://cdn.example.com/b.mp3"},
        "300": {"description": "Operator", "type": "service"},
        "400": {"description": "Blank", "type": "audio"},
        "500": {"description": "Site", "type": "url", "path": "https://example.com"}
    }"#;

    async fn catalog(fs: &MemoryFileSystem) -> KeyCatalog {
        catalog_with(fs, REGISTRY).await
    }

    async fn catalog_with(fs: &MemoryFileSystem, registry: &[u8]) -> KeyCatalog {
        fs.insert_file("/audio_files.json", registry.to_vec());
        let core = CoreConfig::builder()
            .file_system(Arc::new(fs.clone()))
            .http_client(Arc::new(StaticHttpClient::new()))
            .network_monitor(Arc::new(StaticNetworkMonitor::new(false)))
            .clock(Arc::new(ManualClock::new(0)))
            .build()
            .unwrap();
        let mut catalog = KeyCatalog::new(CatalogConfig::default(), &core).unwrap();
        catalog.initialize().await.unwrap();
        catalog
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("http://x/a.mp3"));
        assert!(is_remote("https://x/a.mp3"));
        assert!(!is_remote("/audio/a.mp3"));
        assert!(!is_remote("ftp://x/a.mp3"));
    }

    #[test]
    fn test_retryable_reasons() {
        assert!(UnavailableReason::Queued.is_retryable());
        assert!(UnavailableReason::QueueFull.is_retryable());
        assert!(UnavailableReason::StorageUnavailable.is_retryable());
        assert!(!UnavailableReason::UnknownKey.is_retryable());
        assert!(!UnavailableReason::MissingLocator.is_retryable());
        assert!(!UnavailableReason::LocatorTooLong.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_and_non_audio_keys() {
        let fs = MemoryFileSystem::new();
        let mut catalog = catalog(&fs).await;

        assert_eq!(
            catalog.resolve("999").await,
            ResolveOutcome::Unavailable(UnavailableReason::UnknownKey)
        );
        assert_eq!(
            catalog.resolve("300").await,
            ResolveOutcome::NotAudio(KeyKind::Service)
        );
        assert_eq!(
            catalog.resolve("500").await,
            ResolveOutcome::NotAudio(KeyKind::Link)
        );
        assert_eq!(
            catalog.resolve("400").await,
            ResolveOutcome::Unavailable(UnavailableReason::MissingLocator)
        );
    }

    #[tokio::test]
    async fn test_local_locator_is_returned_verbatim() {
        let fs = MemoryFileSystem::new();
        let mut catalog = catalog(&fs).await;

        let outcome = catalog.resolve("100").await;
        assert_eq!(outcome.local_path(), Some(Path::new("/audio/intro.mp3")));
        assert!(catalog.queue().is_empty());
    }

    #[tokio::test]
    async fn test_remote_locator_is_queued_once() {
        let fs = MemoryFileSystem::new();
        let mut catalog = catalog(&fs).await;

        for _ in 0..3 {
            assert_eq!(
                catalog.resolve("200").await,
                ResolveOutcome::Unavailable(UnavailableReason::Queued)
            );
        }
        assert_eq!(catalog.queue().total_count(), 1);

        let snapshot = catalog.queue().snapshot();
        let task = &snapshot[0];
        assert_eq!(task.destination, PathBuf::from("/audio/b.mp3"));
        assert_eq!(task.label, "Remote");
    }

    #[tokio::test]
    async fn test_existing_download_resolves_locally() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/audio/b.mp3", b"mp3".to_vec());
        let mut catalog = catalog(&fs).await;

        assert_eq!(
            catalog.resolve("200").await,
            ResolveOutcome::LocalPath(PathBuf::from("/audio/b.mp3"))
        );
        assert!(catalog.queue().is_empty());
    }

    #[tokio::test]
    async fn test_unmounted_storage() {
        let fs = MemoryFileSystem::new();
        let mut catalog = catalog(&fs).await;
        fs.set_available(false);

        assert_eq!(
            catalog.resolve("200").await,
            ResolveOutcome::Unavailable(UnavailableReason::StorageUnavailable)
        );
    }

    #[tokio::test]
    async fn test_overlong_locator_claims_no_name() {
        let fs = MemoryFileSystem::new();
        let locator = format!("https://cdn.example.com/stream/{}", "a".repeat(300));
        let registry = format!(
            r#"{{"1": {{"description": "Long", "type": "audio", "path": "{}"}}}}"#,
            locator
        );
        let mut catalog = catalog_with(&fs, registry.as_bytes()).await;

        assert_eq!(
            catalog.resolve("1").await,
            ResolveOutcome::Unavailable(UnavailableReason::LocatorTooLong)
        );
        assert_eq!(catalog.codec.claimed_count(), 0);
        assert!(!fs.contains("/audio/.locator_index.json"));
        assert!(catalog.queue().is_empty());
    }

    #[tokio::test]
    async fn test_reserved_names_are_never_local() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/audio/.locator_index.json", b"{}".to_vec());
        let registry = br#"{
            "1": {"type": "audio", "path": "https://x/.locator_index.json"},
            "2": {"type": "audio", "path": "https://x/dir/."}
        }"#;
        let mut catalog = catalog_with(&fs, registry).await;

        for key in ["1", "2"] {
            assert_eq!(
                catalog.resolve(key).await,
                ResolveOutcome::Unavailable(UnavailableReason::Queued)
            );
        }

        for task in catalog.queue().snapshot() {
            let name = task.destination.file_name().and_then(|n| n.to_str());
            assert!(name.is_some_and(|n| n.starts_with("audio_")), "{:?}", name);
        }
    }
}
