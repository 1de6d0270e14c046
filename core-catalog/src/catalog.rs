//! # Key Catalog
//!
//! The single owned context tying together the key registry, the locator
//! codec and the download queue. Every operation takes `&mut self`, so the
//! exclusive borrow is the only synchronization needed.

use std::path::Path;
use std::sync::Arc;

use bridge_traits::http::HttpClient;
use bridge_traits::network::NetworkMonitor;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::MonotonicClock;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use tracing::{debug, info, instrument, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::locator::LocatorCodec;
use crate::queue::DownloadQueue;
use crate::record::KeyRecord;
use crate::registry::{self, LoadedRegistry, RegistryStore};

/// Key registry, locator codec and download queue for one device.
pub struct KeyCatalog {
    pub(crate) config: CatalogConfig,
    pub(crate) store: RegistryStore,
    pub(crate) codec: LocatorCodec,
    pub(crate) queue: DownloadQueue,
    pub(crate) fs: Arc<dyn FileSystemAccess>,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) network: Arc<dyn NetworkMonitor>,
    pub(crate) clock: Arc<dyn MonotonicClock>,
    pub(crate) events: Option<EventBus>,
    last_idle_poll: Option<u32>,
}

impl KeyCatalog {
    /// Create an empty catalog wired to the bridges in `core`.
    ///
    /// Nothing is read from storage until [`KeyCatalog::initialize`].
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn new(config: CatalogConfig, core: &CoreConfig) -> Result<Self> {
        config.validate()?;

        let fs = Arc::clone(&core.file_system);
        let http = Arc::clone(&core.http_client);
        let network = Arc::clone(&core.network_monitor);
        let clock = Arc::clone(&core.clock);

        Ok(Self {
            store: RegistryStore::new(Arc::clone(&fs), Arc::clone(&clock), &config),
            codec: LocatorCodec::new(Arc::clone(&fs), &config),
            queue: DownloadQueue::new(
                &config,
                Arc::clone(&fs),
                Arc::clone(&http),
                Arc::clone(&network),
            ),
            config,
            fs,
            http,
            network,
            clock,
            events: None,
            last_idle_poll: None,
        })
    }

    /// Publish catalog and download events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.queue.set_event_bus(bus.clone());
        self.events = Some(bus);
        self
    }

    /// Load the cached registry and the locator index at boot.
    ///
    /// Returns `Ok(None)` when nothing has been cached yet.
    ///
    /// # Errors
    ///
    /// `Storage` or `Parse` if the cached registry cannot be read.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<Option<LoadedRegistry>> {
        if let Err(e) = self.codec.load_index().await {
            warn!(error = %e, "Locator index unavailable; starting without claims");
        }

        let loaded = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(CatalogError::NotFound(path)) => {
                info!(path = %path, "No cached key registry");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let stale = self.is_stale();
        if stale {
            info!(entries = loaded.entries, "Cached key registry is stale");
        } else {
            debug!(entries = loaded.entries, "Cached key registry is fresh");
        }

        self.emit(CatalogEvent::Loaded {
            entries: loaded.entries,
            stale,
        });
        Ok(Some(loaded))
    }

    /// Whether the registry should be refreshed.
    pub fn is_stale(&self) -> bool {
        registry::is_stale(
            self.store.registry().len(),
            self.store.mark(),
            self.clock.millis(),
            self.config.validity_millis(),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.registry().contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&KeyRecord> {
        self.store.registry().get(key)
    }

    pub fn len(&self) -> usize {
        self.store.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.registry().is_empty()
    }

    /// Records in source order.
    pub fn records(&self) -> &[KeyRecord] {
        self.store.registry().records()
    }

    /// Clock reading of the last successful refresh.
    pub fn mark(&self) -> Option<u32> {
        self.store.mark()
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut DownloadQueue {
        &mut self.queue
    }

    pub fn audio_directory(&self) -> &Path {
        self.codec.audio_directory()
    }

    /// Log every known key.
    pub fn log_registry(&self) {
        info!(
            entries = self.len(),
            capacity = self.config.max_registry_entries,
            "Known keys"
        );
        for record in self.records() {
            info!(
                key = %record.key,
                kind = %record.kind,
                description = %record.description,
                "Key"
            );
        }
    }

    /// Forget every key and remove the cached registry and mark.
    ///
    /// Downloaded audio and queued downloads are left alone.
    #[instrument(skip(self))]
    pub async fn clear_keys(&mut self) -> Result<()> {
        self.store.clear().await?;
        info!("Key registry cleared");
        self.emit(CatalogEvent::Cleared);
        Ok(())
    }

    /// Drive the download queue from the host loop.
    ///
    /// While a transfer is open every call moves it forward. Otherwise the
    /// queue is only checked once per poll interval, measured on the
    /// wrapping clock.
    pub async fn poll_downloads(&mut self) -> Result<bool> {
        if !self.queue.is_transferring() {
            let now = self.clock.millis();
            if let Some(last) = self.last_idle_poll {
                if now.wrapping_sub(last) < self.config.poll_interval_millis() {
                    return Ok(false);
                }
            }
            self.last_idle_poll = Some(now);
        }

        self.queue.drive_one_step().await
    }

    pub(crate) fn emit(&self, event: CatalogEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Catalog(event)).ok();
        }
    }
}

impl std::fmt::Debug for KeyCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCatalog")
            .field("store", &self.store)
            .field("codec", &self.codec)
            .field("queue", &self.queue)
            .finish()
    }
}
