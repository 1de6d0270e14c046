//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, storage,
//! network link, uptime clock) into the key catalog and exposes the two calls
//! a host loop needs: [`CoreService::resolve`] when a key is dialled and
//! [`CoreService::tick`] on every loop iteration. Desktop simulators typically
//! enable the `desktop-shims` feature and call [`bootstrap_desktop`]; embedded
//! hosts inject their own adapters through [`CoreConfig`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::network::NetworkMonitor;
use core_catalog::KeyCatalog;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use tracing::{debug, info, instrument, warn};

pub use core_catalog::{CatalogConfig, RefreshOutcome, ResolveOutcome, UnavailableReason};
pub use core_runtime::config::CoreConfig;

/// What a single [`CoreService::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Set when the tick saw the network come up and attempted a refresh
    pub refresh: Option<RefreshAttempt>,
    /// Whether the download queue did any work
    pub download_step: bool,
}

/// Outcome of a connectivity-triggered refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAttempt {
    Completed(RefreshOutcome),
    /// The refresh failed; the cached registry stays in use
    Failed,
}

/// Primary façade exposed to host applications.
pub struct CoreService {
    catalog: KeyCatalog,
    network: Arc<dyn NetworkMonitor>,
    events: EventBus,
    was_connected: bool,
}

impl CoreService {
    /// Create a new service from the provided bridges.
    ///
    /// # Errors
    ///
    /// Returns `Catalog(InvalidConfig)` if `catalog_config` fails validation.
    pub fn new(config: CoreConfig, catalog_config: CatalogConfig) -> Result<Self> {
        let events = EventBus::default();
        let catalog = KeyCatalog::new(catalog_config, &config)?.with_event_bus(events.clone());

        Ok(Self {
            catalog,
            network: Arc::clone(&config.network_monitor),
            events,
            was_connected: false,
        })
    }

    /// Load cached state from storage.
    ///
    /// A missing or unreadable cache is not fatal: the service starts with an
    /// empty registry and refreshes once the network comes up.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) {
        match self.catalog.initialize().await {
            Ok(Some(loaded)) => info!(
                entries = loaded.entries,
                dropped = loaded.dropped,
                "Core service ready"
            ),
            Ok(None) => info!("Core service ready without cached keys"),
            Err(e) => warn!(error = %e, "Cached keys unavailable; starting empty"),
        }
    }

    /// Advance background work by one step.
    ///
    /// Refreshes the registry when the network transitions from down to up,
    /// then gives the download queue a chance to run.
    ///
    /// # Errors
    ///
    /// Only errors from the download queue are returned; refresh failures
    /// are logged and reported in the [`TickReport`].
    pub async fn tick(&mut self) -> Result<TickReport> {
        let connected = self.network.is_connected().await;
        let mut report = TickReport::default();

        if connected && !self.was_connected {
            info!("Network up");
            report.refresh = Some(match self.catalog.refresh().await {
                Ok(outcome) => RefreshAttempt::Completed(outcome),
                Err(e) => {
                    warn!(error = %e, transient = e.is_transient(), "Registry refresh failed");
                    RefreshAttempt::Failed
                }
            });
        } else if !connected && self.was_connected {
            debug!("Network down");
        }
        self.was_connected = connected;

        report.download_step = self.catalog.poll_downloads().await?;
        Ok(report)
    }

    /// Resolve a dialled key.
    pub async fn resolve(&mut self, key: &str) -> ResolveOutcome {
        self.catalog.resolve(key).await
    }

    /// Subscribe to catalog and download events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut KeyCatalog {
        &mut self.catalog
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("catalog", &self.catalog)
            .field("was_connected", &self.was_connected)
            .finish()
    }
}

/// Convenience bootstrapper for desktop simulators.
///
/// Storage is rooted at `storage_root`, standing in for the SD card.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, CatalogConfig};
///
/// let mut core = bootstrap_desktop("/tmp/keypad-card", CatalogConfig::default())?;
/// core.initialize().await;
/// core.tick().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    storage_root: impl Into<std::path::PathBuf>,
    catalog_config: CatalogConfig,
) -> Result<CoreService> {
    let config = CoreConfig::builder().storage_root(storage_root).build()?;
    CoreService::new(config, catalog_config)
}
