//! # Core Configuration Module
//!
//! Provides the bridge wiring for the keypad audio core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every platform bridge the catalog needs. It enforces
//! fail-fast validation so a missing capability is reported before the host
//! loop starts rather than on the first key press.
//!
//! ## Dependencies (with desktop defaults)
//!
//! - `HttpClient` - registry and audio downloads (desktop default: reqwest)
//! - `FileSystemAccess` - SD card storage (desktop default: tokio fs under a root directory)
//! - `NetworkMonitor` - connectivity checks (desktop default: TCP probe)
//! - `MonotonicClock` - wrapping uptime clock (desktop default: `Instant`)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically for any bridge that was not provided. Embedded hosts
//! build without the feature and must inject all four.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(SdCardFileSystem::mount()?))
//!     .network_monitor(Arc::new(WifiMonitor))
//!     .clock(Arc::new(TickClock))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, MonotonicClock, NetworkMonitor};
use std::path::PathBuf;
use std::sync::Arc;

/// Bridge wiring for the keypad audio core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for the registry source and audio payloads
    pub http_client: Arc<dyn HttpClient>,

    /// Persistent block storage
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Network connectivity monitor
    pub network_monitor: Arc<dyn NetworkMonitor>,

    /// Wrapping millisecond uptime clock
    pub clock: Arc<dyn MonotonicClock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("network_monitor", &"NetworkMonitor { ... }")
            .field("clock", &"MonotonicClock { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

fn capability_missing(capability: &str, purpose: &str, embedded_hint: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: ensure the 'desktop-shims' feature is enabled to use the default adapter. \
             Embedded: {}.",
            capability, purpose, embedded_hint
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "registry and audio downloads",
        "inject the HTTP client of the network stack",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(root: Option<PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs = match root {
        Some(root) => TokioFileSystem::with_root(root),
        None => TokioFileSystem::new(),
    };
    let fs: Arc<dyn FileSystemAccess> = Arc::new(fs);
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_root: Option<PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "the key registry and cached audio",
        "inject the SD card driver",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    let monitor: Arc<dyn NetworkMonitor> = Arc::new(DesktopNetworkMonitor::new());
    Ok(monitor)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Err(capability_missing(
        "NetworkMonitor",
        "gating refreshes and downloads on connectivity",
        "inject the WiFi link status",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_clock() -> Result<Arc<dyn MonotonicClock>> {
    use bridge_desktop::InstantClock;

    let clock: Arc<dyn MonotonicClock> = Arc::new(InstantClock::new());
    Ok(clock)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_clock() -> Result<Arc<dyn MonotonicClock>> {
    Err(capability_missing(
        "MonotonicClock",
        "cache staleness and download pacing",
        "inject the millisecond tick counter",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) once every bridge the platform
/// cannot default has been set.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn MonotonicClock>>,
    storage_root: Option<PathBuf>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the storage implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the network monitor implementation.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the uptime clock implementation.
    pub fn clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Directory backing the default desktop file system.
    ///
    /// Ignored when a file system is injected explicitly.
    pub fn storage_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityMissing` if a bridge was not provided and no
    /// platform default exists, or `Config` if the storage root is empty.
    pub fn build(self) -> Result<CoreConfig> {
        if let Some(root) = &self.storage_root {
            if root.as_os_str().is_empty() {
                return Err(Error::Config("Storage root cannot be empty".to_string()));
            }
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(self.storage_root)?,
        };

        let network_monitor = match self.network_monitor {
            Some(monitor) => monitor,
            None => provide_default_network_monitor()?,
        };

        let clock = match self.clock {
            Some(clock) => clock,
            None => provide_default_clock()?,
        };

        Ok(CoreConfig {
            http_client,
            file_system,
            network_monitor,
            clock,
        })
    }
}
