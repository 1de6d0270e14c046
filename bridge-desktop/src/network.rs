//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Desktop network monitor implementation
///
/// Probes reachability with a TCP connect to a well-known endpoint. The last
/// result is cached so callers can inspect it without probing again.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    cached_info: Arc<Mutex<Option<NetworkInfo>>>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor probing a public DNS resolver
    pub fn new() -> Self {
        Self::with_probe("8.8.8.8:53", Duration::from_secs(5))
    }

    /// Create a monitor probing a custom `host:port`
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: timeout,
            cached_info: Arc::new(Mutex::new(None)),
        }
    }

    /// Result of the most recent probe, if any
    pub async fn last_known(&self) -> Option<NetworkInfo> {
        self.cached_info.lock().await.clone()
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            // Desktop hosts can't tell WiFi from Ethernet without platform APIs
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
        };

        *self.cached_info.lock().await = Some(info.clone());
        debug!(status = ?status, "Network info updated");

        Ok(info)
    }
}
