//! # Refresh Controller
//!
//! Fetches the registry document from the remote source when the cached copy
//! is stale, then replaces and persists it.

use std::collections::HashSet;

use bridge_traits::http::{HttpClient, HttpRequest};
use core_runtime::events::CatalogEvent;
use core_runtime::logging::redact_locator;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use crate::catalog::KeyCatalog;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::record::Registry;

/// Result of a successful [`KeyCatalog::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cached registry still within its validity window; nothing fetched
    UpToDate,
    Refreshed {
        entries: usize,
        /// Records lost to the registry capacity
        dropped: usize,
    },
}

impl KeyCatalog {
    /// Refresh the registry from the remote source if it is stale.
    ///
    /// The new registry replaces the old one as soon as it parses. Failing to
    /// persist it is logged and does not undo the replacement.
    ///
    /// # Errors
    ///
    /// - `NetworkUnavailable` if there is no connectivity
    /// - `Http` if the request fails or the status is not 200
    /// - `ResponseTooLarge` if the body exceeds the configured limit
    /// - `Parse` if the body is not a registry document
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<RefreshOutcome> {
        if !self.network.is_connected().await {
            return Err(CatalogError::NetworkUnavailable);
        }

        if !self.is_stale() {
            debug!(mark = ?self.store.mark(), "Key registry is fresh; skipping refresh");
            return Ok(RefreshOutcome::UpToDate);
        }

        let body = fetch_source(self.http.as_ref(), &self.config).await?;
        let decoded = Registry::decode(&body, self.config.max_registry_entries)?;
        let entries = decoded.registry.len();

        self.store.replace(decoded.registry);
        match self.store.save(self.store.registry()).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!("Refresh will not survive a reboot without its mark"),
            Err(e) => warn!(error = %e, "Refreshed registry could not be persisted"),
        }
        self.store.set_mark(Some(self.clock.millis()));

        let live: HashSet<&str> = self
            .store
            .registry()
            .iter()
            .map(|record| record.locator.as_str())
            .chain(self.queue.pending_locators())
            .collect();
        self.codec.retain_locators(&live).await;

        info!(entries, dropped = decoded.dropped, "Key registry refreshed");
        self.emit(CatalogEvent::Refreshed { entries });

        Ok(RefreshOutcome::Refreshed {
            entries,
            dropped: decoded.dropped,
        })
    }
}

async fn fetch_source(http: &dyn HttpClient, config: &CatalogConfig) -> Result<Vec<u8>> {
    let url = &config.source_url;
    info!(url = %redact_locator(url), "Fetching key registry");

    let request = HttpRequest::get(url.as_str())
        .user_agent(config.user_agent.as_str())
        .header("Content-Type", "application/json");

    let response = http
        .open_stream(request)
        .await
        .map_err(|e| CatalogError::Http {
            status: None,
            message: e.to_string(),
        })?;

    if response.status != 200 {
        return Err(CatalogError::Http {
            status: Some(response.status),
            message: "registry fetch failed".to_string(),
        });
    }

    let limit = config.max_response_bytes;
    if let Some(length) = response.content_length {
        if length > limit as u64 {
            return Err(CatalogError::ResponseTooLarge {
                limit,
                actual: Some(length),
            });
        }
    }

    // One byte past the limit is enough to detect an oversized body
    let capacity = response
        .content_length
        .map_or(limit, |length| length as usize);
    let mut body = Vec::with_capacity(capacity);
    response
        .body
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .await
        .map_err(|e| CatalogError::Http {
            status: Some(response.status),
            message: format!("body read failed: {}", e),
        })?;

    if body.len() > limit {
        return Err(CatalogError::ResponseTooLarge {
            limit,
            actual: None,
        });
    }

    debug!(bytes = body.len(), "Key registry received");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::testing::{
        ManualClock, MemoryFileSystem, StaticHttpClient, StaticNetworkMonitor, StaticRoute,
    };
    use core_runtime::config::CoreConfig;
    use core_runtime::events::{CoreEvent, EventBus};
    use std::sync::Arc;

    const SOURCE: &str = "https://keys.example.com/registry.json";

    struct Harness {
        fs: MemoryFileSystem,
        http: StaticHttpClient,
        network: StaticNetworkMonitor,
        clock: ManualClock,
        catalog: KeyCatalog,
    }

    fn harness(config: CatalogConfig) -> Harness {
        let fs = MemoryFileSystem::new();
        let http = StaticHttpClient::new();
        let network = StaticNetworkMonitor::new(true);
        let clock = ManualClock::new(1_000);
        let core = CoreConfig::builder()
            .file_system(Arc::new(fs.clone()))
            .http_client(Arc::new(http.clone()))
            .network_monitor(Arc::new(network.clone()))
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        let catalog = KeyCatalog::new(config.with_source_url(SOURCE), &core).unwrap();
        Harness {
            fs,
            http,
            network,
            clock,
            catalog,
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_and_persists() {
        let mut h = harness(CatalogConfig::default());
        h.http.set_route(
            SOURCE,
            StaticRoute::ok(&br#"{"7": {"description": "Seven", "type": "audio", "path": "/audio/7.mp3"}}"#[..]),
        );

        let outcome = h.catalog.refresh().await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                entries: 1,
                dropped: 0
            }
        );
        assert!(h.catalog.contains("7"));
        assert_eq!(h.catalog.mark(), Some(1_000));
        assert!(h.fs.contains("/audio_files.json"));
        assert_eq!(h.fs.file("/known_cache_time.txt"), Some(b"1000".to_vec()));

        let requests = h.http.requests();
        let request = &requests[0];
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_offline_refresh_fails_fast() {
        let mut h = harness(CatalogConfig::default());
        h.network.set_connected(false);

        assert!(matches!(
            h.catalog.refresh().await,
            Err(CatalogError::NetworkUnavailable)
        ));
        assert_eq!(h.http.request_count(), 0);
    }

    #[tokio::test]
    async fn test_http_status_is_reported() {
        let mut h = harness(CatalogConfig::default());
        h.http.set_route(SOURCE, StaticRoute::status(503));

        assert!(matches!(
            h.catalog.refresh().await,
            Err(CatalogError::Http {
                status: Some(503),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_advertised_size_is_checked_before_reading() {
        let mut h = harness(CatalogConfig::default().with_max_response_bytes(16));
        h.http
            .set_route(SOURCE, StaticRoute::truncated(&b"{}"[..], 10_000));

        assert!(matches!(
            h.catalog.refresh().await,
            Err(CatalogError::ResponseTooLarge {
                limit: 16,
                actual: Some(10_000)
            })
        ));
    }

    #[tokio::test]
    async fn test_unadvertised_oversized_body_is_rejected() {
        let mut h = harness(CatalogConfig::default().with_max_response_bytes(16));
        h.http.set_route(
            SOURCE,
            StaticRoute::chunked(&br#"{"1": {}, "2": {}, "3": {}}"#[..]),
        );

        assert!(matches!(
            h.catalog.refresh().await,
            Err(CatalogError::ResponseTooLarge { actual: None, .. })
        ));
        assert!(h.catalog.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_old_registry() {
        let mut h = harness(CatalogConfig::default());
        h.http.set_route(SOURCE, StaticRoute::ok(&b"{\"1\": {}}"[..]));
        h.catalog.refresh().await.unwrap();

        h.clock.advance(CatalogConfig::default().validity_millis());
        h.clock.advance(1);
        h.http.set_route(SOURCE, StaticRoute::ok(&b"not json"[..]));

        assert!(matches!(
            h.catalog.refresh().await,
            Err(CatalogError::Parse(_))
        ));
        assert!(h.catalog.contains("1"));
    }

    #[tokio::test]
    async fn test_overflow_is_dropped() {
        let mut h = harness(CatalogConfig::default().with_max_registry_entries(2));
        h.http.set_route(
            SOURCE,
            StaticRoute::ok(&br#"{"1": {}, "2": {}, "3": {}}"#[..]),
        );

        assert_eq!(
            h.catalog.refresh().await.unwrap(),
            RefreshOutcome::Refreshed {
                entries: 2,
                dropped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_new_registry() {
        let mut h = harness(CatalogConfig::default());
        h.fs.fail_writes_to("/audio_files.json");
        h.http.set_route(SOURCE, StaticRoute::ok(&b"{\"1\": {}}"[..]));

        h.catalog.refresh().await.unwrap();
        assert!(h.catalog.contains("1"));
        assert!(!h.catalog.is_stale());

        // Second refresh within the window does not refetch
        assert_eq!(h.catalog.refresh().await.unwrap(), RefreshOutcome::UpToDate);
        assert_eq!(h.http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_event() {
        let bus = EventBus::new(4);
        let mut events = bus.subscribe();
        let mut h = harness(CatalogConfig::default());
        h.catalog = h.catalog.with_event_bus(bus);
        h.http.set_route(SOURCE, StaticRoute::ok(&b"{\"1\": {}}"[..]));

        h.catalog.refresh().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Catalog(CatalogEvent::Refreshed { entries: 1 })
        );
    }
}
