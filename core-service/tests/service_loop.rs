use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::testing::{
    ManualClock, MemoryFileSystem, StaticHttpClient, StaticNetworkMonitor, StaticRoute,
};
use core_runtime::events::{CatalogEvent, CoreEvent, DownloadEvent};
use core_service::{
    CatalogConfig, CoreConfig, CoreError, CoreService, RefreshAttempt, RefreshOutcome,
    ResolveOutcome, TickReport, UnavailableReason,
};

const SOURCE: &str = "https://keys.example.com/registry.json";
const SONG: &str = "https://cdn.example.com/song.mp3";

struct Host {
    fs: MemoryFileSystem,
    http: StaticHttpClient,
    network: StaticNetworkMonitor,
    clock: ManualClock,
    service: CoreService,
}

fn host(connected: bool) -> Host {
    let fs = MemoryFileSystem::new();
    let http = StaticHttpClient::new()
        .with_route(
            SOURCE,
            StaticRoute::ok(
                r#"{"200": {"description": "Song", "type": "audio", "path": "https://cdn.example.com/song.mp3"}}"#,
            ),
        )
        .with_route(SONG, StaticRoute::ok(vec![3u8; 1500]));
    let network = StaticNetworkMonitor::new(connected);
    let clock = ManualClock::new(0);

    let config = CoreConfig::builder()
        .file_system(Arc::new(fs.clone()))
        .http_client(Arc::new(http.clone()))
        .network_monitor(Arc::new(network.clone()))
        .clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let service =
        CoreService::new(config, CatalogConfig::default().with_source_url(SOURCE)).unwrap();

    Host {
        fs,
        http,
        network,
        clock,
        service,
    }
}

#[tokio::test]
async fn test_refresh_runs_on_network_transition() {
    let mut h = host(false);
    h.service.initialize().await;

    let report = h.service.tick().await.unwrap();
    assert_eq!(report, TickReport::default());
    assert_eq!(h.http.request_count(), 0);

    h.network.set_connected(true);
    let report = h.service.tick().await.unwrap();
    assert_eq!(
        report.refresh,
        Some(RefreshAttempt::Completed(RefreshOutcome::Refreshed {
            entries: 1,
            dropped: 0
        }))
    );

    // Staying connected does not refresh again
    let report = h.service.tick().await.unwrap();
    assert_eq!(report.refresh, None);

    // Reconnecting within the validity window finds the registry fresh
    h.network.set_connected(false);
    h.service.tick().await.unwrap();
    h.network.set_connected(true);
    let report = h.service.tick().await.unwrap();
    assert_eq!(
        report.refresh,
        Some(RefreshAttempt::Completed(RefreshOutcome::UpToDate))
    );
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test]
async fn test_failed_refresh_is_reported_not_raised() {
    let mut h = host(true);
    h.http.set_route(SOURCE, StaticRoute::status(500));

    let report = h.service.tick().await.unwrap();
    assert_eq!(report.refresh, Some(RefreshAttempt::Failed));
    assert!(h.service.catalog().is_empty());
}

#[tokio::test]
async fn test_key_becomes_playable_after_ticks() {
    let mut h = host(true);
    let mut events = h.service.subscribe();
    h.service.initialize().await;
    h.service.tick().await.unwrap();

    assert_eq!(
        h.service.resolve("200").await,
        ResolveOutcome::Unavailable(UnavailableReason::Queued)
    );

    for _ in 0..10 {
        h.clock.advance(1_000);
        h.service.tick().await.unwrap();
    }

    assert_eq!(
        h.service.resolve("200").await,
        ResolveOutcome::LocalPath(PathBuf::from("/audio/song.mp3"))
    );
    assert_eq!(h.fs.file("/audio/song.mp3"), Some(vec![3u8; 1500]));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&CoreEvent::Catalog(CatalogEvent::Refreshed { entries: 1 })));
    assert!(seen.iter().any(|event| matches!(
        event,
        CoreEvent::Download(DownloadEvent::Completed { bytes: 1500, .. })
    )));
}

#[test]
fn test_invalid_catalog_config_is_rejected() {
    let config = CoreConfig::builder()
        .file_system(Arc::new(MemoryFileSystem::new()))
        .http_client(Arc::new(StaticHttpClient::new()))
        .network_monitor(Arc::new(StaticNetworkMonitor::new(true)))
        .clock(Arc::new(ManualClock::new(0)))
        .build()
        .unwrap();

    let result = CoreService::new(config, CatalogConfig::default().with_max_queue_len(0));
    assert!(matches!(result, Err(CoreError::Catalog(_))));
}
