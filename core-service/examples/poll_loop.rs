//! Desktop simulation of the device loop.
//!
//! ```text
//! cargo run -p core-service --example poll_loop -- ./card https://example.com/keys.json 123 456
//! ```
//!
//! Storage lives under the first argument. Each remaining key is dialled once
//! per second until it resolves or fails for good; the loop ends when nothing
//! is left to fetch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_traits::time::{ConsoleLogger, LogLevel};
use core_runtime::events::EventSeverity;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap_desktop, CatalogConfig, ResolveOutcome};
use tokio::time::Instant;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Warnings are mirrored the way the device echoes them on its serial port
    let logging = LoggingConfig::default()
        .with_logger_sink(Arc::new(ConsoleLogger::new(LogLevel::Warn)));
    init_logging(logging).context("logging setup")?;

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| "./card".to_string());
    let source = args
        .next()
        .context("usage: poll_loop <storage-root> <registry-url> [keys...]")?;
    let mut pending: Vec<String> = args.collect();

    let mut core = bootstrap_desktop(root, CatalogConfig::default().with_source_url(source))?;
    let mut events = core.subscribe();
    core.initialize().await;
    core.catalog().log_registry();

    let mut next_dial = Instant::now();
    loop {
        core.tick().await?;
        while let Ok(event) = events.try_recv() {
            match event.severity() {
                EventSeverity::Warning | EventSeverity::Error => {
                    warn!(event = ?event, "{}", event.description())
                }
                _ => info!(event = ?event, "{}", event.description()),
            }
        }

        if Instant::now() >= next_dial {
            next_dial += Duration::from_secs(1);
            let mut still_pending = Vec::new();
            for key in pending.drain(..) {
                match core.resolve(&key).await {
                    ResolveOutcome::LocalPath(path) => {
                        info!(key = %key, path = %path.display(), "Ready to play");
                    }
                    ResolveOutcome::NotAudio(kind) => {
                        info!(key = %key, kind = %kind, "Not an audio key");
                    }
                    ResolveOutcome::Unavailable(reason) if reason.is_retryable() => {
                        info!(key = %key, reason = %reason, "Not yet available");
                        still_pending.push(key);
                    }
                    ResolveOutcome::Unavailable(reason) => {
                        warn!(key = %key, reason = %reason, "Giving up on key");
                    }
                }
            }
            pending = still_pending;
        }

        if pending.is_empty() && core.catalog().queue().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    core.catalog().queue().log_summary();
    Ok(())
}
