//! # Key Catalog Module
//!
//! Resolves keypad keys to playable audio on a device with intermittent
//! connectivity and a small storage card.
//!
//! ## Overview
//!
//! This module manages:
//! - The registry of known keys, cached on storage with a staleness mark
//! - Refreshing that registry from a remote source when it goes stale
//! - Mapping remote audio locators to collision-free local paths
//! - Downloading missing audio in small steps driven by the host loop
//!
//! ## Components
//!
//! - **Records** (`record`): Key records and the bounded registry with its JSON codec
//! - **Locator Codec** (`locator`): Remote locator to local path mapping
//! - **Registry Store** (`registry`): Registry and staleness mark persistence
//! - **Download Queue** (`queue`): Bounded, deduplicated, chunked downloads
//! - **Cache Resolver** (`resolver`): Key to `LocalPath | NotAudio | Unavailable`
//! - **Refresh Controller** (`refresh`): Staleness-gated fetch, parse and persist
//! - **Key Catalog** (`catalog`): The owned context tying them together
//!
//! ## Usage
//!
//! ```ignore
//! use core_catalog::{CatalogConfig, KeyCatalog, ResolveOutcome};
//!
//! let mut catalog = KeyCatalog::new(CatalogConfig::default(), &core_config)?;
//! catalog.initialize().await?;
//! catalog.refresh().await.ok();
//!
//! loop {
//!     if let Some(key) = keypad.next_key() {
//!         if let ResolveOutcome::LocalPath(path) = catalog.resolve(&key).await {
//!             player.play(&path);
//!         }
//!     }
//!     catalog.poll_downloads().await?;
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod locator;
pub mod queue;
pub mod record;
pub mod refresh;
pub mod registry;
pub mod resolver;

pub use catalog::KeyCatalog;
pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use locator::LocatorCodec;
pub use queue::{DownloadQueue, DownloadTask, TaskSnapshot, TaskState, TaskStatus};
pub use record::{DecodedRegistry, KeyKind, KeyRecord, Registry};
pub use refresh::RefreshOutcome;
pub use registry::{clock_age, LoadedRegistry, RegistryStore};
pub use resolver::{ResolveOutcome, UnavailableReason};
