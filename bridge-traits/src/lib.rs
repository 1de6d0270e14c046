//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the key catalog core and the
//! device it runs on. Each trait represents a capability the core requires but
//! that is implemented differently per host (desktop simulator, embedded board
//! with an SD card and a WiFi radio, test harness).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Streaming HTTP GET with status and content length
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Block storage (SD card, local directory)
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity detection
//!
//! ### Utilities
//! - [`MonotonicClock`](time::MonotonicClock) - Wrapping millisecond uptime clock
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Errors
//!
//! Adapters convert host failures into [`BridgeError`](error::BridgeError)
//! and name the path or URL involved. A bridge that is absent at startup is
//! reported by `core_runtime::config::CoreConfigBuilder::build` as
//! `CapabilityMissing`, never as a panic deeper in the catalog.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared behind
//! `Arc` between the catalog and the host loop.
//!
//! ## Testing
//!
//! Enable the `test-utils` feature to get in-memory fakes for every bridge
//! (see [`testing`]).

pub mod error;
pub mod http;
pub mod network;
pub mod storage;
pub mod time;

#[cfg(feature = "test-utils")]
pub mod testing;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, StreamingResponse};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{LogEntry, LogLevel, LoggerSink, MonotonicClock};
