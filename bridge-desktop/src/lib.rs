//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux), used by the simulator and integration tests.
//!
//! ## Overview
//!
//! This crate provides implementations of the bridge traits using
//! desktop-appropriate libraries:
//! - `HttpClient` using `reqwest` with a streamed body
//! - `FileSystemAccess` using `tokio::fs`, rooted in a directory that stands
//!   in for the SD card
//! - `NetworkMonitor` using a TCP reachability probe
//! - `MonotonicClock` using `std::time::Instant`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{InstantClock, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let clock = InstantClock::new();
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod clock;
mod filesystem;
mod http;
mod network;

pub use clock::InstantClock;
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
