//! # Catalog Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors surfaced by the key catalog.
///
/// Per-download failures never appear here; the queue absorbs them and moves
/// on. Only failures that cross the catalog boundary are reported.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Expected absence, e.g. no cached registry on first boot.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage medium missing or an I/O operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Malformed registry document from disk or network.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Download queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Key registry full (capacity {capacity})")]
    RegistryFull { capacity: usize },

    /// Composed local path does not fit the configured bound.
    #[error("Local path too long: {len} bytes (max {max})")]
    PathTooLong { len: usize, max: usize },

    #[error("Locator too long: {len} bytes (max {max})")]
    LocatorTooLong { len: usize, max: usize },

    #[error("HTTP error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Http { status: Option<u16>, message: String },

    #[error("Response too large (limit {limit} bytes)")]
    ResponseTooLarge { limit: usize, actual: Option<u64> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl CatalogError {
    /// Returns `true` if retrying on a later poll may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::NetworkUnavailable
                | CatalogError::Http { .. }
                | CatalogError::Storage(_)
                | CatalogError::Bridge(_)
        )
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
