//! Storage Abstractions
//!
//! Provides a platform-agnostic trait over the device's persistent block
//! storage. Paths are logical, absolute paths such as `/audio/intro.mp3`; each
//! adapter decides how they map onto the physical medium.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations to support different hosts:
/// - Embedded: SD card mounted over SPI
/// - Desktop: a directory standing in for the card
/// - Tests: an in-memory map
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save_mark(fs: &dyn FileSystemAccess, mark: u32) -> Result<()> {
///     fs.write_file(Path::new("/known_cache_time.txt"), mark.to_string().into()).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Whether the storage medium is mounted and usable.
    ///
    /// Adapters for removable media should perform their lazy mount here.
    async fn is_available(&self) -> bool {
        true
    }

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, replacing any previous content
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Open a file for streaming writes, truncating it if it exists
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>;

    /// Move a file to a new path, replacing the destination if present
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}
