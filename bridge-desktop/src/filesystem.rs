//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Tokio-based file system implementation
///
/// Logical paths such as `/audio/intro.mp3` are resolved below a root
/// directory standing in for the card. Paths that try to escape the root
/// through `..` are rejected.
pub struct TokioFileSystem {
    root: PathBuf,
}

impl TokioFileSystem {
    /// Create a file system rooted in the platform data directory
    pub fn new() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("keypad-audio")
            .join("card");

        Self { root }
    }

    /// Create a file system rooted at a custom directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    return Err(BridgeError::OperationFailed(format!(
                        "Path escapes storage root: {}",
                        path.display()
                    )))
                }
            }
        }
        Ok(resolved)
    }

    fn to_logical(&self, physical: &Path) -> PathBuf {
        match physical.strip_prefix(&self.root) {
            Ok(relative) => Path::new("/").join(relative),
            Err(_) => physical.to_path_buf(),
        }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn is_available(&self) -> bool {
        // Mounting the card maps to making sure the root exists.
        match fs::create_dir_all(&self.root).await {
            Ok(()) => true,
            Err(e) => {
                warn!(root = ?self.root, error = %e, "Storage root unavailable");
                false
            }
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let physical = self.resolve(path)?;
        fs::try_exists(&physical)
            .await
            .map_err(Self::map_io_error)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let physical = self.resolve(path)?;
        let metadata = fs::metadata(&physical)
            .await
            .map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let physical = self.resolve(path)?;
        fs::create_dir_all(&physical)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let physical = self.resolve(path)?;
        let data = fs::read(&physical).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let physical = self.resolve(path)?;
        if let Some(parent) = physical.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        fs::write(&physical, data.as_ref())
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
        let physical = self.resolve(path)?;
        let file = fs::File::create(&physical)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Opened file for writing");
        Ok(Box::new(file))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        fs::rename(&source, &target)
            .await
            .map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        let physical = self.resolve(path)?;
        fs::remove_file(&physical)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let physical = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&physical)
            .await
            .map_err(Self::map_io_error)?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(Self::map_io_error)?
        {
            entries.push(self.to_logical(&entry.path()));
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tokio::io::AsyncWriteExt;

    fn temp_root() -> PathBuf {
        env::temp_dir().join(format!("keypad-fs-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let root = temp_root();
        let fs = TokioFileSystem::with_root(&root);
        assert!(fs.is_available().await);

        let path = Path::new("/audio_files.json");
        let data = Bytes::from("{}");
        fs.write_file(path, data.clone()).await.unwrap();

        assert!(root.join("audio_files.json").exists());
        assert_eq!(fs.read_file(path).await.unwrap(), data);

        fs.delete_file(path).await.unwrap();
        assert!(!fs.exists(path).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_stream_then_rename() {
        let root = temp_root();
        let fs = TokioFileSystem::with_root(&root);
        fs.create_dir_all(Path::new("/audio")).await.unwrap();

        let part = Path::new("/audio/a.mp3.part");
        let mut writer = fs.open_write_stream(part).await.unwrap();
        writer.write_all(b"ID3").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        let target = Path::new("/audio/a.mp3");
        fs.rename(part, target).await.unwrap();

        assert_eq!(fs.metadata(target).await.unwrap().size, 3);
        assert_eq!(
            fs.list_directory(Path::new("/audio")).await.unwrap(),
            vec![PathBuf::from("/audio/a.mp3")]
        );

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_rejects_parent_components() {
        let fs = TokioFileSystem::with_root(temp_root());
        assert!(fs.exists(Path::new("/../etc/passwd")).await.is_err());
    }
}
