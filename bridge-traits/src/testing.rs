//! In-memory bridge fakes.
//!
//! Available with the `test-utils` feature. Every fake is cheap to clone
//! through `Arc` and exposes knobs to inject the failures a device sees in the
//! field: unmounted storage, failing writes, dropped connections, a wrapping
//! clock.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::{BridgeError, Result};
use crate::http::{HttpClient, HttpRequest, StreamingResponse};
use crate::network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
use crate::storage::{FileMetadata, FileSystemAccess};
use crate::time::MonotonicClock;

fn not_found(path: &Path) -> BridgeError {
    BridgeError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    failing_paths: HashSet<PathBuf>,
}

/// Storage held entirely in memory.
///
/// Unlike the desktop adapter, `open_write_stream` does not create missing
/// parent directories, matching FAT drivers on embedded targets.
#[derive(Clone)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<MemoryState>>,
    available: Arc<AtomicBool>,
    fail_create_dir: Arc<AtomicBool>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.dirs.insert(PathBuf::from("/"));
        Self {
            state: Arc::new(Mutex::new(state)),
            available: Arc::new(AtomicBool::new(true)),
            fail_create_dir: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate the medium being unmounted or removed.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent `create_dir_all` call fail.
    pub fn fail_create_dir(&self, fail: bool) {
        self.fail_create_dir.store(fail, Ordering::SeqCst);
    }

    /// Make writes to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_paths.insert(path.into());
    }

    /// Seed a file, creating its parent directories.
    pub fn insert_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            insert_dir_chain(&mut state.dirs, parent);
        }
        state.files.insert(path, data.into());
    }

    /// Contents of a file, if present.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state.lock().files.get(path.as_ref()).cloned()
    }

    /// Whether a file or directory is present at `path`.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let state = self.state.lock();
        state.files.contains_key(path.as_ref()) || state.dirs.contains(path.as_ref())
    }

    /// All file paths currently stored.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.state.lock().files.keys().cloned().collect()
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.state.lock().failing_paths.contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "write to {} rejected",
                path.display()
            )));
        }
        Ok(())
    }
}

fn insert_dir_chain(dirs: &mut BTreeSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let state = self.state.lock();
        if let Some(data) = state.files.get(path) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                modified_at: None,
                is_directory: false,
            });
        }
        if state.dirs.contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(not_found(path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        if self.fail_create_dir.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(format!(
                "mkdir {} rejected",
                path.display()
            )));
        }
        insert_dir_chain(&mut self.state.lock().dirs, path);
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        self.state
            .lock()
            .files
            .get(path)
            .map(|data| Bytes::from(data.clone()))
            .ok_or_else(|| not_found(path))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            insert_dir_chain(&mut state.dirs, parent);
        }
        state.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
        self.check_writable(path)?;
        let mut state = self.state.lock();
        let parent_exists = path
            .parent()
            .map(|parent| parent.as_os_str().is_empty() || state.dirs.contains(parent))
            .unwrap_or(true);
        if !parent_exists {
            return Err(not_found(path));
        }
        state.files.insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
        }))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.state.lock();
        let data = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.state
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock();
        if !state.dirs.contains(path) {
            return Err(not_found(path));
        }
        let children = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .filter(|entry| entry.parent() == Some(path))
            .cloned()
            .collect();
        Ok(children)
    }
}

struct MemoryWriter {
    state: Arc<Mutex<MemoryState>>,
    path: PathBuf,
}

impl tokio::io::AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock();
        match state.files.get_mut(&self.path) {
            Some(file) => {
                file.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                "file removed while open",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Canned reply for [`StaticHttpClient`].
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pub status: u16,
    pub body: Vec<u8>,
    /// Advertised `Content-Length`; `None` streams until the body ends.
    pub content_length: Option<u64>,
}

impl StaticRoute {
    /// 200 response advertising the exact body length.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status: 200,
            content_length: Some(body.len() as u64),
            body,
        }
    }

    /// 200 response without a `Content-Length` header.
    pub fn chunked(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_length: None,
        }
    }

    /// 200 response that advertises more bytes than it delivers.
    pub fn truncated(body: impl Into<Vec<u8>>, advertised: u64) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_length: Some(advertised),
        }
    }

    /// Empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            content_length: Some(0),
        }
    }
}

/// HTTP client answering from a fixed URL table.
///
/// Unknown URLs fail as if the connection was refused. Every request is
/// recorded for later assertions.
#[derive(Clone, Default)]
pub struct StaticHttpClient {
    routes: Arc<Mutex<HashMap<String, StaticRoute>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(self, url: impl Into<String>, route: StaticRoute) -> Self {
        self.set_route(url, route);
        self
    }

    pub fn set_route(&self, url: impl Into<String>, route: StaticRoute) {
        self.routes.lock().insert(url.into(), route);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn open_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let route = self.routes.lock().get(&request.url).cloned();
        let url = request.url.clone();
        self.requests.lock().push(request);

        let route = route.ok_or_else(|| {
            BridgeError::OperationFailed(format!("Connection refused: {}", url))
        })?;

        Ok(StreamingResponse {
            status: route.status,
            headers: HashMap::new(),
            content_length: route.content_length,
            body: Box::new(io::Cursor::new(route.body)),
        })
    }
}

/// Network monitor with a manually toggled link state.
#[derive(Clone)]
pub struct StaticNetworkMonitor {
    connected: Arc<AtomicBool>,
}

impl StaticNetworkMonitor {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkMonitor for StaticNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let connected = self.connected.load(Ordering::SeqCst);
        Ok(NetworkInfo {
            status: if connected {
                NetworkStatus::Connected
            } else {
                NetworkStatus::Disconnected
            },
            network_type: connected.then_some(NetworkType::WiFi),
        })
    }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(start: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(start)),
        }
    }

    pub fn set(&self, millis: u32) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move forward, wrapping like the hardware counter.
    pub fn advance(&self, millis: u32) {
        let current = self.now.load(Ordering::SeqCst);
        self.now.store(current.wrapping_add(millis), Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn millis(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_memory_write_stream_requires_parent() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/audio/a.mp3");

        assert!(fs.open_write_stream(path).await.is_err());

        fs.create_dir_all(Path::new("/audio")).await.unwrap();
        let mut writer = fs.open_write_stream(path).await.unwrap();
        writer.write_all(b"abc").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(fs.file(path), Some(b"abc".to_vec()));
    }

    #[tokio::test]
    async fn test_static_http_client_records_requests() {
        let client =
            StaticHttpClient::new().with_route("https://x/a.mp3", StaticRoute::ok(&b"data"[..]));

        let mut response = client
            .open_stream(HttpRequest::get("https://x/a.mp3"))
            .await
            .unwrap();
        let mut body = Vec::new();
        response.body.read_to_end(&mut body).await.unwrap();

        assert_eq!(body, b"data");
        assert_eq!(response.content_length, Some(4));
        assert!(client
            .open_stream(HttpRequest::get("https://x/missing"))
            .await
            .is_err());
        assert_eq!(client.request_count(), 2);
    }

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::new(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.millis(), 1);
    }
}
