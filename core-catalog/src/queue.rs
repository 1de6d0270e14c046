//! # Download Queue
//!
//! Bounded, ordered, deduplicated list of audio downloads, drained one small
//! unit of work per call so the host loop is never blocked for long.
//!
//! ## Model
//!
//! Tasks are appended and never removed individually. A cursor marks the next
//! task to attempt; everything behind it has been attempted (completed or
//! abandoned). `0 <= cursor <= len <= capacity` always holds, and the queue is
//! empty exactly when `cursor == len`.
//!
//! ## Transfers
//!
//! Each call to [`DownloadQueue::drive_one_step`] does one of:
//!
//! - open a transfer for the cursor task (directory, GET, part file)
//! - copy one chunk from the response body into the part file
//! - finalize: close the part file and rename it onto the destination
//!
//! The payload only appears at its destination once every advertised byte has
//! been written, so a resolver that checks for the destination never sees a
//! truncated file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::network::NetworkMonitor;
use bridge_traits::storage::FileSystemAccess;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::redact_locator;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

/// Suffix of the temporary file a payload is streamed into.
pub const PART_SUFFIX: &str = ".part";

/// Status of a task that has not been passed by the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
}

/// One queued download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub locator: String,
    pub destination: PathBuf,
    pub label: String,
    pub status: TaskStatus,
}

/// Externally visible state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Behind the cursor (downloaded or abandoned)
    Completed,
    InProgress,
    Pending,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Completed => write!(f, "completed"),
            TaskState::InProgress => write!(f, "in progress"),
            TaskState::Pending => write!(f, "pending"),
        }
    }
}

/// Listing entry produced by [`DownloadQueue::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub label: String,
    pub locator: String,
    pub destination: PathBuf,
    pub state: TaskState,
}

/// Open transfer for the task at the cursor.
struct ActiveTransfer {
    body: Box<dyn AsyncRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    part_path: PathBuf,
    /// Bytes still expected; `None` when the server sent no length
    remaining: Option<u64>,
    written: u64,
}

/// Path a payload is streamed into before it is renamed onto `destination`.
pub fn part_path(destination: &Path) -> PathBuf {
    let mut path = destination.as_os_str().to_owned();
    path.push(PART_SUFFIX);
    PathBuf::from(path)
}

fn truncate_label(label: &str, max: usize) -> String {
    if label.len() <= max {
        return label.to_string();
    }
    let mut end = max;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}

/// Background download queue.
pub struct DownloadQueue {
    tasks: Vec<DownloadTask>,
    cursor: usize,
    capacity: usize,
    active: Option<ActiveTransfer>,
    buffer: Vec<u8>,
    user_agent: String,
    max_locator_len: usize,
    max_label_len: usize,
    fs: Arc<dyn FileSystemAccess>,
    http: Arc<dyn HttpClient>,
    network: Arc<dyn NetworkMonitor>,
    events: Option<EventBus>,
}

impl DownloadQueue {
    pub fn new(
        config: &CatalogConfig,
        fs: Arc<dyn FileSystemAccess>,
        http: Arc<dyn HttpClient>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        Self {
            tasks: Vec::with_capacity(config.max_queue_len),
            cursor: 0,
            capacity: config.max_queue_len,
            active: None,
            buffer: vec![0; config.chunk_size],
            user_agent: config.user_agent.clone(),
            max_locator_len: config.max_locator_len,
            max_label_len: config.max_label_len,
            fs,
            http,
            network,
            events: None,
        }
    }

    /// Publish download lifecycle events on `bus`.
    pub fn set_event_bus(&mut self, bus: EventBus) {
        self.events = Some(bus);
    }

    /// Queue a download.
    ///
    /// Re-adding a locator that has not been attempted yet succeeds without
    /// appending. A full queue that has been completely drained is recycled
    /// before the new task is accepted.
    ///
    /// # Errors
    ///
    /// - `LocatorTooLong` if the locator exceeds the configured bound
    /// - `QueueFull` if every slot holds a task
    pub fn enqueue(&mut self, locator: &str, destination: PathBuf, label: &str) -> Result<()> {
        if locator.len() > self.max_locator_len {
            return Err(CatalogError::LocatorTooLong {
                len: locator.len(),
                max: self.max_locator_len,
            });
        }

        if self.tasks[self.cursor..]
            .iter()
            .any(|task| task.locator == locator)
        {
            debug!(locator = %redact_locator(locator), "Download already queued");
            return Ok(());
        }

        if self.tasks.len() >= self.capacity {
            if self.is_empty() && self.active.is_none() {
                debug!(attempted = self.tasks.len(), "Recycling drained download queue");
                self.tasks.clear();
                self.cursor = 0;
            } else {
                warn!(
                    capacity = self.capacity,
                    remaining = self.remaining_count(),
                    "Download queue full"
                );
                return Err(CatalogError::QueueFull {
                    capacity: self.capacity,
                });
            }
        }

        let label = truncate_label(label, self.max_label_len);
        info!(
            label = %label,
            locator = %redact_locator(locator),
            destination = %destination.display(),
            "Download queued"
        );

        self.emit(DownloadEvent::Queued {
            locator: redact_locator(locator).to_string(),
            destination: destination.display().to_string(),
            pending: self.remaining_count() + 1,
        });
        self.tasks.push(DownloadTask {
            locator: locator.to_string(),
            destination,
            label,
            status: TaskStatus::Pending,
        });
        Ok(())
    }

    /// Perform at most one bounded unit of download work.
    ///
    /// Returns `false` without doing anything when the queue is empty, the
    /// network or storage is unavailable, or the cursor task is marked in
    /// progress without an open transfer. Per-item failures are logged and
    /// skipped; they never surface as errors.
    #[instrument(skip(self), fields(cursor = self.cursor, len = self.tasks.len()))]
    pub async fn drive_one_step(&mut self) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        if !self.network.is_connected().await {
            debug!("Network unavailable; downloads paused");
            return Ok(false);
        }

        if !self.fs.is_available().await {
            debug!("Storage unavailable; downloads paused");
            return Ok(false);
        }

        if self.active.is_some() {
            self.pump().await;
            return Ok(true);
        }

        if self.tasks[self.cursor].status == TaskStatus::InProgress {
            warn!(
                label = %self.tasks[self.cursor].label,
                "Task marked in progress without an open transfer"
            );
            return Ok(false);
        }

        self.start_current().await;
        Ok(true)
    }

    async fn start_current(&mut self) {
        let task = &mut self.tasks[self.cursor];
        task.status = TaskStatus::InProgress;
        let locator = task.locator.clone();
        let destination = task.destination.clone();

        info!(
            label = %task.label,
            locator = %redact_locator(&locator),
            "Starting download"
        );

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = self.fs.create_dir_all(parent).await {
                    self.fail_current(format!("cannot create {}: {}", parent.display(), e))
                        .await;
                    return;
                }
            }
        }

        let request = HttpRequest::get(&locator).user_agent(&self.user_agent);
        let response = match self.http.open_stream(request).await {
            Ok(response) => response,
            Err(e) => {
                self.fail_current(format!("request failed: {}", e)).await;
                return;
            }
        };

        if response.status != 200 {
            self.fail_current(format!("HTTP {}", response.status)).await;
            return;
        }

        let part = part_path(&destination);
        let writer = match self.fs.open_write_stream(&part).await {
            Ok(writer) => writer,
            Err(e) => {
                self.fail_current(format!("cannot open {}: {}", part.display(), e))
                    .await;
                return;
            }
        };

        debug!(
            content_length = ?response.content_length,
            part = %part.display(),
            "Transfer opened"
        );

        self.active = Some(ActiveTransfer {
            body: response.body,
            writer,
            part_path: part,
            remaining: response.content_length,
            written: 0,
        });
    }

    async fn pump(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let remaining = active.remaining;
        let want = match remaining {
            Some(0) => {
                self.finalize_current().await;
                return;
            }
            Some(remaining) => self.buffer.len().min(remaining as usize),
            None => self.buffer.len(),
        };

        let read = match active.body.read(&mut self.buffer[..want]).await {
            Ok(read) => read,
            Err(e) => {
                self.fail_current(format!("read failed: {}", e)).await;
                return;
            }
        };

        if read == 0 {
            match remaining {
                Some(outstanding) => {
                    let message =
                        format!("connection closed with {} bytes outstanding", outstanding);
                    self.fail_current(message).await;
                }
                None => self.finalize_current().await,
            }
            return;
        }

        if let Err(e) = active.writer.write_all(&self.buffer[..read]).await {
            self.fail_current(format!("write failed: {}", e)).await;
            return;
        }

        active.written += read as u64;
        if let Some(remaining) = active.remaining.as_mut() {
            *remaining -= read as u64;
        }
    }

    async fn finalize_current(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if let Err(e) = active.writer.flush().await {
            self.fail_current(format!("flush failed: {}", e)).await;
            return;
        }
        if let Err(e) = active.writer.shutdown().await {
            self.fail_current(format!("close failed: {}", e)).await;
            return;
        }
        drop(active.writer);

        let task = &self.tasks[self.cursor];
        let locator = task.locator.clone();
        let destination = task.destination.clone();

        if let Err(e) = self.fs.rename(&active.part_path, &destination).await {
            self.fail_current(format!("rename failed: {}", e)).await;
            return;
        }

        info!(
            label = %task.label,
            bytes = active.written,
            destination = %destination.display(),
            "Download complete"
        );
        self.emit(DownloadEvent::Completed {
            locator: redact_locator(&locator).to_string(),
            destination: destination.display().to_string(),
            bytes: active.written,
        });
        self.advance();
    }

    async fn fail_current(&mut self, message: String) {
        self.active = None;
        let task = &self.tasks[self.cursor];
        let locator = task.locator.clone();

        warn!(
            label = %task.label,
            locator = %redact_locator(&locator),
            error = %message,
            "Download failed"
        );

        let part = part_path(&task.destination);
        match self.fs.delete_file(&part).await {
            Ok(()) => debug!(part = %part.display(), "Removed partial download"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(part = %part.display(), error = %e, "Failed to remove partial download"),
        }

        self.emit(DownloadEvent::Failed {
            locator: redact_locator(&locator).to_string(),
            message,
        });
        self.advance();
    }

    fn advance(&mut self) {
        self.tasks[self.cursor].status = TaskStatus::Pending;
        self.cursor += 1;
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }

    /// Tasks not yet attempted, including the one in flight.
    pub fn remaining_count(&self) -> usize {
        self.tasks.len() - self.cursor
    }

    /// Locators of tasks not yet attempted.
    pub fn pending_locators(&self) -> impl Iterator<Item = &str> {
        self.tasks[self.cursor..]
            .iter()
            .map(|task| task.locator.as_str())
    }

    /// Tasks ever added since the last clear or recycle.
    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == self.tasks.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a transfer is currently open.
    pub fn is_transferring(&self) -> bool {
        self.active.is_some()
    }

    /// Drop every task and any open transfer. Storage is left untouched.
    pub fn clear(&mut self) {
        if self.active.take().is_some() {
            debug!("Abandoning open transfer");
        }
        self.tasks.clear();
        self.cursor = 0;
    }

    /// State of every task, in queue order.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(index, task)| TaskSnapshot {
                label: task.label.clone(),
                locator: task.locator.clone(),
                destination: task.destination.clone(),
                state: if index < self.cursor {
                    TaskState::Completed
                } else if task.status == TaskStatus::InProgress {
                    TaskState::InProgress
                } else {
                    TaskState::Pending
                },
            })
            .collect()
    }

    /// Log the queue contents.
    pub fn log_summary(&self) {
        info!(
            total = self.total_count(),
            remaining = self.remaining_count(),
            capacity = self.capacity,
            "Download queue"
        );
        for (index, entry) in self.snapshot().iter().enumerate() {
            info!(
                index,
                state = %entry.state,
                label = %entry.label,
                destination = %entry.destination.display(),
                "Queued download"
            );
        }
    }
}

impl fmt::Debug for DownloadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadQueue")
            .field("len", &self.tasks.len())
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity)
            .field("transferring", &self.active.is_some())
            .finish()
    }
}
