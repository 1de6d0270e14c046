//! # Locator Codec
//!
//! Maps a remote locator to a filesystem-safe local path under the audio
//! directory.
//!
//! ## Naming
//!
//! 1. If the last path segment looks like a file name (contains a `.`), it is
//!    sanitized and used as-is when it fits the file name bound.
//! 2. Otherwise the name is derived from a DJB2 hash of the whole locator:
//!    `audio_{hash:08x}.mp3`, then `audio_{hash:08x}_{n}.mp3` on collision.
//!
//! Hash-derived names are claimed in an ownership index kept next to the
//! audio files, so a locator keeps its name across lookups and reboots even
//! once its own download occupies the slot.

use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::storage::FileSystemAccess;
use core_runtime::logging::redact_locator;
use tracing::{debug, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::queue::PART_SUFFIX;

/// Ownership index file name inside the audio directory.
pub const INDEX_FILE_NAME: &str = ".locator_index.json";

const DJB2_SEED: u32 = 5381;

/// DJB2 string hash with 32-bit wrapping arithmetic.
pub fn djb2(input: &str) -> u32 {
    input.bytes().fold(DJB2_SEED, |hash, byte| {
        hash.wrapping_mul(33).wrapping_add(u32::from(byte))
    })
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; spaces become `_`.
pub fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() => Some(c),
            '.' | '-' | '_' => Some(c),
            ' ' => Some('_'),
            _ => None,
        })
        .collect()
}

/// Names the codec or queue own, or that resolve to a directory.
fn is_reserved_name(name: &str) -> bool {
    name == INDEX_FILE_NAME || name.ends_with(PART_SUFFIX) || name.chars().all(|c| c == '.')
}

fn hash_candidate(hash: u32, attempt: u32) -> String {
    if attempt == 0 {
        format!("audio_{:08x}.mp3", hash)
    } else {
        format!("audio_{:08x}_{}.mp3", hash, attempt)
    }
}

/// Locator to local path mapping with collision tracking.
pub struct LocatorCodec {
    fs: Arc<dyn FileSystemAccess>,
    audio_directory: PathBuf,
    index_path: PathBuf,
    max_filename_len: usize,
    max_path_len: usize,
    collision_attempts: u32,
    /// File name -> locator that claimed it
    owners: BTreeMap<String, String>,
}

impl LocatorCodec {
    pub fn new(fs: Arc<dyn FileSystemAccess>, config: &CatalogConfig) -> Self {
        Self {
            fs,
            index_path: config.audio_directory.join(INDEX_FILE_NAME),
            audio_directory: config.audio_directory.clone(),
            max_filename_len: config.max_filename_len,
            max_path_len: config.max_path_len,
            collision_attempts: config.collision_attempts,
            owners: BTreeMap::new(),
        }
    }

    pub fn audio_directory(&self) -> &Path {
        &self.audio_directory
    }

    /// Number of claimed hash-derived names.
    pub fn claimed_count(&self) -> usize {
        self.owners.len()
    }

    /// File name currently claimed by `locator`, if any.
    pub fn claimed_name(&self, locator: &str) -> Option<&str> {
        self.owners
            .iter()
            .find(|(_, owner)| owner.as_str() == locator)
            .map(|(name, _)| name.as_str())
    }

    /// Load the ownership index from storage.
    ///
    /// A missing index starts empty; a corrupt one is discarded with a warning.
    pub async fn load_index(&mut self) -> Result<usize> {
        let bytes = match self.fs.read_file(&self.index_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                self.owners.clear();
                return Ok(0);
            }
            Err(e) => return Err(CatalogError::Storage(e.to_string())),
        };

        self.owners = match serde_json::from_slice(&bytes) {
            Ok(owners) => owners,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable locator index");
                BTreeMap::new()
            }
        };

        debug!(claims = self.owners.len(), "Locator index loaded");
        Ok(self.owners.len())
    }

    /// Drop claims held by locators outside `live`.
    ///
    /// Files already on storage stay occupied, so pruning never frees a
    /// name that is still in use on disk.
    pub async fn retain_locators(&mut self, live: &HashSet<&str>) {
        let before = self.owners.len();
        self.owners.retain(|_, owner| live.contains(owner.as_str()));
        if self.owners.len() != before {
            debug!(
                released = before - self.owners.len(),
                "Released stale locator claims"
            );
            self.persist_index().await;
        }
    }

    /// Map `locator` to its local path.
    ///
    /// # Errors
    ///
    /// `PathTooLong` if the composed path exceeds the path bound, or a storage
    /// error while probing hash candidates.
    pub async fn map(&mut self, locator: &str) -> Result<PathBuf> {
        let name = match self.sanitized_name(locator) {
            Some(name) => name,
            None => self.hash_name(locator).await?,
        };
        self.compose(&name)
    }

    fn sanitized_name(&self, locator: &str) -> Option<String> {
        let segment = locator.rsplit('/').next().unwrap_or(locator);
        if !segment.contains('.') {
            return None;
        }
        let name = sanitize(segment);
        (!name.is_empty() && name.len() <= self.max_filename_len && !is_reserved_name(&name))
            .then_some(name)
    }

    async fn hash_name(&mut self, locator: &str) -> Result<String> {
        if let Some(name) = self.claimed_name(locator) {
            return Ok(name.to_string());
        }

        let hash = djb2(locator);
        for attempt in 0..=self.collision_attempts {
            let candidate = hash_candidate(hash, attempt);
            if self.owners.contains_key(&candidate) {
                continue;
            }
            let path = self.audio_directory.join(&candidate);
            if self.fs.exists(&path).await? {
                continue;
            }

            if attempt > 0 {
                debug!(
                    locator = %redact_locator(locator),
                    name = %candidate,
                    attempt,
                    "Hash name collided; using suffixed name"
                );
            }
            self.owners.insert(candidate.clone(), locator.to_string());
            self.persist_index().await;
            return Ok(candidate);
        }

        let fallback = hash_candidate(hash, 0);
        warn!(
            locator = %redact_locator(locator),
            name = %fallback,
            attempts = self.collision_attempts,
            "No free name found; existing file will be overwritten"
        );
        Ok(fallback)
    }

    fn compose(&self, name: &str) -> Result<PathBuf> {
        let path = self.audio_directory.join(name);
        let len = path.as_os_str().len();
        if len > self.max_path_len {
            return Err(CatalogError::PathTooLong {
                len,
                max: self.max_path_len,
            });
        }
        Ok(path)
    }

    async fn persist_index(&self) {
        let bytes = match serde_json::to_vec(&self.owners) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode locator index");
                return;
            }
        };
        if let Err(e) = self.fs.write_file(&self.index_path, Bytes::from(bytes)).await {
            warn!(error = %e, "Failed to persist locator index");
        }
    }
}

impl std::fmt::Debug for LocatorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocatorCodec")
            .field("audio_directory", &self.audio_directory)
            .field("claims", &self.owners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::testing::MemoryFileSystem;

    fn codec_with(fs: &MemoryFileSystem, config: &CatalogConfig) -> LocatorCodec {
        LocatorCodec::new(Arc::new(fs.clone()), config)
    }

    #[test]
    fn test_djb2_reference_values() {
        assert_eq!(djb2(""), 5381);
        assert_eq!(djb2("a"), 177_670);
        assert_eq!(djb2("abc"), 193_485_963);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("my song.mp3"), "my_song.mp3");
        assert_eq!(sanitize("intro(1)&.mp3"), "intro1.mp3");
        assert_eq!(sanitize("a-b_c.MP3"), "a-b_c.MP3");
        assert_eq!(sanitize("é!?"), "");
    }

    #[tokio::test]
    async fn test_file_like_segment_is_sanitized() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());

        let path = codec.map("https://cdn.example.com/tracks/my song.mp3").await.unwrap();
        assert_eq!(path, PathBuf::from("/audio/my_song.mp3"));
        assert_eq!(codec.claimed_count(), 0);
    }

    #[tokio::test]
    async fn test_segment_without_extension_is_hashed() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());
        let locator = "https://cdn.example.com/stream/42";

        let path = codec.map(locator).await.unwrap();
        let expected = format!("/audio/audio_{:08x}.mp3", djb2(locator));
        assert_eq!(path, PathBuf::from(expected));
        assert_eq!(codec.claimed_name(locator), path.file_name().and_then(|n| n.to_str()));
    }

    #[tokio::test]
    async fn test_overlong_sanitized_name_falls_back_to_hash() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());
        let locator = format!("https://x/{}.mp3", "a".repeat(80));

        let path = codec.map(&locator).await.unwrap();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("audio_"));
    }

    #[tokio::test]
    async fn test_occupied_hash_name_gets_suffix() {
        let fs = MemoryFileSystem::new();
        let locator = "https://x/stream/7";
        let base = format!("/audio/audio_{:08x}.mp3", djb2(locator));
        fs.insert_file(&base, b"someone else".to_vec());

        let mut codec = codec_with(&fs, &CatalogConfig::default());
        let path = codec.map(locator).await.unwrap();

        assert_eq!(
            path,
            PathBuf::from(format!("/audio/audio_{:08x}_1.mp3", djb2(locator)))
        );
    }

    #[tokio::test]
    async fn test_colliding_locators_get_distinct_names() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());
        let first = "https://x/xA";
        let second = "https://x/wb";
        assert_eq!(djb2(first), djb2(second));

        let first_path = codec.map(first).await.unwrap();
        let second_path = codec.map(second).await.unwrap();

        let hash = djb2(first);
        assert_eq!(first_path, PathBuf::from(format!("/audio/audio_{:08x}.mp3", hash)));
        assert_eq!(second_path, PathBuf::from(format!("/audio/audio_{:08x}_1.mp3", hash)));

        // Repeated lookups keep their own claims
        assert_eq!(codec.map(first).await.unwrap(), first_path);
        assert_eq!(codec.map(second).await.unwrap(), second_path);
    }

    #[tokio::test]
    async fn test_reserved_segments_fall_back_to_hash() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());

        for locator in [
            "https://x/.locator_index.json",
            "https://x/dir/.",
            "https://x/dir/..",
            "https://x/track.mp3.part",
        ] {
            let path = codec.map(locator).await.unwrap();
            assert_eq!(
                path,
                PathBuf::from(format!("/audio/audio_{:08x}.mp3", djb2(locator))),
                "{}",
                locator
            );
        }
        assert_eq!(codec.claimed_count(), 4);
    }

    #[tokio::test]
    async fn test_mapping_is_stable_once_downloaded() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());
        let locator = "https://x/stream/9";

        let first = codec.map(locator).await.unwrap();
        fs.insert_file(&first, b"payload".to_vec());
        let second = codec.map(locator).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_index_survives_reload() {
        let fs = MemoryFileSystem::new();
        let config = CatalogConfig::default();
        let locator = "https://x/stream/11";

        let mut codec = codec_with(&fs, &config);
        let first = codec.map(locator).await.unwrap();
        fs.insert_file(&first, b"payload".to_vec());

        let mut rebooted = codec_with(&fs, &config);
        assert_eq!(rebooted.load_index().await.unwrap(), 1);
        assert_eq!(rebooted.map(locator).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_discarded() {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/audio/.locator_index.json", b"{not json".to_vec());

        let mut codec = codec_with(&fs, &CatalogConfig::default());
        assert_eq!(codec.load_index().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_candidates_reuse_base_name() {
        let fs = MemoryFileSystem::new();
        let config = CatalogConfig::default().with_collision_attempts(2);
        let locator = "https://x/stream/3";
        let hash = djb2(locator);
        for attempt in 0..=2 {
            fs.insert_file(format!("/audio/{}", hash_candidate(hash, attempt)), b"x".to_vec());
        }

        let mut codec = codec_with(&fs, &config);
        let path = codec.map(locator).await.unwrap();
        assert_eq!(path, PathBuf::from(format!("/audio/{}", hash_candidate(hash, 0))));
    }

    #[tokio::test]
    async fn test_path_bound_fails_closed() {
        let fs = MemoryFileSystem::new();
        let config = CatalogConfig::default()
            .with_audio_directory("/very/deep/audio/directory")
            .with_max_path_len(30);
        let mut codec = codec_with(&fs, &config);

        let result = codec.map("https://x/stream/5").await;
        assert!(matches!(result, Err(CatalogError::PathTooLong { max: 30, .. })));
    }

    #[tokio::test]
    async fn test_retain_releases_dead_claims() {
        let fs = MemoryFileSystem::new();
        let mut codec = codec_with(&fs, &CatalogConfig::default());
        codec.map("https://x/stream/1").await.unwrap();
        codec.map("https://x/stream/2").await.unwrap();

        let live: HashSet<&str> = ["https://x/stream/2"].into_iter().collect();
        codec.retain_locators(&live).await;

        assert_eq!(codec.claimed_count(), 1);
        assert!(codec.claimed_name("https://x/stream/1").is_none());
    }
}
