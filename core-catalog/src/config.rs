//! Catalog configuration and limits

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CatalogError, Result};

/// Configuration for the key catalog.
///
/// Every bound here is a deliberate resource limit for small devices; the
/// catalog rejects work past a bound instead of growing.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Remote registry document
    pub source_url: String,

    /// Cached copy of the registry (default: `/audio_files.json`)
    pub registry_file: PathBuf,

    /// Clock reading of the last successful refresh (default: `/known_cache_time.txt`)
    pub staleness_file: PathBuf,

    /// Directory downloaded audio is written to (default: `/audio`)
    pub audio_directory: PathBuf,

    /// Maximum keys held in memory (default: 50)
    pub max_registry_entries: usize,

    /// Maximum download tasks (default: 20)
    pub max_queue_len: usize,

    /// Largest registry response accepted, in bytes (default: 8192)
    pub max_response_bytes: usize,

    /// Longest file name the codec may produce (default: 64)
    pub max_filename_len: usize,

    /// Longest composed local path (default: 128)
    pub max_path_len: usize,

    /// Longest locator a download task may carry (default: 256)
    pub max_locator_len: usize,

    /// Task labels are truncated to this many bytes (default: 64)
    pub max_label_len: usize,

    /// How long a refreshed registry stays fresh (default: 7 days)
    pub cache_validity: Duration,

    /// Minimum spacing between idle queue checks (default: 1s)
    pub poll_interval: Duration,

    /// `User-Agent` sent with every request
    pub user_agent: String,

    /// Bytes moved per download step (default: 1024)
    pub chunk_size: usize,

    /// Numeric suffixes tried before a hash-derived name is reused (default: 999)
    pub collision_attempts: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_url: "https://github.com/jeff-hamm/bowie-phone/sample-sequence.json"
                .to_string(),
            registry_file: PathBuf::from("/audio_files.json"),
            staleness_file: PathBuf::from("/known_cache_time.txt"),
            audio_directory: PathBuf::from("/audio"),
            max_registry_entries: 50,
            max_queue_len: 20,
            max_response_bytes: 8192,
            max_filename_len: 64,
            max_path_len: 128,
            max_locator_len: 256,
            max_label_len: 64,
            cache_validity: Duration::from_secs(7 * 24 * 60 * 60),
            poll_interval: Duration::from_secs(1),
            user_agent: "AudioFileManager/1.0".to_string(),
            chunk_size: 1024,
            collision_attempts: 999,
        }
    }
}

impl CatalogConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_registry_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_file = path.into();
        self
    }

    pub fn with_staleness_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.staleness_file = path.into();
        self
    }

    pub fn with_audio_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_directory = path.into();
        self
    }

    pub fn with_max_registry_entries(mut self, count: usize) -> Self {
        self.max_registry_entries = count;
        self
    }

    pub fn with_max_queue_len(mut self, count: usize) -> Self {
        self.max_queue_len = count;
        self
    }

    pub fn with_max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    pub fn with_max_filename_len(mut self, len: usize) -> Self {
        self.max_filename_len = len;
        self
    }

    pub fn with_max_path_len(mut self, len: usize) -> Self {
        self.max_path_len = len;
        self
    }

    pub fn with_cache_validity(mut self, validity: Duration) -> Self {
        self.cache_validity = validity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_collision_attempts(mut self, attempts: u32) -> Self {
        self.collision_attempts = attempts;
        self
    }

    /// Validity window in clock units.
    ///
    /// The uptime clock is 32 bits wide, so windows are capped at `u32::MAX`.
    pub fn validity_millis(&self) -> u32 {
        u32::try_from(self.cache_validity.as_millis()).unwrap_or(u32::MAX)
    }

    /// Poll interval in clock units.
    pub fn poll_interval_millis(&self) -> u32 {
        u32::try_from(self.poll_interval.as_millis()).unwrap_or(u32::MAX)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        fn invalid(message: &str) -> Result<()> {
            Err(CatalogError::InvalidConfig(message.to_string()))
        }

        if self.source_url.is_empty() {
            return invalid("source_url cannot be empty");
        }

        if self.registry_file.as_os_str().is_empty() || self.staleness_file.as_os_str().is_empty()
        {
            return invalid("registry_file and staleness_file must be set");
        }

        if self.registry_file == self.staleness_file {
            return invalid("registry_file and staleness_file must differ");
        }

        if self.audio_directory.as_os_str().is_empty() {
            return invalid("audio_directory cannot be empty");
        }

        if self.max_registry_entries == 0 || self.max_queue_len == 0 {
            return invalid("registry and queue capacities must be at least 1");
        }

        if self.max_response_bytes == 0 || self.chunk_size == 0 {
            return invalid("max_response_bytes and chunk_size must be greater than 0");
        }

        // audio_{hash:08x}_{n}.mp3 must always fit
        let longest_hash_name = format!("audio_00000000_{}.mp3", self.collision_attempts).len();
        if self.max_filename_len < longest_hash_name {
            return invalid("max_filename_len too small for hash-derived names");
        }

        let dir_len = self.audio_directory.as_os_str().len();
        if self.max_path_len <= dir_len {
            return invalid("max_path_len must exceed the audio_directory length");
        }

        if self.cache_validity.is_zero() {
            return invalid("cache_validity must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.max_registry_entries, 50);
        assert_eq!(config.max_queue_len, 20);
        assert_eq!(config.max_response_bytes, 8192);
        assert_eq!(config.validity_millis(), 604_800_000);
        assert_eq!(config.poll_interval_millis(), 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CatalogConfig::new()
            .with_source_url("https://example.com/keys.json")
            .with_max_queue_len(4)
            .with_chunk_size(256)
            .with_user_agent("Keypad/2.0");

        assert_eq!(config.source_url, "https://example.com/keys.json");
        assert_eq!(config.max_queue_len, 4);
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.user_agent, "Keypad/2.0");
    }

    #[test]
    fn test_config_validation() {
        assert!(CatalogConfig::default()
            .with_max_queue_len(0)
            .validate()
            .is_err());
        assert!(CatalogConfig::default()
            .with_source_url("")
            .validate()
            .is_err());
        assert!(CatalogConfig::default()
            .with_staleness_file("/audio_files.json")
            .validate()
            .is_err());
        assert!(CatalogConfig::default()
            .with_max_filename_len(12)
            .validate()
            .is_err());
        assert!(CatalogConfig::default()
            .with_max_path_len(4)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validity_is_capped_to_clock_width() {
        let config = CatalogConfig::default().with_cache_validity(Duration::from_secs(u64::MAX));
        assert_eq!(config.validity_millis(), u32::MAX);
    }
}
