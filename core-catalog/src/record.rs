//! Key records and the bounded in-memory registry.
//!
//! The same JSON document shape is used on the wire and on disk:
//!
//! ```json
//! {
//!   "123": { "description": "Intro", "type": "audio", "path": "https://x/a.mp3" },
//!   "911": { "description": "Operator", "type": "service" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::{CatalogError, Result};

/// What a key does when dialled.
///
/// Only `Audio` resolves to a playable path; the other kinds are recognised
/// so they can be reported, and unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Audio,
    Service,
    Shortcut,
    /// Wire tag `url`
    Link,
    Unknown(String),
}

impl KeyKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "audio" => KeyKind::Audio,
            "service" => KeyKind::Service,
            "shortcut" => KeyKind::Shortcut,
            "url" => KeyKind::Link,
            other => KeyKind::Unknown(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            KeyKind::Audio => "audio",
            KeyKind::Service => "service",
            KeyKind::Shortcut => "shortcut",
            KeyKind::Link => "url",
            KeyKind::Unknown(tag) => tag,
        }
    }
}

impl Default for KeyKind {
    fn default() -> Self {
        KeyKind::Unknown("unknown".to_string())
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// One known key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: String,
    pub description: String,
    pub kind: KeyKind,
    /// Remote URI, local storage path, or empty
    pub locator: String,
}

impl KeyRecord {
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        kind: KeyKind,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            kind,
            locator: locator.into(),
        }
    }
}

/// Serialized form of a record, keyed externally by its key.
#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    #[serde(default = "default_description")]
    description: String,
    #[serde(rename = "type", alias = "kind", default = "default_kind")]
    kind: String,
    #[serde(rename = "path", alias = "locator", default)]
    locator: String,
}

fn default_description() -> String {
    "Unknown".to_string()
}

fn default_kind() -> String {
    "unknown".to_string()
}

/// Ordered, bounded collection of key records.
///
/// Keys are unique; source order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    records: Vec<KeyRecord>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a record, replacing any record with the same key in place.
    pub fn insert(&mut self, record: KeyRecord) -> Result<()> {
        if let Some(existing) = self.records.iter_mut().find(|r| r.key == record.key) {
            *existing = record;
            return Ok(());
        }
        if self.records.len() >= self.capacity {
            return Err(CatalogError::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    /// Parse a registry document, keeping at most `capacity` records.
    ///
    /// Entries that are not objects or carry mistyped fields are skipped with
    /// a warning. Records past the capacity are dropped and counted.
    pub fn decode(bytes: &[u8], capacity: usize) -> Result<DecodedRegistry> {
        let document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(bytes).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut registry = Registry::new(capacity);
        let mut dropped = 0usize;
        let mut skipped = 0usize;

        for (key, value) in document {
            let wire: WireRecord = match serde_json::from_value(value) {
                Ok(wire) => wire,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed registry entry");
                    skipped += 1;
                    continue;
                }
            };

            let record = KeyRecord {
                key,
                description: wire.description,
                kind: KeyKind::from_tag(&wire.kind),
                locator: wire.locator,
            };

            if registry.insert(record).is_err() {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(dropped, capacity, "Registry limit reached; extra keys dropped");
        }

        Ok(DecodedRegistry {
            registry,
            dropped,
            skipped,
        })
    }

    /// Serialize in source order.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut document = serde_json::Map::with_capacity(self.records.len());
        for record in &self.records {
            let wire = WireRecord {
                description: record.description.clone(),
                kind: record.kind.as_tag().to_string(),
                locator: record.locator.clone(),
            };
            let value =
                serde_json::to_value(wire).map_err(|e| CatalogError::Parse(e.to_string()))?;
            document.insert(record.key.clone(), value);
        }
        serde_json::to_vec(&document).map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

/// Outcome of [`Registry::decode`].
#[derive(Debug)]
pub struct DecodedRegistry {
    pub registry: Registry,
    /// Records lost to the capacity bound
    pub dropped: usize,
    /// Entries that were not valid records
    pub skipped: usize,
}
