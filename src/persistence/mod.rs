//! # Save-state persistence
//!
//! One save slot per title. A save flows engine → [`save_codec`] → backend,
//! a load flows backend → [`save_codec`] validation → engine.
//!
//! ## Backends
//! Two interchangeable stores sit behind [`SaveStore`]:
//! - [`object_store`]: an embedded, versioned object store (upgrade on
//!   first open), modelled on the browser's structured storage
//! - [`filesystem`]: one base64 TOML record per title under a fixed
//!   subdirectory of the device's data directory
//!
//! Which one is active is decided once, when the [`StorageBackend`] is built
//! from configuration. Nothing above this module checks.
//!
//! ## Keys
//! Records are keyed by a [`TitleKey`] sanitised from the display title.
//! Titles that differ only in replaced characters share a key; the later
//! save overwrites the earlier one and loads log the mismatch.

pub mod filesystem;
pub mod object_store;
pub mod save_codec;
pub mod state_slot;

use crate::config::{BackendKind, SaveConfig};
use chrono::{DateTime, Utc};
use filesystem::FilesystemBackend;
use object_store::{ObjectStoreBackend, ObjectStoreFactory};
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub use save_codec::{CodecError, SaveCodec, DEFAULT_MIN_STATE_SIZE};
pub use state_slot::{LoadOutcome, SaveOutcome, SlotError, StateSlot};

const KEY_PLACEHOLDER: char = '_';

/// Storage-safe identity of a title.
///
/// Equality and hashing only consider the sanitised key; the display title is
/// kept for diagnostics.
#[derive(Debug, Clone, Eq)]
pub struct TitleKey {
    key: String,
    title: String,
}

impl TitleKey {
    pub fn from_title(title: &str) -> Self {
        let mut key: String = title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    KEY_PLACEHOLDER
                }
            })
            .collect();
        if key.is_empty() {
            key.push(KEY_PLACEHOLDER);
        }
        Self {
            key,
            title: title.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl PartialEq for TitleKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Hash for TitleKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TitleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Canonical bytes of one save-state snapshot.
///
/// Blobs produced by [`SaveCodec::normalize`] are known to meet the size
/// floor; blobs read back from a store are re-checked before use.
#[derive(Clone, PartialEq, Eq)]
pub struct SaveBlob {
    pub data: Vec<u8>,
    pub saved_at: DateTime<Utc>,
}

impl SaveBlob {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            saved_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for SaveBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveBlob")
            .field("len", &self.data.len())
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

/// What a backend returns for a key: the blob and the title it was saved as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub title_key: String,
    pub title: String,
    pub blob: SaveBlob,
}

impl StorageRecord {
    pub fn new(key: &TitleKey, blob: SaveBlob) -> Self {
        Self {
            title_key: key.as_str().to_string(),
            title: key.title().to_string(),
            blob,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored record is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse record: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("Database {name} is at version {current}, cannot open at {requested}")]
    VersionDowngrade {
        name: String,
        current: u32,
        requested: u32,
    },

    #[error("Object store {0} does not exist")]
    MissingStore(String),

    #[error("Quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendStats {
    pub reads: u64,
    pub writes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl StatCounters {
    pub(crate) fn read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BackendStats {
        BackendStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Key-value byte storage for save slots.
///
/// `get` on a missing key is `Ok(None)`; errors are reserved for transport
/// and decoding failures.
pub trait SaveStore: Send + Sync {
    fn put<'a>(
        &'a self,
        key: &'a TitleKey,
        blob: &'a SaveBlob,
    ) -> impl Future<Output = Result<(), StorageError>> + Send + 'a;

    fn get<'a>(
        &'a self,
        key: &'a TitleKey,
    ) -> impl Future<Output = Result<Option<StorageRecord>, StorageError>> + Send + 'a;

    fn stats(&self) -> BackendStats;
}

/// The backend chosen for this build/platform.
#[derive(Debug)]
pub enum StorageBackend {
    ObjectStore(ObjectStoreBackend),
    Filesystem(FilesystemBackend),
}

impl StorageBackend {
    pub async fn from_config(
        config: &SaveConfig,
        factory: &ObjectStoreFactory,
    ) -> Result<Self, StorageError> {
        let backend = match config.backend {
            BackendKind::ObjectStore => StorageBackend::ObjectStore(
                factory
                    .open(&config.database, &config.store, config.schema_version)
                    .await?,
            ),
            BackendKind::Filesystem => StorageBackend::Filesystem(FilesystemBackend::new(
                config.directory.join(&config.subdirectory),
            )),
        };
        info!("Save backend selected: {}", backend.kind());
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            StorageBackend::ObjectStore(_) => BackendKind::ObjectStore,
            StorageBackend::Filesystem(_) => BackendKind::Filesystem,
        }
    }
}

impl From<ObjectStoreBackend> for StorageBackend {
    fn from(backend: ObjectStoreBackend) -> Self {
        StorageBackend::ObjectStore(backend)
    }
}

impl From<FilesystemBackend> for StorageBackend {
    fn from(backend: FilesystemBackend) -> Self {
        StorageBackend::Filesystem(backend)
    }
}

impl SaveStore for StorageBackend {
    fn put<'a>(
        &'a self,
        key: &'a TitleKey,
        blob: &'a SaveBlob,
    ) -> impl Future<Output = Result<(), StorageError>> + Send + 'a {
        async move {
            match self {
                StorageBackend::ObjectStore(store) => store.put(key, blob).await,
                StorageBackend::Filesystem(store) => store.put(key, blob).await,
            }
        }
    }

    fn get<'a>(
        &'a self,
        key: &'a TitleKey,
    ) -> impl Future<Output = Result<Option<StorageRecord>, StorageError>> + Send + 'a {
        async move {
            match self {
                StorageBackend::ObjectStore(store) => store.get(key).await,
                StorageBackend::Filesystem(store) => store.get(key).await,
            }
        }
    }

    fn stats(&self) -> BackendStats {
        match self {
            StorageBackend::ObjectStore(store) => store.stats(),
            StorageBackend::Filesystem(store) => store.stats(),
        }
    }
}
