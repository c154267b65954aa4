//! Device filesystem backend.
//!
//! Each title gets one TOML file in a fixed directory, with the state bytes
//! base64-encoded. Writes go to a temporary sibling first and are renamed
//! into place, so a failed write never leaves a half-written record.

use crate::persistence::{
    BackendStats, SaveBlob, SaveStore, StatCounters, StorageError, StorageRecord, TitleKey,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const RECORD_EXTENSION: &str = "state";

// On-disk shape of one record
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    title_key: String,
    title: String,
    timestamp: DateTime<Utc>,
    data: String,
}

#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    directory: PathBuf,
    stats: Arc<StatCounters>,
}

impl FilesystemBackend {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            stats: Arc::new(StatCounters::default()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn record_path(&self, key: &TitleKey) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.as_str(), RECORD_EXTENSION))
    }

    async fn ensure_directory(&self) -> Result<(), StorageError> {
        if !tokio::fs::try_exists(&self.directory)
            .await
            .map_err(|e| StorageError::io(&self.directory, e))?
        {
            info!("Creating save directory {}", self.directory.display());
            tokio::fs::create_dir_all(&self.directory)
                .await
                .map_err(|e| StorageError::io(&self.directory, e))?;
        }
        Ok(())
    }
}

impl SaveStore for FilesystemBackend {
    fn put<'a>(
        &'a self,
        key: &'a TitleKey,
        blob: &'a SaveBlob,
    ) -> impl Future<Output = Result<(), StorageError>> + Send + 'a {
        async move {
            self.ensure_directory().await?;

            let record = FileRecord {
                title_key: key.as_str().to_string(),
                title: key.title().to_string(),
                timestamp: blob.saved_at,
                data: STANDARD.encode(&blob.data),
            };
            let content = toml::to_string(&record)?;

            let path = self.record_path(key);
            let staging = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
            tokio::fs::write(&staging, content)
                .await
                .map_err(|e| StorageError::io(&staging, e))?;
            tokio::fs::rename(&staging, &path)
                .await
                .map_err(|e| StorageError::io(&path, e))?;

            self.stats.wrote();
            debug!("Wrote {} bytes to {}", blob.len(), path.display());
            Ok(())
        }
    }

    fn get<'a>(
        &'a self,
        key: &'a TitleKey,
    ) -> impl Future<Output = Result<Option<StorageRecord>, StorageError>> + Send + 'a {
        async move {
            let path = self.record_path(key);
            self.stats.read();
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("No save file at {}", path.display());
                    return Ok(None);
                }
                Err(e) => return Err(StorageError::io(&path, e)),
            };

            let record: FileRecord = toml::from_str(&content)?;
            let data = STANDARD.decode(record.data.as_bytes())?;
            Ok(Some(StorageRecord {
                title_key: record.title_key,
                title: record.title,
                blob: SaveBlob {
                    data,
                    saved_at: record.timestamp,
                },
            }))
        }
    }

    fn stats(&self) -> BackendStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_through_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(root.path().join("data").join("savestates"));
        let key = TitleKey::from_title("game1");
        let blob = SaveBlob::new((0..3000u32).map(|i| (i * 7 % 256) as u8).collect());

        backend.put(&key, &blob).await.unwrap();
        assert!(backend.record_path(&key).exists());

        let record = backend.get(&key).await.unwrap().unwrap();
        assert_eq!(record.blob.data, blob.data);
        assert_eq!(record.blob.saved_at, blob.saved_at);
        assert_eq!(record.title_key, "game1");
    }

    #[tokio::test]
    async fn missing_records_are_not_errors() {
        let root = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(root.path().join("never-created"));
        let found = backend.get(&TitleKey::from_title("unknown")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn record_names_stay_inside_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(root.path());
        let key = TitleKey::from_title("../../escape");
        backend.put(&key, &SaveBlob::new(vec![0; 1024])).await.unwrap();

        let path = backend.record_path(&key);
        assert_eq!(path.parent(), Some(root.path()));
        assert!(!path.with_extension("state.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_records_surface_as_errors() {
        let root = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(root.path());
        let key = TitleKey::from_title("broken");
        let record = FileRecord {
            title_key: "broken".to_string(),
            title: "broken".to_string(),
            timestamp: Utc::now(),
            data: "not base64!!".to_string(),
        };
        std::fs::write(backend.record_path(&key), toml::to_string(&record).unwrap()).unwrap();

        assert!(matches!(
            backend.get(&key).await,
            Err(StorageError::Encoding(_))
        ));
    }
}
