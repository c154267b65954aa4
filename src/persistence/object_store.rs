//! Embedded object-store backend.
//!
//! Mirrors the semantics of the browser's structured storage: named
//! databases with an integer schema version, object stores created by the
//! upgrade step the first time a database is opened at a newer version, and
//! values keyed by string. Databases live as long as the factory that opened
//! them, so reopening by name sees earlier writes.

use crate::persistence::{
    BackendStats, SaveBlob, SaveStore, StatCounters, StorageError, StorageRecord, TitleKey,
};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Database {
    version: u32,
    stores: HashMap<String, BTreeMap<String, StorageRecord>>,
}

impl Database {
    fn usage(&self) -> usize {
        self.stores
            .values()
            .flat_map(|store| store.values())
            .map(|record| record.blob.len())
            .sum()
    }

    fn usage_without(&self, store: &str, key: &str) -> usize {
        let replaced = self
            .stores
            .get(store)
            .and_then(|records| records.get(key))
            .map(|record| record.blob.len())
            .unwrap_or(0);
        self.usage() - replaced
    }
}

/// Opens (and upgrades) embedded databases by name.
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreFactory {
    databases: Arc<Mutex<HashMap<String, Arc<RwLock<Database>>>>>,
    quota: Option<usize>,
}

impl ObjectStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total bytes stored per database.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Opens `name` at `version`, running the upgrade step when the stored
    /// version is older. The upgrade creates `store` if it is missing.
    pub async fn open(
        &self,
        name: &str,
        store: &str,
        version: u32,
    ) -> Result<ObjectStoreBackend, StorageError> {
        let database = {
            let mut databases = self.databases.lock().await;
            databases.entry(name.to_string()).or_default().clone()
        };

        {
            let mut db = database.write().await;
            if version < db.version {
                return Err(StorageError::VersionDowngrade {
                    name: name.to_string(),
                    current: db.version,
                    requested: version,
                });
            }
            if version > db.version {
                info!("Upgrading database {} from v{} to v{}", name, db.version, version);
                if !db.stores.contains_key(store) {
                    debug!("Creating object store {}", store);
                    db.stores.insert(store.to_string(), BTreeMap::new());
                }
                db.version = version;
            }
            if !db.stores.contains_key(store) {
                return Err(StorageError::MissingStore(store.to_string()));
            }
        }

        Ok(ObjectStoreBackend {
            database,
            store: store.to_string(),
            quota: self.quota,
            stats: Arc::new(StatCounters::default()),
        })
    }

    pub async fn version(&self, name: &str) -> Option<u32> {
        let database = self.databases.lock().await.get(name).cloned()?;
        let version = database.read().await.version;
        Some(version)
    }
}

/// Handle on one object store of an open database.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    database: Arc<RwLock<Database>>,
    store: String,
    quota: Option<usize>,
    stats: Arc<StatCounters>,
}

impl ObjectStoreBackend {
    pub fn store_name(&self) -> &str {
        &self.store
    }

    pub async fn len(&self) -> usize {
        let db = self.database.read().await;
        db.stores.get(&self.store).map(BTreeMap::len).unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SaveStore for ObjectStoreBackend {
    fn put<'a>(
        &'a self,
        key: &'a TitleKey,
        blob: &'a SaveBlob,
    ) -> impl Future<Output = Result<(), StorageError>> + Send + 'a {
        async move {
            let mut db = self.database.write().await;
            if let Some(quota) = self.quota {
                let available = quota.saturating_sub(db.usage_without(&self.store, key.as_str()));
                if blob.len() > available {
                    return Err(StorageError::QuotaExceeded {
                        needed: blob.len(),
                        available,
                    });
                }
            }
            let records = db
                .stores
                .get_mut(&self.store)
                .ok_or_else(|| StorageError::MissingStore(self.store.clone()))?;
            records.insert(
                key.as_str().to_string(),
                StorageRecord::new(key, blob.clone()),
            );
            self.stats.wrote();
            debug!("Stored {} bytes under {}", blob.len(), key);
            Ok(())
        }
    }

    fn get<'a>(
        &'a self,
        key: &'a TitleKey,
    ) -> impl Future<Output = Result<Option<StorageRecord>, StorageError>> + Send + 'a {
        async move {
            let db = self.database.read().await;
            let records = db
                .stores
                .get(&self.store)
                .ok_or_else(|| StorageError::MissingStore(self.store.clone()))?;
            self.stats.read();
            Ok(records.get(key.as_str()).cloned())
        }
    }

    fn stats(&self) -> BackendStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: &str = "RetroPocketDB";
    const STORE: &str = "snes_states_v2";

    #[tokio::test]
    async fn round_trip_is_byte_identical() {
        let store = ObjectStoreFactory::new().open(DB, STORE, 2).await.unwrap();
        let key = TitleKey::from_title("game1");
        let blob = SaveBlob::new((0..2048u32).map(|i| (i % 251) as u8).collect());

        store.put(&key, &blob).await.unwrap();
        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.blob, blob);
        assert_eq!(record.title, "game1");

        let missing = store.get(&TitleKey::from_title("unknown")).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(store.stats(), BackendStats { reads: 2, writes: 1 });
    }

    #[tokio::test]
    async fn saves_overwrite_per_title() {
        let store = ObjectStoreFactory::new().open(DB, STORE, 2).await.unwrap();
        let key = TitleKey::from_title("Super Metroid");
        store.put(&key, &SaveBlob::new(vec![1; 1024])).await.unwrap();
        store.put(&key, &SaveBlob::new(vec![2; 1100])).await.unwrap();

        assert_eq!(store.len().await, 1);
        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.blob.data, vec![2; 1100]);
    }

    #[tokio::test]
    async fn upgrade_runs_once_and_data_survives_reopen() {
        let factory = ObjectStoreFactory::new();
        assert_eq!(factory.version(DB).await, None);

        let first = factory.open(DB, STORE, 2).await.unwrap();
        let key = TitleKey::from_title("F-Zero");
        first.put(&key, &SaveBlob::new(vec![9; 1500])).await.unwrap();

        let reopened = factory.open(DB, STORE, 2).await.unwrap();
        assert!(reopened.get(&key).await.unwrap().is_some());
        assert_eq!(factory.version(DB).await, Some(2));
    }

    #[tokio::test]
    async fn downgrade_and_unknown_store_are_rejected() {
        let factory = ObjectStoreFactory::new();
        factory.open(DB, STORE, 2).await.unwrap();

        assert!(matches!(
            factory.open(DB, STORE, 1).await,
            Err(StorageError::VersionDowngrade { current: 2, requested: 1, .. })
        ));
        assert!(matches!(
            factory.open(DB, "other_store", 2).await,
            Err(StorageError::MissingStore(_))
        ));
        // a version bump runs the upgrade and creates it
        assert!(factory.open(DB, "other_store", 3).await.is_ok());
    }

    #[tokio::test]
    async fn quota_failures_leave_previous_record() {
        let store = ObjectStoreFactory::new()
            .with_quota(3000)
            .open(DB, STORE, 2)
            .await
            .unwrap();
        let key = TitleKey::from_title("Star Fox");
        store.put(&key, &SaveBlob::new(vec![1; 2000])).await.unwrap();
        // replacing the same key only needs room for the new blob
        store.put(&key, &SaveBlob::new(vec![2; 2500])).await.unwrap();

        let err = store
            .put(&key, &SaveBlob::new(vec![3; 4000]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 4000, available: 3000 }));
        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.blob.data, vec![2; 2500]);
    }
}
