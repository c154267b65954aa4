//! Save/load worker for the single save slot of a title.
//!
//! ```text
//! save: engine.save_state ──► SaveCodec::normalize ──► store.put
//! load: store.get ──► SaveCodec::denormalize ──► engine.load_state
//! ```
//!
//! Only one operation runs at a time. A request arriving while another is in
//! flight is answered with `Busy` and does nothing; it is not queued.
//! Validation always happens before the write, so a rejected payload never
//! replaces the stored record.

use crate::engine::{Engine, EngineError};
use crate::persistence::{
    CodecError, SaveCodec, SaveStore, StorageBackend, StorageError, TitleKey,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { bytes: usize },
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { bytes: usize },
    NoSave,
    Busy,
}

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid save data: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// Clears the in-flight flag however the operation ends, including drop
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StateSlot<S: SaveStore = StorageBackend> {
    engine: Arc<dyn Engine>,
    store: Arc<S>,
    codec: SaveCodec,
    key: TitleKey,
    in_flight: AtomicBool,
}

impl<S: SaveStore> StateSlot<S> {
    pub fn new(engine: Arc<dyn Engine>, store: Arc<S>, codec: SaveCodec, key: TitleKey) -> Self {
        Self {
            engine,
            store,
            codec,
            key,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &TitleKey {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn save(&self) -> Result<SaveOutcome, SlotError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            info!("Save for {} ignored: another operation is in flight", self.key);
            return Ok(SaveOutcome::Busy);
        };

        let result = self.save_inner().await;
        match &result {
            Ok(SaveOutcome::Saved { bytes }) => info!("Saved {} bytes for {}", bytes, self.key),
            Ok(SaveOutcome::Busy) => {}
            Err(e) => error!("Save for {} failed: {}", self.key, e),
        }
        result
    }

    async fn save_inner(&self) -> Result<SaveOutcome, SlotError> {
        let raw = self.engine.save_state().await?;
        let blob = self.codec.normalize(raw)?;
        self.store.put(&self.key, &blob).await?;
        Ok(SaveOutcome::Saved { bytes: blob.len() })
    }

    pub async fn load(&self) -> Result<LoadOutcome, SlotError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            info!("Load for {} ignored: another operation is in flight", self.key);
            return Ok(LoadOutcome::Busy);
        };

        let result = self.load_inner().await;
        match &result {
            Ok(LoadOutcome::Loaded { bytes }) => info!("Loaded {} bytes for {}", bytes, self.key),
            Ok(LoadOutcome::NoSave) => info!("No save found for {}", self.key),
            Ok(LoadOutcome::Busy) => {}
            Err(e) => error!("Load for {} failed: {}", self.key, e),
        }
        result
    }

    async fn load_inner(&self) -> Result<LoadOutcome, SlotError> {
        let Some(record) = self.store.get(&self.key).await? else {
            return Ok(LoadOutcome::NoSave);
        };
        if record.title != self.key.title() {
            warn!(
                "Save under key {} was written for \"{}\", loading it for \"{}\"",
                self.key,
                record.title,
                self.key.title()
            );
        }
        let bytes = self.codec.denormalize(&record.blob)?;
        self.engine.load_state(bytes).await?;
        Ok(LoadOutcome::Loaded { bytes: bytes.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineFuture, EnginePayload};
    use crate::persistence::object_store::{ObjectStoreBackend, ObjectStoreFactory};
    use crate::persistence::{SaveBlob, StorageRecord};
    use std::sync::Mutex;

    struct ScriptedEngine {
        next_save: Mutex<Vec<EnginePayload>>,
        loaded: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedEngine {
        fn returning(payloads: Vec<EnginePayload>) -> Arc<Self> {
            Arc::new(Self {
                next_save: Mutex::new(payloads),
                loaded: Mutex::new(Vec::new()),
            })
        }
    }

    impl Engine for ScriptedEngine {
        fn save_state(&self) -> EngineFuture<'_, EnginePayload> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                let mut queue = self.next_save.lock().unwrap();
                if queue.is_empty() {
                    return Err(EngineError::call("saveState", "no script left"));
                }
                Ok(queue.remove(0))
            })
        }

        fn load_state<'a>(&'a self, state: &'a [u8]) -> EngineFuture<'a, ()> {
            Box::pin(async move {
                self.loaded.lock().unwrap().push(state.to_vec());
                Ok(())
            })
        }

        fn exit(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    async fn slot(
        engine: Arc<ScriptedEngine>,
        title: &str,
    ) -> StateSlot<ObjectStoreBackend> {
        let store = ObjectStoreFactory::new()
            .open("RetroPocketDB", "snes_states_v2", 2)
            .await
            .unwrap();
        StateSlot::new(engine, Arc::new(store), SaveCodec::default(), TitleKey::from_title(title))
    }

    #[tokio::test]
    async fn save_then_load_feeds_identical_bytes_back() {
        let state: Vec<u8> = (0..1500u32).map(|i| i as u8).collect();
        let engine = ScriptedEngine::returning(vec![EnginePayload::wrapped(EnginePayload::bytes(
            state.clone(),
        ))]);
        let slot = slot(engine.clone(), "Super Mario World (USA).sfc").await;

        assert_eq!(slot.save().await.unwrap(), SaveOutcome::Saved { bytes: 1500 });
        assert_eq!(slot.load().await.unwrap(), LoadOutcome::Loaded { bytes: 1500 });
        assert_eq!(engine.loaded.lock().unwrap().as_slice(), &[state]);
    }

    #[tokio::test]
    async fn load_without_save_is_not_an_error() {
        let engine = ScriptedEngine::returning(vec![]);
        let slot = slot(engine.clone(), "Earthbound").await;
        assert_eq!(slot.load().await.unwrap(), LoadOutcome::NoSave);
        assert!(engine.loaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn back_to_back_saves_write_once() {
        let engine = ScriptedEngine::returning(vec![
            EnginePayload::bytes(vec![1; 2048]),
            EnginePayload::bytes(vec![2; 2048]),
        ]);
        let slot = slot(engine, "Mega Man X").await;

        let (first, second) = tokio::join!(slot.save(), slot.save());
        assert_eq!(first.unwrap(), SaveOutcome::Saved { bytes: 2048 });
        assert_eq!(second.unwrap(), SaveOutcome::Busy);
        assert_eq!(slot.store().stats().writes, 1);
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn load_is_rejected_while_saving() {
        let engine = ScriptedEngine::returning(vec![EnginePayload::bytes(vec![1; 2048])]);
        let slot = slot(engine.clone(), "Kirby").await;

        let (saved, loaded) = tokio::join!(slot.save(), slot.load());
        assert!(matches!(saved.unwrap(), SaveOutcome::Saved { .. }));
        assert_eq!(loaded.unwrap(), LoadOutcome::Busy);
        assert!(engine.loaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_payload_keeps_previous_record() {
        let engine = ScriptedEngine::returning(vec![
            EnginePayload::bytes(vec![5; 4096]),
            EnginePayload::bytes(b"FS error".to_vec()),
        ]);
        let slot = slot(engine, "Donkey Kong Country").await;

        slot.save().await.unwrap();
        let err = slot.save().await.unwrap_err();
        assert!(matches!(
            err,
            SlotError::Codec(CodecError::PayloadTooSmall { size: 8, .. })
        ));

        let record = slot.store().get(slot.key()).await.unwrap().unwrap();
        assert_eq!(record.blob.data, vec![5; 4096]);
        assert_eq!(slot.store().stats().writes, 1);
        // the flag is released after a failure
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn corrupt_stored_record_is_not_fed_to_the_engine() {
        let engine = ScriptedEngine::returning(vec![]);
        let slot = slot(engine.clone(), "Pilotwings").await;
        slot.store()
            .put(slot.key(), &SaveBlob::new(vec![0; 12]))
            .await
            .unwrap();

        let err = slot.load().await.unwrap_err();
        assert!(matches!(err, SlotError::Codec(CodecError::PayloadTooSmall { .. })));
        assert!(engine.loaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn colliding_titles_share_the_slot() {
        let engine = ScriptedEngine::returning(vec![EnginePayload::bytes(vec![4; 1024])]);
        let store = Arc::new(
            ObjectStoreFactory::new()
                .open("RetroPocketDB", "snes_states_v2", 2)
                .await
                .unwrap(),
        );
        let writer = StateSlot::new(
            engine.clone(),
            store.clone(),
            SaveCodec::default(),
            TitleKey::from_title("Zelda: Link"),
        );
        let reader = StateSlot::new(
            engine.clone(),
            store.clone(),
            SaveCodec::default(),
            TitleKey::from_title("Zelda? Link"),
        );

        writer.save().await.unwrap();
        assert_eq!(reader.load().await.unwrap(), LoadOutcome::Loaded { bytes: 1024 });
        let record: StorageRecord = store.get(reader.key()).await.unwrap().unwrap();
        assert_eq!(record.title, "Zelda: Link");
    }
}
