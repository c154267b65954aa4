//! Emulator session with statum typestate lifecycle
//!
//! One session per mounted title. It owns the control surface, the engine
//! handle and the save slot, so nothing about the running game lives in
//! globals and several sessions can coexist (tests do this).
//!
//! # State Machine
//!
//! ```text
//! Launching ──► Running ──► Closed
//!     │
//!     └── launch failure (session-fatal, surfaced with the engine message)
//! ```
//!
//! Input handling on the surface is synchronous. Save and load suspend, and
//! [`EmulatorSession::split`] lets the host keep feeding input while one of
//! them is pending.

use crate::config::FrontendConfig;
use crate::controller::button_registry::{ButtonRegistry, Profile, RegistryError};
use crate::controller::control_surface::ControlSurface;
use crate::controller::dpad_sampler::PadGeometry;
use crate::controller::edge_detector::ButtonEdge;
use crate::controller::event_synthesizer::EventSynthesizer;
use crate::engine::{Engine, EngineError, EngineLauncher, LaunchConfig};
use crate::persistence::{
    LoadOutcome, SaveCodec, SaveOutcome, SlotError, StateSlot, StorageBackend, TitleKey,
};
use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Coarse status for the host UI (loading overlay, error banner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmulatorStatus {
    #[default]
    Idle,
    Loading,
    Running,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Emulator core library not loaded")]
    EngineUnavailable,

    #[error("Failed to start: {0}")]
    LaunchFailure(String),

    #[error("Session has no running engine")]
    NotRunning,

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Unavailable => SessionError::EngineUnavailable,
            EngineError::Rejected(message) => SessionError::LaunchFailure(message),
            other => SessionError::LaunchFailure(other.to_string()),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Launching, // Surface mounted, engine not started
    Running,   // Engine up, input and saves live
    Closed,    // Engine torn down, keys released
}

#[machine]
pub struct EmulatorSession<S: SessionState> {
    title: TitleKey,
    status: watch::Sender<EmulatorStatus>,
    surface: ControlSurface,
    store: Arc<StorageBackend>,
    codec: SaveCodec,
    engine: Option<Arc<dyn Engine>>,
    slot: Option<StateSlot>,
}

impl<S: SessionState> EmulatorSession<S> {
    pub fn title(&self) -> &TitleKey {
        &self.title
    }

    pub fn status(&self) -> EmulatorStatus {
        *self.status.borrow()
    }

    /// Status feed for the host UI. Stays readable after the session is
    /// consumed by a failed launch.
    pub fn subscribe_status(&self) -> watch::Receiver<EmulatorStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: EmulatorStatus) {
        self.status.send_replace(status);
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }
}

impl EmulatorSession<Launching> {
    pub fn create(
        title: &str,
        surface: ControlSurface,
        store: Arc<StorageBackend>,
        codec: SaveCodec,
    ) -> Self {
        let title = TitleKey::from_title(title);
        info!("Creating session for {} (key {})", title.title(), title);

        let (status, _) = watch::channel(EmulatorStatus::Idle);
        Self::new(
            title,
            status,
            surface,
            store,
            codec,
            None, // engine
            None, // slot
        )
    }

    /// Builds the surface and codec from configuration.
    pub fn from_config(
        title: &str,
        config: &FrontendConfig,
        pad: PadGeometry,
        synthesizer: EventSynthesizer,
        store: Arc<StorageBackend>,
    ) -> Result<Self, SessionError> {
        let profile = ButtonRegistry::default().profile(&config.input.profile)?;
        let surface = ControlSurface::new(profile, pad, config.input.settings(), synthesizer);
        let codec = SaveCodec::new(config.saves.min_state_size);
        Ok(Self::create(title, surface, store, codec))
    }

    /// Starts the engine. Any failure here ends the session.
    pub async fn launch(
        mut self,
        launcher: &dyn EngineLauncher,
        config: LaunchConfig,
    ) -> Result<EmulatorSession<Running>, SessionError> {
        if !launcher.is_available() {
            error!("Engine library unavailable, cannot launch {}", self.title);
            self.set_status(EmulatorStatus::Error);
            return Err(SessionError::EngineUnavailable);
        }

        self.set_status(EmulatorStatus::Loading);
        info!("Launching {} on core {}", self.title.title(), config.core);

        let engine = match launcher.launch(config).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Emulator error: {}", e);
                self.set_status(EmulatorStatus::Error);
                return Err(e.into());
            }
        };

        self.surface.attach_engine(engine.clone());
        self.slot = Some(StateSlot::new(
            engine.clone(),
            self.store.clone(),
            self.codec,
            self.title.clone(),
        ));
        self.engine = Some(engine);
        self.set_status(EmulatorStatus::Running);
        info!("Session running: {}", self.title);
        Ok(self.transition())
    }
}

impl EmulatorSession<Running> {
    pub fn surface_mut(&mut self) -> &mut ControlSurface {
        &mut self.surface
    }

    /// Input surface and save slot, borrowed together so input keeps flowing
    /// while a save or load is pending.
    pub fn split(&mut self) -> Result<(&mut ControlSurface, &StateSlot), SessionError> {
        let slot = self.slot.as_ref().ok_or(SessionError::NotRunning)?;
        Ok((&mut self.surface, slot))
    }

    pub fn slot(&self) -> Result<&StateSlot, SessionError> {
        self.slot.as_ref().ok_or(SessionError::NotRunning)
    }

    pub async fn save_state(&self) -> Result<SaveOutcome, SessionError> {
        Ok(self.slot()?.save().await?)
    }

    pub async fn load_state(&self) -> Result<LoadOutcome, SessionError> {
        Ok(self.slot()?.load().await?)
    }

    pub fn set_profile(&mut self, profile: &'static Profile) -> Vec<ButtonEdge> {
        self.surface.set_profile(profile)
    }

    /// Releases held keys and tears the engine down. Teardown errors are
    /// logged and otherwise ignored.
    pub fn close(mut self) -> EmulatorSession<Closed> {
        info!("Closing session {}", self.title);
        self.surface.release_all();
        self.surface.detach_engine();
        self.slot = None;
        if let Some(engine) = self.engine.take() {
            if let Err(e) = engine.exit() {
                warn!("Engine exit failed: {}", e);
            }
        }
        self.set_status(EmulatorStatus::Idle);
        self.transition()
    }
}
