//! Contract of the external emulation engine.
//!
//! The engine (ROM loading, CPU/PPU emulation, rendering) lives outside this
//! crate and is consumed through the narrow surface below. Every call into it
//! returns a boxed future so engines can be held as `Arc<dyn Engine>` and
//! swapped per session.

pub mod payload;

use crate::config::EngineConfig;
use crate::controller::button_registry::{ButtonDescriptor, LogicalButton};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use payload::EnginePayload;

pub const DEFAULT_CORE: &str = "snes9x2005";

pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine library is not loaded")]
    Unavailable,

    #[error("Engine rejected launch: {0}")]
    Rejected(String),

    #[error("Engine call {operation} failed: {message}")]
    Call {
        operation: &'static str,
        message: String,
    },
}

impl EngineError {
    pub fn call(operation: &'static str, message: impl Into<String>) -> Self {
        EngineError::Call {
            operation,
            message: message.into(),
        }
    }
}

/// Structured input accepted by engines that expose a direct input call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputEvent {
    pub button: LogicalButton,
    pub pressed: bool,
    pub code: &'static str,
    pub key: &'static str,
    pub key_code: u32,
}

impl InputEvent {
    pub fn new(button: LogicalButton, descriptor: ButtonDescriptor, pressed: bool) -> Self {
        Self {
            button,
            pressed,
            code: descriptor.code,
            key: descriptor.key,
            key_code: descriptor.key_code,
        }
    }
}

/// Optional capability: direct structured input.
pub trait StructuredInput: Send + Sync {
    fn input(&self, event: &InputEvent) -> Result<(), EngineError>;
}

/// A launched engine instance.
pub trait Engine: Send + Sync {
    /// Exports the current machine state. The payload shape is not fixed.
    fn save_state(&self) -> EngineFuture<'_, EnginePayload>;

    fn load_state<'a>(&'a self, state: &'a [u8]) -> EngineFuture<'a, ()>;

    /// Direct input capability, when the engine has one.
    fn structured_input(&self) -> Option<&dyn StructuredInput> {
        None
    }

    /// Best-effort teardown.
    fn exit(&self) -> Result<(), EngineError>;
}

/// Entry point of the engine library.
pub trait EngineLauncher: Send + Sync {
    /// Whether the engine library is loaded at all.
    fn is_available(&self) -> bool {
        true
    }

    fn launch(&self, config: LaunchConfig) -> EngineFuture<'_, Arc<dyn Engine>>;
}

/// Opaque handle of the surface the engine renders into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTarget(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectFit {
    #[default]
    Contain,
    Cover,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayStyle {
    pub object_fit: ObjectFit,
    pub background: String,
    pub z_index: i32,
}

impl Default for DisplayStyle {
    fn default() -> Self {
        Self {
            object_fit: ObjectFit::Contain,
            background: "transparent".to_string(),
            z_index: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub target: RenderTarget,
    pub rom: Arc<[u8]>,
    pub core: String,
    pub run_forever: bool,
    pub style: DisplayStyle,
}

impl LaunchConfig {
    pub fn new(target: RenderTarget, rom: impl Into<Arc<[u8]>>) -> Self {
        Self {
            target,
            rom: rom.into(),
            core: DEFAULT_CORE.to_string(),
            run_forever: true,
            style: DisplayStyle::default(),
        }
    }

    /// Core and run mode taken from the `[engine]` config section.
    pub fn from_config(target: RenderTarget, rom: impl Into<Arc<[u8]>>, config: &EngineConfig) -> Self {
        Self::new(target, rom)
            .with_core(config.core.clone())
            .with_run_forever(config.run_forever)
    }

    pub fn with_core(mut self, core: impl Into<String>) -> Self {
        self.core = core.into();
        self
    }

    pub fn with_run_forever(mut self, run_forever: bool) -> Self {
        self.run_forever = run_forever;
        self
    }

    pub fn with_style(mut self, style: DisplayStyle) -> Self {
        self.style = style;
        self
    }
}
