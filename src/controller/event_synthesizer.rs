//! Turns button edges into events the engine understands.
//!
//! The engine's key handling surface is opaque, so every edge goes out on
//! every channel that exists:
//!
//! ```text
//!                 ┌─► engine.structured_input()   (if the engine has one)
//! ButtonEdge ─────┼─► render surface  keydown/keyup
//!                 └─► document        keydown/keyup (global listeners)
//! ```
//!
//! Channels fail independently. A failure is logged and counted, never
//! returned, so a broken channel can't stall the others or the frame loop.

use crate::controller::button_registry::{ButtonDescriptor, ButtonRegistry, Profile};
use crate::controller::edge_detector::{ButtonEdge, Transition};
use crate::engine::{Engine, EngineError, InputEvent};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

impl fmt::Display for KeyEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEventKind::KeyDown => write!(f, "keydown"),
            KeyEventKind::KeyUp => write!(f, "keyup"),
        }
    }
}

/// Synthetic keyboard event as dispatched to DOM targets.
///
/// `key_code` and `which` are always set from the descriptor; older cores
/// read nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticKeyEvent {
    pub kind: KeyEventKind,
    pub code: &'static str,
    pub key: &'static str,
    pub key_code: u32,
    pub which: u32,
    pub bubbles: bool,
    pub cancelable: bool,
}

impl SyntheticKeyEvent {
    pub fn new(descriptor: ButtonDescriptor, transition: Transition) -> Self {
        let kind = match transition {
            Transition::Press => KeyEventKind::KeyDown,
            Transition::Release => KeyEventKind::KeyUp,
        };
        Self {
            kind,
            code: descriptor.code,
            key: descriptor.key,
            key_code: descriptor.key_code,
            which: descriptor.key_code,
            bubbles: true,
            cancelable: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Channel {channel} rejected event: {reason}")]
    Rejected {
        channel: &'static str,
        reason: String,
    },

    #[error("Engine input failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Capability not supported: {0}")]
    Unsupported(&'static str),
}

/// A DOM-like target keyboard events can be dispatched to.
pub trait KeyEventTarget: Send + Sync {
    fn dispatch(&self, event: &SyntheticKeyEvent) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub delivered: u8,
    pub failed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub edges: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
pub struct EventSynthesizer {
    engine: Option<Arc<dyn Engine>>,
    surface: Option<Box<dyn KeyEventTarget>>,
    document: Option<Box<dyn KeyEventTarget>>,
    stats: DispatchStats,
}

impl fmt::Debug for EventSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSynthesizer")
            .field("engine", &self.engine.is_some())
            .field("surface", &self.surface.is_some())
            .field("document", &self.document.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl EventSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_surface(mut self, target: Box<dyn KeyEventTarget>) -> Self {
        self.surface = Some(target);
        self
    }

    pub fn with_document(mut self, target: Box<dyn KeyEventTarget>) -> Self {
        self.document = Some(target);
        self
    }

    pub fn attach_engine(&mut self, engine: Arc<dyn Engine>) {
        self.engine = Some(engine);
    }

    pub fn detach_engine(&mut self) -> Option<Arc<dyn Engine>> {
        self.engine.take()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Resolves `edge` under `profile` and pushes it through every channel.
    pub fn emit(&mut self, profile: &Profile, edge: ButtonEdge) -> DispatchReport {
        let descriptor = ButtonRegistry::resolve(profile, edge.button);
        let pressed = edge.transition.is_press();
        let mut report = DispatchReport::default();

        // feature-detected on every edge, engines may gain it after launch
        if let Some(input) = self.engine.as_ref().and_then(|e| e.structured_input()) {
            let event = InputEvent::new(edge.button, descriptor, pressed);
            record(&mut report, "engine", input.input(&event).map_err(DispatchError::from));
        }

        let event = SyntheticKeyEvent::new(descriptor, edge.transition);
        debug!(
            "{} {} ({}, keyCode {}) via profile {}",
            event.kind, edge.button, event.code, event.key_code, profile.name
        );

        if let Some(surface) = &self.surface {
            record(&mut report, "surface", surface.dispatch(&event));
        }
        if let Some(document) = &self.document {
            record(&mut report, "document", document.dispatch(&event));
        }

        if report.delivered == 0 {
            warn!("No channel accepted {} for {}", event.kind, edge.button);
        }

        self.stats.edges += 1;
        self.stats.delivered += u64::from(report.delivered);
        self.stats.failed += u64::from(report.failed);
        report
    }
}

fn record(report: &mut DispatchReport, channel: &str, result: Result<(), DispatchError>) {
    match result {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            warn!("Input channel {} failed: {}", channel, e);
            report.failed += 1;
        }
    }
}
