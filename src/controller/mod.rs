//! Touch input translation
//!
//! Turns continuous pointer input into discrete, edge-triggered key events
//! for the engine:
//!
//! 1. [`dpad_sampler`] - pointer position to four direction flags
//! 2. [`edge_detector`] - held-button set, emits only transitions
//! 3. [`button_registry`] - logical button to key descriptor per profile
//! 4. [`event_synthesizer`] - fans each edge out to the engine's input channels
//! 5. [`control_surface`] - owns the above for one session
//!
//! # Architecture
//!
//! ```text
//! Pointer ──► DpadSampler ──┐
//!                           ├──► EdgeDetector ──► EventSynthesizer ──► Engine
//! Button region ────────────┘     (edges only)     (all channels)
//! ```
//!
//! Everything here runs synchronously on the input event that caused it.

pub mod button_registry;
pub mod control_surface;
pub mod dpad_sampler;
pub mod edge_detector;
pub mod event_synthesizer;

pub use button_registry::{ButtonDescriptor, ButtonRegistry, LogicalButton, Profile};
pub use control_surface::{ControlSurface, Haptics, InputSettings};
pub use dpad_sampler::{DirectionState, DpadSampler, PadGeometry, PointerContact, PointerEvent};
pub use edge_detector::{ButtonEdge, EdgeDetector, Transition};
pub use event_synthesizer::{
    DispatchError, DispatchReport, DispatchStats, EventSynthesizer, KeyEventKind,
    KeyEventTarget, SyntheticKeyEvent,
};
