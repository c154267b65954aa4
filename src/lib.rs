//! Touch controller front end and save-state persistence for a webview
//! emulation engine.
//!
//! The engine itself is external and reached through [`engine::Engine`].
//! This crate translates multi-touch input into the engine's keyboard
//! vocabulary ([`controller`]) and stores its save states ([`persistence`]),
//! tied together per title by [`session::EmulatorSession`].

pub mod config;
pub mod controller;
pub mod engine;
pub mod persistence;
pub mod session;
pub mod setup;

pub use config::FrontendConfig;
pub use session::{EmulatorSession, EmulatorStatus, SessionError};
