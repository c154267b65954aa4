//! Normalisation of engine save payloads.
//!
//! Engines return save states in several shapes (blob, raw bytes, an object
//! wrapping either under `state`, or an error object). Decoding collapses all
//! of them into a [`SaveBlob`] or a [`CodecError`] in one place.
//!
//! The size floor is a heuristic: engine-side failures tend to come back as
//! short error strings where a state was expected. It is configurable because
//! real state sizes vary per core.

use crate::engine::EnginePayload;
use crate::persistence::SaveBlob;
use tracing::{debug, warn};

pub const DEFAULT_MIN_STATE_SIZE: usize = 1024;

// Longest diagnostic kept from an unrecognized payload, in chars
const DIAGNOSTIC_LIMIT: usize = 160;

// Guards against self-similar `{state: {state: ...}}` payloads
const MAX_UNWRAP_DEPTH: usize = 8;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Engine returned no save data")]
    EmptyResult,

    #[error("Engine returned an unrecognized payload: {detail}")]
    UnrecognizedPayload { detail: String },

    #[error("Save data too small ({size} bytes, minimum {minimum}); likely an engine error message")]
    PayloadTooSmall { size: usize, minimum: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveCodec {
    min_size: usize,
}

impl Default for SaveCodec {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_STATE_SIZE,
        }
    }
}

impl SaveCodec {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Decodes a raw save result into a validated blob.
    pub fn normalize(&self, raw: EnginePayload) -> Result<SaveBlob, CodecError> {
        let data = unwrap_payload(raw, 0)?;
        self.validate(&data)?;
        debug!("Normalized save payload: {} bytes", data.len());
        Ok(SaveBlob::new(data))
    }

    /// Bytes to hand back to the engine, re-checked against the size floor.
    pub fn denormalize<'a>(&self, blob: &'a SaveBlob) -> Result<&'a [u8], CodecError> {
        self.validate(&blob.data)?;
        Ok(&blob.data)
    }

    pub fn validate(&self, data: &[u8]) -> Result<(), CodecError> {
        if data.len() < self.min_size {
            warn!(
                "Rejecting {} byte state (minimum {})",
                data.len(),
                self.min_size
            );
            return Err(CodecError::PayloadTooSmall {
                size: data.len(),
                minimum: self.min_size,
            });
        }
        Ok(())
    }
}

fn unwrap_payload(raw: EnginePayload, depth: usize) -> Result<Vec<u8>, CodecError> {
    if raw.is_null() {
        return Err(CodecError::EmptyResult);
    }
    match raw {
        EnginePayload::Blob { data, .. } => Ok(data),
        EnginePayload::Bytes(data) => Ok(data),
        EnginePayload::Object(mut fields) if fields.contains_key("state") => {
            if depth >= MAX_UNWRAP_DEPTH {
                return Err(CodecError::UnrecognizedPayload {
                    detail: format!("state nested deeper than {MAX_UNWRAP_DEPTH} levels"),
                });
            }
            match fields.remove("state") {
                Some(inner) => unwrap_payload(inner, depth + 1),
                None => Err(CodecError::EmptyResult),
            }
        }
        other => Err(CodecError::UnrecognizedPayload {
            detail: diagnostic(&other),
        }),
    }
}

fn diagnostic(payload: &EnginePayload) -> String {
    let rendered = serde_json::to_string(&payload.to_diagnostic_json())
        .unwrap_or_else(|e| format!("<unprintable payload: {e}>"));
    if rendered.chars().count() <= DIAGNOSTIC_LIMIT {
        return rendered;
    }
    let mut truncated: String = rendered.chars().take(DIAGNOSTIC_LIMIT).collect();
    truncated.push('…');
    truncated
}
