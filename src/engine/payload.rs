//! Raw result shapes of `Engine::save_state`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// What an engine handed back from a save call, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePayload {
    Null,
    /// Binary blob object, optionally typed
    Blob {
        data: Vec<u8>,
        mime: Option<String>,
    },
    /// Raw byte array or buffer view
    Bytes(Vec<u8>),
    /// Keyed object; may wrap the real state under `state`
    Object(BTreeMap<String, EnginePayload>),
    /// Any other scalar or JSON-like value
    Value(Value),
}

impl EnginePayload {
    pub fn blob(data: impl Into<Vec<u8>>) -> Self {
        EnginePayload::Blob {
            data: data.into(),
            mime: None,
        }
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        EnginePayload::Bytes(data.into())
    }

    /// `{ state: inner }`
    pub fn wrapped(inner: EnginePayload) -> Self {
        EnginePayload::Object(BTreeMap::from([("state".to_string(), inner)]))
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => EnginePayload::Null,
            Value::Object(map) => EnginePayload::Object(
                map.into_iter()
                    .map(|(key, value)| (key, EnginePayload::from_json(value)))
                    .collect(),
            ),
            other => EnginePayload::Value(other),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EnginePayload::Null | EnginePayload::Value(Value::Null))
    }

    /// JSON rendering for log output; binary content is summarised, not dumped.
    pub fn to_diagnostic_json(&self) -> Value {
        match self {
            EnginePayload::Null => Value::Null,
            EnginePayload::Blob { data, mime } => Value::String(format!(
                "<blob {} bytes{}>",
                data.len(),
                mime.as_deref().map(|m| format!(", {m}")).unwrap_or_default()
            )),
            EnginePayload::Bytes(data) => Value::String(format!("<{} bytes>", data.len())),
            EnginePayload::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_diagnostic_json()))
                    .collect::<Map<String, Value>>(),
            ),
            EnginePayload::Value(value) => value.clone(),
        }
    }
}
