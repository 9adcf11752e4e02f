//! The opaque receptivity value produced by the external engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::RECEPTIVITY_STATE_FIELD;

/// Receptivity reading as produced by the engine.
///
/// The content is forwarded untouched; only the state field is looked at,
/// to reject empty initial readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receptivity(Map<String, Value>);

impl Receptivity {
    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// The `ReceptivityState` field, when present as a string.
    pub fn state(&self) -> Option<&str> {
        self.0.get(RECEPTIVITY_STATE_FIELD).and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Validate the detail of an `initialReceptivity` notification.
///
/// Returns `None` for a missing detail, a non-object detail, or one whose
/// `ReceptivityState` is absent or empty.
pub fn parse_initial_receptivity(detail: Option<&Value>) -> Option<Receptivity> {
    let receptivity = Receptivity::from_value(detail?.clone())?;
    match receptivity.state() {
        Some(state) if !state.is_empty() => Some(receptivity),
        _ => None,
    }
}
