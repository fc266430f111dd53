//! Persistent-container adapter
//!
//! Stores produced by persistent map libraries arrive as JSON objects that
//! carry an `__ownerID` member, either on the container itself or on its
//! `_map` member (in which case the entries live under `_map`). Denormalize
//! checks every record for that signature and, when present, reads and writes
//! through [`ImmutableRecord::get`] / [`ImmutableRecord::set`] instead of
//! touching members directly. The marker itself is never exposed as a field.

use serde_json::{Map, Value};

const OWNER_ID: &str = "__ownerID";
const MAP: &str = "_map";

/// Whether `value` carries the persistent-container signature
pub fn is_immutable(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    object.contains_key(OWNER_ID) || wrapped_entries(object).is_some()
}

fn wrapped_entries(object: &Map<String, Value>) -> Option<&Map<String, Value>> {
    object
        .get(MAP)
        .and_then(Value::as_object)
        .filter(|entries| entries.contains_key(OWNER_ID))
}

/// Field `key` of a plain or persistent record
pub fn get_field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let object = value.as_object()?;
    if is_immutable(value) {
        if key == OWNER_ID {
            return None;
        }
        return match wrapped_entries(object) {
            Some(entries) => entries.get(key),
            None => object.get(key),
        };
    }
    object.get(key)
}

/// Accessor pair over a persistent record
#[derive(Debug, Clone, PartialEq)]
pub struct ImmutableRecord {
    /// Outer container when the entries are wrapped in `_map`
    shell: Option<Map<String, Value>>,
    entries: Map<String, Value>,
}

impl ImmutableRecord {
    /// A record view of `value` if it carries the persistent signature
    pub fn detect(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.contains_key(OWNER_ID) {
            return Some(Self {
                shell: None,
                entries: object.clone(),
            });
        }
        let entries = wrapped_entries(object)?.clone();
        let mut shell = object.clone();
        shell.remove(MAP);
        Some(Self {
            shell: Some(shell),
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == OWNER_ID {
            return None;
        }
        self.entries.get(key)
    }

    /// Record with `key` set to `value`
    pub fn set(mut self, key: &str, value: Value) -> Self {
        if key != OWNER_ID {
            self.entries.insert(key.to_string(), value);
        }
        self
    }

    /// Back to the container shape it was detected in
    pub fn into_value(self) -> Value {
        match self.shell {
            Some(mut shell) => {
                shell.insert(MAP.to_string(), Value::Object(self.entries));
                Value::Object(shell)
            }
            None => Value::Object(self.entries),
        }
    }
}
