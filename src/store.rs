//! Entity store
//!
//! The flat table built by normalize: entity type → id → entity. Backed by
//! ordered maps, so a lookup only ever returns an entry that was stored and
//! serialization is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::immutable;
use crate::schema::EntitySchema;

/// Store key of an id value: strings as-is, anything else as its JSON text
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which value a conflicting field holds after a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Incoming,
    Existing,
    /// Neither side as given (merge rule computed or removed it)
    Combined,
}

/// A field both representations carry with different values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
    pub field: String,
    pub resolution: Resolution,
}

impl FieldConflict {
    pub fn new(field: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            field: field.into(),
            resolution,
        }
    }
}

/// What happened when an entity was added
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    /// Merged into an existing entry; lists fields whose values disagreed
    Merged { conflicts: Vec<FieldConflict> },
}

/// Entities keyed by type, then id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityStore {
    tables: BTreeMap<String, BTreeMap<String, Value>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_type: &str, id: &str) -> Option<&Value> {
        self.tables.get(entity_type)?.get(id)
    }

    pub fn contains(&self, entity_type: &str, id: &str) -> bool {
        self.get(entity_type, id).is_some()
    }

    /// All entities of one type
    pub fn table(&self, entity_type: &str) -> Option<&BTreeMap<String, Value>> {
        self.tables.get(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total number of stored entities
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `entity` under (schema key, id), merging with any existing entry
    pub fn add(&mut self, schema: &EntitySchema, id: &str, entity: Value) -> MergeOutcome {
        let table = self.tables.entry(schema.key().to_string()).or_default();
        match table.get_mut(id) {
            Some(existing) => {
                let merged = schema.merge(existing, &entity);
                let conflicts = conflicting_fields(existing, &entity, &merged);
                *existing = merged;
                trace!(entity_type = schema.key(), id, "merged entity");
                MergeOutcome::Merged { conflicts }
            }
            None => {
                table.insert(id.to_string(), entity);
                trace!(entity_type = schema.key(), id, "stored entity");
                MergeOutcome::Inserted
            }
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.tables
                .iter()
                .map(|(entity_type, table)| {
                    let entries = table
                        .iter()
                        .map(|(id, entity)| (id.clone(), entity.clone()))
                        .collect();
                    (entity_type.clone(), Value::Object(entries))
                })
                .collect(),
        )
    }
}

/// Fields present in both records with different values, and which one won
fn conflicting_fields(existing: &Value, incoming: &Value, merged: &Value) -> Vec<FieldConflict> {
    let (Value::Object(existing), Value::Object(incoming)) = (existing, incoming) else {
        return Vec::new();
    };

    incoming
        .iter()
        .filter_map(|(field, value)| {
            let old = existing.get(field).filter(|old| *old != value)?;
            let resolution = match merged.get(field) {
                Some(kept) if kept == value => Resolution::Incoming,
                Some(kept) if kept == old => Resolution::Existing,
                _ => Resolution::Combined,
            };
            Some(FieldConflict::new(field.clone(), resolution))
        })
        .collect()
}

/// Where denormalize looks entities up
pub trait EntitySource {
    fn entity(&self, entity_type: &str, id: &str) -> Option<&Value>;
}

impl EntitySource for EntityStore {
    fn entity(&self, entity_type: &str, id: &str) -> Option<&Value> {
        self.get(entity_type, id)
    }
}

/// A bag already in JSON form, plain or persistent
impl EntitySource for Value {
    fn entity(&self, entity_type: &str, id: &str) -> Option<&Value> {
        let table = immutable::get_field(self, entity_type)?;
        immutable::get_field(table, id)
    }
}

impl<T: EntitySource + ?Sized> EntitySource for &T {
    fn entity(&self, entity_type: &str, id: &str) -> Option<&Value> {
        (**self).entity(entity_type, id)
    }
}
