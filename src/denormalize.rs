//! Denormalize traversal
//!
//! The inverse walk: references are replaced by entities pulled from an
//! [`EntitySource`], expanded recursively through their field schemas.

use serde_json::Value;
use tracing::debug;

use crate::error::{NormalizrError, Result};
use crate::immutable::{self, ImmutableRecord};
use crate::schema::{tag_text, EntitySchema, Members, ObjectSchema, Schema};
use crate::store::{id_key, EntitySource};
use crate::visited::ExpansionCache;

/// Rebuild the nested shape of `input` from `entities`
///
/// References that resolve to nothing (and that no fallback strategy
/// supplies) become `null`. An entity reached again while it is still being
/// expanded is returned with its fields unexpanded, which is where cycles are
/// cut.
pub fn denormalize<'s, S>(
    input: &Value,
    schema: impl Into<Option<&'s Schema>>,
    entities: &S,
) -> Result<Value>
where
    S: EntitySource + ?Sized,
{
    let schema = schema.into().ok_or(NormalizrError::MissingSchema)?;
    let mut denormalizer = Denormalizer {
        source: entities,
        cache: ExpansionCache::default(),
    };
    Ok(denormalizer.unvisit(input, schema))
}

struct Denormalizer<'a, S: ?Sized> {
    source: &'a S,
    cache: ExpansionCache,
}

impl<S: EntitySource + ?Sized> Denormalizer<'_, S> {
    fn unvisit(&mut self, input: &Value, schema: &Schema) -> Value {
        if input.is_null() {
            return Value::Null;
        }

        match schema {
            Schema::Entity(entity) => self.unvisit_entity(entity, input),
            Schema::Array(array) => match input {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| self.unvisit_member(array.members(), item))
                        .collect(),
                ),
                _ => input.clone(),
            },
            Schema::Object(object) => self.unvisit_object(object, input),
            Schema::Union(union) => self.unvisit_member(union.members(), input),
            Schema::Values(values) => match input {
                Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(field, value)| {
                            (field.clone(), self.unvisit_member(values.members(), value))
                        })
                        .collect(),
                ),
                _ => input.clone(),
            },
        }
    }

    fn unvisit_entity(&mut self, schema: &EntitySchema, input: &Value) -> Value {
        let (found, id) = if input.is_object() {
            let id = schema.get_id(input, &Value::Null, None);
            (Some(input.clone()), id)
        } else {
            let found = self
                .source
                .entity(schema.key(), &id_key(input))
                .cloned()
                .or_else(|| schema.fallback(input));
            (found, input.clone())
        };

        let Some(entity) = found else {
            debug!(entity_type = schema.key(), id = %input, "unresolved reference");
            return Value::Null;
        };
        if !entity.is_object() {
            return entity;
        }

        // Objects without an id cannot be shared or revisited, so skip the cache.
        if id.is_null() {
            return self.expand_entity(schema, entity);
        }
        let id = id_key(&id);
        if let Some(cached) = self.cache.get(schema.key(), &id) {
            return cached.clone();
        }

        self.cache.begin(schema.key(), &id, entity.clone());
        let expanded = self.expand_entity(schema, entity);
        self.cache.complete(schema.key(), &id, expanded.clone());
        expanded
    }

    fn expand_entity(&mut self, schema: &EntitySchema, entity: Value) -> Value {
        let fields = schema.fields();

        if let Some(mut record) = ImmutableRecord::detect(&entity) {
            for (field, child) in fields.iter() {
                if let Some(value) = record.get(field).cloned() {
                    let expanded = self.unvisit(&value, child);
                    record = record.set(field, expanded);
                }
            }
            return record.into_value();
        }

        match entity {
            Value::Object(mut object) => {
                for (field, child) in fields.iter() {
                    if let Some(slot) = object.get_mut(field) {
                        let expanded = self.unvisit(slot, child);
                        *slot = expanded;
                    }
                }
                Value::Object(object)
            }
            other => other,
        }
    }

    fn unvisit_object(&mut self, schema: &ObjectSchema, input: &Value) -> Value {
        if let Some(mut record) = ImmutableRecord::detect(input) {
            for (field, child) in schema.fields() {
                if let Some(value) = record.get(field).filter(|v| !v.is_null()).cloned() {
                    let expanded = self.unvisit(&value, child);
                    record = record.set(field, expanded);
                }
            }
            return record.into_value();
        }

        let Value::Object(input) = input else {
            return input.clone();
        };
        let mut output = input.clone();
        for (field, child) in schema.fields() {
            if let Some(slot) = output.get_mut(field).filter(|v| !v.is_null()) {
                let expanded = self.unvisit(slot, child);
                *slot = expanded;
            }
        }
        Value::Object(output)
    }

    /// Expand one value of a union, array or values schema
    fn unvisit_member(&mut self, members: &Members, value: &Value) -> Value {
        match members {
            Members::Single(schema) => self.unvisit(value, schema),
            Members::Mapped { schemas, .. } => {
                let Some(tag) = immutable::get_field(value, "schema").and_then(tag_text) else {
                    return value.clone();
                };
                let Some(schema) = schemas.get(&tag) else {
                    debug!(tag = %tag, "no schema registered for tag, value left unchanged");
                    return value.clone();
                };
                let target = match immutable::get_field(value, "id") {
                    Some(id) if !id.is_null() => id.clone(),
                    _ => value.clone(),
                };
                self.unvisit(&target, schema)
            }
        }
    }
}
