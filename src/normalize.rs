//! Normalize traversal
//!
//! Walks input data alongside a schema. Entities are processed, their nested
//! fields visited, then stored; a reference takes their place in the output.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{json_type_name, NormalizrError, Result};
use crate::schema::{
    ArraySchema, EntitySchema, Inferred, Members, ObjectSchema, Schema, ValuesSchema,
};
use crate::store::{id_key, EntityStore, MergeOutcome};
use crate::visited::VisitedSet;

/// Output of [`normalize`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedData {
    /// Input shape with entities replaced by references
    pub result: Value,
    pub entities: EntityStore,
    #[serde(skip_serializing_if = "Diagnostics::is_empty")]
    pub diagnostics: Diagnostics,
}

/// Output of [`normalize_into`]; the entities went to the caller's store
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub result: Value,
    pub diagnostics: Diagnostics,
}

/// Behavior switches for a normalize call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Record a diagnostic (and log a warning) when a merge overwrites a field
    pub report_merge_conflicts: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            report_merge_conflicts: true,
        }
    }
}

/// Normalize `data` against `schema` into a fresh store
pub fn normalize(data: &Value, schema: &Schema) -> Result<NormalizedData> {
    let mut entities = EntityStore::new();
    let Normalized {
        result,
        diagnostics,
    } = normalize_into(data, schema, &mut entities)?;
    Ok(NormalizedData {
        result,
        entities,
        diagnostics,
    })
}

/// Normalize `data`, accumulating entities into an existing store
pub fn normalize_into(
    data: &Value,
    schema: &Schema,
    store: &mut EntityStore,
) -> Result<Normalized> {
    normalize_with(data, schema, store, NormalizeOptions::default())
}

pub fn normalize_with(
    data: &Value,
    schema: &Schema,
    store: &mut EntityStore,
    options: NormalizeOptions,
) -> Result<Normalized> {
    if !is_container(data) {
        return Err(NormalizrError::UnexpectedInput {
            found: json_type_name(data),
        });
    }

    let mut normalizer = Normalizer {
        store,
        visited: VisitedSet::default(),
        diagnostics: Diagnostics::new(),
        options,
    };
    let result = normalizer.visit(data, data, None, schema);
    debug!(
        entities = normalizer.store.len(),
        diagnostics = normalizer.diagnostics.len(),
        "normalized input"
    );

    Ok(Normalized {
        result,
        diagnostics: normalizer.diagnostics,
    })
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

struct Normalizer<'a> {
    store: &'a mut EntityStore,
    visited: VisitedSet,
    diagnostics: Diagnostics,
    options: NormalizeOptions,
}

impl Normalizer<'_> {
    fn visit(
        &mut self,
        value: &Value,
        parent: &Value,
        key: Option<&str>,
        schema: &Schema,
    ) -> Value {
        if !is_container(value) {
            return value.clone();
        }

        match schema {
            Schema::Entity(entity) => self.visit_entity(entity, value, parent, key),
            Schema::Array(array) => self.visit_array(array, value, parent, key),
            Schema::Object(object) => self.visit_object(object, value),
            Schema::Union(union) => self.visit_member(union.members(), value, parent, key),
            Schema::Values(values) => self.visit_values(values, value),
        }
    }

    fn visit_entity(
        &mut self,
        entity: &EntitySchema,
        input: &Value,
        parent: &Value,
        key: Option<&str>,
    ) -> Value {
        let id = entity.get_id(input, parent, key);
        if id.is_null() {
            self.diagnostics.missing_id(entity.key(), key);
        }
        let id_key = id_key(&id);

        if self.visited.is_in_progress(entity.key(), &id_key) {
            return id;
        }
        self.visited.enter(entity.key(), &id_key);

        let mut processed = entity.process(input, parent, key);
        let snapshot = processed.clone();
        if let Value::Object(object) = &mut processed {
            for (field, child) in entity.fields().iter() {
                let Some(slot) = object.get_mut(field) else {
                    continue;
                };
                if !is_container(slot) {
                    continue;
                }
                let normalized = self.visit(slot, &snapshot, Some(field.as_str()), child);
                *slot = normalized;
            }
        }

        self.visited.leave(entity.key(), &id_key);
        self.add_entity(entity, &id_key, processed);
        id
    }

    fn add_entity(&mut self, entity: &EntitySchema, id: &str, processed: Value) {
        let MergeOutcome::Merged { conflicts } = self.store.add(entity, id, processed) else {
            return;
        };
        if conflicts.is_empty() || !self.options.report_merge_conflicts {
            return;
        }
        let fields: Vec<&str> = conflicts.iter().map(|c| c.field.as_str()).collect();
        warn!(
            entity_type = entity.key(),
            id,
            fields = %fields.join(","),
            "merge conflict"
        );
        self.diagnostics.merge_conflict(entity.key(), id, &conflicts);
    }

    fn visit_array(
        &mut self,
        array: &ArraySchema,
        value: &Value,
        parent: &Value,
        key: Option<&str>,
    ) -> Value {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => return value.clone(),
        };

        let normalized = items
            .into_iter()
            .map(|item| self.visit_member(array.members(), item, parent, key))
            .filter(|item| !item.is_null())
            .collect();
        Value::Array(normalized)
    }

    fn visit_object(&mut self, object: &ObjectSchema, value: &Value) -> Value {
        let Value::Object(input) = value else {
            return value.clone();
        };

        let mut output = input.clone();
        for (field, child) in object.fields() {
            if let Some(field_value) = input.get(field) {
                let normalized = self.visit(field_value, value, Some(field.as_str()), child);
                output.insert(field.clone(), normalized);
            }
        }
        Value::Object(output)
    }

    fn visit_values(&mut self, values: &ValuesSchema, value: &Value) -> Value {
        let mut output = Map::new();
        match value {
            Value::Object(input) => {
                for (field, field_value) in input {
                    if field_value.is_null() {
                        continue;
                    }
                    let key = Some(field.as_str());
                    let normalized = self.visit_member(values.members(), field_value, value, key);
                    output.insert(field.clone(), normalized);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    let field = index.to_string();
                    let normalized =
                        self.visit_member(values.members(), item, value, Some(field.as_str()));
                    output.insert(field, normalized);
                }
            }
            _ => return value.clone(),
        }
        Value::Object(output)
    }

    /// Visit one value of a union, array or values schema
    fn visit_member(
        &mut self,
        members: &Members,
        value: &Value,
        parent: &Value,
        key: Option<&str>,
    ) -> Value {
        if !is_container(value) {
            return value.clone();
        }

        match members.infer(value, parent, key) {
            Inferred::Single(schema) => self.visit(value, parent, key, schema),
            Inferred::Tagged { schema, tag } => {
                let id = self.visit(value, parent, key, schema);
                if id.is_null() {
                    id
                } else {
                    json!({ "id": id, "schema": tag })
                }
            }
            Inferred::Unmatched(tag) => {
                debug!(tag = ?tag, field = ?key, "no schema matched, value left unchanged");
                self.diagnostics
                    .unmatched_discriminator(key.unwrap_or("<root>"), tag.as_deref());
                value.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;
    use crate::schema::{Discriminator, EntityOptions, SchemaMap, UnionSchema};
    use pretty_assertions::assert_eq;

    fn article_schema() -> (EntitySchema, EntitySchema) {
        let user = EntitySchema::new("users").unwrap();
        let article =
            EntitySchema::with_fields("articles", [("author", &user)], EntityOptions::default())
                .unwrap();
        (article, user)
    }

    #[test]
    fn test_nested_entity() {
        let (article, _) = article_schema();
        let data = json!({"id": 1, "title": "A", "author": {"id": 3, "name": "M"}});

        let out = normalize(&data, &Schema::from(article)).unwrap();
        assert_eq!(out.result, json!(1));
        assert_eq!(
            out.entities.get("articles", "1"),
            Some(&json!({"id": 1, "title": "A", "author": 3}))
        );
        assert_eq!(out.entities.get("users", "3"), Some(&json!({"id": 3, "name": "M"})));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_rejects_non_container_input() {
        let (article, _) = article_schema();
        let schema = Schema::from(article);
        for input in [json!(42), json!("x"), json!(null), json!(true)] {
            let err = normalize(&input, &schema).unwrap_err();
            assert!(matches!(err, NormalizrError::UnexpectedInput { .. }));
        }
        let err = normalize(&json!(null), &schema).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected input given to normalize. Expected type to be \"object\", found \"null\""
        );
    }

    #[test]
    fn test_primitive_field_passes_through() {
        let (article, _) = article_schema();
        let data = json!({"id": 1, "author": 3});
        let out = normalize(&data, &Schema::from(article)).unwrap();
        assert_eq!(out.entities.get("articles", "1"), Some(&json!({"id": 1, "author": 3})));
        assert!(out.entities.table("users").is_none());
    }

    #[test]
    fn test_array_drops_absent_values() {
        let user = EntitySchema::new("users").unwrap();
        let schema = Schema::from(ArraySchema::new(&user));
        let out = normalize(&json!([{"id": 1}, null, {"id": 2}]), &schema).unwrap();
        assert_eq!(out.result, json!([1, 2]));
    }

    #[test]
    fn test_array_accepts_map_of_values() {
        let user = EntitySchema::new("users").unwrap();
        let schema = Schema::from(ArraySchema::new(&user));
        let out = normalize(&json!({"a": {"id": 1}, "b": {"id": 2}}), &schema).unwrap();
        assert_eq!(out.result, json!([1, 2]));
    }

    #[test]
    fn test_id_rule_sees_raw_input() {
        let user = EntitySchema::with_options(
            "users",
            EntityOptions::new()
                .id_attribute("uuid")
                .process_strategy(|input, _, _| {
                    let mut copy = input.clone();
                    if let Some(object) = copy.as_object_mut() {
                        object.remove("uuid");
                    }
                    copy
                }),
        )
        .unwrap();

        let out = normalize(&json!({"uuid": "u-1", "name": "Ann"}), &Schema::from(user)).unwrap();
        assert_eq!(out.result, json!("u-1"));
        assert_eq!(out.entities.get("users", "u-1"), Some(&json!({"name": "Ann"})));
    }

    #[test]
    fn test_process_strategy_receives_parent_and_key() {
        let comment = EntitySchema::with_options(
            "comments",
            EntityOptions::new().process_strategy(|input, parent, key| {
                let mut copy = input.clone();
                copy["post"] = parent["id"].clone();
                copy["via"] = json!(key);
                copy
            }),
        )
        .unwrap();
        let post = EntitySchema::with_fields(
            "posts",
            [("comments", ArraySchema::new(&comment))],
            EntityOptions::default(),
        )
        .unwrap();

        let data = json!({"id": 5, "comments": [{"id": 9}]});
        let out = normalize(&data, &Schema::from(post)).unwrap();
        assert_eq!(
            out.entities.get("comments", "9"),
            Some(&json!({"id": 9, "post": 5, "via": "comments"}))
        );
    }

    #[test]
    fn test_missing_id_is_diagnosed() {
        let user = EntitySchema::new("users").unwrap();
        let out = normalize(&json!({"name": "nobody"}), &Schema::from(user)).unwrap();
        assert_eq!(out.result, Value::Null);
        assert!(out.entities.contains("users", "null"));
        assert_eq!(out.diagnostics.with_code(DiagnosticCode::MissingId).count(), 1);
    }

    #[test]
    fn test_unmatched_union_value_is_unchanged() {
        let mut schemas = SchemaMap::new();
        schemas.insert("users".into(), EntitySchema::new("users").unwrap().into());
        let union = UnionSchema::new(schemas, Some(Discriminator::from("type"))).unwrap();

        let data = json!({"id": 1, "type": "robots"});
        let out = normalize(&data, &Schema::from(union)).unwrap();
        assert_eq!(out.result, data);
        assert!(out.entities.is_empty());
        assert_eq!(
            out.diagnostics
                .with_code(DiagnosticCode::UnmatchedDiscriminator)
                .count(),
            1
        );
    }

    #[test]
    fn test_merge_conflicts_can_be_silenced() {
        let user = EntitySchema::new("users").unwrap();
        let schema = Schema::from(ArraySchema::new(&user));
        let data = json!([{"id": 1, "name": "Ann"}, {"id": 1, "name": "Anne"}]);

        let mut store = EntityStore::new();
        let quiet = normalize_with(
            &data,
            &schema,
            &mut store,
            NormalizeOptions {
                report_merge_conflicts: false,
            },
        )
        .unwrap();
        assert!(quiet.diagnostics.is_empty());

        let loud = normalize(&data, &schema).unwrap();
        assert_eq!(loud.diagnostics.with_code(DiagnosticCode::MergeConflict).count(), 1);
        assert_eq!(loud.entities.get("users", "1"), Some(&json!({"id": 1, "name": "Anne"})));
    }
}
