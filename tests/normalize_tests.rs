//! Normalize Behavior Tests
//!
//! End-to-end normalize scenarios over schemas built in code.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use schema_normalizr::{
    normalize, normalize_into, ArraySchema, DiagnosticCode, Discriminator, EntityOptions,
    EntitySchema, EntityStore, NormalizrError, ObjectSchema, Schema, SchemaMap, UnionSchema,
    ValuesSchema,
};

fn user_group_map() -> SchemaMap {
    let mut schemas = SchemaMap::new();
    schemas.insert("users".into(), EntitySchema::new("users").unwrap().into());
    schemas.insert("groups".into(), EntitySchema::new("groups").unwrap().into());
    schemas
}

// =============================================================================
// Entities
// =============================================================================

#[test]
fn test_article_with_author() {
    let user = EntitySchema::new("users").unwrap();
    let article =
        EntitySchema::with_fields("articles", [("author", &user)], EntityOptions::default())
            .unwrap();

    let data = json!({"id": 1, "title": "A", "author": {"id": 3, "name": "M"}});
    let out = normalize(&data, &Schema::from(article)).unwrap();

    assert_eq!(out.result, json!(1));
    assert_eq!(
        out.entities.to_value(),
        json!({
            "articles": {"1": {"id": 1, "title": "A", "author": 3}},
            "users": {"3": {"id": 3, "name": "M"}}
        })
    );
}

#[test]
fn test_input_is_not_mutated() {
    let user = EntitySchema::new("users").unwrap();
    let article =
        EntitySchema::with_fields("articles", [("author", &user)], EntityOptions::default())
            .unwrap();
    let data = json!({"id": 1, "author": {"id": 3}});
    let before = data.clone();

    normalize(&data, &Schema::from(article)).unwrap();
    assert_eq!(data, before);
}

#[test]
fn test_merge_accumulates_fields() {
    let user = EntitySchema::new("users").unwrap();
    let data = json!([
        {"id": 3, "name": "Jo", "isBritish": true},
        {"id": 3, "name": "Jo", "bio": "writer"}
    ]);

    let out = normalize(&data, &Schema::from(ArraySchema::new(&user))).unwrap();
    assert_eq!(out.result, json!([3, 3]));
    assert_eq!(
        out.entities.get("users", "3"),
        Some(&json!({"id": 3, "name": "Jo", "isBritish": true, "bio": "writer"}))
    );
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_custom_merge_strategy() {
    let counter = EntitySchema::with_options(
        "counters",
        EntityOptions::new().merge_strategy(|existing, incoming| {
            let total =
                existing["hits"].as_i64().unwrap_or(0) + incoming["hits"].as_i64().unwrap_or(0);
            json!({"id": incoming["id"], "hits": total})
        }),
    )
    .unwrap();
    let data = json!([{"id": "a", "hits": 2}, {"id": "a", "hits": 5}]);

    let out = normalize(&data, &Schema::from(ArraySchema::new(&counter))).unwrap();
    assert_eq!(out.entities.get("counters", "a"), Some(&json!({"id": "a", "hits": 7})));
}

#[test]
fn test_conflict_report_names_the_kept_side() {
    let first_wins = EntitySchema::with_options(
        "users",
        EntityOptions::new().merge_strategy(|existing, _| existing.clone()),
    )
    .unwrap();
    let data = json!([{"id": 1, "name": "Ann"}, {"id": 1, "name": "Anne"}]);

    let out = normalize(&data, &Schema::from(ArraySchema::new(&first_wins))).unwrap();
    assert_eq!(out.entities.get("users", "1"), Some(&json!({"id": 1, "name": "Ann"})));

    let conflict = out
        .diagnostics
        .with_code(DiagnosticCode::MergeConflict)
        .next()
        .expect("conflict should be reported");
    assert_eq!(conflict.context, vec!["Existing kept: name".to_string()]);
    assert!(!conflict.message.contains("incoming"));
}

#[test]
fn test_same_entity_twice_is_idempotent() {
    let user = EntitySchema::new("users").unwrap();
    let schema = Schema::from(ArraySchema::new(&user));
    let entity = json!({"id": 5, "name": "Ann", "tags": ["a"]});

    let once = normalize(&json!([entity.clone()]), &schema).unwrap();
    let twice = normalize(&json!([entity.clone(), entity]), &schema).unwrap();

    assert_eq!(once.entities, twice.entities);
    assert!(twice.diagnostics.is_empty());
}

#[test]
fn test_string_and_number_ids_share_a_key() {
    let user = EntitySchema::new("users").unwrap();
    let out = normalize(
        &json!([{"id": 1, "a": true}, {"id": "1", "b": true}]),
        &Schema::from(ArraySchema::new(&user)),
    )
    .unwrap();

    assert_eq!(out.entities.table("users").map(|t| t.len()), Some(1));
}

#[test]
fn test_reserved_looking_ids_are_plain_keys() {
    let user = EntitySchema::new("users").unwrap();
    let out = normalize(
        &json!([{"id": "constructor"}, {"id": "__proto__"}]),
        &Schema::from(ArraySchema::new(&user)),
    )
    .unwrap();

    assert!(out.entities.contains("users", "constructor"));
    assert!(out.entities.contains("users", "__proto__"));
    assert!(!out.entities.contains("users", "toString"));
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn test_self_reference_terminates() {
    let user = EntitySchema::new("users").unwrap();
    user.define([("manager", &user)]);

    let mut data = json!({"id": 1, "name": "Ann"});
    data["manager"] = data.clone();

    let out = normalize(&data, &Schema::from(&user)).unwrap();
    assert_eq!(out.result, json!(1));
    assert_eq!(out.entities.len(), 1);
    assert_eq!(
        out.entities.get("users", "1"),
        Some(&json!({"id": 1, "name": "Ann", "manager": 1}))
    );
}

#[test]
fn test_mutual_cycle_stores_each_entity_once() {
    let author = EntitySchema::new("authors").unwrap();
    let book = EntitySchema::new("books").unwrap();
    author.define([("books", ArraySchema::new(&book))]);
    book.define([("author", &author)]);

    let data = json!({
        "id": "a1",
        "books": [
            {"id": "b1", "author": {"id": "a1", "books": [{"id": "b1"}]}},
            {"id": "b2", "author": {"id": "a1"}}
        ]
    });

    let out = normalize(&data, &Schema::from(&author)).unwrap();
    assert_eq!(out.result, json!("a1"));
    assert_eq!(out.entities.table("authors").map(|t| t.len()), Some(1));
    assert_eq!(out.entities.table("books").map(|t| t.len()), Some(2));
    assert_eq!(
        out.entities.get("authors", "a1"),
        Some(&json!({"id": "a1", "books": ["b1", "b2"]}))
    );
    assert_eq!(
        out.entities.get("books", "b2"),
        Some(&json!({"id": "b2", "author": "a1"}))
    );
}

#[test]
fn test_fields_of_an_inner_cyclic_copy_are_not_merged() {
    let user = EntitySchema::new("users").unwrap();
    user.define([("friends", ArraySchema::new(&user))]);

    let data = json!({
        "id": 1,
        "name": "Ann",
        "friends": [{"id": 2, "friends": [{"id": 1, "email": "ann@x"}]}]
    });

    let out = normalize(&data, &Schema::from(&user)).unwrap();
    // The inner copy of user 1 is met while user 1 is in progress
    assert_eq!(
        out.entities.get("users", "1"),
        Some(&json!({"id": 1, "name": "Ann", "friends": [2]}))
    );
    assert_eq!(
        out.entities.get("users", "2"),
        Some(&json!({"id": 2, "friends": [1]}))
    );
}

#[test]
fn test_nested_entities_without_ids_collapse() {
    let comment = EntitySchema::new("comments").unwrap();
    comment.define([("reply", &comment)]);

    let data = json!({"body": "outer", "reply": {"body": "inner"}});
    let out = normalize(&data, &Schema::from(&comment)).unwrap();

    assert_eq!(out.result, Value::Null);
    assert_eq!(
        out.entities.to_value(),
        json!({"comments": {"null": {"body": "outer", "reply": null}}})
    );
    assert_eq!(out.diagnostics.with_code(DiagnosticCode::MissingId).count(), 2);
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn test_object_schema_passes_other_fields_through() {
    let user = EntitySchema::new("users").unwrap();
    let schema = Schema::from(ObjectSchema::new([("users", ArraySchema::new(&user))]));

    let data = json!({"users": [{"id": 1}], "nextPage": "abc", "total": 1});
    let out = normalize(&data, &schema).unwrap();
    assert_eq!(out.result, json!({"users": [1], "nextPage": "abc", "total": 1}));
}

#[test]
fn test_implicit_object_and_array_forms() {
    let user = EntitySchema::new("users").unwrap();
    let mut fields = SchemaMap::new();
    fields.insert(
        "members".into(),
        Schema::try_from(vec![Schema::from(&user)]).unwrap(),
    );
    let schema = Schema::from(fields);

    let out = normalize(&json!({"members": [{"id": 4}, {"id": 5}]}), &schema).unwrap();
    assert_eq!(out.result, json!({"members": [4, 5]}));

    let err = Schema::try_from(vec![Schema::from(&user), Schema::from(&user)]).unwrap_err();
    assert!(matches!(err, NormalizrError::AmbiguousSchemaMap { count: 2 }));
}

#[test]
fn test_values_schema_keeps_keys() {
    let user = EntitySchema::new("users").unwrap();
    let schema = Schema::from(ValuesSchema::new(&user));

    let data = json!({"alice": {"id": 1}, "bob": {"id": 2}, "nobody": null});
    let out = normalize(&data, &schema).unwrap();
    assert_eq!(out.result, json!({"alice": 1, "bob": 2}));
    assert_eq!(out.entities.len(), 2);
}

#[test]
fn test_polymorphic_values() {
    let values = ValuesSchema::polymorphic(user_group_map(), Some("type".into())).unwrap();
    let schema = Schema::from(values);

    let data = json!({
        "first": {"id": 1, "type": "users"},
        "second": {"id": 2, "type": "groups"}
    });
    let out = normalize(&data, &schema).unwrap();
    assert_eq!(
        out.result,
        json!({
            "first": {"id": 1, "schema": "users"},
            "second": {"id": 2, "schema": "groups"}
        })
    );
}

#[test]
fn test_polymorphic_array_with_function_discriminator() {
    let discriminator = Discriminator::function(|value, _, _| {
        if value.get("members").is_some() {
            Some("groups".to_string())
        } else {
            Some("users".to_string())
        }
    });
    let array = ArraySchema::polymorphic(user_group_map(), Some(discriminator)).unwrap();
    let schema = Schema::from(array);

    let out = normalize(&json!([{"id": 1}, {"id": 2, "members": []}]), &schema).unwrap();
    assert_eq!(
        out.result,
        json!([{"id": 1, "schema": "users"}, {"id": 2, "schema": "groups"}])
    );
}

// =============================================================================
// Unions
// =============================================================================

#[test]
fn test_union_by_attribute() {
    let union = UnionSchema::new(user_group_map(), Some("type".into())).unwrap();
    let out = normalize(&json!({"id": 1, "type": "users"}), &Schema::from(union)).unwrap();
    assert_eq!(out.result, json!({"id": 1, "schema": "users"}));
    assert!(out.entities.contains("users", "1"));
}

#[test]
fn test_union_singular_type_maps_to_plural_key() {
    let discriminator = Discriminator::function(|value, _, _| {
        value.get("type").and_then(Value::as_str).map(|t| format!("{}s", t))
    });
    let union = UnionSchema::new(user_group_map(), Some(discriminator)).unwrap();

    let out = normalize(&json!({"id": 1, "type": "user"}), &Schema::from(union)).unwrap();
    assert_eq!(out.result, json!({"id": 1, "schema": "users"}));
    assert_eq!(out.entities.get("users", "1"), Some(&json!({"id": 1, "type": "user"})));
}

#[test]
fn test_union_requires_discriminator() {
    let err = UnionSchema::new(user_group_map(), None).unwrap_err();
    assert!(matches!(err, NormalizrError::MissingDiscriminator { schema: "Union" }));
}

// =============================================================================
// Store reuse
// =============================================================================

#[test]
fn test_store_accumulates_across_calls() {
    let user = EntitySchema::new("users").unwrap();
    let schema = Schema::from(&user);
    let mut store = EntityStore::new();

    normalize_into(&json!({"id": 1, "name": "Ann"}), &schema, &mut store).unwrap();
    normalize_into(&json!({"id": 2, "name": "Bob"}), &schema, &mut store).unwrap();
    let third = normalize_into(&json!({"id": 1, "name": "Annie"}), &schema, &mut store).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("users", "1"), Some(&json!({"id": 1, "name": "Annie"})));
    assert_eq!(third.diagnostics.with_code(DiagnosticCode::MergeConflict).count(), 1);
}

#[test]
fn test_top_level_must_be_container() {
    let user = EntitySchema::new("users").unwrap();
    let err = normalize(&json!("nope"), &Schema::from(user)).unwrap_err();
    assert!(matches!(err, NormalizrError::UnexpectedInput { found: "string" }));
}
