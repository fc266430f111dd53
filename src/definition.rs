//! Declarative schema definitions
//!
//! A [`Definition`] describes named entities and a root schema as JSON, so a
//! schema graph can be loaded from a file instead of built in code.
//!
//! ```json
//! {
//!   "entities": {
//!     "users":    { "fields": { "friends": ["users"] } },
//!     "articles": { "id_attribute": "slug",
//!                   "fields": { "author": "users", "comments": ["comments"] } },
//!     "comments": { "fields": { "commenter": "users" } }
//!   },
//!   "root": ["articles"]
//! }
//! ```
//!
//! A schema position is one of:
//! - `"name"`: the entity called `name`
//! - `[schema]`: an array of `schema`
//! - `{"field": schema, ...}`: an object with those fields
//! - `{"kind": "array" | "values", "schema": schema}` or
//!   `{"kind": "array" | "values", "schemas": {...}, "schema_attribute": "type"}`
//! - `{"kind": "union", "schemas": {...}, "schema_attribute": "type"}`
//! - `{"kind": "object", "fields": {...}}`, for field maps that contain a
//!   field literally named `kind`
//!
//! Building creates every entity first and installs fields second, so
//! entities may refer to each other (and themselves) in any order.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::DefinitionConfig;
use crate::denormalize::denormalize;
use crate::error::{NormalizrError, Result};
use crate::normalize::{normalize_with, NormalizeOptions, Normalized, NormalizedData};
use crate::schema::{
    ArraySchema, Discriminator, EntityOptions, EntitySchema, ObjectSchema, Schema, SchemaMap,
    UnionSchema, ValuesSchema,
};
use crate::store::{EntitySource, EntityStore};

/// JSON form of a schema position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaDef {
    Entity(String),
    List(Vec<SchemaDef>),
    Tagged(TaggedDef),
    Fields(BTreeMap<String, SchemaDef>),
}

/// Explicit schema forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaggedDef {
    Array(CollectionDef),
    Values(CollectionDef),
    Union {
        schemas: BTreeMap<String, SchemaDef>,
        #[serde(default)]
        schema_attribute: Option<String>,
    },
    Object {
        fields: BTreeMap<String, SchemaDef>,
    },
}

/// Member schema(s) of an array or values definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<SchemaDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<BTreeMap<String, SchemaDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_attribute: Option<String>,
}

/// One named entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Id field; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_attribute: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, SchemaDef>,
}

/// A complete schema description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub entities: BTreeMap<String, EntityDef>,
    /// Schema applied to the top-level input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<SchemaDef>,
}

impl Definition {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Build the schema graph
    pub fn build(&self, config: &DefinitionConfig) -> Result<CompiledDefinition> {
        // Nodes first, so fields can point anywhere in the second pass.
        let mut entities = BTreeMap::new();
        for (name, def) in &self.entities {
            let id_attribute = def
                .id_attribute
                .clone()
                .unwrap_or_else(|| config.default_id_attribute.clone());
            let options = EntityOptions::new().id_attribute(id_attribute);
            let schema = EntitySchema::with_options(name.as_str(), options)?;
            entities.insert(name.clone(), schema);
        }

        for (name, def) in &self.entities {
            let Some(schema) = entities.get(name) else {
                continue;
            };
            let mut fields = SchemaMap::new();
            for (field, field_def) in &def.fields {
                let location = format!("{}.{}", name, field);
                fields.insert(field.clone(), resolve(field_def, &entities, &location)?);
            }
            schema.define(fields);
        }

        let root = self
            .root
            .as_ref()
            .map(|def| resolve(def, &entities, "root"))
            .transpose()?;

        let recursive_groups = self.recursive_groups();
        for group in &recursive_groups {
            debug!(members = %group.join(", "), "recursive entity group");
        }

        Ok(CompiledDefinition {
            entities,
            root,
            recursive_groups,
        })
    }

    /// Groups of entities that reach each other through their fields,
    /// including single entities that reference themselves
    pub fn recursive_groups(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for name in self.entities.keys() {
            indices.insert(name.as_str(), graph.add_node(name.as_str()));
        }

        for (name, def) in &self.entities {
            let from = indices[name.as_str()];
            let mut targets = Vec::new();
            for field_def in def.fields.values() {
                field_def.collect_entity_refs(&mut targets);
            }
            for target in targets {
                if let Some(&to) = indices.get(target) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let mut groups: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.iter().map(|idx| graph[*idx].to_string()).collect();
                members.sort();
                members
            })
            .collect();
        groups.sort();
        groups
    }
}

impl SchemaDef {
    fn collect_entity_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SchemaDef::Entity(name) => out.push(name),
            SchemaDef::List(items) => items.iter().for_each(|d| d.collect_entity_refs(out)),
            SchemaDef::Fields(fields) => fields.values().for_each(|d| d.collect_entity_refs(out)),
            SchemaDef::Tagged(TaggedDef::Array(c)) | SchemaDef::Tagged(TaggedDef::Values(c)) => {
                if let Some(schema) = &c.schema {
                    schema.collect_entity_refs(out);
                }
                if let Some(schemas) = &c.schemas {
                    schemas.values().for_each(|d| d.collect_entity_refs(out));
                }
            }
            SchemaDef::Tagged(TaggedDef::Union { schemas, .. }) => {
                schemas.values().for_each(|d| d.collect_entity_refs(out))
            }
            SchemaDef::Tagged(TaggedDef::Object { fields }) => {
                fields.values().for_each(|d| d.collect_entity_refs(out))
            }
        }
    }
}

fn resolve(
    def: &SchemaDef,
    entities: &BTreeMap<String, EntitySchema>,
    location: &str,
) -> Result<Schema> {
    match def {
        SchemaDef::Entity(name) => entities
            .get(name)
            .map(Schema::from)
            .ok_or_else(|| NormalizrError::UnknownEntity {
                name: name.clone(),
                from: location.to_string(),
            }),
        SchemaDef::List(items) => {
            let items = items
                .iter()
                .map(|item| resolve(item, entities, location))
                .collect::<Result<Vec<_>>>()?;
            Schema::try_from(items)
        }
        SchemaDef::Fields(fields) => {
            Ok(ObjectSchema::new(resolve_map(fields, entities, location)?).into())
        }
        SchemaDef::Tagged(TaggedDef::Object { fields }) => {
            Ok(ObjectSchema::new(resolve_map(fields, entities, location)?).into())
        }
        SchemaDef::Tagged(TaggedDef::Union {
            schemas,
            schema_attribute,
        }) => {
            let schemas = resolve_map(schemas, entities, location)?;
            Ok(UnionSchema::new(schemas, schema_attribute.clone().map(Discriminator::from))?.into())
        }
        SchemaDef::Tagged(TaggedDef::Array(collection)) => {
            match resolve_collection(collection, entities, location)? {
                Members::Single(schema) => Ok(ArraySchema::new(schema).into()),
                Members::Mapped(schemas, discriminator) => {
                    Ok(ArraySchema::polymorphic(schemas, discriminator)?.into())
                }
            }
        }
        SchemaDef::Tagged(TaggedDef::Values(collection)) => {
            match resolve_collection(collection, entities, location)? {
                Members::Single(schema) => Ok(ValuesSchema::new(schema).into()),
                Members::Mapped(schemas, discriminator) => {
                    Ok(ValuesSchema::polymorphic(schemas, discriminator)?.into())
                }
            }
        }
    }
}

fn resolve_map(
    defs: &BTreeMap<String, SchemaDef>,
    entities: &BTreeMap<String, EntitySchema>,
    location: &str,
) -> Result<SchemaMap> {
    defs.iter()
        .map(|(key, def)| {
            let nested = format!("{}.{}", location, key);
            Ok((key.clone(), resolve(def, entities, &nested)?))
        })
        .collect()
}

enum Members {
    Single(Schema),
    Mapped(SchemaMap, Option<Discriminator>),
}

fn resolve_collection(
    collection: &CollectionDef,
    entities: &BTreeMap<String, EntitySchema>,
    location: &str,
) -> Result<Members> {
    match (&collection.schema, &collection.schemas) {
        (Some(schema), None) => Ok(Members::Single(resolve(schema, entities, location)?)),
        (None, Some(schemas)) => Ok(Members::Mapped(
            resolve_map(schemas, entities, location)?,
            collection.schema_attribute.clone().map(Discriminator::from),
        )),
        _ => Err(NormalizrError::InvalidDefinition(format!(
            "{}: exactly one of 'schema' or 'schemas' is required",
            location
        ))),
    }
}

/// A built schema graph
#[derive(Debug, Clone)]
pub struct CompiledDefinition {
    entities: BTreeMap<String, EntitySchema>,
    root: Option<Schema>,
    recursive_groups: Vec<Vec<String>>,
}

impl CompiledDefinition {
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    pub fn root(&self) -> Option<&Schema> {
        self.root.as_ref()
    }

    pub fn recursive_groups(&self) -> &[Vec<String>] {
        &self.recursive_groups
    }

    /// Normalize `data` against the root schema
    pub fn normalize(&self, data: &Value, options: NormalizeOptions) -> Result<NormalizedData> {
        let root = self.root.as_ref().ok_or(NormalizrError::MissingSchema)?;
        let mut entities = EntityStore::new();
        let Normalized {
            result,
            diagnostics,
        } = normalize_with(data, root, &mut entities, options)?;
        Ok(NormalizedData {
            result,
            entities,
            diagnostics,
        })
    }

    /// Denormalize `input` against the root schema
    pub fn denormalize<S>(&self, input: &Value, entities: &S) -> Result<Value>
    where
        S: EntitySource + ?Sized,
    {
        denormalize(input, self.root.as_ref(), entities)
    }
}
