//! Schema types
//!
//! A schema is a tree (or, through entity fields, a graph) of [`Schema`]
//! nodes describing how each position of a JSON document is traversed.
//! Entities are the only nodes that reshape data; the collection variants
//! route the traversal to them.

mod collection;
mod entity;
mod polymorphic;

pub use collection::{ArraySchema, ObjectSchema, UnionSchema, ValuesSchema};
pub use entity::{
    EntityOptions, EntitySchema, FallbackFn, IdAttribute, IdFn, MergeFn, ProcessFn,
};
pub use polymorphic::{Discriminator, DiscriminatorFn};

pub(crate) use polymorphic::{tag_text, Inferred, Members};

use std::collections::BTreeMap;

use crate::error::{NormalizrError, Result};

/// Field name (or schema-map key) to schema
pub type SchemaMap = BTreeMap<String, Schema>;

/// A schema node
#[derive(Debug, Clone)]
pub enum Schema {
    Entity(EntitySchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    Union(UnionSchema),
    Values(ValuesSchema),
}

impl Schema {
    /// Short name of the variant, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Entity(_) => "entity",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Union(_) => "union",
            Schema::Values(_) => "values",
        }
    }

    /// The entity schema, if this node is one
    pub fn as_entity(&self) -> Option<&EntitySchema> {
        match self {
            Schema::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

impl From<EntitySchema> for Schema {
    fn from(schema: EntitySchema) -> Self {
        Schema::Entity(schema)
    }
}

impl From<&EntitySchema> for Schema {
    fn from(schema: &EntitySchema) -> Self {
        Schema::Entity(schema.clone())
    }
}

impl From<ArraySchema> for Schema {
    fn from(schema: ArraySchema) -> Self {
        Schema::Array(schema)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(schema: ObjectSchema) -> Self {
        Schema::Object(schema)
    }
}

impl From<UnionSchema> for Schema {
    fn from(schema: UnionSchema) -> Self {
        Schema::Union(schema)
    }
}

impl From<ValuesSchema> for Schema {
    fn from(schema: ValuesSchema) -> Self {
        Schema::Values(schema)
    }
}

/// A bare field map is an implicit object schema
impl From<SchemaMap> for Schema {
    fn from(fields: SchemaMap) -> Self {
        Schema::Object(ObjectSchema::new(fields))
    }
}

/// A one-element sequence is an implicit array schema
impl TryFrom<Vec<Schema>> for Schema {
    type Error = NormalizrError;

    fn try_from(mut definition: Vec<Schema>) -> Result<Self> {
        if definition.len() != 1 {
            return Err(NormalizrError::AmbiguousSchemaMap {
                count: definition.len(),
            });
        }
        let item = definition.remove(0);
        Ok(Schema::Array(ArraySchema::new(item)))
    }
}
