//! Entity schemas

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::{Schema, SchemaMap};
use crate::error::{NormalizrError, Result};
use crate::immutable;

/// Computes an entity id from (raw input, parent, field key)
pub type IdFn = Rc<dyn Fn(&Value, &Value, Option<&str>) -> Value>;
/// Combines (existing, incoming) representations of one entity
pub type MergeFn = Rc<dyn Fn(&Value, &Value) -> Value>;
/// Produces the stored copy of an entity from (raw input, parent, field key)
pub type ProcessFn = Rc<dyn Fn(&Value, &Value, Option<&str>) -> Value>;
/// Supplies an entity for an id missing from the store
pub type FallbackFn = Rc<dyn Fn(&Value, &EntitySchema) -> Option<Value>>;

/// How an entity's id is extracted
#[derive(Clone)]
pub enum IdAttribute {
    /// Read this field of the raw input
    Field(String),
    /// Compute from (raw input, parent, field key)
    Function(IdFn),
}

impl Default for IdAttribute {
    fn default() -> Self {
        IdAttribute::Field("id".to_string())
    }
}

impl From<&str> for IdAttribute {
    fn from(field: &str) -> Self {
        IdAttribute::Field(field.to_string())
    }
}

impl From<String> for IdAttribute {
    fn from(field: String) -> Self {
        IdAttribute::Field(field)
    }
}

impl fmt::Debug for IdAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdAttribute::Field(name) => f.debug_tuple("Field").field(name).finish(),
            IdAttribute::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Options recognized on an entity schema
#[derive(Clone, Default)]
pub struct EntityOptions {
    id_attribute: IdAttribute,
    merge_strategy: Option<MergeFn>,
    process_strategy: Option<ProcessFn>,
    fallback_strategy: Option<FallbackFn>,
}

impl EntityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the id from this field instead of `id`
    pub fn id_attribute(mut self, id_attribute: impl Into<IdAttribute>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    /// Compute the id with a function of (raw input, parent, field key)
    pub fn id_fn(mut self, f: impl Fn(&Value, &Value, Option<&str>) -> Value + 'static) -> Self {
        self.id_attribute = IdAttribute::Function(Rc::new(f));
        self
    }

    pub fn merge_strategy(mut self, f: impl Fn(&Value, &Value) -> Value + 'static) -> Self {
        self.merge_strategy = Some(Rc::new(f));
        self
    }

    pub fn process_strategy(
        mut self,
        f: impl Fn(&Value, &Value, Option<&str>) -> Value + 'static,
    ) -> Self {
        self.process_strategy = Some(Rc::new(f));
        self
    }

    pub fn fallback_strategy(
        mut self,
        f: impl Fn(&Value, &EntitySchema) -> Option<Value> + 'static,
    ) -> Self {
        self.fallback_strategy = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for EntityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityOptions")
            .field("id_attribute", &self.id_attribute)
            .field("merge_strategy", &self.merge_strategy.is_some())
            .field("process_strategy", &self.process_strategy.is_some())
            .field("fallback_strategy", &self.fallback_strategy.is_some())
            .finish()
    }
}

struct EntityInner {
    key: String,
    fields: RefCell<SchemaMap>,
    options: EntityOptions,
}

/// Schema for one entity type
///
/// Cloning is cheap and yields a handle to the same schema, so fields added
/// later through [`EntitySchema::define`] are seen by every handle. That is
/// how self- and mutually-recursive schemas are wired: create the entities,
/// then define their fields in terms of each other.
///
/// Recursive schemas hold reference cycles and are never freed; build them
/// once and keep them for the life of the program.
#[derive(Clone)]
pub struct EntitySchema {
    inner: Rc<EntityInner>,
}

impl EntitySchema {
    /// Entity type `key` with default options and no nested fields
    pub fn new(key: impl Into<String>) -> Result<Self> {
        Self::with_options(key, EntityOptions::default())
    }

    pub fn with_options(key: impl Into<String>, options: EntityOptions) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(NormalizrError::EmptyEntityKey);
        }
        Ok(Self {
            inner: Rc::new(EntityInner {
                key,
                fields: RefCell::new(SchemaMap::new()),
                options,
            }),
        })
    }

    pub fn with_fields<K, S>(
        key: impl Into<String>,
        fields: impl IntoIterator<Item = (K, S)>,
        options: EntityOptions,
    ) -> Result<Self>
    where
        K: Into<String>,
        S: Into<Schema>,
    {
        let schema = Self::with_options(key, options)?;
        schema.define(fields);
        Ok(schema)
    }

    /// Entity type name, the first-level key of the store
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Add (or replace) nested field schemas
    pub fn define<K, S>(&self, fields: impl IntoIterator<Item = (K, S)>) -> &Self
    where
        K: Into<String>,
        S: Into<Schema>,
    {
        let mut map = self.inner.fields.borrow_mut();
        for (name, schema) in fields {
            map.insert(name.into(), schema.into());
        }
        self
    }

    pub fn fields(&self) -> Ref<'_, SchemaMap> {
        self.inner.fields.borrow()
    }

    pub fn field(&self, name: &str) -> Option<Schema> {
        self.inner.fields.borrow().get(name).cloned()
    }

    pub fn id_attribute(&self) -> &IdAttribute {
        &self.inner.options.id_attribute
    }

    /// Id of the raw `input`; `Null` when the rule finds none
    pub fn get_id(&self, input: &Value, parent: &Value, key: Option<&str>) -> Value {
        match &self.inner.options.id_attribute {
            IdAttribute::Field(name) => immutable::get_field(input, name)
                .cloned()
                .unwrap_or(Value::Null),
            IdAttribute::Function(f) => f(input, parent, key),
        }
    }

    /// Copy of `input` to be stored; never aliases the caller's value
    pub fn process(&self, input: &Value, parent: &Value, key: Option<&str>) -> Value {
        match &self.inner.options.process_strategy {
            Some(f) => f(input, parent, key),
            None => input.clone(),
        }
    }

    pub fn merge(&self, existing: &Value, incoming: &Value) -> Value {
        match &self.inner.options.merge_strategy {
            Some(f) => f(existing, incoming),
            None => shallow_merge(existing, incoming),
        }
    }

    /// Entity to use for an id the store does not hold
    pub fn fallback(&self, id: &Value) -> Option<Value> {
        self.inner
            .options
            .fallback_strategy
            .as_ref()
            .and_then(|f| f(id, self))
    }

    /// Whether both handles point at the same schema
    pub fn ptr_eq(&self, other: &EntitySchema) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EntitySchema {
    // Field schemas may lead back here, so only their names are printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.inner.fields.borrow();
        f.debug_struct("EntitySchema")
            .field("key", &self.inner.key)
            .field("fields", &fields.keys().collect::<Vec<_>>())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Field-wise overwrite of `existing` by `incoming`
pub(crate) fn shallow_merge(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            let mut merged = existing.clone();
            for (field, value) in incoming {
                merged.insert(field.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}
