//! Polymorphic dispatch shared by union, array and values schemas

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::{Schema, SchemaMap};
use crate::error::{NormalizrError, Result};

/// Computes a schema-map key from (value, parent, field key)
pub type DiscriminatorFn = Rc<dyn Fn(&Value, &Value, Option<&str>) -> Option<String>>;

/// Rule selecting which schema of a schema map applies to a value
#[derive(Clone)]
pub enum Discriminator {
    /// Read the schema-map key from this field of the value
    Attribute(String),
    /// Compute the schema-map key
    Function(DiscriminatorFn),
}

impl Discriminator {
    pub fn attribute(name: impl Into<String>) -> Self {
        Discriminator::Attribute(name.into())
    }

    pub fn function(
        f: impl Fn(&Value, &Value, Option<&str>) -> Option<String> + 'static,
    ) -> Self {
        Discriminator::Function(Rc::new(f))
    }

    pub fn resolve(&self, value: &Value, parent: &Value, key: Option<&str>) -> Option<String> {
        match self {
            Discriminator::Attribute(name) => value.get(name).and_then(tag_text),
            Discriminator::Function(f) => f(value, parent, key),
        }
    }
}

impl From<&str> for Discriminator {
    fn from(name: &str) -> Self {
        Discriminator::attribute(name)
    }
}

impl From<String> for Discriminator {
    fn from(name: String) -> Self {
        Discriminator::Attribute(name)
    }
}

impl fmt::Debug for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminator::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            Discriminator::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Textual form of a discriminator or schema tag value
pub(crate) fn tag_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Member schema(s) of a collection or union
#[derive(Debug, Clone)]
pub(crate) enum Members {
    Single(Box<Schema>),
    Mapped {
        schemas: SchemaMap,
        discriminator: Discriminator,
    },
}

/// Outcome of choosing a schema for one value
pub(crate) enum Inferred<'a> {
    Single(&'a Schema),
    Tagged { schema: &'a Schema, tag: String },
    Unmatched(Option<String>),
}

impl Members {
    /// Members from a schema map. Without a discriminator the map must hold
    /// exactly one schema, which then applies to every value.
    pub(crate) fn mapped(
        owner: &'static str,
        mut schemas: SchemaMap,
        discriminator: Option<Discriminator>,
    ) -> Result<Self> {
        match discriminator {
            Some(discriminator) => Ok(Members::Mapped {
                schemas,
                discriminator,
            }),
            None if schemas.len() == 1 => match schemas.pop_first() {
                Some((_, schema)) => Ok(Members::Single(Box::new(schema))),
                None => Err(NormalizrError::MissingDiscriminator { schema: owner }),
            },
            None => Err(NormalizrError::MissingDiscriminator { schema: owner }),
        }
    }

    pub(crate) fn is_single(&self) -> bool {
        matches!(self, Members::Single(_))
    }

    pub(crate) fn infer(&self, value: &Value, parent: &Value, key: Option<&str>) -> Inferred<'_> {
        match self {
            Members::Single(schema) => Inferred::Single(schema),
            Members::Mapped {
                schemas,
                discriminator,
            } => match discriminator.resolve(value, parent, key) {
                Some(tag) => match schemas.get(&tag) {
                    Some(schema) => Inferred::Tagged { schema, tag },
                    None => Inferred::Unmatched(Some(tag)),
                },
                None => Inferred::Unmatched(None),
            },
        }
    }
}
