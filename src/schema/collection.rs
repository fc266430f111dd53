//! Array, object, values and union schemas

use super::polymorphic::Members;
use super::{Discriminator, Schema, SchemaMap};
use crate::error::{NormalizrError, Result};

/// Applies one (possibly polymorphic) schema to every element of a sequence
/// or to every value of a map. Absent results are dropped.
#[derive(Debug, Clone)]
pub struct ArraySchema {
    members: Members,
}

impl ArraySchema {
    pub fn new(item: impl Into<Schema>) -> Self {
        Self {
            members: Members::Single(Box::new(item.into())),
        }
    }

    /// Elements classified by `discriminator` against `schemas`
    pub fn polymorphic(schemas: SchemaMap, discriminator: Option<Discriminator>) -> Result<Self> {
        Ok(Self {
            members: Members::mapped("Array", schemas, discriminator)?,
        })
    }

    pub fn is_single_schema(&self) -> bool {
        self.members.is_single()
    }

    pub(crate) fn members(&self) -> &Members {
        &self.members
    }
}

/// Applies a fixed field map to a record; other fields pass through
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    fields: SchemaMap,
}

impl ObjectSchema {
    pub fn new<K, S>(fields: impl IntoIterator<Item = (K, S)>) -> Self
    where
        K: Into<String>,
        S: Into<Schema>,
    {
        let mut schema = Self::default();
        schema.define(fields);
        schema
    }

    pub fn define<K, S>(&mut self, fields: impl IntoIterator<Item = (K, S)>) -> &mut Self
    where
        K: Into<String>,
        S: Into<Schema>,
    {
        for (name, schema) in fields {
            self.fields.insert(name.into(), schema.into());
        }
        self
    }

    pub fn fields(&self) -> &SchemaMap {
        &self.fields
    }
}

/// One value, classified by a discriminator
#[derive(Debug, Clone)]
pub struct UnionSchema {
    members: Members,
}

impl UnionSchema {
    pub fn new(schemas: SchemaMap, discriminator: Option<Discriminator>) -> Result<Self> {
        let Some(discriminator) = discriminator else {
            return Err(NormalizrError::MissingDiscriminator { schema: "Union" });
        };
        Ok(Self {
            members: Members::mapped("Union", schemas, Some(discriminator))?,
        })
    }

    pub(crate) fn members(&self) -> &Members {
        &self.members
    }
}

/// Every value of a record visited independently; keys are kept
#[derive(Debug, Clone)]
pub struct ValuesSchema {
    members: Members,
}

impl ValuesSchema {
    pub fn new(item: impl Into<Schema>) -> Self {
        Self {
            members: Members::Single(Box::new(item.into())),
        }
    }

    pub fn polymorphic(schemas: SchemaMap, discriminator: Option<Discriminator>) -> Result<Self> {
        Ok(Self {
            members: Members::mapped("Values", schemas, discriminator)?,
        })
    }

    pub fn is_single_schema(&self) -> bool {
        self.members.is_single()
    }

    pub(crate) fn members(&self) -> &Members {
        &self.members
    }
}
