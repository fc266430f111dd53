//! Schema Normalizr
//!
//! Flattens nested JSON entity graphs into per-type lookup tables keyed by id,
//! and rebuilds the nested shape from those tables.
//!
//! ## Features
//!
//! - **Entity Schemas**: id extraction, merge, process and fallback rules per type
//! - **Composite Schemas**: arrays, objects, unions and value maps, single or polymorphic
//! - **Cycle Safety**: recursive schemas and self-referencing data terminate
//! - **Declarative Definitions**: schema graphs loaded from JSON files
//! - **Diagnostics**: merge conflicts, missing ids and unmatched members are reported
//!
//! ## Example
//!
//! ```
//! use schema_normalizr::{normalize, denormalize, EntityOptions, EntitySchema, Schema};
//! use serde_json::json;
//!
//! let user = EntitySchema::new("users")?;
//! let article =
//!     EntitySchema::with_fields("articles", [("author", &user)], EntityOptions::default())?;
//! let schema = Schema::from(article);
//!
//! let data = json!({"id": 1, "title": "A", "author": {"id": 3, "name": "M"}});
//! let normalized = normalize(&data, &schema)?;
//! assert_eq!(normalized.result, json!(1));
//! assert_eq!(normalized.entities.get("users", "3"), Some(&json!({"id": 3, "name": "M"})));
//!
//! let restored = denormalize(&normalized.result, &schema, &normalized.entities)?;
//! assert_eq!(restored, data);
//! # Ok::<(), schema_normalizr::NormalizrError>(())
//! ```
//!
//! ## Store layout
//!
//! ```text
//! {
//!   "articles": { "1": { "id": 1, "title": "A", "author": 3 } },
//!   "users":    { "3": { "id": 3, "name": "M" } }
//! }
//! ```

pub mod config;
pub mod definition;
pub mod denormalize;
pub mod diagnostics;
pub mod error;
pub mod immutable;
pub mod normalize;
pub mod schema;
pub mod store;
mod visited;

pub use config::NormalizrConfig;
pub use definition::{CompiledDefinition, Definition};
pub use denormalize::denormalize;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use error::{NormalizrError, Result};
pub use normalize::{
    normalize, normalize_into, normalize_with, NormalizeOptions, Normalized, NormalizedData,
};
pub use schema::{
    ArraySchema, Discriminator, EntityOptions, EntitySchema, IdAttribute, ObjectSchema, Schema,
    SchemaMap, UnionSchema, ValuesSchema,
};
pub use store::{id_key, EntitySource, EntityStore};
