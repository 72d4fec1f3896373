//! Model declarations and schema analysis.
//!
//! Models describe their persisted fields through an explicit field table
//! ([`Model::schema`]). The analyzer turns that table into a cached
//! [`ModelDescriptor`] whose field kinds are fully resolved; both the index
//! builder and the predicate compiler read the same descriptor, so a field is
//! always queried with the syntax of the kind it is indexed as.

mod analyzer;
mod schema;
mod value_type;

pub use analyzer::{analyze, analyze_schema, cached_count, clear_cache, FieldDescriptor, ModelDescriptor};
pub use schema::{FieldDecl, IndexKind, Indexed, Model, ModelSchema, NestedDecl};
pub use value_type::{FieldKind, FieldValue, Ordered, Value, ValueType};
