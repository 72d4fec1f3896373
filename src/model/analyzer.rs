//! Schema analysis.
//!
//! Walks a model's declared field table and produces the ordered list of
//! indexable field descriptors, with every kind resolved.
//!
//! # Caching
//!
//! Descriptors are memoised process-wide, keyed by index name. The first call
//! for a model pays the traversal; later calls are a map lookup. The cache is
//! populated on first use and only cleared by [`clear_cache`], which exists for
//! test teardown.
//!
//! ```text
//! analyze::<M>()
//!       │
//!       ├─→ cache hit?  → Arc<ModelDescriptor>
//!       │
//!       └─→ traverse M::schema()          (depth 0)
//!               └─→ included nested models (depth 1, flattened)
//! ```

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::schema::{Model, ModelSchema};
use super::value_type::{FieldKind, ValueType};

/// Nested models deeper than this are not traversed.
const MAX_NESTED_DEPTH: usize = 1;

static DESCRIPTORS: LazyLock<DashMap<&'static str, Arc<ModelDescriptor>>> =
    LazyLock::new(DashMap::new);

/// A field as the index and the compiler see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Property name; doubles as the hash field name and the query field name.
    pub name: String,
    pub kind: FieldKind,
    pub sortable: bool,
    pub value_type: ValueType,
}

/// Analysed model: index namespace plus resolved fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub index_name: String,
    /// Indexed fields in declaration order (nested fields flattened in place).
    pub fields: Vec<FieldDescriptor>,
    /// Declared fields that are not indexed, with their inferred kind.
    pub unindexed: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    /// Look up an indexed field.
    pub fn indexed_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up any declared field, indexed first.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.indexed_field(name)
            .or_else(|| self.unindexed.iter().find(|f| f.name == name))
    }

    pub fn has_indexed_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Analyse model `M`, memoised by index name.
pub fn analyze<M: Model>() -> Arc<ModelDescriptor> {
    if let Some(found) = DESCRIPTORS.get(M::INDEX_NAME) {
        return Arc::clone(found.value());
    }

    let entry = DESCRIPTORS
        .entry(M::INDEX_NAME)
        .or_insert_with(|| {
            let descriptor = analyze_schema(&M::schema());
            debug!(
                index = %descriptor.index_name,
                indexed = descriptor.fields.len(),
                "Model analysed"
            );
            Arc::new(descriptor)
        });
    Arc::clone(entry.value())
}

/// Analyse a schema without touching the cache.
pub fn analyze_schema(schema: &ModelSchema) -> ModelDescriptor {
    let mut descriptor = ModelDescriptor {
        index_name: schema.index_name.to_string(),
        fields: Vec::new(),
        unindexed: Vec::new(),
    };
    let mut visited = HashSet::new();
    traverse(schema, 0, &mut visited, &mut descriptor);
    descriptor
}

fn traverse(
    schema: &ModelSchema,
    depth: usize,
    visited: &mut HashSet<&'static str>,
    out: &mut ModelDescriptor,
) {
    if !visited.insert(schema.type_name) {
        return;
    }

    for decl in &schema.fields {
        if out.field(&decl.name).is_some() {
            warn!(
                index = %out.index_name,
                field = %decl.name,
                "Duplicate field name in flattened schema, keeping the first"
            );
            continue;
        }

        match decl.indexed {
            Some(indexed) => out.fields.push(FieldDescriptor {
                name: decl.name.clone(),
                kind: indexed.kind.resolve(&decl.value_type),
                sortable: indexed.sortable,
                value_type: decl.value_type.clone(),
            }),
            None => out.unindexed.push(FieldDescriptor {
                name: decl.name.clone(),
                kind: decl.value_type.classify(),
                sortable: false,
                value_type: decl.value_type.clone(),
            }),
        }

        if let Some(nested) = &decl.nested {
            if nested.include && depth < MAX_NESTED_DEPTH {
                let child = (nested.schema)();
                if visited.contains(child.type_name) {
                    debug!(
                        index = %out.index_name,
                        field = %decl.name,
                        nested = child.type_name,
                        "Nested model already flattened, skipping its fields"
                    );
                } else {
                    traverse(&child, depth + 1, visited, out);
                }
            }
        }
    }
}

/// Drop every cached descriptor.
pub fn clear_cache() {
    DESCRIPTORS.clear();
}

/// Number of cached descriptors.
pub fn cached_count() -> usize {
    DESCRIPTORS.len()
}
