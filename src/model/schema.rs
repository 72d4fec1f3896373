//! Declared model schemas.
//!
//! Each model type registers its field table once, at compile time, through
//! [`Model::schema`]. The table lists every persisted field with its value
//! type, and marks the ones that should be mirrored into the search index.
//!
//! ```rust
//! use hashmodel::model::{IndexKind, Indexed, Model, ModelSchema};
//!
//! struct Player;
//!
//! impl Model for Player {
//!     const INDEX_NAME: &'static str = "players";
//!
//!     fn schema() -> ModelSchema {
//!         ModelSchema::new::<Self>()
//!             .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
//!             .indexed_with::<i32>("Level", Indexed::auto().sortable())
//!             .indexed::<bool>("IsLegendary")
//!             .field::<String>("Bio")
//!     }
//! }
//! ```

use super::value_type::{FieldKind, FieldValue, ValueType};

/// A persisted model type with a search index namespace.
pub trait Model: Send + Sync + 'static {
    /// Logical namespace: the index name and the `"{INDEX_NAME}:"` key prefix.
    const INDEX_NAME: &'static str;

    /// Declared field table, in declaration order.
    fn schema() -> ModelSchema;
}

/// Declared index kind. `Auto` defers to the field classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    #[default]
    Auto,
    Numeric,
    Text,
    Tag,
}

impl IndexKind {
    /// Resolve to a concrete kind: explicit declaration wins, otherwise classify.
    pub fn resolve(self, value_type: &ValueType) -> FieldKind {
        match self {
            IndexKind::Auto => value_type.classify(),
            IndexKind::Numeric => FieldKind::Numeric,
            IndexKind::Text => FieldKind::Text,
            IndexKind::Tag => FieldKind::Tag,
        }
    }
}

/// Index marker attached to a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indexed {
    pub kind: IndexKind,
    pub sortable: bool,
}

impl Indexed {
    pub fn auto() -> Self {
        Self::default()
    }

    pub fn kind(kind: IndexKind) -> Self {
        Self { kind, sortable: false }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

/// A nested model-typed field.
#[derive(Debug, Clone)]
pub struct NestedDecl {
    /// Rust type name of the nested model (cycle guard key).
    pub type_name: &'static str,
    /// Schema of the nested model.
    pub schema: fn() -> ModelSchema,
    /// Whether the nested model's indexed fields are flattened into the parent's index.
    pub include: bool,
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub value_type: ValueType,
    pub indexed: Option<Indexed>,
    pub nested: Option<NestedDecl>,
}

/// Declared field table of a model.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub index_name: &'static str,
    pub type_name: &'static str,
    pub fields: Vec<FieldDecl>,
}

impl ModelSchema {
    /// Start an empty schema for model `M`.
    pub fn new<M: Model>() -> Self {
        Self {
            index_name: M::INDEX_NAME,
            type_name: std::any::type_name::<M>(),
            fields: Vec::new(),
        }
    }

    /// Declare a field that is persisted but not indexed.
    pub fn field<T: FieldValue>(self, name: impl Into<String>) -> Self {
        self.declare(FieldDecl {
            name: name.into(),
            value_type: T::value_type(),
            indexed: None,
            nested: None,
        })
    }

    /// Declare an indexed field whose kind is inferred from `T`.
    pub fn indexed<T: FieldValue>(self, name: impl Into<String>) -> Self {
        self.indexed_with::<T>(name, Indexed::auto())
    }

    /// Declare an indexed field with an explicit marker.
    pub fn indexed_with<T: FieldValue>(self, name: impl Into<String>, indexed: Indexed) -> Self {
        self.declare(FieldDecl {
            name: name.into(),
            value_type: T::value_type(),
            indexed: Some(indexed),
            nested: None,
        })
    }

    /// Declare a nested model whose indexed fields are flattened into this index.
    pub fn nested<N: Model>(self, name: impl Into<String>) -> Self {
        self.nested_decl::<N>(name, true)
    }

    /// Declare a linked model that is persisted separately and not indexed here.
    pub fn linked<N: Model>(self, name: impl Into<String>) -> Self {
        self.nested_decl::<N>(name, false)
    }

    fn nested_decl<N: Model>(self, name: impl Into<String>, include: bool) -> Self {
        let type_name = std::any::type_name::<N>();
        self.declare(FieldDecl {
            name: name.into(),
            value_type: ValueType::Struct(type_name),
            indexed: None,
            nested: Some(NestedDecl {
                type_name,
                schema: N::schema,
                include,
            }),
        })
    }

    /// Append a raw field declaration.
    pub fn declare(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}
