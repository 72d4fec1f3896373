//! Index Manager
//!
//! Derives RediSearch index definitions from analysed models and keeps a
//! registry of the definitions built so far.
//!
//! # RediSearch Index Creation
//!
//! ```text
//! FT.CREATE players
//!   ON HASH
//!   PREFIX 1 players:
//!   SCHEMA
//!     Username TAG
//!     Number NUMERIC SORTABLE
//!     IsLegendary TAG
//! ```
//!
//! Hash field names are the model's property names, so no `AS` aliasing is
//! needed.
//!
//! # Fingerprint
//!
//! The shape of an index is summarised as SHA-256 over `"{name}:{Kind};"` for
//! each field in order (`"{name}:{Kind}:SORTABLE;"` for sortable fields),
//! hex-encoded. Two definitions with the same fingerprint issue the same
//! FT.CREATE schema. The synchronizer compares it with the
//! persisted one to decide whether the physical index must be rebuilt.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::model::{FieldKind, ModelDescriptor};

/// Search index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndex {
    /// Physical index name (namespace + model index name)
    pub name: String,
    /// Key prefix this index covers (e.g., "players:")
    pub prefix: String,
    /// Field definitions for the index
    pub fields: Vec<SearchField>,
}

impl SearchIndex {
    /// Create an empty index definition.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            fields: Vec::new(),
        }
    }

    /// Physical index name and key prefix for a model index name.
    pub fn physical_names(index_name: &str, namespace: Option<&str>) -> (String, String) {
        let ns = namespace.unwrap_or("");
        let name = format!("{}{}", ns, index_name);
        let prefix = format!("{}:", name);
        (name, prefix)
    }

    /// Build the definition for an analysed model.
    ///
    /// Returns `None` when the model has no indexed fields; such models are
    /// never indexed and all queries against them match nothing.
    pub fn build(descriptor: &ModelDescriptor, namespace: Option<&str>) -> Option<Self> {
        if !descriptor.has_indexed_fields() {
            return None;
        }

        let (name, prefix) = Self::physical_names(&descriptor.index_name, namespace);
        let index = descriptor
            .fields
            .iter()
            .fold(Self::new(name, prefix), |index, f| {
                index.field(f.name.clone(), f.kind, f.sortable)
            });
        Some(index)
    }

    /// Add a field of any kind
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, sortable: bool) -> Self {
        self.fields.push(SearchField {
            name: name.into(),
            kind,
            sortable,
        });
        self
    }

    /// Hex SHA-256 of the ordered field list, one `name:Kind;` entry per
    /// field (`name:Kind:SORTABLE;` when sortable).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in &self.fields {
            hasher.update(field.shape().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Generate the FT.CREATE command arguments
    pub fn to_ft_create_args(&self) -> Vec<String> {
        let mut args = vec![
            self.name.clone(),
            "ON".to_string(),
            "HASH".to_string(),
            "PREFIX".to_string(),
            "1".to_string(),
            self.prefix.clone(),
            "SCHEMA".to_string(),
        ];

        for field in &self.fields {
            args.extend(field.to_schema_args());
        }

        args
    }
}

/// Search field definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchField {
    /// Hash field name (also the query field name)
    pub name: String,
    pub kind: FieldKind,
    pub sortable: bool,
}

impl SearchField {
    fn shape(&self) -> String {
        if self.sortable {
            format!("{}:{}:SORTABLE;", self.name, self.kind)
        } else {
            format!("{}:{};", self.name, self.kind)
        }
    }

    fn to_schema_args(&self) -> Vec<String> {
        let mut args = vec![self.name.clone(), self.kind.schema_keyword().to_string()];
        if self.sortable {
            args.push("SORTABLE".to_string());
        }
        args
    }
}

/// Registry of built index definitions, keyed by physical index name.
#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: HashMap<String, SearchIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index definition, replacing any previous one.
    pub fn register(&mut self, index: SearchIndex) {
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn get(&self, name: &str) -> Option<&SearchIndex> {
        self.indexes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{analyze_schema, IndexKind, Indexed, Model, ModelSchema};

    struct Player;

    impl Model for Player {
        const INDEX_NAME: &'static str = "players";

        fn schema() -> ModelSchema {
            ModelSchema::new::<Self>()
                .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
                .indexed_with::<i32>("Number", Indexed::auto().sortable())
                .indexed::<bool>("IsLegendary")
                .field::<String>("Bio")
        }
    }

    struct Bare;

    impl Model for Bare {
        const INDEX_NAME: &'static str = "bare";

        fn schema() -> ModelSchema {
            ModelSchema::new::<Self>().field::<String>("Name")
        }
    }

    #[test]
    fn test_build_from_descriptor() {
        let index = SearchIndex::build(&analyze_schema(&Player::schema()), None).unwrap();
        assert_eq!(index.name, "players");
        assert_eq!(index.prefix, "players:");
        assert_eq!(index.fields.len(), 3);
        assert_eq!(index.fields[1].kind, FieldKind::Numeric);
        assert!(index.fields[1].sortable);
    }

    #[test]
    fn test_build_without_indexed_fields() {
        assert!(SearchIndex::build(&analyze_schema(&Bare::schema()), None).is_none());
    }

    #[test]
    fn test_ft_create_full_command() {
        let index = SearchIndex::build(&analyze_schema(&Player::schema()), None).unwrap();
        let cmd = format!("FT.CREATE {}", index.to_ft_create_args().join(" "));
        assert_eq!(
            cmd,
            "FT.CREATE players ON HASH PREFIX 1 players: SCHEMA \
             Username TAG Number NUMERIC SORTABLE IsLegendary TAG"
        );
    }

    #[test]
    fn test_namespace_applies_to_name_and_prefix() {
        let index = SearchIndex::build(&analyze_schema(&Player::schema()), Some("app:")).unwrap();
        let args = index.to_ft_create_args();
        assert_eq!(args[0], "app:players");
        assert_eq!(args[5], "app:players:");
    }

    fn shape(fields: &[(&str, FieldKind, bool)]) -> SearchIndex {
        fields
            .iter()
            .fold(SearchIndex::new("t", "t:"), |idx, (name, kind, sortable)| {
                idx.field(*name, *kind, *sortable)
            })
    }

    #[test]
    fn test_fingerprint_is_hex_sha256_of_shape() {
        let index = shape(&[("A", FieldKind::Tag, false), ("B", FieldKind::Numeric, false)]);
        let expected = hex::encode(Sha256::digest(b"A:Tag;B:Numeric;"));
        assert_eq!(index.fingerprint(), expected);
        assert_eq!(index.fingerprint().len(), 64);

        let sortable = shape(&[("B", FieldKind::Numeric, true)]);
        assert_eq!(sortable.fingerprint(), hex::encode(Sha256::digest(b"B:Numeric:SORTABLE;")));
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let base = shape(&[("A", FieldKind::Tag, false), ("B", FieldKind::Numeric, false)]);
        let added = base.clone().field("C", FieldKind::Text, false);
        let rekinded = shape(&[("A", FieldKind::Text, false), ("B", FieldKind::Numeric, false)]);
        let reordered = shape(&[("B", FieldKind::Numeric, false), ("A", FieldKind::Tag, false)]);

        assert_ne!(base.fingerprint(), added.fingerprint());
        assert_ne!(base.fingerprint(), rekinded.fingerprint());
        assert_ne!(base.fingerprint(), reordered.fingerprint());
    }

    #[test]
    fn test_equal_fingerprints_mean_equal_create_args() {
        let plain = shape(&[("A", FieldKind::Tag, false), ("B", FieldKind::Numeric, false)]);
        let sortable = shape(&[("A", FieldKind::Tag, false), ("B", FieldKind::Numeric, true)]);

        assert_ne!(plain.to_ft_create_args(), sortable.to_ft_create_args());
        assert_ne!(plain.fingerprint(), sortable.fingerprint());
        assert_eq!(plain.fingerprint(), plain.clone().fingerprint());
        assert_eq!(plain.to_ft_create_args(), plain.clone().to_ft_create_args());
    }

    #[test]
    fn test_index_manager_register_replaces() {
        let mut manager = IndexManager::new();
        manager.register(SearchIndex::new("players", "players:"));
        manager.register(SearchIndex::new("players", "players:").field("Number", FieldKind::Numeric, true));
        manager.register(SearchIndex::new("guilds", "guilds:"));

        assert_eq!(manager.get("players").unwrap().fields.len(), 1);
        assert_eq!(manager.get("guilds").unwrap().prefix, "guilds:");
        assert!(manager.get("items").is_none());
    }
}
