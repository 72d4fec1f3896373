//! # hashmodel
//!
//! Typed models over Redis hashes, searchable through RediSearch.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Model layer                         │
//! │  • Model::schema() declares fields and index markers        │
//! │  • analyze::<M>() resolves kinds, cached process-wide       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │      Index lifecycle     │   │          Querying            │
//! │  • SearchIndex::build    │   │  • Field<M, T> → Filter<M>   │
//! │  • SHA-256 fingerprint   │   │  • PredicateCompiler         │
//! │  • IndexSynchronizer     │   │  • QueryExecutor (FT.SEARCH) │
//! └──────────────────────────┘   └──────────────────────────────┘
//!              │                               │
//!              └───────────────┬───────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              SearchBackend (Redis / in-memory)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hashmodel::model::{IndexKind, Indexed, Model, ModelSchema};
//! use hashmodel::search::Field;
//! use hashmodel::{SearchConfig, SearchEngine};
//!
//! struct Player;
//!
//! impl Model for Player {
//!     const INDEX_NAME: &'static str = "players";
//!
//!     fn schema() -> ModelSchema {
//!         ModelSchema::new::<Self>()
//!             .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
//!             .indexed_with::<i32>("Number", Indexed::auto().sortable())
//!             .indexed::<bool>("IsLegendary")
//!     }
//! }
//!
//! impl Player {
//!     const USERNAME: Field<Player, String> = Field::new("Username");
//!     const NUMBER: Field<Player, i32> = Field::new("Number");
//!     const IS_LEGENDARY: Field<Player, bool> = Field::new("IsLegendary");
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SearchEngine::connect(SearchConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     let ids = engine
//!         .query::<Player>()
//!         .filter(Player::NUMBER.eq(5) & Player::USERNAME.starts_with("1"))
//!         .filter(!Player::IS_LEGENDARY.is_true())
//!         .sort_by(Player::NUMBER.descending())
//!         .ids()
//!         .await?;
//!
//!     println!("{:?}", ids);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`model`]: field classification, schema declaration and analysis
//! - [`search`]: index derivation, synchronisation, predicate compilation, execution
//! - [`engine`]: the [`SearchEngine`] façade
//! - [`storage`]: backends (Redis, in-memory)
//! - [`resilience`]: retry with backoff

pub mod config;
pub mod engine;
pub mod metrics;
pub mod model;
pub mod resilience;
pub mod search;
pub mod storage;

pub use config::{ReadFailurePolicy, SearchConfig};
pub use engine::{ModelQuery, ModelRegistry, SearchEngine, SearchError};
pub use resilience::retry::RetryConfig;
pub use search::{CompileError, Field, Filter, IndexState, SearchPage, SortDirection, SortField};
pub use storage::traits::{SearchBackend, StorageError};
