//! Index Synchronizer
//!
//! Keeps each model's physical RediSearch index in step with its declared
//! schema. The fingerprint of the last created shape is persisted in a
//! metadata hash next to the data; a run compares it with the current one and
//! rebuilds only on drift.
//!
//! ```text
//! Unknown ──load metadata──→ Checked ──same fingerprint──→ UpToDate
//!                               │
//!                               └──missing/different──→ Rebuilding
//!                                    drop (errors ignored)
//!                                    create ──ok──→ persist metadata → UpToDate
//!                                           └─err─→ Failed
//! no indexed fields ──────────────────────────────────→ NotIndexed
//! ```
//!
//! Terminal states are remembered for the process lifetime, so repeat calls
//! perform no I/O. Failures are logged and never returned to the caller; a
//! `Failed` index simply yields no matches.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::index_manager::{IndexManager, SearchIndex};
use crate::config::SearchConfig;
use crate::metrics;
use crate::model::ModelDescriptor;
use crate::storage::traits::SearchBackend;

const FIELD_FINGERPRINT: &str = "fingerprint";
const FIELD_LAST_UPDATED: &str = "last_updated";
const FIELD_CREATED_AT: &str = "created_at";

/// Synchronisation state of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unknown,
    Checked,
    Rebuilding,
    UpToDate,
    /// The model has no indexed fields.
    NotIndexed,
    /// Drop/create failed; not retried for this process.
    Failed,
}

impl IndexState {
    pub fn is_terminal(self) -> bool {
        matches!(self, IndexState::UpToDate | IndexState::NotIndexed | IndexState::Failed)
    }
}

/// Persisted metadata for one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    pub fingerprint: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl IndexMetadata {
    /// Parse a metadata hash. `None` when there is no fingerprint.
    pub fn from_hash(hash: &HashMap<String, String>) -> Option<Self> {
        let fingerprint = hash.get(FIELD_FINGERPRINT).filter(|f| !f.is_empty())?.clone();
        let parse = |field: &str| {
            hash.get(field)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };
        Some(Self {
            fingerprint,
            last_updated: parse(FIELD_LAST_UPDATED),
            created_at: parse(FIELD_CREATED_AT),
        })
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![(FIELD_FINGERPRINT.to_string(), self.fingerprint.clone())];
        if let Some(ts) = self.last_updated {
            fields.push((FIELD_LAST_UPDATED.to_string(), ts.to_rfc3339()));
        }
        if let Some(ts) = self.created_at {
            fields.push((FIELD_CREATED_AT.to_string(), ts.to_rfc3339()));
        }
        fields
    }
}

pub struct IndexSynchronizer {
    backend: Arc<dyn SearchBackend>,
    config: SearchConfig,
    states: DashMap<String, IndexState>,
    definitions: RwLock<IndexManager>,
    run_lock: Mutex<()>,
}

impl IndexSynchronizer {
    pub fn new(backend: Arc<dyn SearchBackend>, config: SearchConfig) -> Self {
        Self {
            backend,
            config,
            states: DashMap::new(),
            definitions: RwLock::new(IndexManager::new()),
            run_lock: Mutex::new(()),
        }
    }

    /// Current state of a physical index.
    pub fn state(&self, index: &str) -> IndexState {
        self.states.get(index).map(|s| *s.value()).unwrap_or(IndexState::Unknown)
    }

    /// Definition built for a physical index, if any.
    pub fn definition(&self, index: &str) -> Option<SearchIndex> {
        self.definitions.read().get(index).cloned()
    }

    /// Forget every remembered state so the next call checks again.
    pub fn reset(&self) {
        self.states.clear();
    }

    /// Bring the index for `descriptor` up to date. Never fails.
    pub async fn ensure(&self, descriptor: &ModelDescriptor) -> IndexState {
        let (physical, _) = SearchIndex::physical_names(&descriptor.index_name, self.config.namespace());

        let current = self.state(&physical);
        if current.is_terminal() {
            return current;
        }

        let _guard = self.run_lock.lock().await;

        // Another task may have finished while we waited.
        let current = self.state(&physical);
        if current.is_terminal() {
            return current;
        }

        let Some(index) = SearchIndex::build(descriptor, self.config.namespace()) else {
            debug!(index = %physical, "Model has no indexed fields, skipping index");
            self.states.insert(physical, IndexState::NotIndexed);
            return IndexState::NotIndexed;
        };
        self.definitions.write().register(index.clone());

        let state = self.synchronise(&index).await;
        self.states.insert(physical, state);
        state
    }

    async fn synchronise(&self, index: &SearchIndex) -> IndexState {
        let fingerprint = index.fingerprint();
        let metadata_key = self.config.metadata_key(&index.name);

        let stored = match self.backend.hgetall(&metadata_key).await {
            Ok(hash) => IndexMetadata::from_hash(&hash),
            Err(e) => {
                warn!(index = %index.name, error = %e, "Failed to load index metadata, rebuilding");
                None
            }
        };
        self.states.insert(index.name.clone(), IndexState::Checked);

        if stored.as_ref().map(|m| m.fingerprint.as_str()) == Some(fingerprint.as_str()) {
            debug!(index = %index.name, "Search index up to date");
            metrics::record_index_operation("check", true);
            return IndexState::UpToDate;
        }

        self.states.insert(index.name.clone(), IndexState::Rebuilding);
        info!(
            index = %index.name,
            previous = stored.as_ref().map(|m| m.fingerprint.as_str()).unwrap_or("none"),
            current = %fingerprint,
            fields = index.fields.len(),
            "Rebuilding search index"
        );

        match self.backend.ft_dropindex(&index.name).await {
            Ok(()) => metrics::record_index_operation("drop", true),
            Err(e) if e.is_unknown_index() => {
                debug!(index = %index.name, "No previous index to drop");
            }
            Err(e) => {
                warn!(index = %index.name, error = %e, "Failed to drop search index, continuing");
                metrics::record_index_operation("drop", false);
            }
        }

        let args = index.to_ft_create_args();
        debug!(command = %format!("FT.CREATE {}", args.join(" ")), "Creating search index");
        if let Err(e) = self.backend.ft_create(&args).await {
            warn!(index = %index.name, error = %e, "Failed to create search index");
            metrics::record_index_operation("create", false);
            return IndexState::Failed;
        }
        metrics::record_index_operation("create", true);

        let now = Utc::now();
        let metadata = IndexMetadata {
            fingerprint,
            last_updated: Some(now),
            created_at: stored.and_then(|m| m.created_at).or(Some(now)),
        };
        if let Err(e) = self.backend.hset(&metadata_key, &metadata.to_fields()).await {
            // The index is live; the next process will rebuild it once more.
            warn!(index = %index.name, error = %e, "Failed to persist index metadata");
        }

        info!(index = %index.name, "Search index rebuilt");
        IndexState::UpToDate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{analyze_schema, IndexKind, Indexed, Model, ModelSchema};
    use crate::storage::memory::InMemoryBackend;

    struct Player;

    impl Model for Player {
        const INDEX_NAME: &'static str = "sync-players";

        fn schema() -> ModelSchema {
            ModelSchema::new::<Self>()
                .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
                .indexed::<i32>("Number")
        }
    }

    struct PlayerV2;

    impl Model for PlayerV2 {
        const INDEX_NAME: &'static str = "sync-players";

        fn schema() -> ModelSchema {
            ModelSchema::new::<Self>()
                .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
                .indexed::<i32>("Number")
                .indexed::<bool>("IsLegendary")
        }
    }

    struct Unindexed;

    impl Model for Unindexed {
        const INDEX_NAME: &'static str = "sync-notes";

        fn schema() -> ModelSchema {
            ModelSchema::new::<Self>().field::<String>("Body")
        }
    }

    fn sync(backend: &Arc<InMemoryBackend>) -> IndexSynchronizer {
        IndexSynchronizer::new(backend.clone(), SearchConfig::default())
    }

    #[tokio::test]
    async fn test_first_run_creates_and_persists_fingerprint() {
        let backend = Arc::new(InMemoryBackend::new());
        let synchronizer = sync(&backend);
        let descriptor = analyze_schema(&Player::schema());

        assert_eq!(synchronizer.state("sync-players"), IndexState::Unknown);
        assert_eq!(synchronizer.ensure(&descriptor).await, IndexState::UpToDate);
        assert_eq!(backend.create_count(), 1);

        let hash = backend.hgetall("index:sync-players").await.unwrap();
        let meta = IndexMetadata::from_hash(&hash).unwrap();
        let expected = SearchIndex::build(&descriptor, None).unwrap().fingerprint();
        assert_eq!(meta.fingerprint, expected);
        assert!(meta.last_updated.is_some());
        assert!(meta.created_at.is_some());
        assert!(synchronizer.definition("sync-players").is_some());
    }

    #[tokio::test]
    async fn test_second_call_does_no_io() {
        let backend = Arc::new(InMemoryBackend::new());
        let synchronizer = sync(&backend);
        let descriptor = analyze_schema(&Player::schema());

        synchronizer.ensure(&descriptor).await;
        synchronizer.ensure(&descriptor).await;
        assert_eq!(backend.create_count(), 1);
        assert_eq!(backend.drop_count(), 1);
    }

    #[tokio::test]
    async fn test_new_process_with_same_shape_skips_rebuild() {
        let backend = Arc::new(InMemoryBackend::new());
        let descriptor = analyze_schema(&Player::schema());

        sync(&backend).ensure(&descriptor).await;
        let fresh = sync(&backend);
        assert_eq!(fresh.ensure(&descriptor).await, IndexState::UpToDate);
        assert_eq!(backend.create_count(), 1);
        assert_eq!(backend.drop_count(), 1);
    }

    #[tokio::test]
    async fn test_schema_drift_rebuilds_and_keeps_created_at() {
        let backend = Arc::new(InMemoryBackend::new());
        sync(&backend).ensure(&analyze_schema(&Player::schema())).await;
        let before = IndexMetadata::from_hash(&backend.hgetall("index:sync-players").await.unwrap()).unwrap();

        let state = sync(&backend).ensure(&analyze_schema(&PlayerV2::schema())).await;
        assert_eq!(state, IndexState::UpToDate);
        assert_eq!(backend.create_count(), 2);

        let after = IndexMetadata::from_hash(&backend.hgetall("index:sync-players").await.unwrap()).unwrap();
        assert_ne!(before.fingerprint, after.fingerprint);
        assert_eq!(before.created_at, after.created_at);
        let args = backend.index_args("sync-players").unwrap();
        assert!(args.contains(&"IsLegendary".to_string()));
    }

    #[tokio::test]
    async fn test_model_without_indexed_fields() {
        let backend = Arc::new(InMemoryBackend::new());
        let synchronizer = sync(&backend);
        let state = synchronizer.ensure(&analyze_schema(&Unindexed::schema())).await;
        assert_eq!(state, IndexState::NotIndexed);
        assert_eq!(backend.create_count(), 0);
        assert_eq!(backend.drop_count(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_is_swallowed_and_remembered() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_creates(true);
        let synchronizer = sync(&backend);
        let descriptor = analyze_schema(&Player::schema());

        assert_eq!(synchronizer.ensure(&descriptor).await, IndexState::Failed);
        backend.fail_creates(false);
        assert_eq!(synchronizer.ensure(&descriptor).await, IndexState::Failed);
        assert!(backend.hgetall("index:sync-players").await.unwrap().is_empty());

        synchronizer.reset();
        assert_eq!(synchronizer.ensure(&descriptor).await, IndexState::UpToDate);
    }

    #[tokio::test]
    async fn test_namespace_prefixes_everything() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = SearchConfig {
            namespace: Some("app:".into()),
            ..Default::default()
        };
        let synchronizer = IndexSynchronizer::new(backend.clone(), config);
        synchronizer.ensure(&analyze_schema(&Player::schema())).await;

        assert_eq!(synchronizer.state("app:sync-players"), IndexState::UpToDate);
        assert!(backend.index_args("app:sync-players").is_some());
        assert!(!backend.hgetall("index:app:sync-players").await.unwrap().is_empty());
    }

    #[test]
    fn test_metadata_requires_fingerprint() {
        let mut hash = HashMap::new();
        assert!(IndexMetadata::from_hash(&hash).is_none());
        hash.insert("last_updated".to_string(), "2024-01-01T00:00:00+00:00".to_string());
        assert!(IndexMetadata::from_hash(&hash).is_none());
        hash.insert("fingerprint".to_string(), "abc".to_string());
        let meta = IndexMetadata::from_hash(&hash).unwrap();
        assert_eq!(meta.fingerprint, "abc");
        assert!(meta.last_updated.is_some());
        assert!(meta.created_at.is_none());
    }
}
