//! Search engine façade.
//!
//! Ties the pieces together for callers that work in terms of model types:
//!
//! ```text
//! engine.query::<Player>().filter(..).ids()
//!       │
//!       ├─→ analyze::<Player>()            (cached descriptor)
//!       ├─→ Query::compile_with()          (CompileError → caller)
//!       ├─→ ensure_index::<Player>()       (first use only)
//!       └─→ QueryExecutor::execute()       (FT.SEARCH, read-failure policy)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::metrics;
use crate::model::{analyze, Model, ModelDescriptor};
use crate::search::{
    CompileError, CompiledQuery, Filter, IndexState, IndexSynchronizer, Query, QueryExecutor,
    SearchIndex, SearchPage, SortField,
};
use crate::storage::redis::RedisBackend;
use crate::storage::traits::{SearchBackend, StorageError};

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid predicate: {0}")]
    Compile(#[from] CompileError),
    #[error("Search on '{index}' failed: {source}")]
    QueryFailed {
        index: String,
        #[source]
        source: StorageError,
    },
}

/// Model types whose indexes are synchronised at startup.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<(&'static str, fn() -> Arc<ModelDescriptor>)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Model>(mut self) -> Self {
        if !self.models.iter().any(|(name, _)| *name == M::INDEX_NAME) {
            self.models.push((M::INDEX_NAME, analyze::<M>));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

pub struct SearchEngine {
    config: SearchConfig,
    synchronizer: IndexSynchronizer,
    executor: QueryExecutor,
}

impl SearchEngine {
    pub fn new(backend: Arc<dyn SearchBackend>, config: SearchConfig) -> Self {
        Self {
            synchronizer: IndexSynchronizer::new(Arc::clone(&backend), config.clone()),
            executor: QueryExecutor::new(backend, &config),
            config,
        }
    }

    /// Connect to `config.redis_url` (or localhost).
    pub async fn connect(config: SearchConfig) -> Result<Self, StorageError> {
        let url = config.redis_url.clone().unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
        let backend = RedisBackend::connect(&url).await?;
        info!(url = %url, "Search engine connected");
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn physical_names(&self, descriptor: &ModelDescriptor) -> (String, String) {
        SearchIndex::physical_names(&descriptor.index_name, self.config.namespace())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Index lifecycle
    // ═══════════════════════════════════════════════════════════════════════════

    /// Synchronisation state of `M`'s index.
    pub fn index_state<M: Model>(&self) -> IndexState {
        let (index, _) = self.physical_names(&analyze::<M>());
        self.synchronizer.state(&index)
    }

    /// Definition of `M`'s index as last synchronised by this engine.
    pub fn index_definition<M: Model>(&self) -> Option<SearchIndex> {
        let (index, _) = self.physical_names(&analyze::<M>());
        self.synchronizer.definition(&index)
    }

    /// Make sure `M`'s index exists with its current shape. Idempotent; never fails.
    pub async fn ensure_index<M: Model>(&self) -> IndexState {
        self.synchronizer.ensure(&analyze::<M>()).await
    }

    /// Synchronise every registered model, in registration order.
    pub async fn initialize_indexes(&self, registry: &ModelRegistry) -> Vec<(String, IndexState)> {
        let mut states = Vec::with_capacity(registry.len());
        for (name, describe) in &registry.models {
            let state = self.synchronizer.ensure(&describe()).await;
            if state == IndexState::Failed {
                warn!(model = %name, "Index synchronisation failed, queries will match nothing");
            }
            states.push((name.to_string(), state));
        }
        info!(models = states.len(), "Search indexes initialised");
        states
    }

    /// Forget index states so the next use checks the server again.
    pub fn reset_index_states(&self) {
        self.synchronizer.reset();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start a query over `M`.
    pub fn query<M: Model>(&self) -> ModelQuery<'_, M> {
        ModelQuery {
            engine: self,
            query: Query::new(),
        }
    }

    /// Compile one optional filter plus sort and run a page of it.
    pub async fn compile_and_execute<M: Model>(
        &self,
        filter: Option<Filter<M>>,
        sort: Option<SortField>,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage, SearchError> {
        let mut query = Query::<M>::new();
        if let Some(filter) = filter {
            query = query.filter(filter);
        }
        if let Some(sort) = sort {
            query = query.sort_by(sort);
        }
        self.execute(&query, page, page_size).await
    }

    /// Run a page of a query.
    pub async fn execute<M: Model>(
        &self,
        query: &Query<M>,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage, SearchError> {
        let descriptor = analyze::<M>();
        let compiled = query.compile_with(&descriptor).map_err(|e| {
            metrics::record_compile_error();
            debug!(index = %descriptor.index_name, error = %e, "Predicate rejected");
            e
        })?;
        self.execute_compiled(&descriptor, &compiled, page, page_size).await
    }

    async fn execute_compiled(
        &self,
        descriptor: &ModelDescriptor,
        compiled: &CompiledQuery,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage, SearchError> {
        if self.synchronizer.ensure(descriptor).await == IndexState::NotIndexed {
            return Ok(SearchPage::empty());
        }
        let (index, prefix) = self.physical_names(descriptor);
        self.executor.execute(&index, &prefix, compiled, page, page_size).await
    }
}

/// Query bound to an engine, with terminal operations.
pub struct ModelQuery<'e, M> {
    engine: &'e SearchEngine,
    query: Query<M>,
}

impl<'e, M: Model> ModelQuery<'e, M> {
    pub fn filter(mut self, filter: Filter<M>) -> Self {
        self.query = self.query.filter(filter);
        self
    }

    pub fn sort_by(mut self, sort: SortField) -> Self {
        self.query = self.query.sort_by(sort);
        self
    }

    pub fn with_content(mut self) -> Self {
        self.query = self.query.with_content();
        self
    }

    /// The underlying query.
    pub fn into_query(self) -> Query<M> {
        self.query
    }

    /// One page of results.
    pub async fn page(&self, page: usize, page_size: usize) -> Result<SearchPage, SearchError> {
        self.engine.execute(&self.query, page, page_size).await
    }

    /// Ids of the first page, at the configured default page size.
    pub async fn ids(&self) -> Result<Vec<String>, SearchError> {
        let size = self.engine.config.default_page_size;
        Ok(self.page(0, size).await?.ids)
    }

    /// Id of the first match.
    pub async fn first_id(&self) -> Result<Option<String>, SearchError> {
        Ok(self.page(0, 1).await?.ids.into_iter().next())
    }

    /// Whether anything matches.
    pub async fn any(&self) -> Result<bool, SearchError> {
        Ok(!self.page(0, 1).await?.ids.is_empty())
    }

    /// Total number of matches.
    pub async fn count(&self) -> Result<u64, SearchError> {
        Ok(self.page(0, 1).await?.total_count)
    }

    /// Selected fields of the first page of matches, keyed by id.
    pub async fn select<I, S>(&self, fields: I) -> Result<Vec<(String, HashMap<String, String>)>, SearchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let size = self.engine.config.default_page_size;
        Ok(self.paged_select(0, size, fields).await?.0)
    }

    /// Selected fields for one page, plus total count and page count.
    pub async fn paged_select<I, S>(
        &self,
        page: usize,
        page_size: usize,
        fields: I,
    ) -> Result<(Vec<(String, HashMap<String, String>)>, u64, u64), SearchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for field in fields.into_iter().map(Into::into) {
            if !selected.contains(&field) {
                selected.push(field);
            }
        }
        let query = self.query.clone().select(selected);
        let found = self.engine.execute(&query, page, page_size).await?;
        let rows = found.ids.into_iter().zip(found.documents).collect();
        Ok((rows, found.total_count, found.total_pages))
    }
}
