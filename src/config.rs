//! Configuration for the search engine.
//!
//! # Example
//!
//! ```
//! use hashmodel::{ReadFailurePolicy, SearchConfig};
//!
//! // Minimal config (uses defaults)
//! let config = SearchConfig::default();
//! assert_eq!(config.default_page_size, 1000);
//! assert_eq!(config.metadata_prefix, "index");
//!
//! // Full config
//! let config = SearchConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     namespace: Some("app:".into()),
//!     read_failure_policy: ReadFailurePolicy::Propagate,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// What a query does when the backend call or reply parsing fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Log and return an empty page with zero counts.
    #[default]
    Empty,
    /// Return `SearchError::QueryFailed`.
    Propagate,
}

/// Configuration for the search engine.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Global prefix prepended to index names, key prefixes and metadata keys
    #[serde(default)]
    pub namespace: Option<String>,

    /// Metadata records live at "{metadata_prefix}:{index}"
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,

    /// Page size used by the query helpers when none is given
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// FT.SEARCH query dialect
    #[serde(default = "default_dialect")]
    pub dialect: u32,

    #[serde(default)]
    pub read_failure_policy: ReadFailurePolicy,

    /// Log every issued query text at debug level
    #[serde(default)]
    pub log_queries: bool,
}

fn default_metadata_prefix() -> String { "index".to_string() }
fn default_page_size() -> usize { 1000 }
fn default_dialect() -> u32 { 2 }

impl SearchConfig {
    /// Metadata key for a physical index name.
    pub fn metadata_key(&self, index: &str) -> String {
        format!("{}:{}", self.metadata_prefix, index)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            namespace: None,
            metadata_prefix: default_metadata_prefix(),
            default_page_size: default_page_size(),
            dialect: default_dialect(),
            read_failure_policy: ReadFailurePolicy::default(),
            log_queries: false,
        }
    }
}
