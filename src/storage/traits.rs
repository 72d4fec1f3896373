use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Unknown index '{0}'")]
    UnknownIndex(String),
    #[error("Malformed reply to {command}: {reason}")]
    MalformedReply { command: String, reason: String },
}

impl StorageError {
    /// True for "index does not exist" replies.
    pub fn is_unknown_index(&self) -> bool {
        match self {
            StorageError::UnknownIndex(_) => true,
            StorageError::Backend(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("unknown index name") || msg.contains("no such index")
            }
            StorageError::MalformedReply { .. } => false,
        }
    }
}

/// The search/hash commands the engine issues.
///
/// Implementations receive fully-built argument lists; they do no query
/// construction of their own.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// `FT.CREATE <args>`
    async fn ft_create(&self, args: &[String]) -> Result<(), StorageError>;

    /// `FT.DROPINDEX <index>`. Documents are kept.
    async fn ft_dropindex(&self, index: &str) -> Result<(), StorageError>;

    /// `FT.SEARCH <args>`, returning the raw positional reply.
    async fn ft_search(&self, args: &[String]) -> Result<redis::Value, StorageError>;

    /// `HGETALL <key>`. An absent key yields an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError>;

    /// `HSET <key> <field> <value> ...`
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StorageError>;
}
