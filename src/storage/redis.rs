//! Redis backend for search and metadata commands.
//!
//! Talks to a Redis Stack server (RediSearch module loaded) over a
//! [`ConnectionManager`], which reconnects on its own after a dropped
//! connection. Every command goes through [`retry_if`] so transport blips are
//! absorbed while command errors come straight back.
//!
//! ```text
//! FT.CREATE players ON HASH PREFIX 1 players: SCHEMA Username TAG ...
//! FT.SEARCH players "(@Number:[5 5] @Username:{1*})" NOCONTENT LIMIT 0 1000 DIALECT 2
//! HSET index:players fingerprint <hex> last_updated <rfc3339>
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client};
use std::collections::HashMap;
use tracing::instrument;

use super::traits::{SearchBackend, StorageError};
use crate::resilience::retry::{is_transient, retry, retry_if, RetryConfig};

pub struct RedisBackend {
    connection: ConnectionManager,
    retry: RetryConfig,
}

impl RedisBackend {
    /// Connect, retrying with the startup schedule.
    pub async fn connect(connection_string: &str) -> Result<Self, StorageError> {
        let client = Client::open(connection_string).map_err(|e| StorageError::Backend(e.to_string()))?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            connection,
            retry: RetryConfig::command(),
        })
    }

    /// Wrap an existing connection.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            retry: RetryConfig::command(),
        }
    }

    /// Override the per-command retry schedule.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn run<T: redis::FromRedisValue>(&self, name: &str, command: redis::Cmd) -> Result<T, StorageError> {
        let conn = self.connection.clone();
        retry_if(
            name,
            &self.retry,
            || {
                let mut conn = conn.clone();
                let command = command.clone();
                async move {
                    let value: T = command.query_async(&mut conn).await?;
                    Ok(value)
                }
            },
            is_transient,
        )
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(format!("{} failed: {}", name, e)))
    }
}

#[async_trait]
impl SearchBackend for RedisBackend {
    #[instrument(skip(self, args), fields(index = args.first().map(String::as_str).unwrap_or("")))]
    async fn ft_create(&self, args: &[String]) -> Result<(), StorageError> {
        let mut command = cmd("FT.CREATE");
        command.arg(args);
        let _: redis::Value = self.run("FT.CREATE", command).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ft_dropindex(&self, index: &str) -> Result<(), StorageError> {
        let mut command = cmd("FT.DROPINDEX");
        command.arg(index);
        match self.run::<redis::Value>("FT.DROPINDEX", command).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unknown_index() => Err(StorageError::UnknownIndex(index.to_string())),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, args), fields(index = args.first().map(String::as_str).unwrap_or("")))]
    async fn ft_search(&self, args: &[String]) -> Result<redis::Value, StorageError> {
        let mut command = cmd("FT.SEARCH");
        command.arg(args);
        self.run("FT.SEARCH", command).await
    }

    #[instrument(skip(self))]
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        let conn = self.connection.clone();
        retry_if(
            "HGETALL",
            &self.retry,
            || {
                let mut conn = conn.clone();
                let key = key.to_string();
                async move {
                    let map: HashMap<String, String> = conn.hgetall(&key).await?;
                    Ok(map)
                }
            },
            is_transient,
        )
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(format!("HGETALL failed: {}", e)))
    }

    #[instrument(skip(self, fields))]
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StorageError> {
        if fields.is_empty() {
            return Ok(());
        }
        let conn = self.connection.clone();
        retry_if(
            "HSET",
            &self.retry,
            || {
                let mut conn = conn.clone();
                let key = key.to_string();
                let fields = fields.to_vec();
                async move {
                    let _: () = conn.hset_multiple(&key, &fields[..]).await?;
                    Ok(())
                }
            },
            is_transient,
        )
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(format!("HSET failed: {}", e)))
    }
}
