//! Query Executor
//!
//! Issues a [`CompiledQuery`] as `FT.SEARCH` and parses the positional reply.
//!
//! ```text
//! FT.SEARCH <index> <query> [NOCONTENT] [RETURN n f1 .. fn]
//!           LIMIT <page*page_size> <max(1, page_size)>
//!           [SORTBY <field> ASC|DESC] DIALECT 2
//!
//! reply: [total, key1, [f, v, ..]?, key2, [f, v, ..]?, ...]
//! ```
//!
//! Keys come back with the index's `"{index}:"` prefix, which is stripped so
//! callers see plain ids.

use redis::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::query::CompiledQuery;
use crate::config::{ReadFailurePolicy, SearchConfig};
use crate::engine::SearchError;
use crate::metrics::{self, SearchTimer};
use crate::storage::traits::{SearchBackend, StorageError};

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub ids: Vec<String>,
    pub total_count: u64,
    pub total_pages: u64,
    /// Per-id fields, aligned with `ids`; empty unless content was requested.
    pub documents: Vec<HashMap<String, String>>,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `ceil(total / page_size)`, zero for a zero page size.
pub fn total_pages(total: u64, page_size: usize) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64)
}

/// Build FT.SEARCH arguments (without the command name).
pub fn build_search_args(
    index: &str,
    query: &CompiledQuery,
    page: usize,
    page_size: usize,
    dialect: u32,
) -> Vec<String> {
    let offset = page.saturating_mul(page_size);
    let count = page_size.max(1);

    let mut args = vec![index.to_string(), query.query_text()];

    if !query.with_content {
        args.push("NOCONTENT".to_string());
    } else if !query.return_fields.is_empty() {
        args.push("RETURN".to_string());
        args.push(query.return_fields.len().to_string());
        args.extend(query.return_fields.iter().cloned());
    }

    args.push("LIMIT".to_string());
    args.push(offset.to_string());
    args.push(count.to_string());

    if let Some(sort) = &query.sort {
        args.push("SORTBY".to_string());
        args.push(sort.field.clone());
        args.push(sort.direction.keyword().to_string());
    }

    args.push("DIALECT".to_string());
    args.push(dialect.to_string());
    args
}

fn malformed(reason: impl Into<String>) -> StorageError {
    StorageError::MalformedReply {
        command: "FT.SEARCH".to_string(),
        reason: reason.into(),
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Okay => Some("OK".to_string()),
        _ => None,
    }
}

fn parse_fields(items: &[Value]) -> Result<HashMap<String, String>, StorageError> {
    if items.len() % 2 != 0 {
        return Err(malformed("odd number of field/value entries"));
    }
    items
        .chunks(2)
        .map(|pair| {
            let field = value_to_string(&pair[0]).ok_or_else(|| malformed("non-string field name"))?;
            let value = value_to_string(&pair[1]).unwrap_or_default();
            Ok((field, value))
        })
        .collect()
}

/// Parse an FT.SEARCH reply into a page.
pub fn parse_search_reply(
    reply: Value,
    key_prefix: &str,
    page_size: usize,
    with_content: bool,
) -> Result<SearchPage, StorageError> {
    let mut items = match reply {
        Value::Array(items) => items.into_iter(),
        other => return Err(malformed(format!("expected array reply, got {:?}", other))),
    };

    let total_count = match items.next() {
        Some(Value::Int(n)) if n >= 0 => n as u64,
        Some(other) => value_to_string(&other)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| malformed(format!("bad total count {:?}", other)))?,
        None => return Err(malformed("empty reply")),
    };

    let mut page = SearchPage {
        total_count,
        total_pages: total_pages(total_count, page_size),
        ..SearchPage::default()
    };

    for item in items {
        match item {
            Value::Array(fields) => {
                if !with_content {
                    continue;
                }
                let doc = page
                    .documents
                    .last_mut()
                    .ok_or_else(|| malformed("field list before any id"))?;
                *doc = parse_fields(&fields)?;
            }
            Value::Nil => {}
            other => {
                let key = value_to_string(&other).ok_or_else(|| malformed(format!("bad id {:?}", other)))?;
                let id = key.strip_prefix(key_prefix).unwrap_or(&key).to_string();
                page.ids.push(id);
                if with_content {
                    page.documents.push(HashMap::new());
                }
            }
        }
    }

    Ok(page)
}

/// Runs compiled queries against a backend.
pub struct QueryExecutor {
    backend: Arc<dyn SearchBackend>,
    dialect: u32,
    policy: ReadFailurePolicy,
    log_queries: bool,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn SearchBackend>, config: &SearchConfig) -> Self {
        Self {
            backend,
            dialect: config.dialect,
            policy: config.read_failure_policy,
            log_queries: config.log_queries,
        }
    }

    /// Execute one page of a compiled query.
    ///
    /// Transport and parse failures follow the configured
    /// [`ReadFailurePolicy`].
    pub async fn execute(
        &self,
        index: &str,
        key_prefix: &str,
        query: &CompiledQuery,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage, SearchError> {
        let args = build_search_args(index, query, page, page_size, self.dialect);
        if self.log_queries {
            debug!(index, query = %args[1], "FT.SEARCH {}", args.join(" "));
        } else {
            debug!(index, page, page_size, "FT.SEARCH");
        }

        let result = {
            let _timer = SearchTimer::start();
            match self.backend.ft_search(&args).await {
                Ok(reply) => parse_search_reply(reply, key_prefix, page_size, query.with_content),
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(found) => {
                metrics::record_search_query("success");
                metrics::record_search_results(found.ids.len());
                Ok(found)
            }
            Err(e) => {
                metrics::record_search_query("error");
                match self.policy {
                    ReadFailurePolicy::Empty => {
                        warn!(index, error = %e, "Search failed, returning empty page");
                        Ok(SearchPage::empty())
                    }
                    ReadFailurePolicy::Propagate => Err(SearchError::QueryFailed {
                        index: index.to_string(),
                        source: e,
                    }),
                }
            }
        }
    }
}
