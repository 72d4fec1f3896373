//! In-memory backend.
//!
//! Stores hashes in a [`DashMap`] and keeps FT.CREATE definitions so the index
//! lifecycle can be exercised without a server. `FT.SEARCH` does not evaluate
//! query text: every hash under the index prefix matches. LIMIT, SORTBY,
//! NOCONTENT and RETURN are honoured, and each issued query is recorded for
//! inspection.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use redis::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::traits::{SearchBackend, StorageError};

pub struct InMemoryBackend {
    hashes: DashMap<String, HashMap<String, String>>,
    indexes: DashMap<String, Vec<String>>,
    searches: Mutex<Vec<Vec<String>>>,
    creates: AtomicUsize,
    drops: AtomicUsize,
    fail_searches: AtomicBool,
    fail_creates: AtomicBool,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hashes: DashMap::new(),
            indexes: DashMap::new(),
            searches: Mutex::new(Vec::new()),
            creates: AtomicUsize::new(0),
            drops: AtomicUsize::new(0),
            fail_searches: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
        }
    }

    /// Store a hash directly.
    pub fn insert<K, V>(&self, key: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.hashes.insert(key.into(), map);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// FT.CREATE arguments of a live index.
    pub fn index_args(&self, index: &str) -> Option<Vec<String>> {
        self.indexes.get(index).map(|r| r.value().clone())
    }

    /// Successful FT.CREATE calls so far.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// FT.DROPINDEX calls so far, including ones for missing indexes.
    pub fn drop_count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    /// Every FT.SEARCH argument list, oldest first.
    pub fn searches(&self) -> Vec<Vec<String>> {
        self.searches.lock().clone()
    }

    pub fn last_search(&self) -> Option<Vec<String>> {
        self.searches.lock().last().cloned()
    }

    /// Make every FT.SEARCH fail with a backend error.
    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    /// Make every FT.CREATE fail with a backend error.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    fn matching_keys(&self, prefix: &str, sort: Option<(&str, bool)>) -> Vec<String> {
        let mut keys: Vec<String> = self
            .hashes
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect();
        keys.sort();

        if let Some((field, descending)) = sort {
            let value_of = |key: &String| self.hashes.get(key).and_then(|h| h.get(field).cloned());
            keys.sort_by(|a, b| {
                let ord = compare_field_values(value_of(a).as_deref(), value_of(b).as_deref());
                if descending { ord.reverse() } else { ord }
            });
        }
        keys
    }

    fn document_fields(&self, key: &str, returned: Option<&[String]>) -> Value {
        let Some(hash) = self.hashes.get(key) else {
            return Value::Array(Vec::new());
        };
        let mut pairs: Vec<(&String, &String)> = match returned {
            Some(fields) => fields
                .iter()
                .filter_map(|f| hash.get_key_value(f.as_str()))
                .collect(),
            None => {
                let mut all: Vec<_> = hash.iter().collect();
                all.sort();
                all
            }
        };
        let flat = pairs
            .drain(..)
            .flat_map(|(k, v)| {
                [
                    Value::BulkString(k.clone().into_bytes()),
                    Value::BulkString(v.clone().into_bytes()),
                ]
            })
            .collect();
        Value::Array(flat)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric order when both parse, lexical otherwise; missing values sort last.
fn compare_field_values(a: Option<&str>, b: Option<&str>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
        (Some(a), Some(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal),
            _ => a.cmp(b),
        },
    }
}

/// Options parsed from FT.SEARCH arguments after the query text.
struct SearchOptions {
    no_content: bool,
    returned: Option<Vec<String>>,
    offset: usize,
    count: usize,
    sort: Option<(String, bool)>,
}

fn parse_search_options(args: &[String]) -> Result<SearchOptions, StorageError> {
    let malformed = |reason: &str| StorageError::MalformedReply {
        command: "FT.SEARCH".to_string(),
        reason: reason.to_string(),
    };
    let number = |s: Option<&String>| -> Result<usize, StorageError> {
        s.and_then(|s| s.parse().ok()).ok_or_else(|| malformed("expected a number"))
    };

    let mut opts = SearchOptions {
        no_content: false,
        returned: None,
        offset: 0,
        count: 10,
        sort: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.to_ascii_uppercase().as_str() {
            "NOCONTENT" => opts.no_content = true,
            "RETURN" => {
                let n = number(iter.next())?;
                let fields = (0..n)
                    .map(|_| iter.next().cloned().ok_or_else(|| malformed("short RETURN list")))
                    .collect::<Result<Vec<_>, _>>()?;
                opts.returned = Some(fields);
            }
            "LIMIT" => {
                opts.offset = number(iter.next())?;
                opts.count = number(iter.next())?;
            }
            "SORTBY" => {
                let field = iter.next().cloned().ok_or_else(|| malformed("SORTBY without field"))?;
                let descending = matches!(iter.next().map(|s| s.to_ascii_uppercase()).as_deref(), Some("DESC"));
                opts.sort = Some((field, descending));
            }
            "DIALECT" => {
                number(iter.next())?;
            }
            _ => {}
        }
    }
    Ok(opts)
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn ft_create(&self, args: &[String]) -> Result<(), StorageError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("FT.CREATE failed: injected failure".into()));
        }
        let name = args
            .first()
            .ok_or_else(|| StorageError::Backend("FT.CREATE without index name".into()))?;
        if self.indexes.contains_key(name) {
            return Err(StorageError::Backend("Index already exists".into()));
        }
        self.indexes.insert(name.clone(), args.to_vec());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ft_dropindex(&self, index: &str) -> Result<(), StorageError> {
        self.drops.fetch_add(1, Ordering::SeqCst);
        match self.indexes.remove(index) {
            Some(_) => Ok(()),
            None => Err(StorageError::UnknownIndex(index.to_string())),
        }
    }

    async fn ft_search(&self, args: &[String]) -> Result<Value, StorageError> {
        self.searches.lock().push(args.to_vec());

        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("FT.SEARCH failed: injected failure".into()));
        }

        let index = args
            .first()
            .ok_or_else(|| StorageError::Backend("FT.SEARCH without index name".into()))?;
        let prefix = self
            .indexes
            .get(index)
            .and_then(|def| def.get(5).cloned())
            .ok_or_else(|| StorageError::UnknownIndex(index.clone()))?;

        let opts = parse_search_options(args.get(2..).unwrap_or(&[]))?;
        let sort = opts.sort.as_ref().map(|(f, desc)| (f.as_str(), *desc));
        let keys = self.matching_keys(&prefix, sort);

        let mut reply = vec![Value::Int(keys.len() as i64)];
        for key in keys.iter().skip(opts.offset).take(opts.count) {
            reply.push(Value::BulkString(key.clone().into_bytes()));
            if !opts.no_content {
                reply.push(self.document_fields(key, opts.returned.as_deref()));
            }
        }
        Ok(Value::Array(reply))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        Ok(self.hashes.get(key).map(|r| r.value().clone()).unwrap_or_default())
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StorageError> {
        let mut entry = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn as_array(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            other => panic!("Expected array, got {:?}", other),
        }
    }

    async fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend
            .ft_create(&args(&["players", "ON", "HASH", "PREFIX", "1", "players:", "SCHEMA", "Number", "NUMERIC"]))
            .await
            .unwrap();
        backend.insert("players:a", [("Number", "3"), ("Username", "ann")]);
        backend.insert("players:b", [("Number", "1"), ("Username", "bob")]);
        backend.insert("players:c", [("Number", "2"), ("Username", "cid")]);
        backend.insert("guilds:x", [("Name", "x")]);
        backend
    }

    #[tokio::test]
    async fn test_new_backend_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty());
        assert_eq!(backend.create_count(), 0);
    }

    #[tokio::test]
    async fn test_search_matches_prefix_and_windows() {
        let backend = seeded().await;
        let reply = backend
            .ft_search(&args(&["players", "*", "NOCONTENT", "LIMIT", "1", "1", "DIALECT", "2"]))
            .await
            .unwrap();
        let items = as_array(reply);
        assert_eq!(items[0], Value::Int(3));
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], Value::BulkString(b"players:b".to_vec()));
    }

    #[tokio::test]
    async fn test_search_sorts_numerically() {
        let backend = seeded().await;
        let reply = backend
            .ft_search(&args(&["players", "*", "NOCONTENT", "LIMIT", "0", "10", "SORTBY", "Number", "DESC"]))
            .await
            .unwrap();
        let items = as_array(reply);
        assert_eq!(items[1], Value::BulkString(b"players:a".to_vec()));
        assert_eq!(items[3], Value::BulkString(b"players:b".to_vec()));
    }

    #[tokio::test]
    async fn test_search_returns_selected_fields() {
        let backend = seeded().await;
        let reply = backend
            .ft_search(&args(&["players", "*", "RETURN", "1", "Username", "LIMIT", "0", "1"]))
            .await
            .unwrap();
        let items = as_array(reply);
        assert_eq!(
            items[2],
            Value::Array(vec![
                Value::BulkString(b"Username".to_vec()),
                Value::BulkString(b"ann".to_vec()),
            ])
        );
    }

    #[tokio::test]
    async fn test_unknown_index() {
        let backend = InMemoryBackend::new();
        let err = backend.ft_search(&args(&["nope", "*"])).await.unwrap_err();
        assert!(err.is_unknown_index());
        assert!(backend.ft_dropindex("nope").await.unwrap_err().is_unknown_index());
        assert_eq!(backend.drop_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let backend = seeded().await;
        let again = backend.ft_create(&args(&["players", "ON", "HASH", "PREFIX", "1", "players:"])).await;
        assert!(again.is_err());
        assert_eq!(backend.create_count(), 1);
    }

    #[tokio::test]
    async fn test_hset_merges_fields() {
        let backend = InMemoryBackend::new();
        backend.hset("index:players", &[("fingerprint".into(), "aa".into())]).await.unwrap();
        backend.hset("index:players", &[("last_updated".into(), "now".into())]).await.unwrap();
        let map = backend.hgetall("index:players").await.unwrap();
        assert_eq!(map.len(), 2);
        assert!(backend.hgetall("missing").await.unwrap().is_empty());
    }
}
