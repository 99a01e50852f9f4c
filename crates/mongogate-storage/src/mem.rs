use crate::traits::{DocumentStore, StoreSession};
use mongogate_core::{Document, Filter, GateError, Page, Result};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

/// Process-local document store. Collections are kept in name order and
/// documents in insertion order. Counts connects/queries and open sessions so
/// callers can check that sessions are released.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    stats: Arc<Stats>,
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, Vec<Document>>,
    // every operation fails with this message while set
    failure: Option<String>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct Stats {
    connects: AtomicU64,
    queries: AtomicU64,
    open_sessions: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, doc: Document) {
        self.inner
            .write()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    pub fn create_collection(&self, collection: &str) {
        self.inner
            .write()
            .collections
            .entry(collection.to_string())
            .or_default();
    }

    pub fn set_failure(&self, message: Option<&str>) {
        self.inner.write().failure = message.map(str::to_string);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.write().latency = latency;
    }

    pub fn connects(&self) -> u64 {
        self.stats.connects.load(AtomicOrdering::SeqCst)
    }

    pub fn queries(&self) -> u64 {
        self.stats.queries.load(AtomicOrdering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.stats.open_sessions.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>> {
        self.stats.connects.fetch_add(1, AtomicOrdering::SeqCst);
        let failure = self.inner.read().failure.clone();
        if let Some(msg) = failure {
            return Err(GateError::Store(msg));
        }
        self.stats.open_sessions.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemSession {
            store: self.clone(),
        }))
    }
}

struct MemSession {
    store: InMemoryStore,
}

impl MemSession {
    // Shared preamble of every query: count it, apply latency and failure.
    async fn begin(&self) -> Result<()> {
        self.store.stats.queries.fetch_add(1, AtomicOrdering::SeqCst);
        let (latency, failure) = {
            let inner = self.store.inner.read();
            (inner.latency, inner.failure.clone())
        };
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
        match failure {
            Some(msg) => Err(GateError::Store(msg)),
            None => Ok(()),
        }
    }

    fn matching(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let inner = self.store.inner.read();
        let mut out = Vec::new();
        for doc in inner.collections.get(collection).into_iter().flatten() {
            if matches_filter(doc, filter)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl StoreSession for MemSession {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.begin().await?;
        Ok(self.store.inner.read().collections.keys().cloned().collect())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>> {
        self.begin().await?;
        let docs = self.matching(collection, filter)?;
        Ok(match page {
            Some(p) => docs
                .into_iter()
                .skip(p.skip as usize)
                .take(p.limit as usize)
                .collect(),
            None => docs,
        })
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.begin().await?;
        Ok(self.matching(collection, filter)?.len() as u64)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.begin().await?;
        let inner = self.store.inner.read();
        let found = inner
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .find(|doc| id_matches(doc.get("_id"), id))
            .cloned();
        Ok(found)
    }

    async fn close(&self) -> Result<()> {
        self.store
            .stats
            .open_sessions
            .fetch_sub(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

// `_id` may be stored as a plain string or as relaxed-JSON ObjectId.
fn id_matches(stored: Option<&JsonValue>, id: &str) -> bool {
    match stored {
        Some(JsonValue::String(s)) => s == id,
        Some(JsonValue::Object(m)) => m.get("$oid").and_then(|v| v.as_str()) == Some(id),
        _ => false,
    }
}

fn lookup<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(doc, |cur, part| cur.get(part))
}

fn matches_filter(doc: &JsonValue, filter: &Filter) -> Result<bool> {
    for (path, expected) in filter {
        if !matches_field(lookup(doc, path), expected)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_doc(v: &JsonValue) -> bool {
    match v {
        JsonValue::Object(m) => !m.is_empty() && m.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_field(actual: Option<&JsonValue>, expected: &JsonValue) -> Result<bool> {
    if !is_operator_doc(expected) {
        return Ok(equals(actual, expected));
    }
    let ops = expected.as_object().into_iter().flatten();
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(actual, arg),
            "$ne" => !equals(actual, arg),
            "$gt" => compare(actual, arg) == Some(Ordering::Greater),
            "$gte" => matches!(
                compare(actual, arg),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            "$lt" => compare(actual, arg) == Some(Ordering::Less),
            "$lte" => matches!(compare(actual, arg), Some(Ordering::Less | Ordering::Equal)),
            "$in" => in_list(actual, arg)?,
            "$nin" => !in_list(actual, arg)?,
            "$exists" => actual.is_some() == arg.as_bool().unwrap_or(true),
            other => return Err(GateError::Store(format!("unknown operator: {}", other))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

// Equality with array fields matching any element, like the real store.
fn equals(actual: Option<&JsonValue>, expected: &JsonValue) -> bool {
    match actual {
        Some(JsonValue::Array(items)) if !expected.is_array() => {
            items.iter().any(|i| json_eq(i, expected))
        }
        Some(v) => json_eq(v, expected),
        None => expected.is_null(),
    }
}

// Numbers compare by value so 1 and 1.0 are equal.
fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(actual: Option<&JsonValue>, arg: &JsonValue) -> Option<Ordering> {
    match (actual?, arg) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn in_list(actual: Option<&JsonValue>, arg: &JsonValue) -> Result<bool> {
    let list = arg
        .as_array()
        .ok_or_else(|| GateError::Store("$in needs an array".into()))?;
    Ok(list.iter().any(|v| equals(actual, v)))
}
