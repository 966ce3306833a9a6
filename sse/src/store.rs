//! Durable storage backends for the event log.
//!
//! A store is an ordered key-value collection keyed by `EventId`. The store
//! assigns keys itself on `append`: the next key is one past the highest key it
//! has ever handed out, so ids are dense, start at 0 and are never reused.

use crate::error::{Error, ErrorKind, Result, StoreErrorKind};
use async_trait::async_trait;
use events::EventId;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// The persisted part of an event. The id is the store key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event_type: Option<String>,
    pub data: String,
}

/// Ordered, appendable key-value store backing the event log.
///
/// Callers serialise `append` externally; implementations only need to be
/// safe for concurrent reads alongside a single appender.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist `entry` under the next key and return that key. A failed append
    /// does not consume a key.
    async fn append(&self, entry: &Entry) -> Result<EventId>;

    async fn get(&self, id: EventId) -> Result<Option<Entry>>;

    /// All keys currently held, ascending.
    async fn keys(&self) -> Result<Vec<EventId>>;

    async fn remove(&self, id: EventId) -> Result<()>;

    /// Number of entries currently held, without reading them.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn flush(&self) -> Result<()>;
}

fn exhausted() -> Error {
    Error::new(ErrorKind::Store(StoreErrorKind::Exhausted))
}

#[derive(Default)]
struct MemoryInner {
    entries: BTreeMap<EventId, Entry>,
    next: u64,
}

/// Volatile store; history is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned map is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, entry: &Entry) -> Result<EventId> {
        let mut inner = self.lock();
        let id = EventId::new(inner.next);
        let following = inner.next.checked_add(1).ok_or_else(exhausted)?;
        inner.entries.insert(id, entry.clone());
        inner.next = following;
        Ok(id)
    }

    async fn get(&self, id: EventId) -> Result<Option<Entry>> {
        Ok(self.lock().entries.get(&id).cloned())
    }

    async fn keys(&self) -> Result<Vec<EventId>> {
        Ok(self.lock().entries.keys().copied().collect())
    }

    async fn remove(&self, id: EventId) -> Result<()> {
        self.lock().entries.remove(&id);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock().entries.len())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Store persisted in a sled tree. Keys are big-endian `u64` so sled's byte
/// ordering matches id ordering; values are JSON-encoded entries.
pub struct SledStore {
    tree: sled::Tree,
    next: Mutex<u64>,
    // sled's own `len` scans the whole tree.
    len: AtomicUsize,
}

impl SledStore {
    /// Open (or create) the database at `path` and use the tree called `name`.
    pub fn open(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        info!("Opened sled event store at {:?}", path.as_ref());
        Self::from_db(&db, name)
    }

    /// Use the tree `name` of an already opened database.
    pub fn from_db(db: &sled::Db, name: &str) -> Result<Self> {
        let tree = db.open_tree(name)?;
        let next = match tree.last()? {
            Some((key, _)) => decode_key(&key)?
                .value()
                .checked_add(1)
                .ok_or_else(exhausted)?,
            None => 0,
        };
        let len = tree.len();
        debug!("Sled event store tree {name} resumes at id {next} with {len} entries");

        Ok(Self {
            tree,
            next: Mutex::new(next),
            len: AtomicUsize::new(len),
        })
    }
}

fn encode_key(id: EventId) -> [u8; 8] {
    id.value().to_be_bytes()
}

fn decode_key(key: &[u8]) -> Result<EventId> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| {
        Error::with_source(
            ErrorKind::Store(StoreErrorKind::Serialization),
            format!("invalid event key length {}", key.len()),
        )
    })?;
    Ok(EventId::new(u64::from_be_bytes(bytes)))
}

#[async_trait]
impl EventStore for SledStore {
    async fn append(&self, entry: &Entry) -> Result<EventId> {
        let value = serde_json::to_vec(entry)?;
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let id = EventId::new(*next);
        let following = next.checked_add(1).ok_or_else(exhausted)?;
        self.tree.insert(encode_key(id), value)?;
        // Only advance once the insert succeeded so a failure does not burn an id.
        *next = following;
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    async fn get(&self, id: EventId) -> Result<Option<Entry>> {
        match self.tree.get(encode_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn keys(&self) -> Result<Vec<EventId>> {
        self.tree
            .iter()
            .keys()
            .map(|key| decode_key(&key?))
            .collect()
    }

    async fn remove(&self, id: EventId) -> Result<()> {
        if self.tree.remove(encode_key(id))?.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.len.load(Ordering::Relaxed))
    }

    async fn flush(&self) -> Result<()> {
        self.tree.flush_async().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(data: &str) -> Entry {
        Entry {
            event_type: None,
            data: data.to_string(),
        }
    }

    fn temporary_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_assigns_dense_ids_from_zero() {
        let store = MemoryStore::new();
        for expected in 0..3 {
            let id = store.append(&entry("x")).await.unwrap();
            assert_eq!(id, EventId::new(expected));
        }
        assert_eq!(
            store.keys().await.unwrap(),
            vec![EventId::new(0), EventId::new(1), EventId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_memory_store_never_reuses_removed_ids() {
        let store = MemoryStore::new();
        store.append(&entry("a")).await.unwrap();
        let last = store.append(&entry("b")).await.unwrap();
        store.remove(last).await.unwrap();

        let id = store.append(&entry("c")).await.unwrap();
        assert_eq!(id, EventId::new(2));
        assert_eq!(store.get(last).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_len_tracks_appends_and_removes() {
        let store = MemoryStore::new();
        let first = store.append(&entry("a")).await.unwrap();
        store.append(&entry("b")).await.unwrap();

        store.remove(first).await.unwrap();
        store.remove(first).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sled_store_get_returns_appended_entry() {
        let db = temporary_db();
        let store = SledStore::from_db(&db, "events").unwrap();
        let stored = Entry {
            event_type: Some("push".to_string()),
            data: "line1\nline2".to_string(),
        };

        let id = store.append(&stored).await.unwrap();

        assert_eq!(store.get(id).await.unwrap(), Some(stored));
        assert_eq!(store.get(EventId::new(99)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sled_store_keys_are_numerically_ordered() {
        let db = temporary_db();
        let store = SledStore::from_db(&db, "events").unwrap();
        // 256 crosses a byte boundary; lexicographic decimal ordering would break here.
        for _ in 0..300 {
            store.append(&entry("x")).await.unwrap();
        }

        let keys = store.keys().await.unwrap();
        assert_eq!(keys.len(), 300);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_sled_store_resumes_after_reopen() {
        let db = temporary_db();
        {
            let store = SledStore::from_db(&db, "events").unwrap();
            store.append(&entry("a")).await.unwrap();
            store.append(&entry("b")).await.unwrap();
        }

        let reopened = SledStore::from_db(&db, "events").unwrap();
        let id = reopened.append(&entry("c")).await.unwrap();

        assert_eq!(id, EventId::new(2));
    }

    #[tokio::test]
    async fn test_sled_store_len_counts_without_scanning_keys() {
        let db = temporary_db();
        {
            let store = SledStore::from_db(&db, "events").unwrap();
            store.append(&entry("a")).await.unwrap();
            store.append(&entry("b")).await.unwrap();
        }

        let reopened = SledStore::from_db(&db, "events").unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);

        reopened.append(&entry("c")).await.unwrap();
        reopened.remove(EventId::new(0)).await.unwrap();
        // Removing a missing key leaves the count alone.
        reopened.remove(EventId::new(0)).await.unwrap();
        reopened.remove(EventId::new(42)).await.unwrap();

        assert_eq!(reopened.len().await.unwrap(), 2);
        assert_eq!(
            reopened.len().await.unwrap(),
            reopened.keys().await.unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_sled_store_trees_are_isolated_by_name() {
        let db = temporary_db();
        let first = SledStore::from_db(&db, "first").unwrap();
        let second = SledStore::from_db(&db, "second").unwrap();

        first.append(&entry("a")).await.unwrap();

        assert!(second.keys().await.unwrap().is_empty());
        assert_eq!(
            second.append(&entry("b")).await.unwrap(),
            EventId::new(0)
        );
    }
}
