use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use request_logging::request_trace;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::timer::{lock, spawn_after};
use crate::{CacheKey, Ttl};

/// Type-erased value held by the shared stores.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// One cached result: data, the params that produced it and when it was written.
#[derive(Clone)]
pub struct CacheEntry {
    pub data: AnyValue,
    pub params: AnyValue,
    pub time: Instant,
}

struct Record {
    entry: CacheEntry,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Process-wide key to entry store with per-entry expiry.
#[derive(Default)]
pub struct CacheStore {
    records: Arc<Mutex<HashMap<CacheKey, Record>>>,
    generation: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry`, replacing the expiry timer of any previous entry.
    pub fn set(&self, key: CacheKey, cache_time: Ttl, entry: CacheEntry) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let timer = match cache_time {
            Ttl::Infinite => None,
            Ttl::Finite(delay) => {
                let records = Arc::downgrade(&self.records);
                let expired_key = key.clone();
                spawn_after(delay, move || {
                    let Some(records) = records.upgrade() else {
                        return;
                    };
                    let mut records = lock(&records);
                    if records
                        .get(&expired_key)
                        .is_some_and(|record| record.generation == generation)
                    {
                        records.remove(&expired_key);
                        request_trace!("cache entry {} expired", expired_key);
                    }
                })
            }
        };

        let previous = lock(&self.records).insert(
            key,
            Record {
                entry,
                generation,
                timer,
            },
        );
        if let Some(timer) = previous.and_then(|record| record.timer) {
            timer.abort();
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        lock(&self.records)
            .get(key)
            .map(|record| record.entry.clone())
    }

    /// Removes the given keys.
    pub fn clear<I>(&self, keys: I)
    where
        I: IntoIterator,
        I::Item: Into<CacheKey>,
    {
        let mut records = lock(&self.records);
        for key in keys {
            if let Some(timer) = records.remove(&key.into()).and_then(|record| record.timer) {
                timer.abort();
            }
        }
    }

    pub fn clear_all(&self) {
        let drained: Vec<Record> = lock(&self.records).drain().map(|(_, record)| record).collect();
        for timer in drained.into_iter().filter_map(|record| record.timer) {
            timer.abort();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{AnyValue, CacheEntry, CacheStore};
    use crate::{CacheKey, Ttl};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn entry(value: u32) -> CacheEntry {
        let data: AnyValue = Arc::new(value);
        let params: AnyValue = Arc::new(());
        CacheEntry {
            data,
            params,
            time: Instant::now(),
        }
    }

    fn value(store: &CacheStore, key: &str) -> Option<u32> {
        store
            .get(&CacheKey::from(key))
            .and_then(|entry| entry.data.downcast_ref::<u32>().copied())
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_cache_time() {
        let store = CacheStore::new();
        store.set("a".into(), Ttl::from_millis(100), entry(1));
        assert_eq!(value(&store, "a"), Some(1));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(value(&store, "a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_expiry() {
        let store = CacheStore::new();
        store.set("a".into(), Ttl::from_millis(100), entry(1));
        tokio::time::sleep(Duration::from_millis(80)).await;
        store.set("a".into(), Ttl::from_millis(100), entry(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(value(&store, "a"), Some(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(value(&store, "a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn infinite_entries_stay() {
        let store = CacheStore::new();
        store.set("a".into(), Ttl::Infinite, entry(1));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(value(&store, "a"), Some(1));
    }

    #[tokio::test]
    async fn clear_removes_selected_keys_or_everything() {
        let store = CacheStore::new();
        for key in ["a", "b", "c"] {
            store.set(key.into(), Ttl::Infinite, entry(0));
        }
        store.clear(["a", "b"]);
        assert_eq!(store.len(), 1);
        assert_eq!(value(&store, "c"), Some(0));

        store.clear_all();
        assert!(store.is_empty());
    }
}
