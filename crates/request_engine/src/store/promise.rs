use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, Shared};
use request_logging::request_warn;
use tokio::runtime::Handle;

use super::cache::AnyValue;
use super::timer::lock;
use crate::{CacheKey, RequestError};

/// In-flight service call that several requests may await.
pub type SharedCall = Shared<BoxFuture<'static, Result<AnyValue, RequestError>>>;

/// Identifies one [`PromiseStore::set`] so a request can recognise its own call.
pub type CallId = u64;

/// At most one in-flight call per cache key.
#[derive(Default)]
pub struct PromiseStore {
    calls: Arc<Mutex<HashMap<CacheKey, (CallId, SharedCall)>>>,
    next_id: AtomicU64,
}

impl PromiseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<(CallId, SharedCall)> {
        lock(&self.calls).get(key).cloned()
    }

    /// Stores `call` under `key` and drives it to completion in the background.
    ///
    /// The entry is removed once the call settles, whether or not anyone awaits it.
    pub fn set(&self, key: CacheKey, call: SharedCall) -> CallId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.calls).insert(key.clone(), (id, call.clone()));

        let calls = Arc::downgrade(&self.calls);
        let settle = async move {
            let _ = call.await;
            if let Some(calls) = calls.upgrade() {
                let mut calls = lock(&calls);
                if calls.get(&key).is_some_and(|(current, _)| *current == id) {
                    calls.remove(&key);
                }
            }
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(settle);
            }
            Err(_) => request_warn!("shared call for {} not driven: no tokio runtime", id),
        }
        id
    }

    pub fn len(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}
