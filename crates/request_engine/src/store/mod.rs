//! Process-wide state shared by every request: cache, in-flight calls,
//! cache subscriptions and host signals.
mod cache;
mod host;
mod promise;
mod subscribe;
pub(crate) mod timer;

use std::sync::{Arc, OnceLock};

pub use cache::{AnyValue, CacheEntry, CacheStore};
pub use host::HostEnvironment;
pub use promise::{CallId, PromiseStore, SharedCall};
pub use subscribe::{Listener, Subscription, SubscriptionBus, Topic};

use crate::CacheKey;

/// The shared stores one group of requests cooperates through.
///
/// Requests use [`RequestContext::global`] unless their options inject another
/// instance, which is how tests stay isolated from each other.
#[derive(Default)]
pub struct RequestContext {
    cache: CacheStore,
    promises: PromiseStore,
    topics: SubscriptionBus<CacheKey, AnyValue>,
    host: HostEnvironment,
}

static GLOBAL: OnceLock<Arc<RequestContext>> = OnceLock::new();

impl RequestContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(RequestContext::new).clone()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn promises(&self) -> &PromiseStore {
        &self.promises
    }

    /// Cache-write notifications, keyed like the cache.
    pub fn topics(&self) -> &SubscriptionBus<CacheKey, AnyValue> {
        &self.topics
    }

    pub fn host(&self) -> &HostEnvironment {
        &self.host
    }

    /// Drops every entry, in-flight call and listener.
    pub fn reset(&self) {
        self.cache.clear_all();
        self.promises.clear();
        self.topics.clear();
        self.host.reset();
    }
}

/// Removes the given keys from the global cache.
pub fn clear_cache<I>(keys: I)
where
    I: IntoIterator,
    I::Item: Into<CacheKey>,
{
    RequestContext::global().cache().clear(keys);
}

/// Empties the global cache.
pub fn clear_all_cache() {
    RequestContext::global().cache().clear_all();
}

#[cfg(test)]
mod tests {
    use super::{AnyValue, CacheEntry, RequestContext};
    use crate::{CacheKey, Ttl};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test]
    async fn reset_empties_every_store() {
        let context = RequestContext::new();
        let key = CacheKey::from("k");
        let value: AnyValue = Arc::new(1_u32);
        context.cache().set(
            key.clone(),
            Ttl::Infinite,
            CacheEntry {
                data: Arc::clone(&value),
                params: value,
                time: Instant::now(),
            },
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _focus = context.host().subscribe_focus(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _topic = context.topics().subscribe(key.clone(), |_| {});
        context.host().set_online(false);

        context.reset();

        assert!(context.cache().is_empty());
        assert_eq!(context.topics().listener_count(&key), 0);
        assert!(context.host().is_online());
        context.host().notify_focus();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
