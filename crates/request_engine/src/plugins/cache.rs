//! Shares data between requests with the same cache key.
//!
//! Reads go through the request's `get_cache` or the context's cache store, writes
//! through `set_cache` or the store, and every write is broadcast on the key's topic
//! to sibling requests. Concurrent calls for one key share a single in-flight call.
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use request_logging::{request_debug, request_trace, request_warn};
use tokio::time::Instant;

use crate::fetch::FetchHandle;
use crate::options::{GetCache, SetCache};
use crate::plugin::Plugin;
use crate::plugins::Inert;
use crate::service::{call_service, Service, ServiceFuture};
use crate::store::timer::lock;
use crate::store::{AnyValue, CacheEntry, CallId, SharedCall, Subscription};
use crate::{
    BeforeOutcome, CacheKey, Data, Params, RequestContext, RequestError, RequestOptions,
    StatePatch, Ttl,
};

/// One cached result as seen by a request.
#[derive(Debug, Clone)]
pub struct CachedData<D, P> {
    pub data: Option<D>,
    pub params: Option<P>,
    pub time: Instant,
}

pub struct CachePlugin<D: Data, P: Params> {
    fetch: FetchHandle<D, P>,
    key: CacheKey,
    cache_time: Ttl,
    stale_time: Ttl,
    set_cache: Option<SetCache<D, P>>,
    get_cache: Option<GetCache<D, P>>,
    context: Arc<RequestContext>,
    subscription: Mutex<Option<Subscription>>,
    /// The in-flight call this request put into the promise store, if any.
    own_call: Mutex<Option<CallId>>,
}

pub fn cache_plugin<D: Data, P: Params>(
    fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    let Some(key) = options.cache_key.clone() else {
        return Box::new(Inert);
    };
    Box::new(CachePlugin {
        fetch: fetch.clone(),
        key,
        cache_time: options.cache_time,
        stale_time: options.stale_time,
        set_cache: options.set_cache.clone(),
        get_cache: options.get_cache.clone(),
        context: options.context(),
        subscription: Mutex::new(None),
        own_call: Mutex::new(None),
    })
}

impl<D: Data, P: Params> CachePlugin<D, P> {
    fn read(&self, params: &P) -> Option<CachedData<D, P>> {
        if let Some(get_cache) = &self.get_cache {
            return get_cache(params);
        }
        let entry = self.context.cache().get(&self.key)?;
        let (Some(data), Some(params)) = (
            entry.data.downcast_ref::<Option<D>>(),
            entry.params.downcast_ref::<Option<P>>(),
        ) else {
            request_warn!("cache entry '{}' holds a different type; ignored", self.key);
            return None;
        };
        Some(CachedData {
            data: data.clone(),
            params: params.clone(),
            time: entry.time,
        })
    }

    fn write(&self, cached: CachedData<D, P>) {
        let payload: AnyValue = Arc::new(cached.data.clone());
        match &self.set_cache {
            Some(set_cache) => set_cache(&cached),
            None => self.context.cache().set(
                self.key.clone(),
                self.cache_time,
                CacheEntry {
                    data: Arc::new(cached.data),
                    params: Arc::new(cached.params),
                    time: cached.time,
                },
            ),
        }
        self.context.topics().trigger(&self.key, &payload);
    }

    /// Writes with this request's own listener detached, so the broadcast only
    /// reaches siblings.
    fn publish(&self, cached: CachedData<D, P>) {
        let previous = lock(&self.subscription).take();
        drop(previous);
        self.write(cached);
        let fresh = self.subscribe();
        *lock(&self.subscription) = Some(fresh);
    }

    fn subscribe(&self) -> Subscription {
        let fetch = self.fetch.clone();
        let key = self.key.clone();
        self.context
            .topics()
            .subscribe(self.key.clone(), move |payload: &AnyValue| {
                match payload.downcast_ref::<Option<D>>() {
                    Some(data) => fetch.set_state(StatePatch::new().data(data.clone())),
                    None => request_warn!("cache broadcast for '{}' has a different type", key),
                }
            })
    }

    fn is_fresh(&self, cached: &CachedData<D, P>) -> bool {
        self.stale_time
            .covers(Instant::now().saturating_duration_since(cached.time))
    }

    fn typed(&self, call: SharedCall) -> ServiceFuture<D> {
        let key = self.key.clone();
        Box::pin(async move {
            let value = call.await?;
            value
                .downcast_ref::<D>()
                .cloned()
                .ok_or(RequestError::TypeMismatch { key })
        })
    }
}

impl<D: Data, P: Params> Plugin<D, P> for CachePlugin<D, P> {
    fn on_init(&self) -> Option<StatePatch<D, P>> {
        let cached = self.read(&P::default())?;
        let fresh = self.is_fresh(&cached);
        let mut patch = StatePatch::new().data(cached.data);
        if let Some(params) = cached.params {
            patch = patch.params(params);
        }
        if fresh {
            patch = patch.loading(false);
        }
        Some(patch)
    }

    fn on_attach(&self) {
        let subscription = self.subscribe();
        *lock(&self.subscription) = Some(subscription);
    }

    fn on_before(&self, params: &P) -> Option<BeforeOutcome<D, P>> {
        let cached = self.read(params)?;
        if self.is_fresh(&cached) && cached.data.is_some() {
            request_trace!("fresh cache hit for '{}'", self.key);
            Some(BeforeOutcome {
                return_now: true,
                patch: StatePatch::new()
                    .loading(false)
                    .data(cached.data)
                    .error(None),
                ..BeforeOutcome::default()
            })
        } else {
            request_trace!("stale cache hit for '{}'", self.key);
            Some(BeforeOutcome::patch(
                StatePatch::new().data(cached.data).error(None),
            ))
        }
    }

    fn on_request(
        &self,
        service: &Arc<dyn Service<D, P>>,
        params: &P,
    ) -> Option<ServiceFuture<D>> {
        let promises = self.context.promises();
        if let Some((id, call)) = promises.get(&self.key) {
            if *lock(&self.own_call) != Some(id) {
                request_debug!("joining in-flight call for '{}'", self.key);
                return Some(self.typed(call));
            }
        }
        let call: SharedCall = call_service(service, params.clone())
            .map(|result| result.map(|data| Arc::new(data) as AnyValue))
            .boxed()
            .shared();
        let id = promises.set(self.key.clone(), call.clone());
        *lock(&self.own_call) = Some(id);
        Some(self.typed(call))
    }

    fn on_success(&self, data: &D, params: &P) {
        self.publish(CachedData {
            data: Some(data.clone()),
            params: Some(params.clone()),
            time: Instant::now(),
        });
    }

    fn on_mutate(&self, data: Option<&D>) {
        let params = self.fetch.state().and_then(|state| state.params);
        self.publish(CachedData {
            data: data.cloned(),
            params,
            time: Instant::now(),
        });
    }

    fn on_teardown(&self) {
        let subscription = lock(&self.subscription).take();
        drop(subscription);
    }
}
