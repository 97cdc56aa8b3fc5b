//! The request engine: one logical request's state, invocation counter and
//! plugin pipeline.
use std::future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use request_logging::{request_debug, request_error, request_trace, request_warn};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::plugin::{Invocation, Invoke, Plugin, PluginFactory};
use crate::service::{call_service, Service, ServiceFuture};
use crate::store::timer::lock;
use crate::{
    BeforeOutcome, Data, FetchState, Params, RequestError, RequestOptions, StatePatch,
};

/// Host callback signalling "state changed, re-read it".
pub type Subscriber = Arc<dyn Fn() + Send + Sync>;

/// Owns one request's lifecycle. Cloning yields another handle to the same engine.
pub struct Fetch<D: Data, P: Params> {
    inner: Arc<FetchInner<D, P>>,
}

impl<D: Data, P: Params> Clone for Fetch<D, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Weak reference to an engine, given to plugins so they can call back into it.
///
/// Every method is a no-op once the engine is gone.
pub struct FetchHandle<D: Data, P: Params> {
    inner: Weak<FetchInner<D, P>>,
}

impl<D: Data, P: Params> Clone for FetchHandle<D, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

struct FetchInner<D: Data, P: Params> {
    service: Arc<dyn Service<D, P>>,
    options: Arc<RequestOptions<D, P>>,
    subscriber: Subscriber,
    state: Mutex<FetchState<D, P>>,
    /// Bumped by every invocation and by cancel. Only a completion whose
    /// snapshot still equals it may touch state.
    count: AtomicU64,
    /// Counter value of the last invocation that settled.
    settled: AtomicU64,
    ready: AtomicBool,
    plugins: Vec<Box<dyn Plugin<D, P>>>,
    invoke: Invoke<D, P>,
}

impl<D: Data, P: Params> Fetch<D, P> {
    pub fn new(
        service: Arc<dyn Service<D, P>>,
        options: Arc<RequestOptions<D, P>>,
        subscriber: Subscriber,
        factories: Vec<PluginFactory<D, P>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<FetchInner<D, P>>| {
            let handle = FetchHandle {
                inner: Weak::clone(weak),
            };
            let plugins: Vec<Box<dyn Plugin<D, P>>> = factories
                .into_iter()
                .map(|factory| factory(&handle, options.as_ref()))
                .collect();

            let mut state = FetchState {
                loading: !options.manual,
                ..FetchState::default()
            };
            for patch in plugins.iter().filter_map(|plugin| plugin.on_init()) {
                state.apply(patch);
            }

            let base: Invoke<D, P> = {
                let handle = handle.clone();
                Arc::new(move |params| handle.invoke_direct(params))
            };
            let invoke = plugins
                .iter()
                .fold(base, |next, plugin| plugin.wrap_invoke(next));

            FetchInner {
                service,
                ready: AtomicBool::new(options.ready),
                options,
                subscriber,
                state: Mutex::new(state),
                count: AtomicU64::new(0),
                settled: AtomicU64::new(0),
                plugins,
                invoke,
            }
        });

        for plugin in &inner.plugins {
            plugin.on_attach();
        }
        Self { inner }
    }

    /// Runs the request and resolves with its data.
    ///
    /// The counter bump, `on_before` and the state update happen before this
    /// returns, and the service call is spawned on the current runtime, so it
    /// runs to completion even if the returned future is dropped. A call that is
    /// gated by a plugin, superseded by a newer call or `cancel`, or answered
    /// early by a plugin without any data returns a future that never settles;
    /// wrap it in a timeout when that matters.
    pub fn run_async(&self, params: P) -> BoxFuture<'static, Result<D, RequestError>> {
        let invocation = (self.inner.invoke)(params);
        Box::pin(async move {
            match invocation.await {
                Some(result) => result,
                None => future::pending().await,
            }
        })
    }

    /// Fire-and-forget `run_async`. Failures go to `on_error` or the error log.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn run(&self, params: P) {
        let invocation = (self.inner.invoke)(params);
        let handled = self.inner.options.on_error.is_some();
        let task = async move {
            if let Some(Err(err)) = invocation.await {
                if !handled {
                    request_error!("request failed: {}", err);
                }
            }
        };
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(task);
            }
            Err(_) => request_warn!("run called outside a tokio runtime; completion is dropped"),
        }
    }

    /// Orphans any in-flight call and stops loading.
    pub fn cancel(&self) {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        self.inner.set_state(StatePatch::new().loading(false));
        for plugin in &self.inner.plugins {
            plugin.on_cancel();
        }
    }

    /// `run` with the last params.
    pub fn refresh(&self) {
        self.run(self.last_params());
    }

    pub fn refresh_async(&self) -> BoxFuture<'static, Result<D, RequestError>> {
        self.run_async(self.last_params())
    }

    /// Sets data directly without calling the service.
    pub fn mutate(&self, data: Option<D>) {
        for plugin in &self.inner.plugins {
            plugin.on_mutate(data.as_ref());
        }
        self.inner.set_state(StatePatch::new().data(data));
    }

    /// Computes new data from the current data.
    pub fn mutate_with(&self, updater: impl FnOnce(Option<&D>) -> Option<D>) {
        let current = lock(&self.inner.state).data.clone();
        self.mutate(updater(current.as_ref()));
    }

    pub fn state(&self) -> FetchState<D, P> {
        lock(&self.inner.state).clone()
    }

    pub fn set_state(&self, patch: StatePatch<D, P>) {
        self.inner.set_state(patch);
    }

    pub fn options(&self) -> &RequestOptions<D, P> {
        &self.inner.options
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Updates the ready gate, returning the previous value.
    pub fn set_ready(&self, ready: bool) -> bool {
        self.inner.ready.swap(ready, Ordering::SeqCst)
    }

    pub fn handle(&self) -> FetchHandle<D, P> {
        FetchHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Lets every plugin release timers and subscriptions.
    pub fn teardown(&self) {
        for plugin in &self.inner.plugins {
            plugin.on_teardown();
        }
    }

    fn last_params(&self) -> P {
        lock(&self.inner.state).params.clone().unwrap_or_default()
    }
}

impl<D: Data, P: Params> FetchInner<D, P> {
    fn set_state(&self, patch: StatePatch<D, P>) {
        lock(&self.state).apply(patch);
        (self.subscriber)();
    }

    fn is_current(&self, count: u64) -> bool {
        self.count.load(Ordering::SeqCst) == count
    }

    fn invoke(self: &Arc<Self>, params: P) -> Invocation<D> {
        let current = self.count.fetch_add(1, Ordering::SeqCst) + 1;

        let mut outcome = BeforeOutcome::default();
        for before in self.plugins.iter().filter_map(|plugin| plugin.on_before(&params)) {
            outcome.merge(before);
        }
        if outcome.stop_now {
            request_debug!("invocation {} stopped by a plugin", current);
            return Box::pin(future::ready(None));
        }

        let mut patch = StatePatch::new().loading(true).params(params.clone());
        patch.merge(outcome.patch);
        self.set_state(patch);

        if outcome.return_now {
            self.settled.store(current, Ordering::SeqCst);
            let data = lock(&self.state).data.clone();
            if data.is_none() {
                request_warn!("invocation {} returned early without data", current);
            }
            request_trace!("invocation {} answered without calling the service", current);
            return Box::pin(future::ready(data.map(Ok)));
        }

        if let Some(on_before) = &self.options.on_before {
            on_before(&params);
        }

        let call = self.run_request(&params);
        let inner = Arc::clone(self);
        let completion = async move {
            let result = call.await;
            inner.settle(current, params, result)
        };
        match Handle::try_current() {
            Ok(runtime) => {
                let (tx, rx) = oneshot::channel();
                runtime.spawn(async move {
                    let _ = tx.send(completion.await);
                });
                rx.map(|received| received.ok().flatten()).boxed()
            }
            Err(_) => {
                request_warn!("invocation {} started outside a tokio runtime", current);
                completion.boxed()
            }
        }
    }

    fn run_request(&self, params: &P) -> ServiceFuture<D> {
        let mut substitute = None;
        for call in self
            .plugins
            .iter()
            .filter_map(|plugin| plugin.on_request(&self.service, params))
        {
            substitute = Some(call);
        }
        substitute.unwrap_or_else(|| call_service(&self.service, params.clone()))
    }

    fn settle(
        &self,
        current: u64,
        params: P,
        result: Result<D, RequestError>,
    ) -> Option<Result<D, RequestError>> {
        if !self.is_current(current) {
            request_debug!("discarding stale completion of invocation {}", current);
            return None;
        }
        self.settled.store(current, Ordering::SeqCst);

        match result {
            Ok(data) => {
                self.set_state(
                    StatePatch::new()
                        .data(Some(data.clone()))
                        .error(None)
                        .loading(false),
                );
                if let Some(on_success) = &self.options.on_success {
                    on_success(&data, &params);
                }
                for plugin in &self.plugins {
                    plugin.on_success(&data, &params);
                }
                if let Some(on_finally) = &self.options.on_finally {
                    on_finally(&params, Some(&data), None);
                }
                // Callbacks above may have started or cancelled another call.
                if self.is_current(current) {
                    for plugin in &self.plugins {
                        plugin.on_finally(&params, Some(&data), None);
                    }
                }
                Some(Ok(data))
            }
            Err(error) => {
                self.set_state(StatePatch::new().error(Some(error.clone())).loading(false));
                if let Some(on_error) = &self.options.on_error {
                    on_error(&error, &params);
                }
                for plugin in &self.plugins {
                    plugin.on_error(&error, &params);
                }
                if let Some(on_finally) = &self.options.on_finally {
                    on_finally(&params, None, Some(&error));
                }
                if self.is_current(current) {
                    for plugin in &self.plugins {
                        plugin.on_finally(&params, None, Some(&error));
                    }
                }
                Some(Err(error))
            }
        }
    }
}

impl<D: Data, P: Params> FetchHandle<D, P> {
    pub fn upgrade(&self) -> Option<Fetch<D, P>> {
        self.inner.upgrade().map(|inner| Fetch { inner })
    }

    pub fn run(&self, params: P) {
        if let Some(fetch) = self.upgrade() {
            fetch.run(params);
        }
    }

    pub fn refresh(&self) {
        if let Some(fetch) = self.upgrade() {
            fetch.refresh();
        }
    }

    pub fn set_state(&self, patch: StatePatch<D, P>) {
        if let Some(fetch) = self.upgrade() {
            fetch.set_state(patch);
        }
    }

    pub fn state(&self) -> Option<FetchState<D, P>> {
        self.upgrade().map(|fetch| fetch.state())
    }

    pub fn is_ready(&self) -> bool {
        self.upgrade().is_some_and(|fetch| fetch.is_ready())
    }

    /// Counter value of the most recent invocation or cancel.
    pub fn invocation_count(&self) -> u64 {
        self.inner
            .upgrade()
            .map_or(0, |inner| inner.count.load(Ordering::SeqCst))
    }

    /// True while the latest invocation has not settled.
    pub fn is_pending(&self) -> bool {
        self.inner.upgrade().is_some_and(|inner| {
            inner.settled.load(Ordering::SeqCst) < inner.count.load(Ordering::SeqCst)
        })
    }

    fn invoke_direct(&self, params: P) -> Invocation<D> {
        match self.inner.upgrade() {
            Some(inner) => inner.invoke(params),
            None => Box::pin(future::ready(None)),
        }
    }
}
