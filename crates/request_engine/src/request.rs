//! The outward request surface: builds an engine with the built-in plugins and
//! drives the auto-run effects.
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::fetch::{Fetch, Subscriber};
use crate::plugin::PluginFactory;
use crate::plugins::{default_plugins, AutoRunEffects};
use crate::service::Service;
use crate::{Data, FetchState, Params, RequestContext, RequestError, RequestOptions};

/// One mounted request. Dropping it cancels any in-flight call and releases
/// every timer and subscription its plugins hold.
///
/// Only `ready` and the refresh dependencies can change after mounting; any
/// other option change needs a new `Request`.
pub struct Request<D: Data, P: Params> {
    fetch: Fetch<D, P>,
    effects: AutoRunEffects,
}

impl<D: Data, P: Params> Request<D, P> {
    /// Mounts a request without a state-change subscriber.
    pub fn new(service: Arc<dyn Service<D, P>>, options: RequestOptions<D, P>) -> Self {
        Self::mount(service, options, Arc::new(|| {}), Vec::new())
    }

    /// Mounts a request. `subscriber` is called after every state change;
    /// `extra_plugins` run after the built-in ones.
    ///
    /// Unless `manual`, the first run starts right away, so call this inside a
    /// Tokio runtime.
    pub fn mount(
        service: Arc<dyn Service<D, P>>,
        options: RequestOptions<D, P>,
        subscriber: Subscriber,
        extra_plugins: Vec<PluginFactory<D, P>>,
    ) -> Self {
        let effects = AutoRunEffects::new(options.refresh_deps.clone());
        let mut factories = default_plugins();
        factories.extend(extra_plugins);
        let fetch = Fetch::new(service, Arc::new(options), subscriber, factories);
        effects.mount(&fetch);
        Self { fetch, effects }
    }

    /// Updates the ready gate; flipping it on runs with the default params.
    pub fn set_ready(&self, ready: bool) {
        self.effects.render(&self.fetch, ready, None);
    }

    /// Replaces the dependency list; a change refreshes unless `manual`.
    pub fn set_refresh_deps(&self, deps: Vec<serde_json::Value>) {
        let ready = self.fetch.is_ready();
        self.effects.render(&self.fetch, ready, Some(deps));
    }

    /// Applies new ready and dependency inputs together. At most one run results.
    pub fn rerender(&self, ready: bool, deps: Vec<serde_json::Value>) {
        self.effects.render(&self.fetch, ready, Some(deps));
    }

    pub fn state(&self) -> FetchState<D, P> {
        self.fetch.state()
    }

    pub fn loading(&self) -> bool {
        self.fetch.state().loading
    }

    pub fn data(&self) -> Option<D> {
        self.fetch.state().data
    }

    pub fn error(&self) -> Option<RequestError> {
        self.fetch.state().error
    }

    /// The last params, or the default value before the first run.
    pub fn params(&self) -> P {
        self.fetch.state().params.unwrap_or_default()
    }

    pub fn run(&self, params: P) {
        self.fetch.run(params);
    }

    pub fn run_async(&self, params: P) -> BoxFuture<'static, Result<D, RequestError>> {
        self.fetch.run_async(params)
    }

    pub fn refresh(&self) {
        self.fetch.refresh();
    }

    pub fn refresh_async(&self) -> BoxFuture<'static, Result<D, RequestError>> {
        self.fetch.refresh_async()
    }

    pub fn cancel(&self) {
        self.fetch.cancel();
    }

    pub fn mutate(&self, data: Option<D>) {
        self.fetch.mutate(data);
    }

    pub fn mutate_with(&self, updater: impl FnOnce(Option<&D>) -> Option<D>) {
        self.fetch.mutate_with(updater);
    }

    pub fn fetch(&self) -> &Fetch<D, P> {
        &self.fetch
    }

    pub fn context(&self) -> Arc<RequestContext> {
        self.fetch.options().context()
    }
}

impl<D: Data, P: Params> Drop for Request<D, P> {
    fn drop(&mut self) {
        self.fetch.cancel();
        self.fetch.teardown();
    }
}
