use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::fetch::FetchHandle;
use crate::service::{Service, ServiceFuture};
use crate::{BeforeOutcome, Data, Params, RequestError, RequestOptions, StatePatch};

/// Outcome of one invocation. `None` means the call was suppressed or superseded
/// and will never settle for the caller.
pub type Invocation<D> = BoxFuture<'static, Option<Result<D, RequestError>>>;

/// The engine's invoke entry point. Interception plugins wrap it.
pub type Invoke<D, P> = Arc<dyn Fn(P) -> Invocation<D> + Send + Sync>;

/// Builds one plugin for a request being created.
pub type PluginFactory<D, P> =
    Box<dyn FnOnce(&FetchHandle<D, P>, &RequestOptions<D, P>) -> Box<dyn Plugin<D, P>> + Send>;

/// Lifecycle hooks a plugin may implement. Every hook defaults to doing nothing.
///
/// Hooks run synchronously on the engine's call path and must not block.
pub trait Plugin<D: Data, P: Params>: Send + Sync {
    /// Contributes to the state the engine starts with.
    fn on_init(&self) -> Option<StatePatch<D, P>> {
        None
    }

    /// Runs once the engine exists and the handle is live.
    fn on_attach(&self) {}

    fn on_before(&self, _params: &P) -> Option<BeforeOutcome<D, P>> {
        None
    }

    /// May substitute the service call, e.g. with a shared in-flight one.
    fn on_request(
        &self,
        _service: &Arc<dyn Service<D, P>>,
        _params: &P,
    ) -> Option<ServiceFuture<D>> {
        None
    }

    fn on_success(&self, _data: &D, _params: &P) {}

    fn on_error(&self, _error: &RequestError, _params: &P) {}

    fn on_finally(&self, _params: &P, _data: Option<&D>, _error: Option<&RequestError>) {}

    fn on_cancel(&self) {}

    fn on_mutate(&self, _data: Option<&D>) {}

    /// The owning request is going away.
    fn on_teardown(&self) {}

    /// Decorates the invoke entry point. Applied in plugin order at construction.
    fn wrap_invoke(&self, next: Invoke<D, P>) -> Invoke<D, P> {
        next
    }
}
