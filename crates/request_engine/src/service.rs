use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::{RequestError, ServiceError};

/// Future of one service call, already mapped into the engine's error type.
pub type ServiceFuture<D> = BoxFuture<'static, Result<D, RequestError>>;

/// The asynchronous operation a request orchestrates.
///
/// Implementations must tolerate their result being discarded: a cancelled or
/// superseded call still runs to completion, the engine just ignores it.
#[async_trait::async_trait]
pub trait Service<D, P>: Send + Sync {
    async fn call(&self, params: P) -> Result<D, ServiceError>;
}

/// Adapter turning an async closure into a [`Service`].
pub struct ServiceFn<F, P> {
    f: F,
    _params: PhantomData<fn(P)>,
}

/// Wraps `f` so it can be handed to a request.
pub fn service_fn<F, P>(f: F) -> ServiceFn<F, P> {
    ServiceFn {
        f,
        _params: PhantomData,
    }
}

#[async_trait::async_trait]
impl<D, P, F, Fut> Service<D, P> for ServiceFn<F, P>
where
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<D, ServiceError>> + Send,
    P: Send + 'static,
    D: Send + 'static,
{
    async fn call(&self, params: P) -> Result<D, ServiceError> {
        (self.f)(params).await
    }
}

/// Calls `service` with `params` as a `'static` future.
pub fn call_service<D, P>(service: &Arc<dyn Service<D, P>>, params: P) -> ServiceFuture<D>
where
    D: Send + 'static,
    P: Send + 'static,
{
    let service = Arc::clone(service);
    Box::pin(async move { service.call(params).await.map_err(RequestError::service) })
}
