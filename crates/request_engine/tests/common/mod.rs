#![allow(dead_code)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use request_engine::{service_fn, RequestContext, RequestOptions, Service, ServiceError, Subscriber};
use tokio::time::Instant;

/// Every call a scripted service received, with the time it arrived.
pub struct Calls<P> {
    inner: Arc<Mutex<Vec<(P, Instant)>>>,
}

impl<P> Clone for Calls<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Clone> Calls<P> {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, params: P) -> usize {
        let mut calls = self.inner.lock().unwrap();
        calls.push((params, Instant::now()));
        calls.len()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn params(&self) -> Vec<P> {
        self.inner.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.inner.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

/// A service whose delay and result are picked per call. `attempt` starts at 1.
pub fn scripted<D, P, F>(f: F) -> (Arc<dyn Service<D, P>>, Calls<P>)
where
    D: Send + 'static,
    P: Clone + Send + 'static,
    F: Fn(P, usize) -> (Duration, Result<D, ServiceError>) + Send + Sync + 'static,
{
    let calls = Calls::new();
    let recorder = calls.clone();
    let service = service_fn(move |params: P| {
        let attempt = recorder.record(params.clone());
        let (delay, result) = f(params, attempt);
        async move {
            tokio::time::sleep(delay).await;
            result
        }
    });
    (Arc::new(service), calls)
}

/// A service that always takes `delay`.
pub fn delayed<D, P, F>(delay: Duration, f: F) -> (Arc<dyn Service<D, P>>, Calls<P>)
where
    D: Send + 'static,
    P: Clone + Send + 'static,
    F: Fn(P, usize) -> Result<D, ServiceError> + Send + Sync + 'static,
{
    scripted(move |params, attempt| (delay, f(params, attempt)))
}

pub fn failure(message: &str) -> ServiceError {
    message.into()
}

/// Fresh isolated stores; also installs the test logger.
pub fn init() -> Arc<RequestContext> {
    request_logging::initialize_for_tests();
    RequestContext::new()
}

pub fn options<D, P>(context: &Arc<RequestContext>) -> RequestOptions<D, P> {
    RequestOptions {
        context: Some(Arc::clone(context)),
        ..RequestOptions::default()
    }
}

pub fn manual<D, P>(context: &Arc<RequestContext>) -> RequestOptions<D, P> {
    RequestOptions {
        manual: true,
        ..options(context)
    }
}

/// A subscriber that counts notifications.
pub fn notifications() -> (Subscriber, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let subscriber: Subscriber = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (subscriber, count)
}

pub async fn sleep_ms(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
