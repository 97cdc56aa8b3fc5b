use std::sync::Arc;

use super::limiter::{LimiterSettings, RateLimiter};
use crate::fetch::FetchHandle;
use crate::options::enabled;
use crate::plugin::{Invoke, Plugin};
use crate::plugins::Inert;
use crate::{Data, Params, RequestOptions};

/// Invokes at most once per `wait`.
pub struct ThrottlePlugin<D: Data, P: Params> {
    limiter: Arc<RateLimiter<D, P>>,
}

pub fn throttle_plugin<D: Data, P: Params>(
    _fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    match options
        .throttle
        .filter(|throttle| enabled(Some(throttle.wait)).is_some())
    {
        Some(throttle) => Box::new(ThrottlePlugin {
            limiter: RateLimiter::new(LimiterSettings::throttle(throttle)),
        }),
        None => Box::new(Inert),
    }
}

impl<D: Data, P: Params> Plugin<D, P> for ThrottlePlugin<D, P> {
    fn wrap_invoke(&self, next: Invoke<D, P>) -> Invoke<D, P> {
        let limiter = Arc::clone(&self.limiter);
        Arc::new(move |params| limiter.call(params, Arc::clone(&next)))
    }

    fn on_cancel(&self) {
        self.limiter.cancel();
    }

    fn on_teardown(&self) {
        self.limiter.cancel();
    }
}
