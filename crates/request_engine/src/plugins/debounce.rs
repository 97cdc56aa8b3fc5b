use std::sync::Arc;

use super::limiter::{LimiterSettings, RateLimiter};
use crate::fetch::FetchHandle;
use crate::options::enabled;
use crate::plugin::{Invoke, Plugin};
use crate::plugins::Inert;
use crate::{Data, Params, RequestOptions};

/// Delays invocations until calls stop arriving for `wait`.
pub struct DebouncePlugin<D: Data, P: Params> {
    limiter: Arc<RateLimiter<D, P>>,
}

pub fn debounce_plugin<D: Data, P: Params>(
    _fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    match options
        .debounce
        .filter(|debounce| enabled(Some(debounce.wait)).is_some())
    {
        Some(debounce) => Box::new(DebouncePlugin {
            limiter: RateLimiter::new(LimiterSettings::debounce(debounce)),
        }),
        None => Box::new(Inert),
    }
}

impl<D: Data, P: Params> Plugin<D, P> for DebouncePlugin<D, P> {
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
