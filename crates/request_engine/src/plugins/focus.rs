use std::sync::{Arc, Mutex};
use std::time::Duration;

use request_logging::request_trace;
use tokio::time::Instant;

use crate::fetch::FetchHandle;
use crate::plugin::Plugin;
use crate::plugins::Inert;
use crate::store::timer::lock;
use crate::store::Subscription;
use crate::{Data, Params, RequestContext, RequestOptions};

/// Lets the first trigger through, then ignores triggers until `timespan` has passed.
#[derive(Debug)]
pub(crate) struct LeadingGate {
    timespan: Duration,
    opened_at: Mutex<Option<Instant>>,
}

impl LeadingGate {
    pub(crate) fn new(timespan: Duration) -> Self {
        Self {
            timespan,
            opened_at: Mutex::new(None),
        }
    }

    pub(crate) fn try_pass(&self) -> bool {
        let now = Instant::now();
        let mut opened_at = lock(&self.opened_at);
        let blocked = opened_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.timespan);
        if blocked {
            return false;
        }
        *opened_at = Some(now);
        true
    }
}

/// Refreshes when the host regains focus.
pub struct RefreshOnFocusPlugin<D: Data, P: Params> {
    fetch: FetchHandle<D, P>,
    context: Arc<RequestContext>,
    gate: Arc<LeadingGate>,
    subscription: Mutex<Option<Subscription>>,
}

pub fn refresh_on_focus_plugin<D: Data, P: Params>(
    fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    if !options.refresh_on_window_focus {
        return Box::new(Inert);
    }
    Box::new(RefreshOnFocusPlugin {
        fetch: fetch.clone(),
        context: options.context(),
        gate: Arc::new(LeadingGate::new(options.focus_timespan)),
        subscription: Mutex::new(None),
    })
}

impl<D: Data, P: Params> Plugin<D, P> for RefreshOnFocusPlugin<D, P> {
    fn on_attach(&self) {
        let fetch = self.fetch.clone();
        let gate = Arc::clone(&self.gate);
        let subscription = self.context.host().subscribe_focus(move || {
            if gate.try_pass() {
                request_trace!("refreshing on focus");
                fetch.refresh();
            }
        });
        *lock(&self.subscription) = Some(subscription);
    }

    fn on_teardown(&self) {
        let subscription = lock(&self.subscription).take();
        drop(subscription);
    }
}
