use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use request_logging::request_debug;

use crate::fetch::FetchHandle;
use crate::options::enabled;
use crate::plugin::Plugin;
use crate::plugins::Inert;
use crate::store::timer::{lock, TimerSlot};
use crate::store::Subscription;
use crate::{BeforeOutcome, Data, Limit, Params, RequestContext, RequestError, RequestOptions};

/// Refreshes after every completion until errors exceed the ceiling.
pub struct PollingPlugin<D: Data, P: Params> {
    fetch: FetchHandle<D, P>,
    interval: Duration,
    when_hidden: bool,
    error_limit: Limit,
    context: Arc<RequestContext>,
    timer: TimerSlot,
    revisible: Arc<Mutex<Option<Subscription>>>,
    errors: AtomicU32,
}

pub fn polling_plugin<D: Data, P: Params>(
    fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    match enabled(options.polling_interval) {
        Some(interval) => Box::new(PollingPlugin {
            fetch: fetch.clone(),
            interval,
            when_hidden: options.polling_when_hidden,
            error_limit: options.polling_error_retry_count,
            context: options.context(),
            timer: TimerSlot::new(),
            revisible: Arc::new(Mutex::new(None)),
            errors: AtomicU32::new(0),
        }),
        None => Box::new(Inert),
    }
}

impl<D: Data, P: Params> PollingPlugin<D, P> {
    fn stop(&self) {
        self.timer.clear();
        let subscription = lock(&self.revisible).take();
        drop(subscription);
    }

    fn schedule(&self) {
        let fetch = self.fetch.clone();
        let context = Arc::clone(&self.context);
        let revisible = Arc::clone(&self.revisible);
        let when_hidden = self.when_hidden;
        self.timer.schedule(self.interval, move || {
            if !when_hidden && !context.host().is_visible() {
                request_debug!("host hidden; polling resumes when visible");
                let subscription = context.host().subscribe_revisible(move || fetch.refresh());
                *lock(&revisible) = Some(subscription);
            } else {
                fetch.refresh();
            }
        });
    }
}

impl<D: Data, P: Params> Plugin<D, P> for PollingPlugin<D, P> {
    fn on_before(&self, _params: &P) -> Option<BeforeOutcome<D, P>> {
        self.stop();
        None
    }

    fn on_success(&self, _data: &D, _params: &P) {
        self.errors.store(0, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &RequestError, _params: &P) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_finally(&self, _params: &P, _data: Option<&D>, _error: Option<&RequestError>) {
        let errors = self.errors.load(Ordering::SeqCst);
        if self.error_limit.allows(errors) {
            self.schedule();
        } else {
            request_debug!("polling stopped after {} consecutive errors", errors);
            self.errors.store(0, Ordering::SeqCst);
        }
    }

    fn on_cancel(&self) {
        self.stop();
    }

    fn on_teardown(&self) {
        self.stop();
    }
}
