use std::time::Duration;

use crate::fetch::FetchHandle;
use crate::options::enabled;
use crate::plugin::Plugin;
use crate::plugins::Inert;
use crate::store::timer::TimerSlot;
use crate::{BeforeOutcome, Data, Params, RequestError, RequestOptions, StatePatch};

/// Keeps `loading` false for fast requests; flips it on once a call outlives the delay.
pub struct LoadingDelayPlugin<D: Data, P: Params> {
    fetch: FetchHandle<D, P>,
    delay: Duration,
    timer: TimerSlot,
}

pub fn loading_delay_plugin<D: Data, P: Params>(
    fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    match enabled(options.loading_delay) {
        Some(delay) => Box::new(LoadingDelayPlugin {
            fetch: fetch.clone(),
            delay,
            timer: TimerSlot::new(),
        }),
        None => Box::new(Inert),
    }
}

impl<D: Data, P: Params> Plugin<D, P> for LoadingDelayPlugin<D, P> {
    fn on_before(&self, _params: &P) -> Option<BeforeOutcome<D, P>> {
        self.timer.clear();
        if self.fetch.is_ready() {
            let fetch = self.fetch.clone();
            let ticket = fetch.invocation_count();
            self.timer.schedule(self.delay, move || {
                if fetch.invocation_count() == ticket && fetch.is_pending() {
                    fetch.set_state(StatePatch::new().loading(true));
                }
            });
        }
        Some(BeforeOutcome::patch(StatePatch::new().loading(false)))
    }

    fn on_finally(&self, _params: &P, _data: Option<&D>, _error: Option<&RequestError>) {
        self.timer.clear();
    }

    fn on_cancel(&self) {
        self.timer.clear();
    }

    fn on_teardown(&self) {
        self.timer.clear();
    }
}
