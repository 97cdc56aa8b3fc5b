use std::sync::Mutex;

use request_logging::request_debug;

use crate::fetch::{Fetch, FetchHandle};
use crate::plugin::Plugin;
use crate::store::timer::lock;
use crate::{BeforeOutcome, Data, Params, RequestOptions, StatePatch};

/// Gates every invocation on the request's ready flag.
pub struct AutoRunPlugin<D: Data, P: Params> {
    fetch: FetchHandle<D, P>,
    initial_loading: bool,
}

pub fn auto_run_plugin<D: Data, P: Params>(
    fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    Box::new(AutoRunPlugin {
        fetch: fetch.clone(),
        initial_loading: !options.manual && options.ready,
    })
}

impl<D: Data, P: Params> Plugin<D, P> for AutoRunPlugin<D, P> {
    fn on_init(&self) -> Option<StatePatch<D, P>> {
        Some(StatePatch::new().loading(self.initial_loading))
    }

    fn on_before(&self, _params: &P) -> Option<BeforeOutcome<D, P>> {
        if self.fetch.is_ready() {
            None
        } else {
            request_debug!("request not ready; invocation suppressed");
            Some(BeforeOutcome::stop())
        }
    }
}

/// The effect half of auto-run: reacts to mount, ready flips and dependency changes.
pub(crate) struct AutoRunEffects {
    deps: Mutex<Vec<serde_json::Value>>,
}

impl AutoRunEffects {
    pub(crate) fn new(deps: Vec<serde_json::Value>) -> Self {
        Self {
            deps: Mutex::new(deps),
        }
    }

    pub(crate) fn mount<D: Data, P: Params>(&self, fetch: &Fetch<D, P>) {
        let options = fetch.options();
        if options.manual {
            return;
        }
        let params = fetch
            .state()
            .params
            .or_else(|| options.default_params.clone())
            .unwrap_or_default();
        fetch.run(params);
    }

    /// At most one of "ready became true" and "deps changed" triggers a run per call.
    pub(crate) fn render<D: Data, P: Params>(
        &self,
        fetch: &Fetch<D, P>,
        ready: bool,
        deps: Option<Vec<serde_json::Value>>,
    ) {
        let options = fetch.options();
        let was_ready = fetch.set_ready(ready);
        let mut has_auto_run = false;
        if !was_ready && ready && !options.manual {
            has_auto_run = true;
            fetch.run(options.default_params.clone().unwrap_or_default());
        }

        let Some(deps) = deps else {
            return;
        };
        let changed = {
            let mut current = lock(&self.deps);
            if *current == deps {
                false
            } else {
                *current = deps;
                true
            }
        };
        if changed && !has_auto_run && !options.manual {
            request_debug!("refresh deps changed");
            match &options.refresh_deps_action {
                Some(action) => action(),
                None => fetch.refresh(),
            }
        }
    }
}
