//! Built-in plugins, one per cross-cutting behavior.
//!
//! Each module exposes a `*_plugin(handle, options)` constructor that returns an
//! inert plugin when its options leave the behavior off.
mod auto_run;
mod cache;
mod debounce;
mod focus;
mod limiter;
mod loading_delay;
mod polling;
mod retry;
mod throttle;

pub use auto_run::{auto_run_plugin, AutoRunPlugin};
pub use cache::{cache_plugin, CachePlugin, CachedData};
pub use debounce::{debounce_plugin, DebouncePlugin};
pub use focus::{refresh_on_focus_plugin, RefreshOnFocusPlugin};
pub use loading_delay::{loading_delay_plugin, LoadingDelayPlugin};
pub use polling::{polling_plugin, PollingPlugin};
pub use retry::{backoff, retry_plugin, RetryPlugin};
pub use throttle::{throttle_plugin, ThrottlePlugin};

pub(crate) use auto_run::AutoRunEffects;

use crate::plugin::{Plugin, PluginFactory};
use crate::{Data, Params};

/// Stand-in for a plugin whose options are off.
pub(crate) struct Inert;

impl<D: Data, P: Params> Plugin<D, P> for Inert {}

/// The built-in plugins in the order `Request` installs them.
pub fn default_plugins<D: Data, P: Params>() -> Vec<PluginFactory<D, P>> {
    let mut factories: Vec<PluginFactory<D, P>> = Vec::with_capacity(8);
    factories.push(Box::new(debounce_plugin::<D, P>));
    factories.push(Box::new(loading_delay_plugin::<D, P>));
    factories.push(Box::new(polling_plugin::<D, P>));
    factories.push(Box::new(refresh_on_focus_plugin::<D, P>));
    factories.push(Box::new(throttle_plugin::<D, P>));
    factories.push(Box::new(auto_run_plugin::<D, P>));
    factories.push(Box::new(cache_plugin::<D, P>));
    factories.push(Box::new(retry_plugin::<D, P>));
    factories
}
