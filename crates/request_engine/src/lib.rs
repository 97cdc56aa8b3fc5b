//! Request engine: one async call per logical request, orchestrated through a
//! plugin pipeline for caching, retry, polling, rate limiting and auto-run.
mod config;
mod error;
mod fetch;
mod http;
mod options;
mod plugin;
pub mod plugins;
mod request;
mod service;
mod state;
pub mod store;
mod types;

pub use config::RequestConfig;
pub use error::{ConfigError, RequestError, ServiceError};
pub use fetch::{Fetch, FetchHandle, Subscriber};
pub use http::{HttpError, HttpResponse, HttpService, HttpSettings};
pub use options::{
    BeforeCallback, DebounceOptions, ErrorCallback, FinallyCallback, GetCache,
    RefreshDepsAction, RequestOptions, SetCache, SuccessCallback, ThrottleOptions,
    DEFAULT_CACHE_TIME, DEFAULT_FOCUS_TIMESPAN,
};
pub use plugin::{Invocation, Invoke, Plugin, PluginFactory};
pub use plugins::CachedData;
pub use request::Request;
pub use service::{call_service, service_fn, Service, ServiceFn, ServiceFuture};
pub use state::{BeforeOutcome, Data, FetchState, Params, StatePatch};
pub use store::{clear_all_cache, clear_cache, HostEnvironment, RequestContext};
pub use types::{CacheKey, Limit, Ttl};
