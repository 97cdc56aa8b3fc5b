use std::sync::Arc;
use std::time::Duration;

use crate::plugins::CachedData;
use crate::{CacheKey, Limit, RequestContext, RequestError, Ttl};

pub type BeforeCallback<P> = Arc<dyn Fn(&P) + Send + Sync>;
pub type SuccessCallback<D, P> = Arc<dyn Fn(&D, &P) + Send + Sync>;
pub type ErrorCallback<P> = Arc<dyn Fn(&RequestError, &P) + Send + Sync>;
pub type FinallyCallback<D, P> =
    Arc<dyn Fn(&P, Option<&D>, Option<&RequestError>) + Send + Sync>;
pub type RefreshDepsAction = Arc<dyn Fn() + Send + Sync>;
/// Replaces the shared cache store as the write side for one request.
pub type SetCache<D, P> = Arc<dyn Fn(&CachedData<D, P>) + Send + Sync>;
/// Replaces the shared cache store as the read side for one request.
pub type GetCache<D, P> = Arc<dyn Fn(&P) -> Option<CachedData<D, P>> + Send + Sync>;

pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_FOCUS_TIMESPAN: Duration = Duration::from_secs(5);

/// Leading/trailing edge debounce settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOptions {
    pub wait: Duration,
    pub leading: bool,
    pub trailing: bool,
    pub max_wait: Option<Duration>,
}

impl DebounceOptions {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleOptions {
    pub wait: Duration,
    pub leading: bool,
    pub trailing: bool,
}

impl ThrottleOptions {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            leading: true,
            trailing: true,
        }
    }
}

/// Everything a request can be configured with.
///
/// Build it with struct update syntax:
/// `RequestOptions { manual: true, ..Default::default() }`.
pub struct RequestOptions<D, P> {
    /// Do not run on mount; wait for an explicit `run`.
    pub manual: bool,
    pub default_params: Option<P>,
    /// While false, every invocation is suppressed.
    pub ready: bool,
    pub refresh_deps: Vec<serde_json::Value>,
    pub refresh_deps_action: Option<RefreshDepsAction>,

    pub cache_key: Option<CacheKey>,
    pub cache_time: Ttl,
    pub stale_time: Ttl,
    pub set_cache: Option<SetCache<D, P>>,
    pub get_cache: Option<GetCache<D, P>>,

    pub polling_interval: Option<Duration>,
    pub polling_when_hidden: bool,
    pub polling_error_retry_count: Limit,

    pub retry_count: Limit,
    /// Fixed retry delay; exponential backoff when unset.
    pub retry_interval: Option<Duration>,

    pub debounce: Option<DebounceOptions>,
    pub throttle: Option<ThrottleOptions>,
    pub loading_delay: Option<Duration>,

    pub refresh_on_window_focus: bool,
    pub focus_timespan: Duration,

    pub on_before: Option<BeforeCallback<P>>,
    pub on_success: Option<SuccessCallback<D, P>>,
    pub on_error: Option<ErrorCallback<P>>,
    pub on_finally: Option<FinallyCallback<D, P>>,

    /// Shared stores to use instead of the global ones.
    pub context: Option<Arc<RequestContext>>,
}

impl<D, P> Default for RequestOptions<D, P> {
    fn default() -> Self {
        Self {
            manual: false,
            default_params: None,
            ready: true,
            refresh_deps: Vec::new(),
            refresh_deps_action: None,
            cache_key: None,
            cache_time: Ttl::Finite(DEFAULT_CACHE_TIME),
            stale_time: Ttl::Finite(Duration::ZERO),
            set_cache: None,
            get_cache: None,
            polling_interval: None,
            polling_when_hidden: true,
            polling_error_retry_count: Limit::Unlimited,
            retry_count: Limit::AtMost(0),
            retry_interval: None,
            debounce: None,
            throttle: None,
            loading_delay: None,
            refresh_on_window_focus: false,
            focus_timespan: DEFAULT_FOCUS_TIMESPAN,
            on_before: None,
            on_success: None,
            on_error: None,
            on_finally: None,
            context: None,
        }
    }
}

impl<D, P> RequestOptions<D, P> {
    pub fn context(&self) -> Arc<RequestContext> {
        self.context.clone().unwrap_or_else(RequestContext::global)
    }
}

/// Treats a zero duration like an unset one.
pub(crate) fn enabled(duration: Option<Duration>) -> Option<Duration> {
    duration.filter(|d| !d.is_zero())
}
