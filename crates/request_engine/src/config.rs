//! File-based request configuration in millisecond/sentinel encoding.
use std::fs;
use std::path::Path;
use std::time::Duration;

use request_logging::request_info;
use serde::Deserialize;

use crate::{
    CacheKey, ConfigError, DebounceOptions, Limit, RequestOptions, ThrottleOptions, Ttl,
};

/// Every non-callback request option. Absent fields keep the value already in
/// the options the config is applied to.
///
/// Times are milliseconds. `-1` means "never expire" for `cache_time`, "always
/// fresh" for `stale_time` and "unlimited" for the retry counts; `0` disables an
/// interval.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestConfig {
    pub manual: Option<bool>,
    pub ready: Option<bool>,
    pub refresh_deps: Option<Vec<serde_json::Value>>,
    pub cache_key: Option<CacheKey>,
    pub cache_time: Option<i64>,
    pub stale_time: Option<i64>,
    pub polling_interval: Option<u64>,
    pub polling_when_hidden: Option<bool>,
    pub polling_error_retry_count: Option<i64>,
    pub retry_count: Option<i64>,
    pub retry_interval: Option<u64>,
    pub debounce_wait: Option<u64>,
    pub debounce_leading: Option<bool>,
    pub debounce_trailing: Option<bool>,
    pub debounce_max_wait: Option<u64>,
    pub throttle_wait: Option<u64>,
    pub throttle_leading: Option<bool>,
    pub throttle_trailing: Option<bool>,
    pub loading_delay: Option<u64>,
    pub refresh_on_window_focus: Option<bool>,
    pub focus_timespan: Option<u64>,
}

impl RequestConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: RequestConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_ron(&text)?;
        request_info!("Loaded request config from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_wait.is_none()
            && (self.debounce_leading.is_some()
                || self.debounce_trailing.is_some()
                || self.debounce_max_wait.is_some())
        {
            return Err(ConfigError::Invalid {
                field: "debounce_wait",
                reason: "debounce edges or max wait given without a wait".to_string(),
            });
        }
        if self.throttle_wait.is_none()
            && (self.throttle_leading.is_some() || self.throttle_trailing.is_some())
        {
            return Err(ConfigError::Invalid {
                field: "throttle_wait",
                reason: "throttle edges given without a wait".to_string(),
            });
        }
        if self.focus_timespan == Some(0) {
            return Err(ConfigError::Invalid {
                field: "focus_timespan",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Overlays this config onto `options`, keeping its callbacks.
    pub fn apply<D, P>(&self, mut options: RequestOptions<D, P>) -> RequestOptions<D, P> {
        if let Some(manual) = self.manual {
            options.manual = manual;
        }
        if let Some(ready) = self.ready {
            options.ready = ready;
        }
        if let Some(deps) = &self.refresh_deps {
            options.refresh_deps = deps.clone();
        }
        if let Some(key) = &self.cache_key {
            options.cache_key = Some(key.clone());
        }
        if let Some(millis) = self.cache_time {
            options.cache_time = Ttl::from_millis(millis);
        }
        if let Some(millis) = self.stale_time {
            options.stale_time = Ttl::from_millis(millis);
        }
        if let Some(millis) = self.polling_interval {
            options.polling_interval = non_zero(millis);
        }
        if let Some(when_hidden) = self.polling_when_hidden {
            options.polling_when_hidden = when_hidden;
        }
        if let Some(count) = self.polling_error_retry_count {
            options.polling_error_retry_count = Limit::from_count(count);
        }
        if let Some(count) = self.retry_count {
            options.retry_count = Limit::from_count(count);
        }
        if let Some(millis) = self.retry_interval {
            options.retry_interval = non_zero(millis);
        }
        if let Some(wait) = self.debounce_wait {
            let mut debounce = DebounceOptions::new(Duration::from_millis(wait));
            if let Some(leading) = self.debounce_leading {
                debounce.leading = leading;
            }
            if let Some(trailing) = self.debounce_trailing {
                debounce.trailing = trailing;
            }
            debounce.max_wait = self.debounce_max_wait.map(Duration::from_millis);
            options.debounce = Some(debounce);
        }
        if let Some(wait) = self.throttle_wait {
            let mut throttle = ThrottleOptions::new(Duration::from_millis(wait));
            if let Some(leading) = self.throttle_leading {
                throttle.leading = leading;
            }
            if let Some(trailing) = self.throttle_trailing {
                throttle.trailing = trailing;
            }
            options.throttle = Some(throttle);
        }
        if let Some(millis) = self.loading_delay {
            options.loading_delay = non_zero(millis);
        }
        if let Some(refresh) = self.refresh_on_window_focus {
            options.refresh_on_window_focus = refresh;
        }
        if let Some(millis) = self.focus_timespan {
            options.focus_timespan = Duration::from_millis(millis);
        }
        options
    }
}

fn non_zero(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}
