use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use request_logging::request_debug;

use crate::fetch::FetchHandle;
use crate::plugin::Plugin;
use crate::plugins::Inert;
use crate::store::timer::TimerSlot;
use crate::{BeforeOutcome, Data, Limit, Params, RequestError, RequestOptions};

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Delay before retry number `attempt` (1-based) when no fixed interval is set.
pub fn backoff(attempt: u32) -> Duration {
    let millis = BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(millis.min(BACKOFF_CAP_MS))
}

pub struct RetryPlugin<D: Data, P: Params> {
    fetch: FetchHandle<D, P>,
    limit: Limit,
    interval: Option<Duration>,
    timer: TimerSlot,
    attempts: AtomicU32,
    /// Set right before a retry refreshes so `on_before` keeps the attempt count.
    by_retry: Arc<AtomicBool>,
}

pub fn retry_plugin<D: Data, P: Params>(
    fetch: &FetchHandle<D, P>,
    options: &RequestOptions<D, P>,
) -> Box<dyn Plugin<D, P>> {
    if options.retry_count.is_disabled() {
        return Box::new(Inert);
    }
    Box::new(RetryPlugin {
        fetch: fetch.clone(),
        limit: options.retry_count,
        interval: options.retry_interval,
        timer: TimerSlot::new(),
        attempts: AtomicU32::new(0),
        by_retry: Arc::new(AtomicBool::new(false)),
    })
}

impl<D: Data, P: Params> Plugin<D, P> for RetryPlugin<D, P> {
    fn on_before(&self, _params: &P) -> Option<BeforeOutcome<D, P>> {
        if !self.by_retry.swap(false, Ordering::SeqCst) {
            self.attempts.store(0, Ordering::SeqCst);
        }
        self.timer.clear();
        None
    }

    fn on_success(&self, _data: &D, _params: &P) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &RequestError, _params: &P) {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.limit.allows(attempt) {
            request_debug!("giving up after {} retries", attempt - 1);
            self.attempts.store(0, Ordering::SeqCst);
            return;
        }
        let delay = self.interval.unwrap_or_else(|| backoff(attempt));
        request_debug!("retry {} scheduled in {:?}", attempt, delay);
        let fetch = self.fetch.clone();
        let by_retry = Arc::clone(&self.by_retry);
        self.timer.schedule(delay, move || {
            by_retry.store(true, Ordering::SeqCst);
            fetch.refresh();
        });
    }

    fn on_cancel(&self) {
        self.attempts.store(0, Ordering::SeqCst);
        self.timer.clear();
    }

    fn on_teardown(&self) {
        self.timer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::backoff;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff(1), Duration::from_millis(2000));
        assert_eq!(backoff(2), Duration::from_millis(4000));
        assert_eq!(backoff(3), Duration::from_millis(8000));
        assert_eq!(backoff(5), Duration::from_millis(30_000));
        assert_eq!(backoff(64), Duration::from_millis(30_000));
    }
}
