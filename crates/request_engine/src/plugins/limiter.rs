//! Leading/trailing rate limiter behind the debounce and throttle plugins.
//!
//! Follows the classic debounce-with-max-wait model: calls inside the window are
//! folded into one batch whose last params win, and every caller folded into a
//! batch receives that batch's result.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use request_logging::{request_trace, request_warn};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::plugin::{Invocation, Invoke};
use crate::store::timer::{lock, TimerSlot};
use crate::{Data, DebounceOptions, Params, RequestError, ThrottleOptions};

type Outcome<D> = Option<Result<D, RequestError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LimiterSettings {
    wait: Duration,
    leading: bool,
    trailing: bool,
    max_wait: Option<Duration>,
}

impl LimiterSettings {
    pub(crate) fn debounce(options: DebounceOptions) -> Self {
        Self {
            wait: options.wait,
            leading: options.leading,
            trailing: options.trailing,
            max_wait: options.max_wait.map(|max| max.max(options.wait)),
        }
    }

    pub(crate) fn throttle(options: ThrottleOptions) -> Self {
        Self {
            wait: options.wait,
            leading: options.leading,
            trailing: options.trailing,
            max_wait: Some(options.wait),
        }
    }
}

struct Batch<D: Data, P: Params> {
    params: P,
    next: Invoke<D, P>,
    waiters: Vec<oneshot::Sender<Outcome<D>>>,
}

struct LimiterState<D: Data, P: Params> {
    last_call: Option<Instant>,
    last_invoke: Option<Instant>,
    pending: Option<Batch<D, P>>,
}

pub(crate) struct RateLimiter<D: Data, P: Params> {
    settings: LimiterSettings,
    state: Mutex<LimiterState<D, P>>,
    timer: TimerSlot,
}

impl<D: Data, P: Params> RateLimiter<D, P> {
    pub(crate) fn new(settings: LimiterSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            state: Mutex::new(LimiterState {
                last_call: None,
                last_invoke: None,
                pending: None,
            }),
            timer: TimerSlot::new(),
        })
    }

    /// Registers one call. The returned invocation settles with the result of
    /// whichever invocation this call is folded into.
    pub(crate) fn call(self: &Arc<Self>, params: P, next: Invoke<D, P>) -> Invocation<D> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let fire = {
            let mut state = lock(&self.state);
            let invoking = self.should_invoke(&state, now);
            match state.pending.as_mut() {
                Some(batch) => {
                    batch.params = params;
                    batch.next = next;
                    batch.waiters.push(tx);
                }
                None => {
                    state.pending = Some(Batch {
                        params,
                        next,
                        waiters: vec![tx],
                    });
                }
            }
            state.last_call = Some(now);

            if invoking && !self.timer.is_armed() {
                self.leading_edge(&mut state, now)
            } else if invoking && self.settings.max_wait.is_some() {
                self.arm(self.settings.wait);
                Self::take_batch(&mut state, now)
            } else {
                if !self.timer.is_armed() {
                    self.arm(self.settings.wait);
                }
                None
            }
        };

        if let Some(batch) = fire {
            Self::fire(batch);
        }
        Box::pin(async move { rx.await.ok().flatten() })
    }

    /// Drops the timer and any batch not yet invoked. Its callers never settle.
    pub(crate) fn cancel(&self) {
        self.timer.clear();
        let mut state = lock(&self.state);
        state.last_call = None;
        state.last_invoke = None;
        state.pending = None;
    }

    fn should_invoke(&self, state: &LimiterState<D, P>, now: Instant) -> bool {
        let Some(last_call) = state.last_call else {
            return true;
        };
        let since_call = now.saturating_duration_since(last_call);
        let max_wait_elapsed = self.settings.max_wait.is_some_and(|max_wait| {
            state
                .last_invoke
                .map_or(true, |last| now.saturating_duration_since(last) >= max_wait)
        });
        since_call >= self.settings.wait || max_wait_elapsed
    }

    fn remaining_wait(&self, state: &LimiterState<D, P>, now: Instant) -> Duration {
        let since_call = state
            .last_call
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        let waiting = self.settings.wait.saturating_sub(since_call);
        match (self.settings.max_wait, state.last_invoke) {
            (Some(max_wait), Some(last_invoke)) => {
                let since_invoke = now.saturating_duration_since(last_invoke);
                waiting.min(max_wait.saturating_sub(since_invoke))
            }
            _ => waiting,
        }
    }

    fn leading_edge(self: &Arc<Self>, state: &mut LimiterState<D, P>, now: Instant) -> Option<Batch<D, P>> {
        state.last_invoke = Some(now);
        self.arm(self.settings.wait);
        if self.settings.leading {
            Self::take_batch(state, now)
        } else {
            None
        }
    }

    fn timer_expired(self: &Arc<Self>) {
        let now = Instant::now();
        let fire = {
            let mut state = lock(&self.state);
            if self.should_invoke(&state, now) {
                if self.settings.trailing && state.pending.is_some() {
                    Self::take_batch(&mut state, now)
                } else {
                    state.pending = None;
                    None
                }
            } else {
                let remaining = self.remaining_wait(&state, now);
                self.arm(remaining);
                None
            }
        };
        if let Some(batch) = fire {
            Self::fire(batch);
        }
    }

    fn arm(self: &Arc<Self>, delay: Duration) {
        let limiter = Arc::downgrade(self);
        self.timer.schedule(delay, move || {
            if let Some(limiter) = limiter.upgrade() {
                limiter.timer_expired();
            }
        });
    }

    fn take_batch(state: &mut LimiterState<D, P>, now: Instant) -> Option<Batch<D, P>> {
        state.last_invoke = Some(now);
        state.pending.take()
    }

    fn fire(batch: Batch<D, P>) {
        let Batch {
            params,
            next,
            waiters,
        } = batch;
        request_trace!("rate limiter invoking for {} caller(s)", waiters.len());
        let invocation = next(params);
        let deliver = async move {
            let outcome = invocation.await;
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        };
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(deliver);
            }
            Err(_) => request_warn!("rate limited call dropped: no tokio runtime"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LimiterSettings, RateLimiter};
    use crate::plugin::{Invocation, Invoke};
    use crate::{DebounceOptions, ThrottleOptions};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder() -> (Invoke<u32, u32>, Arc<Mutex<Vec<u32>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let invoke: Invoke<u32, u32> = Arc::new(move |params: u32| -> Invocation<u32> {
            seen.lock().unwrap().push(params);
            Box::pin(async move { Some(Ok(params * 10)) })
        });
        (invoke, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_folds_a_burst_into_one_trailing_call() {
        let limiter = RateLimiter::new(LimiterSettings::debounce(DebounceOptions::new(
            Duration::from_millis(200),
        )));
        let (invoke, calls) = recorder();

        let mut pending = Vec::new();
        for params in 1..=3 {
            pending.push(limiter.call(params, invoke.clone()));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(calls.lock().unwrap().is_empty());

        let results = futures_util::future::join_all(pending).await;
        assert_eq!(*calls.lock().unwrap(), vec![3]);
        for result in results {
            assert_eq!(result.unwrap().unwrap(), 30);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn max_wait_forces_an_invocation_during_a_long_burst() {
        let options = DebounceOptions {
            max_wait: Some(Duration::from_millis(250)),
            ..DebounceOptions::new(Duration::from_millis(100))
        };
        let limiter = RateLimiter::new(LimiterSettings::debounce(options));
        let (invoke, calls) = recorder();

        let mut pending = Vec::new();
        for params in 1..=6 {
            pending.push(limiter.call(params, invoke.clone()));
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        // 6 calls over 360ms never leave a 100ms gap, but max wait fires once.
        assert_eq!(calls.lock().unwrap().len(), 1);
        drop(pending);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_runs_leading_and_trailing_edges() {
        let limiter = RateLimiter::new(LimiterSettings::throttle(ThrottleOptions::new(
            Duration::from_millis(100),
        )));
        let (invoke, calls) = recorder();

        let first = limiter.call(1, invoke.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = limiter.call(2, invoke.clone());
        let third = limiter.call(3, invoke.clone());

        assert_eq!(first.await.unwrap().unwrap(), 10);
        assert_eq!(second.await.unwrap().unwrap(), 30);
        assert_eq!(third.await.unwrap().unwrap(), 30);
        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_batch() {
        let limiter = RateLimiter::new(LimiterSettings::debounce(DebounceOptions::new(
            Duration::from_millis(100),
        )));
        let (invoke, calls) = recorder();

        let pending = limiter.call(1, invoke.clone());
        limiter.cancel();
        assert!(pending.await.is_none());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(calls.lock().unwrap().is_empty());
    }
}
