use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use request_logging::request_warn;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawns `f` after `delay` on the current Tokio runtime.
///
/// Returns `None` outside a runtime; the callback is then dropped.
pub(crate) fn spawn_after<F>(delay: Duration, f: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        })),
        Err(_) => {
            request_warn!("timer of {:?} dropped: no tokio runtime", delay);
            None
        }
    }
}

/// A single re-armable timer, the `setTimeout`/`clearTimeout` pair of one plugin.
///
/// A timer that fires removes itself from the slot before running its callback,
/// so the callback may clear or re-arm the same slot.
#[derive(Default)]
pub(crate) struct TimerSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replaces any armed timer with one that runs `f` after `delay`.
    pub(crate) fn schedule<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.inner);
        if let Some(previous) = state.handle.take() {
            previous.abort();
        }
        state.generation += 1;
        let generation = state.generation;
        let slot = Arc::downgrade(&self.inner);
        state.handle = spawn_after(delay, move || {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            {
                let mut state = lock(&slot);
                if state.generation != generation {
                    return;
                }
                // Detach without aborting: this task is the one running.
                state.handle = None;
            }
            f();
        });
    }

    pub(crate) fn clear(&self) {
        let mut state = lock(&self.inner);
        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        lock(&self.inner).handle.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Locks `mutex`, recovering the guard from a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
