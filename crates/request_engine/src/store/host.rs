use std::sync::atomic::{AtomicBool, Ordering};

use request_logging::request_trace;

use super::subscribe::{Subscription, Topic};

/// Visibility, connectivity and focus signals fed in by the embedding application.
pub struct HostEnvironment {
    visible: AtomicBool,
    online: AtomicBool,
    focus: Topic<()>,
    revisible: Topic<()>,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            visible: AtomicBool::new(true),
            online: AtomicBool::new(true),
            focus: Topic::new(),
            revisible: Topic::new(),
        }
    }
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// The host window gained focus.
    pub fn notify_focus(&self) {
        self.revalidate_focus();
    }

    /// The host became visible or hidden.
    pub fn notify_visibility_change(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
        if visible {
            request_trace!("host visible again");
            self.revisible.trigger(&());
            self.revalidate_focus();
        }
    }

    /// Listens for focus while visible and online.
    pub fn subscribe_focus(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.focus.subscribe(move |_| listener())
    }

    /// Listens for the host turning visible.
    pub fn subscribe_revisible(
        &self,
        listener: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.revisible.subscribe(move |_| listener())
    }

    pub(crate) fn reset(&self) {
        self.visible.store(true, Ordering::SeqCst);
        self.online.store(true, Ordering::SeqCst);
        self.focus.clear();
        self.revisible.clear();
    }

    fn revalidate_focus(&self) {
        if !self.is_visible() || !self.is_online() {
            return;
        }
        self.focus.trigger(&());
    }
}
