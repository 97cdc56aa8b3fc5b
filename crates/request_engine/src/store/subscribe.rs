//! Keyed listener registry used to push cache writes to sibling requests, and the
//! keyless listener list behind the focus and visibility topics.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::timer::lock;

/// A listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Unsubscribes on drop or on [`Subscription::unsubscribe`].
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

type Entries<T> = Vec<(u64, Listener<T>)>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed)
}

fn remove_first<T>(entries: &mut Entries<T>, id: u64) {
    if let Some(index) = entries.iter().position(|(entry_id, _)| *entry_id == id) {
        entries.remove(index);
    }
}

/// Ordered listener list without a key.
pub struct Topic<T> {
    listeners: Arc<Mutex<Entries<T>>>,
}

impl<T: 'static> Topic<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = next_id();
        lock(&self.listeners).push((id, Arc::new(listener)));
        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                remove_first(&mut lock(&listeners), id);
            }
        })
    }

    /// Calls every listener in registration order.
    ///
    /// Iterates a snapshot, so a listener may subscribe or unsubscribe re-entrantly.
    pub fn trigger(&self, payload: &T) {
        let snapshot: Vec<Listener<T>> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.listeners).clear();
    }
}

impl<T: 'static> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Key to listener-list registry.
pub struct SubscriptionBus<K, T> {
    topics: Arc<Mutex<HashMap<K, Entries<T>>>>,
}

impl<K, T> SubscriptionBus<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: 'static,
{
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn subscribe(
        &self,
        key: K,
        listener: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription {
        let id = next_id();
        lock(&self.topics)
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        let weak: Weak<Mutex<HashMap<K, Entries<T>>>> = Arc::downgrade(&self.topics);
        Subscription::new(move || {
            let Some(topics) = weak.upgrade() else {
                return;
            };
            let mut topics = lock(&topics);
            if let Some(entries) = topics.get_mut(&key) {
                remove_first(entries, id);
                if entries.is_empty() {
                    topics.remove(&key);
                }
            }
        })
    }

    /// Calls every listener of `key` synchronously, in registration order.
    pub fn trigger(&self, key: &K, payload: &T) {
        let snapshot: Vec<Listener<T>> = match lock(&self.topics).get(key) {
            Some(entries) => entries.iter().map(|(_, listener)| listener.clone()).collect(),
            None => return,
        };
        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn listener_count(&self, key: &K) -> usize {
        lock(&self.topics).get(key).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        lock(&self.topics).clear();
    }
}

impl<K, T> Default for SubscriptionBus<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Subscription, SubscriptionBus, Topic};
    use std::sync::{Arc, Mutex};

    #[test]
    fn trigger_runs_listeners_in_registration_order() {
        let bus: SubscriptionBus<&'static str, u32> = SubscriptionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = seen.clone();
        let _a = bus.subscribe("k", move |v| first.lock().unwrap().push(("a", *v)));
        let second = seen.clone();
        let _b = bus.subscribe("k", move |v| second.lock().unwrap().push(("b", *v)));
        let _other = bus.subscribe("other", |_| panic!("wrong key"));

        bus.trigger(&"k", &7);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn dropping_subscription_removes_only_that_listener() {
        let bus: SubscriptionBus<&'static str, ()> = SubscriptionBus::new();
        let a = bus.subscribe("k", |_| {});
        let _b = bus.subscribe("k", |_| {});
        assert_eq!(bus.listener_count(&"k"), 2);
        drop(a);
        assert_eq!(bus.listener_count(&"k"), 1);
    }

    #[test]
    fn listener_may_resubscribe_during_trigger() {
        let bus: Arc<SubscriptionBus<&'static str, ()>> = Arc::new(SubscriptionBus::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));

        let inner_bus = bus.clone();
        let inner_slot = slot.clone();
        let inner_calls = calls.clone();
        let sub = bus.subscribe("k", move |_| {
            *inner_calls.lock().unwrap() += 1;
            // Replace ourselves while the bus is iterating.
            let replacement = inner_bus.subscribe("k", |_| {});
            let previous = inner_slot.lock().unwrap().replace(replacement);
            drop(previous);
        });
        *slot.lock().unwrap() = Some(sub);

        bus.trigger(&"k", &());
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(bus.listener_count(&"k"), 1);
    }

    #[test]
    fn topic_unsubscribe_is_exact() {
        let topic: Topic<()> = Topic::new();
        let a = topic.subscribe(|_| {});
        let b = topic.subscribe(|_| {});
        b.unsubscribe();
        assert_eq!(topic.len(), 1);
        a.unsubscribe();
        assert!(topic.is_empty());
    }
}
