//! Subscriber Registry
//!
//! Explicit map from subscription id to callback. Registration hands back an
//! opaque [`Subscription`] token; the listener stays registered until that
//! token is consumed with [`Subscription::unsubscribe`]. Dropping the token
//! does not unsubscribe.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback stored in a [`ListenerRegistry`].
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct RegistryInner<E> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<E>>,
}

/// Registry of listeners for events of type `E`.
///
/// Cloning yields another handle onto the same registry.
pub struct ListenerRegistry<E> {
    inner: Arc<Mutex<RegistryInner<E>>>,
}

impl<E> Clone for ListenerRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Register a listener and return its unsubscribe token.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.insert(id, Arc::new(listener));
            id
        };

        let registry: Weak<Mutex<RegistryInner<E>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = registry.upgrade() {
                inner.lock().listeners.remove(&id);
            }
        })
    }

    /// Deliver `event` to every registered listener.
    ///
    /// Listeners run on a snapshot taken before delivery, so a listener may
    /// unsubscribe itself (or others) without deadlocking.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self.inner.lock().listeners.values().cloned().collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener. Outstanding tokens become no-ops.
    pub fn clear(&self) {
        self.inner.lock().listeners.clear();
    }
}

/// Opaque unsubscribe token returned by registrations.
#[must_use = "the listener stays registered until unsubscribe() is called"]
pub struct Subscription {
    cancels: Vec<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancels: vec![Box::new(cancel)],
        }
    }

    /// A token that unsubscribes nothing.
    pub fn noop() -> Self {
        Self {
            cancels: Vec::new(),
        }
    }

    /// Combine two tokens so one `unsubscribe` removes both registrations.
    pub fn join(mut self, other: Subscription) -> Self {
        self.cancels.extend(other.cancels);
        self
    }

    pub fn unsubscribe(self) {
        for cancel in self.cancels {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("registrations", &self.cancels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_listeners() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = Arc::clone(&total);
        let _a = registry.subscribe(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = Arc::clone(&total);
        let _b = registry.subscribe(move |v| {
            t2.fetch_add(*v as usize * 10, Ordering::SeqCst);
        });

        registry.emit(&2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let registry: ListenerRegistry<()> = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = registry.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&());
        sub.unsubscribe();
        registry.emit(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_keeps_listener() {
        let registry: ListenerRegistry<()> = ListenerRegistry::new();
        drop(registry.subscribe(|_| {}));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_join_unsubscribes_both() {
        let a: ListenerRegistry<()> = ListenerRegistry::new();
        let b: ListenerRegistry<()> = ListenerRegistry::new();
        let joined = a.subscribe(|_| {}).join(b.subscribe(|_| {}));

        joined.unsubscribe();
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn test_listener_can_unsubscribe_during_emit() {
        let registry: ListenerRegistry<()> = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_inner = Arc::clone(&slot);
        let sub = registry.subscribe(move |_| {
            if let Some(sub) = slot_inner.lock().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        registry.emit(&());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_token_outliving_registry_is_harmless() {
        let registry: ListenerRegistry<()> = ListenerRegistry::new();
        let sub = registry.subscribe(|_| {});
        drop(registry);
        sub.unsubscribe();
    }
}
