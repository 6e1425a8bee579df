//! Ordered subscriber registry

use std::sync::{Arc, Mutex, PoisonError};

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Inner<E> {
    next: u64,
    listeners: Vec<(ListenerHandle, Listener<E>)>,
}

/// Subscribers for one event type, notified in subscription order.
///
/// `fire` works on a snapshot of the list, so a listener may subscribe or unsubscribe
/// (through a clone of the registry) while it is being notified.
pub struct ListenerRegistry<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Clone for ListenerRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<E> ListenerRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerHandle {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = ListenerHandle(inner.next);
        inner.next += 1;
        inner.listeners.push((handle, Arc::new(listener)));
        handle
    }

    /// Returns whether the handle was subscribed
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.listeners.len();
        inner.listeners.retain(|(h, _)| *h != handle);
        inner.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fire(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}
