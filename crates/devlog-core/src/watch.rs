//! Observable values with explicit change-callback registration
//!
//! A [`Watched`] value notifies registered handlers with `(old, new)` whenever
//! it changes. Registration hands back a [`Subscription`] token; the token is
//! the only way to deregister, it cannot be cloned, and it deregisters itself
//! when dropped, so every registration is paired with exactly one
//! deregistration.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Handler<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

struct Inner<T> {
    value: T,
    handlers: Vec<(u64, Handler<T>)>,
    next_id: u64,
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A value that reports its changes to subscribers
pub struct Watched<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone + PartialEq + Send + 'static> Watched<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                handlers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        lock(&self.inner).value.clone()
    }

    /// Replace the value, notifying subscribers if it changed
    ///
    /// Handlers run after the internal lock is released, so they may read the
    /// value or subscribe again. Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        let (old, handlers) = {
            let mut inner = lock(&self.inner);
            if inner.value == value {
                return false;
            }
            let old = std::mem::replace(&mut inner.value, value.clone());
            let handlers: Vec<Handler<T>> =
                inner.handlers.iter().map(|(_, h)| Arc::clone(h)).collect();
            (old, handlers)
        };

        for handler in handlers {
            handler(&old, &value);
        }
        true
    }

    /// Register a handler receiving `(old, new)` on every change
    pub fn subscribe<F>(&self, handler: F) -> Subscription<T>
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, Arc::new(handler)));

        Subscription {
            id,
            target: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Deregister a handler
    ///
    /// Returns false when the subscription belongs to another value; it is
    /// still consumed and detaches from its own value.
    pub fn unsubscribe(&self, mut subscription: Subscription<T>) -> bool {
        let belongs = subscription
            .target
            .as_ref()
            .map(|weak| weak.ptr_eq(&Arc::downgrade(&self.inner)))
            .unwrap_or(false);
        subscription.detach() && belongs
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }
}

/// Registration token returned by [`Watched::subscribe`]
#[must_use = "dropping a subscription deregisters its handler"]
pub struct Subscription<T> {
    id: u64,
    target: Option<Weak<Mutex<Inner<T>>>>,
}

impl<T> Subscription<T> {
    fn detach(&mut self) -> bool {
        let Some(target) = self.target.take() else {
            return false;
        };
        let Some(inner) = target.upgrade() else {
            return false;
        };
        let mut inner = lock(&inner);
        let before = inner.handlers.len();
        inner.handlers.retain(|(id, _)| *id != self.id);
        inner.handlers.len() != before
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
