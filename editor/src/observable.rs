//! Observable values.
//!
//! A value holder with `get`, `set` and `subscribe`. Listeners run
//! synchronously inside [`Observable::set`], after the new value is stored,
//! and only when the value actually changed.

use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    listeners: RwLock<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// A shared value that notifies subscribers when it changes.
///
/// Clones share the same value and listener list.
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone + PartialEq> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(value),
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Store `value` and notify listeners. Returns `false` and notifies no
    /// one when `value` equals the current value.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.write();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }

        // Listeners may subscribe or set again, so no lock is held while
        // they run.
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&value);
        }
        true
    }

    /// Call `listener` with every new value.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

/// Handle to a registered listener. Dropping it keeps the listener
/// registered; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription<T> {
    id: u64,
    inner: Weak<Inner<T>>,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn notifies_on_change_only() {
        let value = Observable::new(String::from("a"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        value.subscribe(move |v: &String| sink.lock().push(v.clone()));

        assert!(value.set("b".to_string()));
        assert!(!value.set("b".to_string()));
        assert!(value.set("c".to_string()));

        assert_eq!(*seen.lock(), vec!["b", "c"]);
        assert_eq!(value.get(), "c");
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let value = Observable::new(0);
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let subscription = value.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        value.set(1);
        subscription.unsubscribe();
        value.set(2);

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(value.subscriber_count(), 0);
    }

    #[test]
    fn listeners_can_read_and_set() {
        let value = Observable::new(0);
        let handle = value.clone();
        value.subscribe(move |&v| {
            // Clamp from inside the listener
            if v > 10 {
                handle.set(10);
            }
        });

        value.set(42);
        assert_eq!(value.get(), 10);
        assert_eq!(value.with(|v| *v + 1), 11);
    }
}
