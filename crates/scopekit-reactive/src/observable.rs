#![forbid(unsafe_code)]

//! Observable value wrapper with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value of type `T` in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). Mutations notify every live subscriber in
//! registration order. `set`/`update` only notify when the value actually
//! changes (by `PartialEq`); `modify`/`notify` always notify, which suits
//! models that cannot be compared.
//!
//! # Failure Modes
//!
//! - **Re-entrant mutation**: Calling `set()` from within a subscriber
//!   callback panics (RefCell borrow rules). A subscriber that mutates the
//!   value it observes is a cycle in the subscriber graph.
//! - **Unsubscribe during notification**: Dropping a [`Subscription`] from
//!   inside a callback deactivates it immediately; its entry is pruned on
//!   the next notification pass.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One registered callback. `active` flips to false the moment its
/// [`Subscription`] is released, even if the entry is still listed.
struct Subscriber<T> {
    id: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

/// Shared interior for [`Observable<T>`].
struct ObservableInner<T> {
    value: T,
    version: u64,
    next_subscriber: u64,
    subscribers: Vec<Rc<Subscriber<T>>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state.
/// Both handles see the same value and share subscribers; use
/// [`ptr_eq`](Observable::ptr_eq) to test handle identity.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each notifying mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. A released subscriber is never invoked again.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: 'static> Observable<T> {
    /// Create a new observable with the given initial value.
    ///
    /// The initial version is 0 and no subscribers are registered.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                next_subscriber: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Mutate the value in place and notify unconditionally.
    ///
    /// # Panics
    ///
    /// Panics if called re-entrantly from within a subscriber callback.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.borrow_mut().value);
        self.notify();
    }

    /// Bump the version and notify all live subscribers without touching
    /// the value. Use after mutating state the observable cannot see.
    pub fn notify(&self) {
        let subscribers: Vec<Rc<Subscriber<T>>> = {
            let mut inner = self.inner.borrow_mut();
            inner.version += 1;
            inner.subscribers.retain(|s| s.active.get());
            inner.subscribers.clone()
        };

        let inner = self.inner.borrow();
        for subscriber in &subscribers {
            // An earlier callback in this pass may have released it.
            if subscriber.active.get() {
                (subscriber.callback)(&inner.value);
            }
        }
    }

    /// Subscribe to changes. The callback receives a reference to the value
    /// after each notifying mutation.
    ///
    /// Returns a [`Subscription`] guard; dropping it removes the callback.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let entry = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            let entry = Rc::new(Subscriber {
                id,
                active: Cell::new(true),
                callback: Box::new(callback),
            });
            inner.subscribers.push(Rc::clone(&entry));
            entry
        };

        let weak_inner = Rc::downgrade(&self.inner);
        Subscription {
            release: Some(Box::new(move || {
                entry.active.set(false);
                let Some(inner) = weak_inner.upgrade() else {
                    return;
                };
                // Busy while a `with` closure or notification holds a borrow;
                // the inactive entry is pruned on the next pass instead.
                if let Ok(mut inner) = inner.try_borrow_mut() {
                    inner.subscribers.retain(|s| s.id != entry.id);
                }
            })),
        }
    }

    /// Current version number. Useful for dirty-checking in render loops.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.active.get())
            .count()
    }

    /// Whether two handles share the same inner state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stable identity of the shared state, for logging.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Set a new value. If it differs from the current value the version is
    /// incremented and all live subscribers are notified.
    ///
    /// # Panics
    ///
    /// Panics if called re-entrantly from within a subscriber callback.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
        }
        self.notify();
    }

    /// Modify the value in place via a closure. Subscribers are notified
    /// only if the value changed (compared against a snapshot).
    ///
    /// # Panics
    ///
    /// Panics if called re-entrantly from within a subscriber callback.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            inner.value != old
        };
        if changed {
            self.notify();
        }
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the guard (or calling [`cancel`](Subscription::cancel)) removes
/// the callback from its observable synchronously. The guard is type-erased
/// so guards for different value types can be stored together.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Explicitly unsubscribe. Equivalent to dropping the guard.
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl Fn(&i32) + 'static) {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        (count, move |_: &i32| count_clone.set(count_clone.get() + 1))
    }

    #[test]
    fn get_set_basic() {
        let obs = Observable::new(42);
        assert_eq!(obs.get(), 42);
        assert_eq!(obs.version(), 0);

        obs.set(99);
        assert_eq!(obs.get(), 99);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn equal_set_is_noop() {
        let obs = Observable::new(42);
        let (count, cb) = counter();
        let _sub = obs.subscribe(cb);
        obs.set(42);
        assert_eq!(obs.version(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn update_notifies_only_on_change() {
        let obs = Observable::new(vec![1, 2, 3]);
        let seen = Rc::new(Cell::new(0usize));
        let seen_clone = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v: &Vec<i32>| seen_clone.set(v.len()));

        obs.update(|v| v.push(4));
        assert_eq!(seen.get(), 4);
        assert_eq!(obs.version(), 1);

        obs.update(|v| v[0] = 1);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn modify_always_notifies() {
        #[derive(Debug)]
        struct Cart {
            items: Vec<&'static str>,
        }

        let obs = Observable::new(Cart { items: Vec::new() });
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_: &Cart| hits_clone.set(hits_clone.get() + 1));

        obs.modify(|cart| cart.items.push("apple"));
        obs.modify(|_| {});
        assert_eq!(hits.get(), 2);
        assert_eq!(obs.version(), 2);
        assert_eq!(obs.with(|c| c.items.len()), 1);
    }

    #[test]
    fn drop_removes_subscriber_immediately() {
        let obs = Observable::new(0);
        let (count, cb) = counter();
        let sub = obs.subscribe(cb);
        assert_eq!(obs.subscriber_count(), 1);

        obs.set(1);
        drop(sub);
        assert_eq!(obs.subscriber_count(), 0);

        obs.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancel_is_explicit_unsubscribe() {
        let obs = Observable::new(0);
        let (count, cb) = counter();
        let sub = obs.subscribe(cb);
        sub.cancel();
        obs.set(5);
        assert_eq!(count.get(), 0);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log1 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_| log1.borrow_mut().push('A'));
        let log2 = Rc::clone(&log);
        let _s2 = obs.subscribe(move |_| log2.borrow_mut().push('B'));
        let log3 = Rc::clone(&log);
        let _s3 = obs.subscribe(move |_| log3.borrow_mut().push('C'));

        obs.set(1);
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn unsubscribe_during_notification_skips_later_callback() {
        let obs = Observable::new(0);
        let (count, cb) = counter();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim_clone = Rc::clone(&victim);
        let _killer = obs.subscribe(move |_| {
            victim_clone.borrow_mut().take();
        });
        *victim.borrow_mut() = Some(obs.subscribe(cb));

        obs.set(1);
        assert_eq!(count.get(), 0);
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn clone_shares_state_and_identity() {
        let obs1 = Observable::new(0);
        let obs2 = obs1.clone();
        let other = Observable::new(0);

        obs2.set(7);
        assert_eq!(obs1.get(), 7);
        assert!(obs1.ptr_eq(&obs2));
        assert!(!obs1.ptr_eq(&other));
        assert_eq!(obs1.addr(), obs2.addr());
    }

    #[test]
    fn subscription_outliving_observable_is_harmless() {
        let (count, cb) = counter();
        let sub = {
            let obs = Observable::new(0);
            obs.subscribe(cb)
        };
        drop(sub);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn debug_format() {
        let obs = Observable::new(42);
        let dbg = format!("{:?}", obs);
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
