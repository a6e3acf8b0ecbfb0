#![forbid(unsafe_code)]

//! Change-tracking primitives for ScopeKit.
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Subscribers are removed synchronously when their guard is
//! released; entries released mid-notification are skipped and pruned on
//! the next pass.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per notifying mutation.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. A callback is never invoked after its [`Subscription`] is dropped.

pub mod observable;

pub use observable::{Observable, Subscription};
