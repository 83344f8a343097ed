//! Subscriptions and teardowns.
//!
//! A [`Subscription`] is the handle returned by `subscribe`. It is closed at
//! most once, either by the producer (`error` / `complete`) or by the owner
//! (`unsubscribe`), and on that first close it runs the teardown the
//! producer returned.

use std::{fmt, rc::Rc};

use crate::{
  error::{Error, Result},
  hooks,
};

mod dynamic;
mod observer;

pub use dynamic::DynamicObservers;
pub(crate) use observer::activate;
pub use observer::SubscriptionObserver;

/// Lifecycle of one activation, erased over the item type.
pub(crate) trait Lifecycle {
  fn is_closed(&self) -> bool;

  /// Mark closed and release the bound observer.
  fn close(&self);

  /// Take the stored teardown, leaving an empty one behind.
  fn take_teardown(&self) -> Teardown;
}

/// Live, cancellable connection between one activation of an observable and
/// one observer.
///
/// Handles are cheap to clone; every clone controls the same activation.
#[derive(Clone)]
pub struct Subscription(pub(crate) Rc<dyn Lifecycle>);

impl Subscription {
  /// A subscription that is already closed.
  pub fn closed() -> Self { Subscription(Rc::new(Closed)) }

  #[inline]
  pub fn is_closed(&self) -> bool { self.0.is_closed() }

  /// Close the subscription and run its teardown.
  ///
  /// Idempotent: the teardown runs once, on the first call. A failing teardown
  /// is reported to the unhandled-error hook.
  pub fn unsubscribe(&self) {
    self.0.close();
    let teardown = self.0.take_teardown();
    teardown.run(self);
  }

  /// Whether both handles control the same activation.
  pub fn ptr_eq(&self, other: &Subscription) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription").field("closed", &self.is_closed()).finish()
  }
}

struct Closed;

impl Lifecycle for Closed {
  fn is_closed(&self) -> bool { true }

  fn close(&self) {}

  fn take_teardown(&self) -> Teardown { Teardown::empty() }
}

// ============================================================================
// Teardown
// ============================================================================

/// Cleanup returned by a subscriber function, run exactly once when the
/// subscription closes.
#[derive(Default)]
pub struct Teardown(Option<Box<dyn FnOnce() -> Result<()>>>);

impl Teardown {
  pub fn empty() -> Self { Self(None) }

  pub fn new(f: impl FnOnce() + 'static) -> Self {
    Self::try_new(move || {
      f();
      Ok(())
    })
  }

  /// A cleanup that may fail. The error goes to the unhandled-error hook.
  pub fn try_new(f: impl FnOnce() -> Result<()> + 'static) -> Self { Self(Some(Box::new(f))) }

  pub fn is_empty(&self) -> bool { self.0.is_none() }

  pub(crate) fn run(self, subscription: &Subscription) {
    if let Some(f) = self.0 {
      if let Err(err) = f() {
        hooks::unhandled_error(err, subscription);
      }
    }
  }
}

impl fmt::Debug for Teardown {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Teardown").field(&!self.is_empty()).finish()
  }
}

/// Values a subscriber function may return.
///
/// `Err` is how a subscriber fails synchronously: the error is delivered
/// through the subscription's error path instead of being raised.
pub trait IntoTeardown {
  fn into_teardown(self) -> Result<Teardown>;
}

impl IntoTeardown for () {
  #[inline]
  fn into_teardown(self) -> Result<Teardown> { Ok(Teardown::empty()) }
}

impl IntoTeardown for Teardown {
  #[inline]
  fn into_teardown(self) -> Result<Teardown> { Ok(self) }
}

impl IntoTeardown for Subscription {
  fn into_teardown(self) -> Result<Teardown> { Ok(Teardown::new(move || self.unsubscribe())) }
}

impl<F> IntoTeardown for F
where
  F: FnOnce() + 'static,
{
  #[inline]
  fn into_teardown(self) -> Result<Teardown> { Ok(Teardown::new(self)) }
}

impl<R: IntoTeardown> IntoTeardown for Result<R, Error> {
  #[inline]
  fn into_teardown(self) -> Result<Teardown> { self.and_then(R::into_teardown) }
}
