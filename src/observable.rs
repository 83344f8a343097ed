//! The push-based producer.
//!
//! An [`Observable`] wraps a subscriber function. Nothing runs until
//! `subscribe`; every call to `subscribe` is an independent activation with
//! its own [`Subscription`].

use std::{fmt, rc::Rc};

use crate::{
  error::Result,
  observer::{IntoObserver, Observer},
  subscription::{activate, IntoTeardown, Subscription, SubscriptionObserver, Teardown},
};

type SubscriberFn<T> = dyn Fn(SubscriptionObserver<T>) -> Result<Teardown>;

/// A reusable, stateless producer of a sequence of values.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use multitude::prelude::*;
///
/// let values = Rc::new(RefCell::new(vec![]));
/// let c_values = values.clone();
/// let subscription = Observable::new(|obs| {
///   obs.next(1);
///   obs.next(2);
///   obs.complete();
/// })
/// .subscribe(move |v| c_values.borrow_mut().push(v));
///
/// assert_eq!(*values.borrow(), vec![1, 2]);
/// assert!(subscription.is_closed());
/// ```
pub struct Observable<T> {
  subscriber: Rc<SubscriberFn<T>>,
}

impl<T> Clone for Observable<T> {
  fn clone(&self) -> Self { Self { subscriber: self.subscriber.clone() } }
}

impl<T> fmt::Debug for Observable<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Observable") }
}

impl<T: 'static> Observable<T> {
  /// Wrap a subscriber function. It is stored, not invoked.
  ///
  /// The function may return anything [`IntoTeardown`]: nothing, a cleanup
  /// closure, a [`Subscription`] to release, or an `Err` to fail the
  /// activation through its error path.
  pub fn new<F, R>(subscriber: F) -> Self
  where
    F: Fn(SubscriptionObserver<T>) -> R + 'static,
    R: IntoTeardown,
  {
    Self { subscriber: Rc::new(move |observer| subscriber(observer).into_teardown()) }
  }

  /// Start an activation for `observer`.
  pub fn subscribe(&self, observer: impl IntoObserver<T>) -> Subscription {
    activate(observer.into_observer(), &*self.subscriber)
  }

  /// Emit each item, then complete.
  pub fn of(items: impl IntoIterator<Item = T>) -> Self
  where
    T: Clone,
  {
    Self::from_iter(items.into_iter().collect::<Vec<_>>())
  }

  /// Emit the items of `iterable`, then complete. The iterable is cloned and
  /// walked again for every subscription.
  #[allow(clippy::should_implement_trait)]
  pub fn from_iter<I>(iterable: I) -> Self
  where
    I: IntoIterator<Item = T> + Clone + 'static,
  {
    Self::new(move |observer| {
      for value in iterable.clone() {
        if observer.is_closed() {
          return;
        }
        observer.next(value);
      }
      observer.complete();
    })
  }

  /// Convert anything exposing [`ObservableCompatible`].
  ///
  /// Converting an `Observable` hands back the same producer, so
  /// `Observable::from(&o).ptr_eq(&o)` holds.
  #[allow(clippy::should_implement_trait)]
  pub fn from<C>(source: &C) -> Self
  where
    C: ObservableCompatible<T> + ?Sized,
  {
    source.to_observable()
  }

  /// Convert anything with a `subscribe` method.
  pub fn from_like<S>(source: S) -> Self
  where
    S: Subscribable<T> + 'static,
  {
    Self::new(move |observer| source.subscribe_observer(observer.into_observer()))
  }

  /// Whether both handles wrap the same subscriber function.
  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.subscriber, &other.subscriber) }

  /// Apply a transformation, such as `share(..)`, to this observable.
  pub fn pipe<R>(&self, op: impl FnOnce(&dyn ObservableCompatible<T>) -> R) -> R { op(self) }
}

/// Explicit conversion to an [`Observable`].
///
/// Implemented by every producer in the crate; implement it to let
/// `Observable::from`, `share` and the other helpers accept your type.
pub trait ObservableCompatible<T> {
  fn to_observable(&self) -> Observable<T>;
}

impl<T> ObservableCompatible<T> for Observable<T> {
  #[inline]
  fn to_observable(&self) -> Observable<T> { self.clone() }
}

/// Anything that can subscribe an [`Observer`] and hand back a
/// [`Subscription`].
pub trait Subscribable<T> {
  fn subscribe_observer(&self, observer: Observer<T>) -> Subscription;
}

impl<T: 'static> Subscribable<T> for Observable<T> {
  #[inline]
  fn subscribe_observer(&self, observer: Observer<T>) -> Subscription { self.subscribe(observer) }
}

#[cfg(test)]
mod tests {
  use std::cell::{Cell, RefCell};

  use super::*;
  use crate::error::Error;

  #[multitude_macro::test]
  fn subscriber_is_lazy_and_per_subscription() {
    let calls = Rc::new(Cell::new(0));
    let c_calls = calls.clone();
    let observable = Observable::<i32>::new(move |_| c_calls.set(c_calls.get() + 1));
    assert_eq!(calls.get(), 0);

    observable.subscribe(());
    observable.subscribe(());
    assert_eq!(calls.get(), 2);
  }

  #[multitude_macro::test]
  fn of_completes_after_items() {
    let log = Rc::new(RefCell::new(vec![]));
    let (n, c) = (log.clone(), log.clone());
    Observable::of(["a", "b"]).subscribe(
      Observer::new()
        .on_next(move |v: &str| n.borrow_mut().push(v.to_string()))
        .on_complete(move || c.borrow_mut().push("done".to_string())),
    );
    assert_eq!(*log.borrow(), vec!["a", "b", "done"]);
  }

  #[multitude_macro::test]
  fn from_iter_stops_when_unsubscribed() {
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    let subscription: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    let c_subscription = subscription.clone();
    Observable::from_iter(1..10).subscribe(
      Observer::new()
        .on_start(move |s| *c_subscription.borrow_mut() = Some(s))
        .on_next(move |v| {
          c_seen.borrow_mut().push(v);
          if v == 3 {
            if let Some(s) = subscription.borrow().as_ref() {
              s.unsubscribe();
            }
          }
        }),
    );
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
  }

  #[multitude_macro::test]
  fn from_returns_same_producer() {
    let observable = Observable::of([1]);
    let converted = Observable::from(&observable);
    assert!(converted.ptr_eq(&observable));
    assert!(Observable::from(&converted).ptr_eq(&observable));
    assert!(!Observable::of([1]).ptr_eq(&observable));
  }

  #[multitude_macro::test]
  fn from_like_delegates_subscribe() {
    struct Like;
    impl Subscribable<i32> for Like {
      fn subscribe_observer(&self, observer: Observer<i32>) -> Subscription {
        Observable::of([7, 8]).subscribe(observer)
      }
    }

    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    Observable::from_like(Like).subscribe(move |v| c_seen.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), vec![7, 8]);
  }

  #[multitude_macro::test]
  fn failing_subscriber_reaches_error_callback() {
    let failure = Rc::new(RefCell::new(None));
    let c_failure = failure.clone();
    let subscription = Observable::<i32>::new(|_| -> Result<()> { Err(Error::msg("nope")) })
      .subscribe(Observer::new().on_error(move |err| *c_failure.borrow_mut() = Some(err.to_string())));
    assert!(subscription.is_closed());
    assert_eq!(failure.borrow().as_deref(), Some("nope"));
  }

  #[multitude_macro::test]
  fn pipe_applies_operator() {
    let count = Observable::of([1, 2, 3]).pipe(|source| {
      let n = Rc::new(Cell::new(0));
      let c_n = n.clone();
      source.to_observable().subscribe(move |_| c_n.set(c_n.get() + 1));
      n.get()
    });
    assert_eq!(count, 3);
  }
}
