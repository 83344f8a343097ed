//! Primitives that operators are built from.
//!
//! `operate` covers the common shape: a new observable whose activation
//! subscribes the source through an intercepting observer. The intercepting
//! observer handles whatever it cares about; terminal signals it leaves out
//! fall through to the downstream observer.

use std::{fmt, rc::Rc};

use crate::{
  error::Result,
  observable::{Observable, ObservableCompatible},
  observer::{Action, Observer, ObserverLike, Signal},
  subscription::{Subscription, SubscriptionObserver, Teardown},
  talkback::{Talkback, TalkbackOptions},
};

/// Lift a function over observables into one accepting anything
/// [`ObservableCompatible`].
pub fn transform<T, R, F>(f: F) -> impl Fn(&dyn ObservableCompatible<T>) -> R
where
  F: Fn(Observable<T>) -> R,
{
  move |source: &dyn ObservableCompatible<T>| f(source.to_observable())
}

pub struct InterceptOptions<T, U> {
  /// Receives the source's signals first.
  pub between: Observer<T>,
  /// Gets the terminal signals `between` does not handle, and any error
  /// raised by `between` itself.
  pub to: SubscriptionObserver<U>,
}

/// Subscribe `source` with `options.between` in front of `options.to`.
pub fn intercept<T, U, C>(source: &C, options: InterceptOptions<T, U>) -> Subscription
where
  T: Clone + 'static,
  U: 'static,
  C: ObservableCompatible<T> + ?Sized,
{
  let InterceptOptions { between, to } = options;
  let on_error = to.clone();
  let talkback = Talkback::new(
    TalkbackOptions::default()
      .stop_at_first(true)
      .on_error(move |err| on_error.error(err)),
  )
  .with(between)
  .with(Terminals(to));
  source.to_observable().subscribe(talkback)
}

/// Forwards only terminal signals, so it can sit behind an observer of a
/// different item type.
struct Terminals<U>(SubscriptionObserver<U>);

impl<T, U: 'static> ObserverLike<T> for Terminals<U> {
  fn handles(&self, action: Action) -> bool { matches!(action, Action::Error | Action::Complete) }

  fn deliver(&mut self, signal: Signal<T>) -> Result<()> {
    match signal {
      Signal::Error(err) => self.0.error(err),
      Signal::Complete => self.0.complete(),
      Signal::Start(_) | Signal::Next(_) => {}
    }
    Ok(())
  }
}

/// The intercepting observer of an [`operate`] activation, with an optional
/// cleanup run after the source subscription is released.
pub struct OperationObserver<T> {
  pub observer: Observer<T>,
  pub teardown: Teardown,
}

impl<T> OperationObserver<T> {
  pub fn new(observer: Observer<T>) -> Self { Self { observer, teardown: Teardown::empty() } }

  pub fn with_teardown(mut self, teardown: Teardown) -> Self {
    self.teardown = teardown;
    self
  }
}

impl<T> From<Observer<T>> for OperationObserver<T> {
  fn from(observer: Observer<T>) -> Self { Self::new(observer) }
}

impl<T> fmt::Debug for OperationObserver<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OperationObserver")
      .field("observer", &self.observer)
      .field("teardown", &self.teardown)
      .finish()
  }
}

/// Build an operator from a function that, given the downstream observer,
/// returns the observer to subscribe the source with.
///
/// Only terminal signals fall through to the downstream observer. Values
/// reach it only through the returned observer's `next`, since source and
/// downstream item types may differ; an observer without `next` drops them.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use multitude::prelude::*;
///
/// let double = operate(|to: SubscriptionObserver<i32>| {
///   OperationObserver::new(Observer::new().on_next(move |v: i32| to.next(v * 2)))
/// });
///
/// let seen = Rc::new(RefCell::new(vec![]));
/// let c_seen = seen.clone();
/// Observable::of([1, 2, 3])
///   .pipe(double)
///   .subscribe(move |v| c_seen.borrow_mut().push(v));
/// assert_eq!(*seen.borrow(), vec![2, 4, 6]);
/// ```
pub fn operate<T, U, F>(operation: F) -> impl Fn(&dyn ObservableCompatible<T>) -> Observable<U>
where
  T: Clone + 'static,
  U: 'static,
  F: Fn(SubscriptionObserver<U>) -> OperationObserver<T> + 'static,
{
  let operation = Rc::new(operation);
  transform(move |source: Observable<T>| {
    let operation = operation.clone();
    Observable::new(move |to: SubscriptionObserver<U>| {
      let OperationObserver { observer, teardown } = operation(to.clone());
      let subscription = intercept(&source, InterceptOptions { between: observer, to });
      move || {
        subscription.unsubscribe();
        teardown.run(&subscription);
      }
    })
  })
}
