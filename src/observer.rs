//! Observer capability set and the listener trait used by fan-out helpers.
//!
//! An [`Observer`] is a bag of optional callbacks: `start`, `next`, `error`
//! and `complete`. A missing callback is not an error, a callback that returns
//! `Err` is. Every callback comes in two flavours: `on_*` takes a plain closure,
//! `try_*` takes a closure returning [`Result`] whose `Err` is routed to the
//! unhandled-error hook (or to a talkback's `on_error`).

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
  error::{Error, Result},
  subscription::Subscription,
};

// ============================================================================
// Signals
// ============================================================================

/// The four kinds of notification an observer can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Start,
  Next,
  Error,
  Complete,
}

/// One notification, with its payload.
#[derive(Clone)]
pub enum Signal<T> {
  Start(Subscription),
  Next(T),
  Error(Error),
  Complete,
}

impl<T> Signal<T> {
  pub fn action(&self) -> Action {
    match self {
      Signal::Start(_) => Action::Start,
      Signal::Next(_) => Action::Next,
      Signal::Error(_) => Action::Error,
      Signal::Complete => Action::Complete,
    }
  }

  /// `error` and `complete` end a subscription.
  pub fn is_terminal(&self) -> bool { matches!(self, Signal::Error(_) | Signal::Complete) }
}

impl<T> fmt::Debug for Signal<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Signal::Start(subscription) => f.debug_tuple("Start").field(subscription).finish(),
      Signal::Next(_) => f.write_str("Next(..)"),
      Signal::Error(err) => f.debug_tuple("Error").field(err).finish(),
      Signal::Complete => f.write_str("Complete"),
    }
  }
}

// ============================================================================
// ObserverLike
// ============================================================================

/// Anything that can take part in signal delivery.
///
/// `handles` reports whether a member is present; dispatchers check it before
/// calling `deliver`, so an absent member is skipped instead of failing.
/// `deliver` on an absent member is a no-op returning `Ok(())`.
pub trait ObserverLike<T> {
  fn handles(&self, action: Action) -> bool;

  fn deliver(&mut self, signal: Signal<T>) -> Result<()>;
}

impl<T, L> ObserverLike<T> for Box<L>
where
  L: ObserverLike<T> + ?Sized,
{
  #[inline]
  fn handles(&self, action: Action) -> bool { (**self).handles(action) }

  #[inline]
  fn deliver(&mut self, signal: Signal<T>) -> Result<()> { (**self).deliver(signal) }
}

// ============================================================================
// Observer
// ============================================================================

type Callback<A> = Box<dyn FnMut(A) -> Result<()>>;

/// Consumer of a stream: `{ start?, next?, error?, complete? }`.
///
/// ```rust
/// use multitude::prelude::*;
///
/// let observer = Observer::new()
///   .on_next(|v: i32| println!("value {v}"))
///   .on_error(|err| println!("failed: {err}"))
///   .on_complete(|| println!("done"));
///
/// Observable::of([1, 2, 3]).subscribe(observer);
/// ```
pub struct Observer<T> {
  start: Option<Callback<Subscription>>,
  next: Option<Callback<T>>,
  error: Option<Callback<Error>>,
  complete: Option<Callback<()>>,
}

impl<T> Default for Observer<T> {
  fn default() -> Self { Self { start: None, next: None, error: None, complete: None } }
}

impl<T> Observer<T> {
  /// An observer with no members.
  pub fn new() -> Self { Self::default() }

  pub fn on_start(self, mut f: impl FnMut(Subscription) + 'static) -> Self {
    self.try_start(move |s| {
      f(s);
      Ok(())
    })
  }

  pub fn try_start(mut self, f: impl FnMut(Subscription) -> Result<()> + 'static) -> Self {
    self.start = Some(Box::new(f));
    self
  }

  pub fn on_next(self, mut f: impl FnMut(T) + 'static) -> Self {
    self.try_next(move |v| {
      f(v);
      Ok(())
    })
  }

  pub fn try_next(mut self, f: impl FnMut(T) -> Result<()> + 'static) -> Self {
    self.next = Some(Box::new(f));
    self
  }

  pub fn on_error(self, mut f: impl FnMut(Error) + 'static) -> Self {
    self.try_error(move |e| {
      f(e);
      Ok(())
    })
  }

  pub fn try_error(mut self, f: impl FnMut(Error) -> Result<()> + 'static) -> Self {
    self.error = Some(Box::new(f));
    self
  }

  pub fn on_complete(self, mut f: impl FnMut() + 'static) -> Self {
    self.try_complete(move || {
      f();
      Ok(())
    })
  }

  pub fn try_complete(mut self, mut f: impl FnMut() -> Result<()> + 'static) -> Self {
    self.complete = Some(Box::new(move |()| f()));
    self
  }

  /// Adapt any listener into an observer.
  ///
  /// Only the members the listener handles at this point are installed, so
  /// presence checks on the resulting observer match the listener's.
  pub fn from_listener<L>(listener: L) -> Self
  where
    L: ObserverLike<T> + 'static,
    T: 'static,
  {
    let [start, next, error, complete] =
      [Action::Start, Action::Next, Action::Error, Action::Complete].map(|a| listener.handles(a));
    let shared = Rc::new(RefCell::new(listener));
    let mut observer = Self::new();
    if start {
      let l = shared.clone();
      observer = observer.try_start(move |s| l.borrow_mut().deliver(Signal::Start(s)));
    }
    if next {
      let l = shared.clone();
      observer = observer.try_next(move |v| l.borrow_mut().deliver(Signal::Next(v)));
    }
    if error {
      let l = shared.clone();
      observer = observer.try_error(move |e| l.borrow_mut().deliver(Signal::Error(e)));
    }
    if complete {
      observer = observer.try_complete(move || shared.borrow_mut().deliver(Signal::Complete));
    }
    observer
  }
}

impl<T> ObserverLike<T> for Observer<T> {
  fn handles(&self, action: Action) -> bool {
    match action {
      Action::Start => self.start.is_some(),
      Action::Next => self.next.is_some(),
      Action::Error => self.error.is_some(),
      Action::Complete => self.complete.is_some(),
    }
  }

  fn deliver(&mut self, signal: Signal<T>) -> Result<()> {
    match signal {
      Signal::Start(subscription) => self.start.as_mut().map_or(Ok(()), |f| f(subscription)),
      Signal::Next(value) => self.next.as_mut().map_or(Ok(()), |f| f(value)),
      Signal::Error(err) => self.error.as_mut().map_or(Ok(()), |f| f(err)),
      Signal::Complete => self.complete.as_mut().map_or(Ok(()), |f| f(())),
    }
  }
}

impl<T> fmt::Debug for Observer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Observer")
      .field("start", &self.start.is_some())
      .field("next", &self.next.is_some())
      .field("error", &self.error.is_some())
      .field("complete", &self.complete.is_some())
      .finish()
  }
}

// ============================================================================
// IntoObserver
// ============================================================================

/// Everything `subscribe` accepts.
///
/// - an [`Observer`];
/// - a closure, sugar for `Observer::new().on_next(f)`;
/// - `()` or `None`, an observer with no members.
pub trait IntoObserver<T> {
  fn into_observer(self) -> Observer<T>;
}

impl<T> IntoObserver<T> for Observer<T> {
  #[inline]
  fn into_observer(self) -> Observer<T> { self }
}

impl<T> IntoObserver<T> for () {
  #[inline]
  fn into_observer(self) -> Observer<T> { Observer::new() }
}

impl<T> IntoObserver<T> for Option<Observer<T>> {
  #[inline]
  fn into_observer(self) -> Observer<T> { self.unwrap_or_default() }
}

impl<T, F> IntoObserver<T> for F
where
  F: FnMut(T) + 'static,
{
  #[inline]
  fn into_observer(self) -> Observer<T> { Observer::new().on_next(self) }
}
