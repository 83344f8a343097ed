//! Fan-out of one signal to an ordered list of listeners.
//!
//! A listener that lacks the member being dispatched is skipped. A listener
//! whose member fails has its error handed to `on_error` and dispatch moves on
//! to the next listener, unless `stop_at_first` is set, in which case dispatch
//! ends after the first listener that has the member, failed or not.
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use multitude::prelude::*;
//!
//! let seen = Rc::new(RefCell::new(vec![]));
//! let c_seen = seen.clone();
//! let talkback = Talkback::new(TalkbackOptions::default())
//!   .with(Observer::new().try_next(|_: i32| Err(Error::msg("first listener broke"))))
//!   .with(Observer::new().on_next(move |v| c_seen.borrow_mut().push(v)));
//!
//! talkback.next(1);
//! assert_eq!(*seen.borrow(), vec![1]);
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
  error::{Error, Result},
  observer::{Action, IntoObserver, Observer, ObserverLike, Signal},
  subscription::{Subscription, SubscriptionObserver},
};

pub type TalkbackErrorHandler = Rc<dyn Fn(Error)>;

#[derive(Clone, Default)]
pub struct TalkbackOptions {
  /// End dispatch after the first listener that has the member.
  pub stop_at_first: bool,
  /// Receives errors of failing listeners. Defaults to logging them.
  pub on_error: Option<TalkbackErrorHandler>,
}

impl TalkbackOptions {
  pub fn stop_at_first(mut self, stop: bool) -> Self {
    self.stop_at_first = stop;
    self
  }

  pub fn on_error(mut self, f: impl Fn(Error) + 'static) -> Self {
    self.on_error = Some(Rc::new(f));
    self
  }
}

impl fmt::Debug for TalkbackOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TalkbackOptions")
      .field("stop_at_first", &self.stop_at_first)
      .field("on_error", &self.on_error.is_some())
      .finish()
  }
}

/// An ordered list of listeners receiving every dispatched signal.
///
/// Cloning a talkback shares its listeners.
pub struct Talkback<T> {
  items: Rc<RefCell<Vec<Box<dyn ObserverLike<T>>>>>,
  options: TalkbackOptions,
}

impl<T> Clone for Talkback<T> {
  fn clone(&self) -> Self { Self { items: self.items.clone(), options: self.options.clone() } }
}

impl<T: Clone + 'static> Talkback<T> {
  pub fn new(options: TalkbackOptions) -> Self {
    Self { items: Rc::new(RefCell::new(vec![])), options }
  }

  /// Append a listener.
  pub fn with(self, listener: impl ObserverLike<T> + 'static) -> Self {
    self.items.borrow_mut().push(Box::new(listener));
    self
  }

  pub fn len(&self) -> usize { self.items.borrow().len() }

  pub fn is_empty(&self) -> bool { self.items.borrow().is_empty() }

  pub fn start(&self, subscription: Subscription) { self.dispatch(Signal::Start(subscription)) }

  pub fn next(&self, value: T) { self.dispatch(Signal::Next(value)) }

  pub fn error(&self, err: Error) { self.dispatch(Signal::Error(err)) }

  pub fn complete(&self) { self.dispatch(Signal::Complete) }

  pub(crate) fn dispatch(&self, signal: Signal<T>) {
    let action = signal.action();
    let mut index = 0;
    loop {
      // Each listener is taken out for the duration of its call so it may
      // dispatch into this talkback again.
      let mut listener = {
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
          break;
        }
        std::mem::replace(&mut items[index], Box::new(Vacant))
      };
      let handled = listener.handles(action);
      let outcome = if handled { listener.deliver(signal.clone()) } else { Ok(()) };
      if let Some(slot) = self.items.borrow_mut().get_mut(index) {
        *slot = listener;
      }
      if let Err(err) = outcome {
        self.report(err);
      }
      if handled && self.options.stop_at_first {
        break;
      }
      index += 1;
    }
  }

  fn report(&self, err: Error) {
    match &self.options.on_error {
      Some(on_error) => on_error(err),
      None => tracing::error!(error = %err, "talkback listener failed"),
    }
  }
}

/// Send `signal` to every observer in order.
pub(crate) fn broadcast<T>(observers: Vec<SubscriptionObserver<T>>, signal: Signal<T>)
where
  T: Clone + 'static,
{
  if observers.is_empty() {
    return;
  }
  observers
    .into_iter()
    .fold(Talkback::new(TalkbackOptions::default()), |talkback, observer| talkback.with(observer))
    .dispatch(signal);
}

struct Vacant;

impl<T> ObserverLike<T> for Vacant {
  fn handles(&self, _: Action) -> bool { false }

  fn deliver(&mut self, _: Signal<T>) -> Result<()> { Ok(()) }
}

impl<T: Clone + 'static> ObserverLike<T> for Talkback<T> {
  fn handles(&self, _: Action) -> bool { true }

  fn deliver(&mut self, signal: Signal<T>) -> Result<()> {
    self.dispatch(signal);
    Ok(())
  }
}

impl<T: Clone + 'static> IntoObserver<T> for Talkback<T> {
  fn into_observer(self) -> Observer<T> { Observer::from_listener(self) }
}

impl<T> fmt::Debug for Talkback<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Talkback")
      .field("listeners", &self.items.borrow().len())
      .field("options", &self.options)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn failing_next(calls: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Observer<i32> {
    let calls = calls.clone();
    Observer::new().try_next(move |_| {
      calls.borrow_mut().push(name);
      Err(Error::msg(name))
    })
  }

  fn recording_next(calls: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Observer<i32> {
    let calls = calls.clone();
    Observer::new().on_next(move |_| calls.borrow_mut().push(name))
  }

  #[multitude_macro::test]
  fn failing_listener_does_not_stop_dispatch() {
    let calls = Rc::new(RefCell::new(vec![]));
    let errors = Rc::new(RefCell::new(vec![]));
    let c_errors = errors.clone();
    let talkback = Talkback::new(
      TalkbackOptions::default().on_error(move |err| c_errors.borrow_mut().push(err.to_string())),
    )
    .with(failing_next(&calls, "first"))
    .with(recording_next(&calls, "second"));

    talkback.next(1);
    assert_eq!(*calls.borrow(), vec!["first", "second"]);
    assert_eq!(*errors.borrow(), vec!["first".to_string()]);
  }

  #[multitude_macro::test]
  fn stop_at_first_skips_listeners_without_member() {
    let calls = Rc::new(RefCell::new(vec![]));
    let talkback = Talkback::new(TalkbackOptions::default().stop_at_first(true))
      .with(Observer::<i32>::new().on_complete(|| {}))
      .with(failing_next(&calls, "first"))
      .with(recording_next(&calls, "second"));

    talkback.next(1);
    assert_eq!(*calls.borrow(), vec!["first"]);
  }

  #[multitude_macro::test]
  fn missing_members_are_not_errors() {
    let errors = Rc::new(RefCell::new(0));
    let c_errors = errors.clone();
    let talkback = Talkback::<i32>::new(
      TalkbackOptions::default().on_error(move |_| *c_errors.borrow_mut() += 1),
    )
    .with(Observer::new())
    .with(Observer::new());

    talkback.start(Subscription::closed());
    talkback.next(1);
    talkback.error(Error::msg("ignored"));
    talkback.complete();
    assert_eq!(*errors.borrow(), 0);
  }

  #[multitude_macro::test]
  fn nested_talkbacks_forward() {
    let calls = Rc::new(RefCell::new(vec![]));
    let inner = Talkback::new(TalkbackOptions::default()).with(recording_next(&calls, "inner"));
    let outer =
      Talkback::new(TalkbackOptions::default()).with(inner).with(recording_next(&calls, "outer"));

    outer.next(1);
    assert_eq!(*calls.borrow(), vec!["inner", "outer"]);
    assert_eq!(outer.len(), 2);
  }
}
