//! A hot producer that is also a consumer.
//!
//! A [`Subject`] emits directly through `next` / `error` / `complete` to
//! whatever observers are attached at that moment, and remembers the last
//! value it emitted. Calls made after it closed never reach an observer:
//! `next` goes to the stopped-notification hook, `error` to the
//! unhandled-error hook.
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use multitude::prelude::*;
//!
//! let subject = Subject::new();
//! subject.next(1);
//!
//! let seen = Rc::new(RefCell::new(vec![]));
//! let c_seen = seen.clone();
//! subject.subscribe(move |v| c_seen.borrow_mut().push(v));
//! subject.next(2);
//! subject.complete();
//! subject.next(3);
//!
//! assert_eq!(*seen.borrow(), vec![2]);
//! assert_eq!(subject.value(), Some(2));
//! assert!(subject.closed());
//! ```

use std::{
  cell::RefCell,
  fmt,
  rc::{Rc, Weak},
};

use crate::{
  error::{Error, Result},
  observable::{Observable, ObservableCompatible, Subscribable},
  observer::{Action, IntoObserver, Observer, ObserverLike, Signal},
  subscription::{DynamicObservers, Subscription, SubscriptionObserver, Teardown},
  talkback::broadcast,
};

/// Options of [`Subject::from`].
pub struct SubjectOptions<T> {
  /// Initial value. It is not emitted.
  pub value: Option<T>,
}

impl<T> Default for SubjectOptions<T> {
  fn default() -> Self { Self { value: None } }
}

struct Shared<T> {
  value: RefCell<Option<T>>,
  observers: RefCell<DynamicObservers<SubscriptionObserver<T>>>,
  terminal: RefCell<Option<Signal<T>>>,
  /// Subscription feeding a subject built with `Subject::from`.
  bridge: RefCell<Option<Subscription>>,
}

impl<T: Clone + 'static> Shared<T> {
  fn emit(&self, value: T) {
    *self.value.borrow_mut() = Some(value.clone());
    let observers = self.observers.borrow().snapshot();
    broadcast(observers, Signal::Next(value));
  }

  /// Close with `signal`. Fails with the error itself when nobody could
  /// receive it.
  fn terminate(&self, signal: Signal<T>) -> Result<()> {
    *self.terminal.borrow_mut() = Some(signal.clone());
    let observers: Vec<_> = self.observers.borrow_mut().drain().collect();
    let outcome = match signal {
      Signal::Error(err) if observers.is_empty() => Err(err),
      signal => {
        broadcast(observers, signal);
        Ok(())
      }
    };
    let bridge = self.bridge.borrow_mut().take();
    if let Some(bridge) = bridge {
      bridge.unsubscribe();
    }
    outcome
  }

  fn attach(this: &Rc<Self>, observer: SubscriptionObserver<T>) -> Teardown {
    let terminal = this.terminal.borrow().clone();
    match terminal {
      Some(Signal::Error(err)) => observer.error(err),
      Some(_) => observer.complete(),
      None => {
        let id = this.observers.borrow_mut().add(observer);
        let weak = Rc::downgrade(this);
        return Teardown::new(move || {
          if let Some(shared) = weak.upgrade() {
            let released = shared.observers.borrow_mut().remove(id);
            drop(released);
          }
        });
      }
    }
    Teardown::empty()
  }
}

/// Multicast with direct emission and last-value memory.
///
/// Clones share the same observers, value and state.
pub struct Subject<T> {
  shared: Rc<Shared<T>>,
  emitter: SubscriptionObserver<T>,
  observable: Observable<T>,
}

impl<T> Clone for Subject<T> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      emitter: self.emitter.clone(),
      observable: self.observable.clone(),
    }
  }
}

impl<T: Clone + 'static> Default for Subject<T> {
  fn default() -> Self { Self::build(None) }
}

impl<T: Clone + 'static> Subject<T> {
  pub fn new() -> Self { Self::default() }

  /// A subject whose `value` starts as `value`. Nothing is emitted.
  pub fn with_value(value: T) -> Self { Self::build(Some(value)) }

  /// Same as [`Subject::with_value`].
  pub fn of(item: T) -> Self { Self::with_value(item) }

  /// A subject fed by `source`.
  ///
  /// Values `source` emits while being subscribed update `value` but reach no
  /// observer, since none can be attached yet. The subscription to `source`
  /// is released once the subject terminates, whichever side ended it.
  #[allow(clippy::should_implement_trait)]
  pub fn from<C>(source: &C, options: SubjectOptions<T>) -> Self
  where
    C: ObservableCompatible<T> + ?Sized,
  {
    let subject = Self::build(options.value);
    let bridge = source.to_observable().subscribe(subject.emitter.clone());
    if subject.closed() {
      bridge.unsubscribe();
    } else {
      *subject.shared.bridge.borrow_mut() = Some(bridge);
    }
    subject
  }

  fn build(value: Option<T>) -> Self {
    let shared = Rc::new(Shared {
      value: RefCell::new(value),
      observers: RefCell::new(DynamicObservers::new()),
      terminal: RefCell::new(None),
      bridge: RefCell::new(None),
    });

    let weak: Weak<Shared<T>> = Rc::downgrade(&shared);
    let (on_error, on_complete) = (weak.clone(), weak.clone());
    let fan_out = Observer::new()
      .on_next(move |value: T| {
        if let Some(shared) = weak.upgrade() {
          shared.emit(value);
        }
      })
      .try_error(move |err| match on_error.upgrade() {
        Some(shared) => shared.terminate(Signal::Error(err)),
        None => Err(err),
      })
      .try_complete(move || match on_complete.upgrade() {
        Some(shared) => shared.terminate(Signal::Complete),
        None => Ok(()),
      });

    let attach = shared.clone();
    Self {
      shared,
      emitter: SubscriptionObserver::bind(fan_out),
      observable: Observable::new(move |observer| Shared::attach(&attach, observer)),
    }
  }

  pub fn next(&self, value: T) { self.emitter.next(value) }

  /// Error every attached observer and close. With no observer attached the
  /// error goes to the unhandled-error hook.
  pub fn error(&self, err: Error) { self.emitter.error(err) }

  pub fn complete(&self) { self.emitter.complete() }

  /// Last value emitted, or the initial value.
  pub fn value(&self) -> Option<T> { self.shared.value.borrow().clone() }

  pub fn closed(&self) -> bool { self.emitter.is_closed() }

  pub fn observer_count(&self) -> usize { self.shared.observers.borrow().len() }

  pub fn subscribe(&self, observer: impl IntoObserver<T>) -> Subscription {
    self.observable.subscribe(observer)
  }
}

impl<T> ObservableCompatible<T> for Subject<T> {
  fn to_observable(&self) -> Observable<T> { self.observable.clone() }
}

impl<T: Clone + 'static> Subscribable<T> for Subject<T> {
  fn subscribe_observer(&self, observer: Observer<T>) -> Subscription { self.subscribe(observer) }
}

impl<T: Clone + 'static> ObserverLike<T> for Subject<T> {
  fn handles(&self, action: Action) -> bool { action != Action::Start }

  fn deliver(&mut self, signal: Signal<T>) -> Result<()> {
    match signal {
      Signal::Start(_) => {}
      Signal::Next(value) => self.next(value),
      Signal::Error(err) => self.error(err),
      Signal::Complete => self.complete(),
    }
    Ok(())
  }
}

impl<T: Clone + 'static> IntoObserver<T> for Subject<T> {
  fn into_observer(self) -> Observer<T> { Observer::from_listener(self) }
}

impl<T> fmt::Debug for Subject<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subject")
      .field("observers", &self.shared.observers.borrow().len())
      .field("closed", &self.emitter.is_closed())
      .finish()
  }
}
