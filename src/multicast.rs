//! One upstream activation shared by many downstream observers.
//!
//! A [`Multicast`] asks a policy, on construction and on every downstream
//! subscribe and unsubscribe, whether it should be connected upstream and how
//! many values to replay to newcomers. The answers drive a
//! [`MulticastState`] machine.
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use multitude::prelude::*;
//!
//! let source = Observable::of([1, 2, 3, 4, 5]);
//! let multicast = Multicast::from(&source, MulticastOptions::handler(|_| Params {
//!   connect: true,
//!   replay: 2,
//! }));
//!
//! let late = Rc::new(RefCell::new(vec![]));
//! let c_late = late.clone();
//! multicast.subscribe(move |v| c_late.borrow_mut().push(v));
//! assert_eq!(*late.borrow(), vec![4, 5]);
//! ```

use std::{
  cell::{Cell, RefCell},
  fmt,
  rc::{Rc, Weak},
};

use crate::{
  error::Error,
  observable::{Observable, ObservableCompatible, Subscribable},
  observer::{IntoObserver, Observer, Signal},
  subscription::{IntoTeardown, Subscription, SubscriptionObserver, Teardown},
  talkback::broadcast,
};

pub mod replay;
pub mod state;

pub use replay::MulticastReplay;
pub use state::{MulticastState, Transition};

/// What prompted a policy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  Start,
  Subscribe,
  Unsubscribe,
}

/// Where the upstream connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
  Unsubscribe,
  Subscribe,
  Error,
  Complete,
  /// Never reported to a policy: a terminated multicast stops asking.
  Terminate,
}

/// Input of a multicast policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerState {
  pub event: Event,
  pub source: SourceState,
  /// Live downstream observers, counted before an unsubscribing one leaves.
  pub subscriptions: usize,
}

/// Decision of a multicast policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
  pub connect: bool,
  /// Values replayed to new observers. `usize::MAX` replays everything.
  pub replay: usize,
}

pub type MulticastHandler = Rc<dyn Fn(HandlerState) -> Params>;

#[derive(Clone, Default)]
pub enum MulticastOptions {
  /// Always connected, no replay.
  #[default]
  Default,
  /// Always connected, replaying the given number of values.
  Replay(usize),
  /// Custom policy.
  Handler(MulticastHandler),
}

impl MulticastOptions {
  pub fn handler(f: impl Fn(HandlerState) -> Params + 'static) -> Self {
    Self::Handler(Rc::new(f))
  }
}

impl fmt::Debug for MulticastOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Default => f.write_str("Default"),
      Self::Replay(n) => f.debug_tuple("Replay").field(n).finish(),
      Self::Handler(_) => f.write_str("Handler(..)"),
    }
  }
}

// ============================================================================
// Shared core
// ============================================================================

struct Inner<T> {
  state: RefCell<MulticastState<T>>,
  options: MulticastOptions,
  source: Observable<T>,
  epoch: Cell<u64>,
  next_id: Cell<usize>,
}

impl<T: Clone + 'static> Inner<T> {
  fn params(&self, event: Event) -> Params {
    let state = {
      let state = self.state.borrow();
      if state.is_terminated() {
        return Params { connect: false, replay: 0 };
      }
      HandlerState { event, source: state.source(), subscriptions: state.subscriptions() }
    };
    match &self.options {
      MulticastOptions::Default => Params { connect: true, replay: 0 },
      MulticastOptions::Replay(replay) => Params { connect: true, replay: *replay },
      MulticastOptions::Handler(handler) => handler(state),
    }
  }

  fn update(&self, params: Params) -> Transition<T> {
    let epoch = self.epoch.get() + 1;
    self.epoch.set(epoch);
    self.state.borrow_mut().update(params, epoch)
  }

  /// Carry out a transition caused by a start or unsubscribe event.
  fn apply(this: &Rc<Self>, transition: Transition<T>) {
    match transition {
      Transition::Connect { epoch } => Self::connect(this, epoch),
      Transition::Disconnect { upstream, observers } => Self::disconnect(upstream, observers),
      Transition::Terminate => tracing::debug!("multicast terminated"),
      _ => {}
    }
  }

  fn connect(this: &Rc<Self>, epoch: u64) {
    tracing::debug!(epoch, "multicast connecting upstream");
    let weak = Rc::downgrade(this);
    let (on_next, on_error, on_complete) = (weak.clone(), weak.clone(), weak.clone());
    let observer = Observer::new()
      .on_start(move |subscription: Subscription| {
        let attached =
          weak.upgrade().is_some_and(|inner| inner.attach_upstream(epoch, subscription.clone()));
        if !attached {
          subscription.unsubscribe();
        }
      })
      .on_next(move |value: T| {
        if let Some(inner) = on_next.upgrade() {
          inner.forward(epoch, value);
        }
      })
      .on_error(move |err| {
        if let Some(inner) = on_error.upgrade() {
          inner.finish(epoch, Some(err));
        }
      })
      .on_complete(move || {
        if let Some(inner) = on_complete.upgrade() {
          inner.finish(epoch, None);
        }
      });
    this.source.subscribe(observer);
  }

  fn attach_upstream(&self, epoch: u64, upstream: Subscription) -> bool {
    self.state.borrow_mut().attach_upstream(epoch, upstream)
  }

  fn disconnect(upstream: Option<Subscription>, observers: Vec<SubscriptionObserver<T>>) {
    tracing::debug!(observers = observers.len(), "multicast disconnecting upstream");
    if let Some(upstream) = upstream {
      upstream.unsubscribe();
    }
    broadcast(observers, Signal::Error(Error::NotConnected));
  }

  fn forward(&self, epoch: u64, value: T) {
    let observers = self.state.borrow_mut().push(epoch, value.clone());
    if let Some(observers) = observers {
      broadcast(observers, Signal::Next(value));
    }
  }

  fn finish(&self, epoch: u64, error: Option<Error>) {
    let signal = match &error {
      Some(err) => Signal::Error(err.clone()),
      None => Signal::Complete,
    };
    let observers = self.state.borrow_mut().finalize(epoch, error);
    if let Some(observers) = observers {
      tracing::debug!(epoch, observers = observers.len(), "multicast upstream finished");
      broadcast(observers, signal);
    }
  }

  /// Downstream subscribe.
  fn attach(this: &Rc<Self>, observer: SubscriptionObserver<T>) -> Teardown {
    let params = this.params(Event::Subscribe);
    let id = this.next_id.get();
    this.next_id.set(id + 1);

    match this.update(params) {
      Transition::Connect { epoch } => {
        this.state.borrow_mut().insert(id, observer);
        Self::connect(this, epoch);
      }
      Transition::KeepSubscribe => {
        let values = this.state.borrow().replay_values();
        for value in values {
          observer.next(value);
        }
        if observer.is_closed() {
          return Teardown::empty();
        }
        let inserted = this.state.borrow_mut().insert(id, observer.clone());
        if !inserted {
          this.deliver_final(&observer);
        }
      }
      Transition::KeepFinal => {
        let values = this.state.borrow().replay_values();
        for value in values {
          observer.next(value);
        }
        this.deliver_final(&observer);
      }
      Transition::Disconnect { upstream, observers } => {
        Self::disconnect(upstream, observers);
        observer.error(Error::NotConnected);
      }
      Transition::Terminate => {
        tracing::debug!("multicast terminated");
        observer.error(Error::NotConnected);
      }
      Transition::KeepUnsubscribe | Transition::KeepTerminate => observer.error(Error::NotConnected),
    }

    let weak: Weak<Self> = Rc::downgrade(this);
    Teardown::new(move || {
      if let Some(inner) = weak.upgrade() {
        Self::detach(&inner, id);
      }
    })
  }

  /// Downstream unsubscribe.
  fn detach(this: &Rc<Self>, id: usize) {
    let params = this.params(Event::Unsubscribe);
    let released = this.state.borrow_mut().remove(id);
    drop(released);
    let transition = this.update(params);
    Self::apply(this, transition);
  }

  fn deliver_final(&self, observer: &SubscriptionObserver<T>) {
    let signal = self.state.borrow().final_signal();
    match signal {
      Some(Signal::Error(err)) => observer.error(err),
      Some(Signal::Complete) => observer.complete(),
      _ => {}
    }
  }
}

// ============================================================================
// Multicast
// ============================================================================

/// An observable sharing one upstream activation across its observers.
pub struct Multicast<T> {
  inner: Rc<Inner<T>>,
  observable: Observable<T>,
}

impl<T> Clone for Multicast<T> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone(), observable: self.observable.clone() } }
}

impl<T: Clone + 'static> Multicast<T> {
  /// Multicast the activations of `subscriber` under `options`.
  ///
  /// The policy is asked right away with `Event::Start`; an always-connected
  /// multicast subscribes upstream before `new` returns.
  pub fn new<F, R>(subscriber: F, options: MulticastOptions) -> Self
  where
    F: Fn(SubscriptionObserver<T>) -> R + 'static,
    R: IntoTeardown,
  {
    Self::with_source(Observable::new(subscriber), options)
  }

  /// A connected multicast replaying `items`. It never completes.
  pub fn of(items: impl IntoIterator<Item = T>) -> Self {
    let items: Vec<T> = items.into_iter().collect();
    let replay = items.len();
    Self::new(
      move |observer| {
        for item in items.iter().cloned() {
          observer.next(item);
        }
      },
      MulticastOptions::Replay(replay),
    )
  }

  /// Multicast any convertible source.
  #[allow(clippy::should_implement_trait)]
  pub fn from<C>(source: &C, options: MulticastOptions) -> Self
  where
    C: ObservableCompatible<T> + ?Sized,
  {
    Self::with_source(source.to_observable(), options)
  }

  fn with_source(source: Observable<T>, options: MulticastOptions) -> Self {
    let inner = Rc::new(Inner {
      state: RefCell::new(MulticastState::default()),
      options,
      source,
      epoch: Cell::new(0),
      next_id: Cell::new(0),
    });
    let attach = inner.clone();
    let observable = Observable::new(move |observer| Inner::attach(&attach, observer));

    let params = inner.params(Event::Start);
    let transition = inner.update(params);
    Inner::apply(&inner, transition);
    Self { inner, observable }
  }

  pub fn subscribe(&self, observer: impl IntoObserver<T>) -> Subscription {
    self.observable.subscribe(observer)
  }

  /// Last value multicast by the current connection or final state.
  pub fn value(&self) -> Option<T> { self.inner.state.borrow().value() }

  pub fn source_state(&self) -> SourceState { self.inner.state.borrow().source() }

  /// Observers attached to the live connection.
  pub fn subscriber_count(&self) -> usize { self.inner.state.borrow().subscriptions() }
}

impl<T> ObservableCompatible<T> for Multicast<T> {
  fn to_observable(&self) -> Observable<T> { self.observable.clone() }
}

impl<T: Clone + 'static> Subscribable<T> for Multicast<T> {
  fn subscribe_observer(&self, observer: Observer<T>) -> Subscription { self.subscribe(observer) }
}

impl<T> fmt::Debug for Multicast<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Multicast").field("options", &self.inner.options).finish()
  }
}
