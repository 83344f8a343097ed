use std::{
  cell::{Cell, RefCell},
  collections::VecDeque,
  fmt,
  rc::Rc,
};

use super::{Lifecycle, Subscription, Teardown};
use crate::{
  error::{Error, Result},
  hooks,
  observer::{Action, IntoObserver, Observer, ObserverLike, Signal},
};

struct Core<T> {
  closed: Cell<bool>,
  observer: RefCell<Option<Observer<T>>>,
  teardown: RefCell<Teardown>,
  // Set while a signal is being delivered; re-entrant signals wait in
  // `pending` and are delivered in order once the running one returns.
  busy: Cell<bool>,
  pending: RefCell<VecDeque<Signal<T>>>,
}

impl<T> Lifecycle for Core<T> {
  fn is_closed(&self) -> bool { self.closed.get() }

  fn close(&self) {
    self.closed.set(true);
    let released = self.observer.borrow_mut().take();
    drop(released);
  }

  fn take_teardown(&self) -> Teardown { std::mem::take(&mut *self.teardown.borrow_mut()) }
}

/// Producer-side handle of a subscription.
///
/// A subscriber function receives one and emits through it. Emission after
/// the subscription closed never reaches the observer: `next` goes to the
/// stopped-notification hook, `error` to the unhandled-error hook.
pub struct SubscriptionObserver<T> {
  core: Rc<Core<T>>,
}

impl<T> Clone for SubscriptionObserver<T> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T> SubscriptionObserver<T> {
  #[inline]
  pub fn is_closed(&self) -> bool { self.core.closed.get() }

  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.core, &other.core) }
}

impl<T: 'static> SubscriptionObserver<T> {
  /// A handle bound to `observer` with no subscriber function behind it.
  pub(crate) fn bind(observer: Observer<T>) -> Self {
    let core = Core {
      closed: Cell::new(false),
      observer: RefCell::new(Some(observer)),
      teardown: RefCell::new(Teardown::empty()),
      busy: Cell::new(false),
      pending: RefCell::new(VecDeque::new()),
    };
    Self { core: Rc::new(core) }
  }

  #[inline]
  pub fn next(&self, value: T) { self.dispatch(Signal::Next(value)) }

  #[inline]
  pub fn error(&self, err: Error) { self.dispatch(Signal::Error(err)) }

  #[inline]
  pub fn complete(&self) { self.dispatch(Signal::Complete) }

  /// The subscription this handle emits into.
  pub fn subscription(&self) -> Subscription { Subscription(self.core.clone()) }

  fn dispatch(&self, signal: Signal<T>) {
    self.core.pending.borrow_mut().push_back(signal);
    if self.core.busy.replace(true) {
      return;
    }
    loop {
      let signal = self.core.pending.borrow_mut().pop_front();
      let Some(signal) = signal else { break };
      self.invoke(signal);
    }
    self.core.busy.set(false);
  }

  fn invoke(&self, signal: Signal<T>) {
    let core = &self.core;
    let subscription = self.subscription();
    if core.closed.get() {
      match signal {
        Signal::Next(value) => hooks::stopped_notification(&value, &subscription),
        Signal::Error(err) => hooks::unhandled_error(err, &subscription),
        Signal::Start(_) | Signal::Complete => {}
      }
      return;
    }

    let terminal = signal.is_terminal();
    if terminal {
      core.closed.set(true);
    }
    let observer = core.observer.borrow_mut().take();
    match observer {
      Some(mut observer) => {
        if observer.handles(signal.action()) {
          if let Err(err) = observer.deliver(signal) {
            hooks::unhandled_error(err, &subscription);
          }
        } else if let Signal::Error(err) = signal {
          hooks::unhandled_error(err, &subscription);
        }
        // An unsubscribe from inside the callback closed us meanwhile.
        if !core.closed.get() {
          *core.observer.borrow_mut() = Some(observer);
        }
      }
      None => {
        if let Signal::Error(err) = signal {
          hooks::unhandled_error(err, &subscription);
        }
      }
    }
    if terminal {
      subscription.unsubscribe();
    }
  }
}

impl<T> fmt::Debug for SubscriptionObserver<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SubscriptionObserver").field("closed", &self.core.closed.get()).finish()
  }
}

impl<T: 'static> ObserverLike<T> for SubscriptionObserver<T> {
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

impl<T: 'static> IntoObserver<T> for SubscriptionObserver<T> {
  fn into_observer(self) -> Observer<T> { Observer::from_listener(self) }
}

/// Run one activation: bind `observer`, send it `start`, then invoke the
/// subscriber function unless `start` already closed the subscription.
pub(crate) fn activate<T: 'static>(
  observer: Observer<T>,
  subscriber: &dyn Fn(SubscriptionObserver<T>) -> Result<Teardown>,
) -> Subscription {
  let emitter = SubscriptionObserver::bind(observer);
  let subscription = emitter.subscription();
  emitter.dispatch(Signal::Start(subscription.clone()));
  if emitter.is_closed() {
    return subscription;
  }

  let teardown = subscriber(emitter.clone()).unwrap_or_else(|err| {
    emitter.error(err);
    Teardown::empty()
  });
  if emitter.is_closed() {
    teardown.run(&subscription);
  } else {
    *emitter.core.teardown.borrow_mut() = teardown;
  }
  subscription
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hooks::Hooks;

  type Log = Rc<RefCell<Vec<String>>>;

  fn recorder(log: &Log) -> Observer<i32> {
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    Observer::new()
      .on_next(move |v| n.borrow_mut().push(format!("next {v}")))
      .on_error(move |err| e.borrow_mut().push(format!("error {err}")))
      .on_complete(move || c.borrow_mut().push("complete".into()))
  }

  fn capture_hooks() -> Log {
    let log: Log = Rc::new(RefCell::new(vec![]));
    let (u, s) = (log.clone(), log.clone());
    hooks::configure(Some(
      Hooks::new()
        .on_unhandled_error(move |err, _| u.borrow_mut().push(format!("unhandled {err}")))
        .on_stopped_notification(move |value, _| {
          let value = value.downcast_ref::<i32>().copied().unwrap_or_default();
          s.borrow_mut().push(format!("stopped {value}"));
        }),
    ));
    log
  }

  #[multitude_macro::test]
  fn at_most_one_terminal() {
    let hook_log = capture_hooks();
    let log: Log = Rc::new(RefCell::new(vec![]));
    let subscription = activate(recorder(&log), &|obs| {
      obs.next(1);
      obs.complete();
      obs.complete();
      obs.error(Error::msg("late"));
      obs.next(2);
      Ok(Teardown::empty())
    });

    assert!(subscription.is_closed());
    assert_eq!(*log.borrow(), vec!["next 1", "complete"]);
    assert_eq!(*hook_log.borrow(), vec!["unhandled late", "stopped 2"]);
  }

  #[multitude_macro::test]
  fn error_without_handler_is_unhandled() {
    let hook_log = capture_hooks();
    let subscription = activate(Observer::<i32>::new(), &|obs| {
      obs.error(Error::msg("lost"));
      Ok(Teardown::empty())
    });
    assert!(subscription.is_closed());
    assert_eq!(*hook_log.borrow(), vec!["unhandled lost"]);
  }

  fn counting_teardown(runs: &Rc<Cell<u32>>) -> Teardown {
    let runs = runs.clone();
    Teardown::new(move || runs.set(runs.get() + 1))
  }

  #[multitude_macro::test]
  fn failing_error_handler_still_tears_down() {
    let hook_log = capture_hooks();
    let runs = Rc::new(Cell::new(0));
    let teardown_runs = runs.clone();
    let observer = Observer::<i32>::new().try_error(|_| Err(Error::msg("handler broke")));
    let subscription = activate(observer, &move |obs| {
      obs.error(Error::msg("source failed"));
      Ok(counting_teardown(&teardown_runs))
    });

    assert!(subscription.is_closed());
    assert_eq!(runs.get(), 1);
    assert_eq!(*hook_log.borrow(), vec!["unhandled handler broke"]);
    subscription.unsubscribe();
    assert_eq!(runs.get(), 1);
  }

  #[multitude_macro::test]
  fn failing_complete_handler_still_tears_down() {
    let hook_log = capture_hooks();
    let runs = Rc::new(Cell::new(0));
    let teardown_runs = runs.clone();
    let observer = Observer::<i32>::new().try_complete(|| Err(Error::msg("handler broke")));
    let subscription = activate(observer, &move |obs| {
      obs.complete();
      Ok(counting_teardown(&teardown_runs))
    });

    assert!(subscription.is_closed());
    assert_eq!(runs.get(), 1);
    assert_eq!(*hook_log.borrow(), vec!["unhandled handler broke"]);
  }

  #[multitude_macro::test]
  fn failing_subscriber_errors_lazily() {
    let log: Log = Rc::new(RefCell::new(vec![]));
    let subscription = activate(recorder(&log), &|obs| {
      obs.next(1);
      Err(Error::msg("broken producer"))
    });
    assert!(subscription.is_closed());
    assert_eq!(*log.borrow(), vec!["next 1", "error broken producer"]);
  }

  #[multitude_macro::test]
  fn teardown_runs_once_on_close() {
    let runs = Rc::new(Cell::new(0));
    let c_runs = runs.clone();
    let subscription = activate(Observer::<i32>::new(), &move |_| {
      let c_runs = c_runs.clone();
      Ok(Teardown::new(move || c_runs.set(c_runs.get() + 1)))
    });
    assert!(!subscription.is_closed());
    subscription.unsubscribe();
    subscription.unsubscribe();
    assert_eq!(runs.get(), 1);
  }

  #[multitude_macro::test]
  fn teardown_runs_immediately_after_sync_completion() {
    let runs = Rc::new(Cell::new(0));
    let c_runs = runs.clone();
    activate(Observer::<i32>::new(), &move |obs| {
      obs.complete();
      let c_runs = c_runs.clone();
      Ok(Teardown::new(move || c_runs.set(c_runs.get() + 1)))
    });
    assert_eq!(runs.get(), 1);
  }

  #[multitude_macro::test]
  fn unsubscribe_in_start_skips_subscriber() {
    let called = Rc::new(Cell::new(false));
    let c_called = called.clone();
    let observer = Observer::<i32>::new().on_start(|subscription| subscription.unsubscribe());
    let subscription = activate(observer, &move |_| {
      c_called.set(true);
      Ok(Teardown::empty())
    });
    assert!(subscription.is_closed());
    assert!(!called.get());
  }

  #[multitude_macro::test]
  fn failing_start_keeps_subscription_open() {
    let hook_log = capture_hooks();
    let observer = Observer::<i32>::new().try_start(|_| Err(Error::msg("start failed")));
    let subscription = activate(observer, &|_| Ok(Teardown::empty()));
    assert!(!subscription.is_closed());
    assert_eq!(*hook_log.borrow(), vec!["unhandled start failed"]);
  }

  #[multitude_macro::test]
  fn failing_next_is_unhandled_and_stream_continues() {
    let hook_log = capture_hooks();
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    let observer = Observer::new().try_next(move |v: i32| {
      c_seen.borrow_mut().push(v);
      if v == 1 { Err(Error::msg("odd one")) } else { Ok(()) }
    });
    activate(observer, &|obs| {
      obs.next(1);
      obs.next(2);
      Ok(Teardown::empty())
    });
    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(*hook_log.borrow(), vec!["unhandled odd one"]);
  }

  #[multitude_macro::test]
  fn reentrant_signals_keep_order() {
    let log: Log = Rc::new(RefCell::new(vec![]));
    let slot: Rc<RefCell<Option<SubscriptionObserver<i32>>>> = Rc::new(RefCell::new(None));
    let (c_log, c_slot) = (log.clone(), slot.clone());
    let observer = Observer::new()
      .on_next(move |v: i32| {
        c_log.borrow_mut().push(format!("enter {v}"));
        if v == 1 {
          if let Some(obs) = c_slot.borrow().as_ref() {
            obs.next(2);
            obs.complete();
          }
        }
        c_log.borrow_mut().push(format!("leave {v}"));
      })
      .on_complete({
        let log = log.clone();
        move || log.borrow_mut().push("complete".into())
      });

    activate(observer, &move |obs| {
      *slot.borrow_mut() = Some(obs.clone());
      obs.next(1);
      Ok(Teardown::empty())
    });
    assert_eq!(*log.borrow(), vec!["enter 1", "leave 1", "enter 2", "leave 2", "complete"]);
  }
}
