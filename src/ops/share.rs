use std::{cell::Cell, fmt, rc::Rc, str::FromStr};

use crate::{
  error::Error,
  multicast::{Event, HandlerState, Multicast, MulticastOptions, Params, SourceState},
  observable::ObservableCompatible,
};

/// When a shared observable connects to and disconnects from its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SharePolicy {
  /// Connect while at least one observer is attached. Dropping to zero
  /// observers disconnects and discards the replay; the next observer starts
  /// a fresh activation.
  #[default]
  OnDemand,
  /// Connect on the first observer and stay connected, observers or not.
  KeepOpen,
  /// Like `OnDemand`, but the first drop to zero observers disconnects for
  /// good. Later observers get `Error::NotConnected`, or the source's own
  /// terminal signal if it finished before the disconnect.
  KeepClosed,
}

impl SharePolicy {
  pub const ALL: [SharePolicy; 3] =
    [SharePolicy::OnDemand, SharePolicy::KeepOpen, SharePolicy::KeepClosed];

  pub fn as_str(&self) -> &'static str {
    match self {
      SharePolicy::OnDemand => "on-demand",
      SharePolicy::KeepOpen => "keep-open",
      SharePolicy::KeepClosed => "keep-closed",
    }
  }

  /// The multicast policy implementing this share policy.
  ///
  /// Every call builds independent policy state, so each shared observable
  /// tracks its own disconnect.
  pub fn options(self, replay: usize) -> MulticastOptions {
    match self {
      SharePolicy::KeepOpen => MulticastOptions::handler(move |state| Params {
        connect: state.event != Event::Start,
        replay,
      }),
      SharePolicy::OnDemand => {
        MulticastOptions::handler(move |state| Params { connect: on_demand(&state), replay })
      }
      SharePolicy::KeepClosed => {
        let disconnected = Rc::new(Cell::new(false));
        MulticastOptions::handler(move |state| {
          let connect = match state.event {
            Event::Subscribe if !finished(&state) => !disconnected.get(),
            _ => on_demand(&state),
          };
          if state.event == Event::Unsubscribe && !connect {
            disconnected.set(true);
          }
          Params { connect, replay }
        })
      }
    }
  }
}

fn finished(state: &HandlerState) -> bool {
  matches!(state.source, SourceState::Error | SourceState::Complete)
}

fn on_demand(state: &HandlerState) -> bool {
  if finished(state) {
    return true;
  }
  match state.event {
    Event::Start => false,
    Event::Subscribe => true,
    Event::Unsubscribe => state.subscriptions > 1,
  }
}

impl fmt::Display for SharePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SharePolicy {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|policy| policy.as_str() == s)
      .ok_or_else(|| Error::UnknownPolicy { policy: s.to_string() })
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShareOptions {
  /// Values replayed to new observers.
  pub replay: usize,
}

/// Turn a cold observable into a hot one shared by all its observers.
///
/// ```rust
/// use std::{cell::Cell, rc::Rc};
///
/// use multitude::prelude::*;
///
/// let activations = Rc::new(Cell::new(0));
/// let c_activations = activations.clone();
/// let source = Observable::<i32>::new(move |_| c_activations.set(c_activations.get() + 1));
///
/// let shared = source.pipe(share(SharePolicy::OnDemand, ShareOptions::default()));
/// let a = shared.subscribe(());
/// let b = shared.subscribe(());
/// assert_eq!(activations.get(), 1);
///
/// a.unsubscribe();
/// b.unsubscribe();
/// shared.subscribe(());
/// assert_eq!(activations.get(), 2);
/// ```
pub fn share<T>(
  policy: SharePolicy,
  options: ShareOptions,
) -> impl Fn(&dyn ObservableCompatible<T>) -> Multicast<T>
where
  T: Clone + 'static,
{
  move |source: &dyn ObservableCompatible<T>| {
    Multicast::from(source, policy.options(options.replay))
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{
    observable::Observable,
    observer::Observer,
    subscription::{Subscription, SubscriptionObserver},
  };

  #[test]
  fn policy_names_round_trip() {
    for policy in SharePolicy::ALL {
      assert_eq!(policy.to_string().parse::<SharePolicy>().unwrap(), policy);
    }
    assert_eq!(SharePolicy::default(), SharePolicy::OnDemand);
    let err = "sometimes".parse::<SharePolicy>().unwrap_err();
    assert!(matches!(err, Error::UnknownPolicy { policy } if policy == "sometimes"));
  }

  fn counted(calls: &Rc<Cell<u32>>) -> Observable<i32> {
    let calls = calls.clone();
    Observable::new(move |_: SubscriptionObserver<i32>| calls.set(calls.get() + 1))
  }

  #[multitude_macro::test]
  fn on_demand_reconnects_after_drop_to_zero() {
    let calls = Rc::new(Cell::new(0));
    let shared = counted(&calls).pipe(share(SharePolicy::OnDemand, ShareOptions::default()));
    assert_eq!(calls.get(), 0);

    shared.subscribe(()).unsubscribe();
    shared.subscribe(());
    assert_eq!(calls.get(), 2);
  }

  #[multitude_macro::test]
  fn keep_open_connects_once() {
    let calls = Rc::new(Cell::new(0));
    let shared = counted(&calls).pipe(share(SharePolicy::KeepOpen, ShareOptions::default()));
    for _ in 0..3 {
      shared.subscribe(()).unsubscribe();
    }
    let _live: Vec<Subscription> = (0..2).map(|_| shared.subscribe(())).collect();
    assert_eq!(calls.get(), 1);
  }

  #[multitude_macro::test]
  fn keep_closed_refuses_after_disconnect() {
    let calls = Rc::new(Cell::new(0));
    let shared = counted(&calls).pipe(share(SharePolicy::KeepClosed, ShareOptions::default()));
    let first = shared.subscribe(());
    let second = shared.subscribe(());
    first.unsubscribe();
    assert_eq!(shared.subscriber_count(), 1);
    second.unsubscribe();

    let errors = Rc::new(RefCell::new(vec![]));
    let c_errors = errors.clone();
    let late =
      shared.subscribe(Observer::new().on_error(move |err| c_errors.borrow_mut().push(err)));
    assert!(late.is_closed());
    assert!(errors.borrow()[0].is_not_connected());
    assert_eq!(calls.get(), 1);
  }

  #[multitude_macro::test]
  fn keep_closed_replays_real_terminal() {
    let shared = Observable::of([1, 2, 3])
      .pipe(share(SharePolicy::KeepClosed, ShareOptions { replay: 1 }));
    shared.subscribe(()).unsubscribe();

    let log = Rc::new(RefCell::new(vec![]));
    let (n, c) = (log.clone(), log.clone());
    shared.subscribe(
      Observer::new()
        .on_next(move |v: i32| n.borrow_mut().push(v.to_string()))
        .on_complete(move || c.borrow_mut().push("complete".into())),
    );
    assert_eq!(*log.borrow(), vec!["3", "complete"]);
  }

  #[multitude_macro::test]
  fn policies_do_not_share_state() {
    let calls = Rc::new(Cell::new(0));
    let keep_closed = share(SharePolicy::KeepClosed, ShareOptions::default());
    let first = keep_closed(&counted(&calls));
    first.subscribe(()).unsubscribe();

    let second = keep_closed(&counted(&calls));
    let subscription = second.subscribe(());
    assert!(!subscription.is_closed());
    assert_eq!(calls.get(), 2);
  }
}
