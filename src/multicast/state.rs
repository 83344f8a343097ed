//! The multicast state machine.
//!
//! `update` is a pure transition: it moves the machine and returns what the
//! caller must do about it as a [`Transition`]. Connecting upstream, releasing
//! it and notifying observers all happen in the caller.

use super::{replay::MulticastReplay, Params, SourceState};
use crate::{
  error::Error,
  observer::Signal,
  subscription::{DynamicObservers, Subscription, SubscriptionObserver},
};

/// A live upstream connection.
pub struct Connection<T> {
  /// Distinguishes this connection from earlier ones of the same multicast.
  pub(crate) epoch: u64,
  pub(crate) replay: MulticastReplay<T>,
  pub(crate) observers: DynamicObservers<SubscriptionObserver<T>>,
  /// Set once the upstream activation has started.
  pub(crate) upstream: Option<Subscription>,
}

impl<T: Clone> Connection<T> {
  fn new(epoch: u64, replay: usize) -> Self {
    Self {
      epoch,
      replay: MulticastReplay::new(replay),
      observers: DynamicObservers::new(),
      upstream: None,
    }
  }
}

pub enum MulticastState<T> {
  Unsubscribe,
  Subscribe(Connection<T>),
  Error { error: Error, replay: MulticastReplay<T> },
  Complete { replay: MulticastReplay<T> },
  /// Absorbing: nothing leaves this state.
  Terminate,
}

/// Effect of one `update`, to be carried out by the caller.
pub enum Transition<T> {
  KeepUnsubscribe,
  /// A connection was opened; subscribe upstream for `epoch`.
  Connect { epoch: u64 },
  KeepSubscribe,
  /// The connection was closed; release `upstream` and tell `observers`.
  Disconnect { upstream: Option<Subscription>, observers: Vec<SubscriptionObserver<T>> },
  KeepFinal,
  /// A final state was given up; its replay is gone.
  Terminate,
  KeepTerminate,
}

impl<T> Transition<T> {
  pub fn name(&self) -> &'static str {
    match self {
      Transition::KeepUnsubscribe => "keep-unsubscribe",
      Transition::Connect { .. } => "connect",
      Transition::KeepSubscribe => "keep-subscribe",
      Transition::Disconnect { .. } => "disconnect",
      Transition::KeepFinal => "keep-final",
      Transition::Terminate => "terminate",
      Transition::KeepTerminate => "keep-terminate",
    }
  }
}

impl<T> Default for MulticastState<T> {
  fn default() -> Self { Self::Unsubscribe }
}

impl<T: Clone + 'static> MulticastState<T> {
  /// Apply a `{ connect, replay }` decision. `epoch` names the connection
  /// opened if this update connects.
  pub fn update(&mut self, params: Params, epoch: u64) -> Transition<T> {
    let Params { connect, replay: max } = params;
    let (next, transition) = match std::mem::take(self) {
      Self::Unsubscribe if connect => {
        (Self::Subscribe(Connection::new(epoch, max)), Transition::Connect { epoch })
      }
      Self::Unsubscribe => (Self::Unsubscribe, Transition::KeepUnsubscribe),
      Self::Subscribe(mut connection) => {
        connection.replay.limit(max);
        if connect {
          (Self::Subscribe(connection), Transition::KeepSubscribe)
        } else {
          let observers = connection.observers.drain().collect();
          (Self::Unsubscribe, Transition::Disconnect { upstream: connection.upstream, observers })
        }
      }
      Self::Error { error, mut replay } => {
        replay.limit(max);
        if connect {
          (Self::Error { error, replay }, Transition::KeepFinal)
        } else {
          (Self::Terminate, Transition::Terminate)
        }
      }
      Self::Complete { mut replay } => {
        replay.limit(max);
        if connect {
          (Self::Complete { replay }, Transition::KeepFinal)
        } else {
          (Self::Terminate, Transition::Terminate)
        }
      }
      Self::Terminate => (Self::Terminate, Transition::KeepTerminate),
    };
    *self = next;
    transition
  }

  /// Move the connection `epoch` to its final state. Returns the observers
  /// that must receive the terminal signal, or `None` when `epoch` is not the
  /// live connection.
  pub fn finalize(
    &mut self,
    epoch: u64,
    error: Option<Error>,
  ) -> Option<Vec<SubscriptionObserver<T>>> {
    if !self.is_epoch(epoch) {
      return None;
    }
    let Self::Subscribe(mut connection) = std::mem::take(self) else { return None };
    let replay = connection.replay;
    *self = match error {
      Some(error) => Self::Error { error, replay },
      None => Self::Complete { replay },
    };
    Some(connection.observers.drain().collect())
  }

  /// Record a value of connection `epoch`. Returns the observers it must be
  /// sent to.
  pub fn push(&mut self, epoch: u64, value: T) -> Option<Vec<SubscriptionObserver<T>>> {
    match self {
      Self::Subscribe(connection) if connection.epoch == epoch => {
        connection.replay.push(value);
        Some(connection.observers.snapshot())
      }
      _ => None,
    }
  }

  /// Remember the upstream subscription of connection `epoch`. Returns false
  /// if that connection is already gone.
  pub fn attach_upstream(&mut self, epoch: u64, upstream: Subscription) -> bool {
    match self {
      Self::Subscribe(connection) if connection.epoch == epoch => {
        connection.upstream = Some(upstream);
        true
      }
      _ => false,
    }
  }

  /// Add a downstream observer to the live connection. Returns false if
  /// there is none.
  pub fn insert(&mut self, id: usize, observer: SubscriptionObserver<T>) -> bool {
    match self {
      Self::Subscribe(connection) => {
        connection.observers.insert(id, observer);
        true
      }
      _ => false,
    }
  }

  pub fn remove(&mut self, id: usize) -> Option<SubscriptionObserver<T>> {
    match self {
      Self::Subscribe(connection) => connection.observers.remove(id),
      _ => None,
    }
  }

  /// Values a newly attached observer is replayed, oldest first.
  pub fn replay_values(&self) -> Vec<T> { self.replay().map(|r| r.values()).unwrap_or_default() }

  /// The last value of the current connection or final state.
  pub fn value(&self) -> Option<T> { self.replay().and_then(|r| r.value()) }

  /// The signal late observers receive once nothing is live anymore.
  pub fn final_signal(&self) -> Option<Signal<T>> {
    match self {
      Self::Unsubscribe | Self::Terminate => Some(Signal::Error(Error::NotConnected)),
      Self::Error { error, .. } => Some(Signal::Error(error.clone())),
      Self::Complete { .. } => Some(Signal::Complete),
      Self::Subscribe(_) => None,
    }
  }

  pub fn source(&self) -> SourceState {
    match self {
      Self::Unsubscribe => SourceState::Unsubscribe,
      Self::Subscribe(_) => SourceState::Subscribe,
      Self::Error { .. } => SourceState::Error,
      Self::Complete { .. } => SourceState::Complete,
      Self::Terminate => SourceState::Terminate,
    }
  }

  /// Downstream observers of the live connection.
  pub fn subscriptions(&self) -> usize {
    match self {
      Self::Subscribe(connection) => connection.observers.len(),
      _ => 0,
    }
  }

  pub fn is_terminated(&self) -> bool { matches!(self, Self::Terminate) }

  fn is_epoch(&self, epoch: u64) -> bool {
    matches!(self, Self::Subscribe(connection) if connection.epoch == epoch)
  }

  fn replay(&self) -> Option<&MulticastReplay<T>> {
    match self {
      Self::Subscribe(connection) => Some(&connection.replay),
      Self::Error { replay, .. } | Self::Complete { replay } => Some(replay),
      Self::Unsubscribe | Self::Terminate => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::observer::Observer;

  const CONNECT: Params = Params { connect: true, replay: 2 };
  const DISCONNECT: Params = Params { connect: false, replay: 0 };

  fn observer() -> SubscriptionObserver<i32> { SubscriptionObserver::bind(Observer::new()) }

  #[multitude_macro::test]
  fn connect_then_disconnect_hands_back_observers() {
    let mut state = MulticastState::<i32>::default();
    assert!(matches!(state.update(DISCONNECT, 1), Transition::KeepUnsubscribe));
    assert!(matches!(state.update(CONNECT, 2), Transition::Connect { epoch: 2 }));
    assert!(state.insert(0, observer()));
    assert!(state.attach_upstream(2, Subscription::closed()));
    assert_eq!(state.source(), SourceState::Subscribe);
    assert_eq!(state.subscriptions(), 1);

    match state.update(DISCONNECT, 3) {
      Transition::Disconnect { upstream, observers } => {
        assert!(upstream.is_some());
        assert_eq!(observers.len(), 1);
      }
      other => panic!("unexpected transition {}", other.name()),
    }
    assert_eq!(state.source(), SourceState::Unsubscribe);
    assert_eq!(state.value(), None);
  }

  #[multitude_macro::test]
  fn stale_epochs_are_ignored() {
    let mut state = MulticastState::<i32>::default();
    state.update(CONNECT, 1);
    assert!(state.push(7, 10).is_none());
    assert!(!state.attach_upstream(7, Subscription::closed()));
    assert!(state.finalize(7, None).is_none());
    assert_eq!(state.source(), SourceState::Subscribe);
  }

  #[multitude_macro::test]
  fn final_state_keeps_replay_until_terminated() {
    let mut state = MulticastState::<i32>::default();
    state.update(CONNECT, 1);
    (1..=3).for_each(|v| {
      state.push(1, v);
    });
    let observers = state.finalize(1, Some(Error::msg("boom"))).unwrap();
    assert!(observers.is_empty());
    assert_eq!(state.source(), SourceState::Error);
    assert_eq!(state.replay_values(), vec![2, 3]);
    assert!(matches!(state.final_signal(), Some(Signal::Error(Error::Message(_)))));

    assert!(matches!(state.update(CONNECT, 2), Transition::KeepFinal));
    assert_eq!(state.value(), Some(3));
    assert!(matches!(state.update(DISCONNECT, 3), Transition::Terminate));
    assert!(state.is_terminated());
    assert!(state.replay_values().is_empty());
    assert!(matches!(state.final_signal(), Some(Signal::Error(Error::NotConnected))));
    assert!(matches!(state.update(CONNECT, 4), Transition::KeepTerminate));
  }

  #[multitude_macro::test]
  fn update_relimits_replay() {
    let mut state = MulticastState::<i32>::default();
    state.update(Params { connect: true, replay: 3 }, 1);
    (1..=3).for_each(|v| {
      state.push(1, v);
    });
    state.update(Params { connect: true, replay: 1 }, 2);
    assert_eq!(state.replay_values(), vec![3]);
  }
}
