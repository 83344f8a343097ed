//! Prelude module for convenient imports

pub use crate::{
  error::{Error, Result},
  hooks::{self, Hooks},
  multicast::{Event, HandlerState, Multicast, MulticastOptions, Params, SourceState},
  observable::{Observable, ObservableCompatible, Subscribable},
  observer::{Action, IntoObserver, Observer, ObserverLike, Signal},
  ops::*,
  subject::{Subject, SubjectOptions},
  subscription::{IntoTeardown, Subscription, SubscriptionObserver, Teardown},
  talkback::{Talkback, TalkbackOptions},
};
