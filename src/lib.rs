//! # multitude: push streams with policy-driven multicasting
//!
//! A small, single-threaded reactive core. Producers push values into
//! observers synchronously; a [`Subscription`] ties one producer activation
//! to one observer and releases it exactly once.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use multitude::prelude::*;
//!
//! let seen = Rc::new(RefCell::new(vec![]));
//! let c_seen = seen.clone();
//!
//! let shared =
//!   Observable::of([1, 2, 3]).pipe(share(SharePolicy::KeepOpen, ShareOptions { replay: 2 }));
//! shared.subscribe(());
//! shared.subscribe(move |v| c_seen.borrow_mut().push(v));
//!
//! assert_eq!(*seen.borrow(), vec![2, 3]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | Stateless producer; every `subscribe` is a new activation |
//! | [`Observer`] | Optional `start`, `next`, `error` and `complete` callbacks |
//! | [`Subscription`] | Handle to release an activation |
//! | [`Multicast`] | One upstream activation fanned out under a connect/replay policy |
//! | [`Subject`] | Hot observable that is also an observer, with last-value memory |
//! | [`Talkback`] | Ordered fan-out to listeners with error isolation |
//!
//! Unhandled errors and signals sent to closed subscriptions go to the hooks
//! set with [`hooks::configure`]. By default both are logged with `tracing`.
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Subscription`]: subscription::Subscription
//! [`Multicast`]: multicast::Multicast
//! [`Subject`]: subject::Subject
//! [`Talkback`]: talkback::Talkback

extern crate self as multitude;

pub mod error;
pub mod hooks;
pub mod multicast;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod subject;
pub mod subscription;
pub mod talkback;
