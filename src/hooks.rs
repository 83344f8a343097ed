//! Registry for the two global hooks.
//!
//! - `on_unhandled_error(error, subscription)` receives every error that could
//!   not reach a listener: an observer without an `error` member, an `error`
//!   on a closed subscription, a callback or teardown that failed.
//! - `on_stopped_notification(value, subscription)` receives values emitted
//!   into an already closed subscription.
//!
//! The registry is per thread. Streams are built on `Rc` and never cross
//! threads, so a thread is the whole world a stream graph lives in.
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use multitude::{hooks::{self, Hooks}, prelude::*};
//!
//! let errors = Rc::new(RefCell::new(vec![]));
//! let c_errors = errors.clone();
//! hooks::configure(Some(
//!   Hooks::new().on_unhandled_error(move |err, _| c_errors.borrow_mut().push(err.to_string())),
//! ));
//!
//! Observable::<i32>::new(|obs| obs.error(Error::msg("nobody listens"))).subscribe(());
//! assert_eq!(*errors.borrow(), vec!["nobody listens".to_string()]);
//!
//! hooks::reset();
//! ```

use std::{any::Any, cell::RefCell, fmt, rc::Rc};

use crate::{
  error::{Error, Result},
  subscription::Subscription,
};

pub type UnhandledErrorHook = Rc<dyn Fn(Error, &Subscription)>;

pub type StoppedNotificationHook = Rc<dyn Fn(&dyn Any, &Subscription) -> Result<()>>;

/// Hook set. Members left unset fall back to the defaults: unhandled errors
/// are logged at `error` level, stopped notifications are dropped.
///
/// The default never escalates an unhandled error: it is not rethrown and
/// does not panic. Install `on_unhandled_error` to make such errors fatal.
#[derive(Clone, Default)]
pub struct Hooks {
  pub on_unhandled_error: Option<UnhandledErrorHook>,
  pub on_stopped_notification: Option<StoppedNotificationHook>,
}

impl Hooks {
  pub fn new() -> Self { Self::default() }

  pub fn on_unhandled_error(mut self, f: impl Fn(Error, &Subscription) + 'static) -> Self {
    self.on_unhandled_error = Some(Rc::new(f));
    self
  }

  pub fn on_stopped_notification(self, f: impl Fn(&dyn Any, &Subscription) + 'static) -> Self {
    self.try_stopped_notification(move |value, subscription| {
      f(value, subscription);
      Ok(())
    })
  }

  /// A stopped-notification hook that may fail; its error is routed to the
  /// unhandled-error hook.
  pub fn try_stopped_notification(
    mut self,
    f: impl Fn(&dyn Any, &Subscription) -> Result<()> + 'static,
  ) -> Self {
    self.on_stopped_notification = Some(Rc::new(f));
    self
  }
}

impl fmt::Debug for Hooks {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Hooks")
      .field("on_unhandled_error", &self.on_unhandled_error.is_some())
      .field("on_stopped_notification", &self.on_stopped_notification.is_some())
      .finish()
  }
}

thread_local! {
  static HOOKS: RefCell<Hooks> = RefCell::new(Hooks::default());
}

/// Replace the active hooks. `None` restores the defaults.
pub fn configure(hooks: Option<Hooks>) {
  let hooks = hooks.unwrap_or_default();
  tracing::trace!(?hooks, "configuring stream hooks");
  HOOKS.with(|h| *h.borrow_mut() = hooks);
}

/// Restore the default hooks.
pub fn reset() { configure(None) }

pub(crate) fn unhandled_error(err: Error, subscription: &Subscription) {
  // Cloned out so the hook may reconfigure the registry.
  let hook = HOOKS.with(|h| h.borrow().on_unhandled_error.clone());
  match hook {
    Some(hook) => hook(err, subscription),
    None => tracing::error!(error = %err, ?subscription, "unhandled stream error"),
  }
}

pub(crate) fn stopped_notification(value: &dyn Any, subscription: &Subscription) {
  let hook = HOOKS.with(|h| h.borrow().on_stopped_notification.clone());
  let Some(hook) = hook else { return };
  if let Err(err) = hook(value, subscription) {
    tracing::warn!(error = %err, "stopped notification hook failed");
    unhandled_error(err, subscription);
  }
}
