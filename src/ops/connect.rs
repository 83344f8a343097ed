use super::share::{share, SharePolicy, ShareOptions};
use crate::{multicast::Multicast, observable::ObservableCompatible, observer::Observer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
  /// Values replayed to new observers.
  pub replay: usize,
}

/// Share the source and connect to it right away.
///
/// The source is activated immediately, attached observers or not, and is
/// never released before it terminates. Errors of that internal activation
/// are swallowed; attached observers still receive them.
pub fn connect<T>(options: ConnectOptions) -> impl Fn(&dyn ObservableCompatible<T>) -> Multicast<T>
where
  T: Clone + 'static,
{
  let keep_open = share(SharePolicy::KeepOpen, ShareOptions { replay: options.replay });
  move |source: &dyn ObservableCompatible<T>| {
    let multicast = keep_open(source);
    multicast.subscribe(Observer::new().on_error(|_| {}));
    multicast
  }
}
