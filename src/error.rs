//! Error type shared by every stream in the crate.
//!
//! Stream errors are ordinary values: they travel through `error` signals,
//! are fanned out to many observers by multicasts and subjects, and end up in
//! the unhandled-error hook when nobody can receive them. They are therefore
//! cheap to clone.

use std::sync::Arc;

/// Root error type for streams, hooks and policies.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
  /// Delivered by a multicast that is disconnected from its source, or that
  /// has been permanently shut down.
  #[error("multicast observable is not connected")]
  NotConnected,

  /// A share policy name could not be parsed.
  #[error("unknown share policy: {policy}")]
  UnknownPolicy { policy: String },

  /// Free-form error raised by user code.
  #[error("{0}")]
  Message(String),

  /// Error produced by user code, wrapped to stay cloneable.
  #[error("{0}")]
  Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Create a free-form error.
  pub fn msg(message: impl Into<String>) -> Self { Self::Message(message.into()) }

  /// Wrap any error so it can travel through a stream.
  pub fn wrap<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Source(Arc::new(err))
  }

  /// Whether this is the error a disconnected multicast hands out.
  pub fn is_not_connected(&self) -> bool { matches!(self, Self::NotConnected) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
