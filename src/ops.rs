//! Transformations applied with [`Observable::pipe`](crate::observable::Observable::pipe).
//!
//! Each function here returns a closure taking `&dyn ObservableCompatible<T>`,
//! so the same transformation applies to an `Observable`, a `Multicast` or a
//! `Subject`.

pub mod connect;
pub mod operate;
pub mod share;

pub use connect::{connect, ConnectOptions};
pub use operate::{intercept, operate, transform, InterceptOptions, OperationObserver};
pub use share::{share, ShareOptions, SharePolicy};
