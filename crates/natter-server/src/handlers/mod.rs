//! Request handlers, one module per area. Each adds methods to
//! [`Dispatcher`](crate::dispatch::Dispatcher).

mod contacts;
mod login;
mod relay;
mod status;
