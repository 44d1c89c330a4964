//! Event dispatch
//!
//! Hands constructed domain events to user-registered listeners.

mod dispatcher;

pub(crate) use dispatcher::panic_message;
pub use dispatcher::{Dispatcher, Listener, ListenerHandle, ListenerId};
