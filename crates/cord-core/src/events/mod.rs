//! Domain events and their listener scopes

mod event;

pub use event::{Event, EventKind, Scope};
