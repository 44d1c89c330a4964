//! Session engine
//!
//! One task per shard owns the websocket. It performs the Hello /
//! Identify / Resume handshake, keeps the heartbeat going, queues every
//! dispatch for the shard's applier task in sequence order and reconnects
//! with backoff when the connection drops.

mod apply;
mod backoff;
mod connection;
mod heartbeat;
mod shard;
mod state;
mod task;

pub use backoff::Backoff;
pub use heartbeat::HeartbeatState;
pub use shard::{Shard, ShardConfig, ShardHandle};
pub use state::{SessionState, SessionStatus};
