//! # cord-gateway
//!
//! Gateway client: the session engine that keeps one websocket per shard
//! alive, the decoder for inbound frames, the packet handlers that apply
//! dispatches to the entity cache, and the dispatcher that hands the
//! resulting events to listeners.

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod session;

pub use dispatch::{Dispatcher, ListenerHandle, ListenerId};
pub use error::{GatewayError, GatewayResult, HandlerError, HandlerResult};
pub use handlers::{HandlerContext, HandlerRegistry, PacketHandler, ShardInfo};
pub use session::{SessionState, SessionStatus, Shard, ShardConfig, ShardHandle};
