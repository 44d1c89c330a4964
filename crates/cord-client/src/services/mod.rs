//! Entity operations
//!
//! Each service borrows the client and pairs a REST call with the cache.
//! Fetched entities are written back to the cache; mutations are not, the
//! gateway echo of a mutation updates the cache and fires its event.

pub mod channel;
pub mod member;
pub mod message;
pub mod server;
pub mod user;

pub use channel::ChannelService;
pub use member::MemberService;
pub use message::MessageService;
pub use server::ServerService;
pub use user::UserService;
