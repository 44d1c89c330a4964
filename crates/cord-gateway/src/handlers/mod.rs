//! Packet handlers
//!
//! One handler per dispatch event name. A handler applies its payload to
//! the entity cache and returns the domain events to dispatch; it never
//! builds an event around an entity the cache does not hold.
//!
//! Cache misses are handled per entity kind:
//! - servers, channels and roles: the event is skipped
//! - messages: update and reaction events are skipped, deletes always fire
//! - users: created from the inline user objects of the payload
//! - members: fetched over REST, the event is skipped if that fails

mod channel;
mod context;
mod lifecycle;
mod member;
mod message;
mod reaction;
mod role;
mod server;
mod user;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use cord_core::Event;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dispatch::panic_message;
pub use crate::error::{HandlerError, HandlerResult};

pub use channel::{ChannelCreateHandler, ChannelDeleteHandler, ChannelUpdateHandler};
pub use context::{HandlerContext, ShardInfo};
pub use lifecycle::{ReadyHandler, ResumedHandler};
pub use member::{
    MemberAddHandler, MemberRemoveHandler, MemberUpdateHandler, MembersChunkHandler,
};
pub use message::{
    MessageCreateHandler, MessageDeleteBulkHandler, MessageDeleteHandler, MessageUpdateHandler,
};
pub use reaction::{ReactionAddHandler, ReactionRemoveAllHandler, ReactionRemoveHandler};
pub use role::{RoleCreateHandler, RoleDeleteHandler, RoleUpdateHandler};
pub use server::{
    EmojisUpdateHandler, ServerCreateHandler, ServerDeleteHandler, ServerUpdateHandler,
};
pub use user::{PresenceUpdateHandler, TypingStartHandler, UserUpdateHandler};

/// Applies one dispatch payload
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>>;
}

/// Event name to handler mapping
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn PacketHandler>>,
}

impl HandlerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Every built-in handler
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("READY", ReadyHandler);
        registry.register("RESUMED", ResumedHandler);

        registry.register("GUILD_CREATE", ServerCreateHandler);
        registry.register("GUILD_UPDATE", ServerUpdateHandler);
        registry.register("GUILD_DELETE", ServerDeleteHandler);
        registry.register("GUILD_EMOJIS_UPDATE", EmojisUpdateHandler);

        registry.register("GUILD_MEMBERS_CHUNK", MembersChunkHandler);
        registry.register("GUILD_MEMBER_ADD", MemberAddHandler);
        registry.register("GUILD_MEMBER_UPDATE", MemberUpdateHandler);
        registry.register("GUILD_MEMBER_REMOVE", MemberRemoveHandler);

        registry.register("GUILD_ROLE_CREATE", RoleCreateHandler);
        registry.register("GUILD_ROLE_UPDATE", RoleUpdateHandler);
        registry.register("GUILD_ROLE_DELETE", RoleDeleteHandler);

        registry.register("CHANNEL_CREATE", ChannelCreateHandler);
        registry.register("CHANNEL_UPDATE", ChannelUpdateHandler);
        registry.register("CHANNEL_DELETE", ChannelDeleteHandler);

        registry.register("MESSAGE_CREATE", MessageCreateHandler);
        registry.register("MESSAGE_UPDATE", MessageUpdateHandler);
        registry.register("MESSAGE_DELETE", MessageDeleteHandler);
        registry.register("MESSAGE_DELETE_BULK", MessageDeleteBulkHandler);

        registry.register("MESSAGE_REACTION_ADD", ReactionAddHandler);
        registry.register("MESSAGE_REACTION_REMOVE", ReactionRemoveHandler);
        registry.register("MESSAGE_REACTION_REMOVE_ALL", ReactionRemoveAllHandler);

        registry.register("PRESENCE_UPDATE", PresenceUpdateHandler);
        registry.register("TYPING_START", TypingStartHandler);
        registry.register("USER_UPDATE", UserUpdateHandler);
        registry
    }

    /// Register or replace the handler for an event name
    pub fn register(&mut self, event: &'static str, handler: impl PacketHandler + 'static) {
        if self.handlers.insert(event, Box::new(handler)).is_some() {
            tracing::debug!(event = event, "Replaced packet handler");
        }
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `event`
    ///
    /// Unregistered names yield no events. A panicking handler is reported
    /// as `HandlerError::Panicked`; the caller drops the packet and moves on.
    pub async fn handle(
        &self,
        event: &str,
        payload: Value,
        ctx: &HandlerContext,
    ) -> HandlerResult<Vec<Event>> {
        let Some(handler) = self.handlers.get(event) else {
            tracing::debug!(event = event, "No handler for event");
            return Ok(Vec::new());
        };

        match AssertUnwindSafe(handler.handle(payload, ctx))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&&str> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("events", &names).finish()
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> HandlerResult<T> {
    Ok(serde_json::from_value(payload)?)
}
