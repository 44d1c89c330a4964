//! Domain events - what listeners observe after the cache was updated
//!
//! Events carry ids to look up in the cache, not copies of live entities.
//! Delete events carry a snapshot of the removed entity instead, since it
//! is no longer reachable by id. Server and role updates carry the
//! snapshots from before and after the change.

use crate::entities::{
    Activity, Channel, CustomEmoji, Message, ReactionEmoji, Role, Server, UserStatus,
};
use crate::value_objects::Snowflake;

/// Where a listener is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Server(Snowflake),
    Channel(Snowflake),
    User(Snowflake),
    Message(Snowflake),
}

/// All events dispatched to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // =========================================================================
    // Lifecycle Events
    // =========================================================================
    Ready { shard: u32, session_id: String },
    Resumed { shard: u32 },
    /// The shard is reconnecting; `cause` is a short log-friendly reason
    Reconnect { shard: u32, cause: String },
    LostConnection { shard: u32 },

    // =========================================================================
    // Server Events
    // =========================================================================
    ServerJoin { server_id: Snowflake },
    ServerBecomesAvailable { server_id: Snowflake },
    ServerBecomesUnavailable { server_id: Snowflake },
    ServerLeave { server: Server },
    /// Server settings changed; snapshots from before and after
    ServerUpdate { old: Server, new: Server },

    // =========================================================================
    // Channel Events
    // =========================================================================
    ChannelCreate {
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
    },
    ChannelUpdate {
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
    },
    ChannelDelete { channel: Channel },

    // =========================================================================
    // Role Events
    // =========================================================================
    RoleCreate {
        server_id: Snowflake,
        role_id: Snowflake,
    },
    RoleUpdate { old: Role, new: Role },
    RoleDelete { role: Role },

    // =========================================================================
    // Member Events
    // =========================================================================
    MemberJoin {
        server_id: Snowflake,
        user_id: Snowflake,
    },
    MemberLeave {
        server_id: Snowflake,
        user_id: Snowflake,
    },
    UserChangeNickname {
        server_id: Snowflake,
        user_id: Snowflake,
        old: Option<String>,
        new: Option<String>,
    },
    UserRoleAdd {
        server_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    },
    UserRoleRemove {
        server_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    },

    // =========================================================================
    // Message Events
    // =========================================================================
    MessageCreate {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
    },
    MessageEdit {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
        old_content: Option<String>,
    },
    MessageDelete {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
        /// Present if the message was cached
        message: Option<Box<Message>>,
    },

    // =========================================================================
    // Reaction Events
    // =========================================================================
    ReactionAdd {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
        user_id: Snowflake,
        emoji: ReactionEmoji,
    },
    ReactionRemove {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
        user_id: Snowflake,
        emoji: ReactionEmoji,
    },
    ReactionRemoveAll {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
    },

    // =========================================================================
    // User Events
    // =========================================================================
    UserChangeStatus {
        user_id: Snowflake,
        old: UserStatus,
        new: UserStatus,
    },
    UserChangeActivity {
        user_id: Snowflake,
        old: Option<Activity>,
        new: Option<Activity>,
    },
    UserChangeName {
        user_id: Snowflake,
        old: String,
        new: String,
    },
    UserChangeAvatar {
        user_id: Snowflake,
        old: Option<String>,
        new: Option<String>,
    },
    UserStartTyping {
        user_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
    },
    /// The connected account changed
    UserUpdate { user_id: Snowflake },

    // =========================================================================
    // Emoji Events
    // =========================================================================
    EmojiCreate {
        server_id: Snowflake,
        emoji_id: Snowflake,
    },
    EmojiUpdate {
        server_id: Snowflake,
        emoji_id: Snowflake,
    },
    EmojiDelete { emoji: CustomEmoji },
}

/// Event kind tag, used as the listener registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Resumed,
    Reconnect,
    LostConnection,
    ServerJoin,
    ServerBecomesAvailable,
    ServerBecomesUnavailable,
    ServerLeave,
    ServerUpdate,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    MemberJoin,
    MemberLeave,
    UserChangeNickname,
    UserRoleAdd,
    UserRoleRemove,
    MessageCreate,
    MessageEdit,
    MessageDelete,
    ReactionAdd,
    ReactionRemove,
    ReactionRemoveAll,
    UserChangeStatus,
    UserChangeActivity,
    UserChangeName,
    UserChangeAvatar,
    UserStartTyping,
    UserUpdate,
    EmojiCreate,
    EmojiUpdate,
    EmojiDelete,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Resumed => "resumed",
            Self::Reconnect => "reconnect",
            Self::LostConnection => "lost_connection",
            Self::ServerJoin => "server_join",
            Self::ServerBecomesAvailable => "server_becomes_available",
            Self::ServerBecomesUnavailable => "server_becomes_unavailable",
            Self::ServerLeave => "server_leave",
            Self::ServerUpdate => "server_update",
            Self::ChannelCreate => "channel_create",
            Self::ChannelUpdate => "channel_update",
            Self::ChannelDelete => "channel_delete",
            Self::RoleCreate => "role_create",
            Self::RoleUpdate => "role_update",
            Self::RoleDelete => "role_delete",
            Self::MemberJoin => "member_join",
            Self::MemberLeave => "member_leave",
            Self::UserChangeNickname => "user_change_nickname",
            Self::UserRoleAdd => "user_role_add",
            Self::UserRoleRemove => "user_role_remove",
            Self::MessageCreate => "message_create",
            Self::MessageEdit => "message_edit",
            Self::MessageDelete => "message_delete",
            Self::ReactionAdd => "reaction_add",
            Self::ReactionRemove => "reaction_remove",
            Self::ReactionRemoveAll => "reaction_remove_all",
            Self::UserChangeStatus => "user_change_status",
            Self::UserChangeActivity => "user_change_activity",
            Self::UserChangeName => "user_change_name",
            Self::UserChangeAvatar => "user_change_avatar",
            Self::UserStartTyping => "user_start_typing",
            Self::UserUpdate => "user_update",
            Self::EmojiCreate => "emoji_create",
            Self::EmojiUpdate => "emoji_update",
            Self::EmojiDelete => "emoji_delete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready { .. } => EventKind::Ready,
            Self::Resumed { .. } => EventKind::Resumed,
            Self::Reconnect { .. } => EventKind::Reconnect,
            Self::LostConnection { .. } => EventKind::LostConnection,
            Self::ServerJoin { .. } => EventKind::ServerJoin,
            Self::ServerBecomesAvailable { .. } => EventKind::ServerBecomesAvailable,
            Self::ServerBecomesUnavailable { .. } => EventKind::ServerBecomesUnavailable,
            Self::ServerLeave { .. } => EventKind::ServerLeave,
            Self::ServerUpdate { .. } => EventKind::ServerUpdate,
            Self::ChannelCreate { .. } => EventKind::ChannelCreate,
            Self::ChannelUpdate { .. } => EventKind::ChannelUpdate,
            Self::ChannelDelete { .. } => EventKind::ChannelDelete,
            Self::RoleCreate { .. } => EventKind::RoleCreate,
            Self::RoleUpdate { .. } => EventKind::RoleUpdate,
            Self::RoleDelete { .. } => EventKind::RoleDelete,
            Self::MemberJoin { .. } => EventKind::MemberJoin,
            Self::MemberLeave { .. } => EventKind::MemberLeave,
            Self::UserChangeNickname { .. } => EventKind::UserChangeNickname,
            Self::UserRoleAdd { .. } => EventKind::UserRoleAdd,
            Self::UserRoleRemove { .. } => EventKind::UserRoleRemove,
            Self::MessageCreate { .. } => EventKind::MessageCreate,
            Self::MessageEdit { .. } => EventKind::MessageEdit,
            Self::MessageDelete { .. } => EventKind::MessageDelete,
            Self::ReactionAdd { .. } => EventKind::ReactionAdd,
            Self::ReactionRemove { .. } => EventKind::ReactionRemove,
            Self::ReactionRemoveAll { .. } => EventKind::ReactionRemoveAll,
            Self::UserChangeStatus { .. } => EventKind::UserChangeStatus,
            Self::UserChangeActivity { .. } => EventKind::UserChangeActivity,
            Self::UserChangeName { .. } => EventKind::UserChangeName,
            Self::UserChangeAvatar { .. } => EventKind::UserChangeAvatar,
            Self::UserStartTyping { .. } => EventKind::UserStartTyping,
            Self::UserUpdate { .. } => EventKind::UserUpdate,
            Self::EmojiCreate { .. } => EventKind::EmojiCreate,
            Self::EmojiUpdate { .. } => EventKind::EmojiUpdate,
            Self::EmojiDelete { .. } => EventKind::EmojiDelete,
        }
    }

    /// Every scope whose listeners receive this event, global first
    ///
    /// A channel delete inside a category also reaches the category's
    /// listeners.
    pub fn scopes(&self) -> Vec<Scope> {
        fn server(id: Option<Snowflake>, scopes: &mut Vec<Scope>) {
            if let Some(id) = id {
                scopes.push(Scope::Server(id));
            }
        }

        let mut scopes = vec![Scope::Global];

        match self {
            Self::Ready { .. }
            | Self::Resumed { .. }
            | Self::Reconnect { .. }
            | Self::LostConnection { .. } => {}

            Self::ServerJoin { server_id }
            | Self::ServerBecomesAvailable { server_id }
            | Self::ServerBecomesUnavailable { server_id } => server(Some(*server_id), &mut scopes),
            Self::ServerUpdate { new, .. } => server(Some(new.id), &mut scopes),
            Self::ServerLeave { server: s } => server(Some(s.id), &mut scopes),

            Self::ChannelCreate {
                channel_id,
                server_id,
            }
            | Self::ChannelUpdate {
                channel_id,
                server_id,
            } => {
                server(*server_id, &mut scopes);
                scopes.push(Scope::Channel(*channel_id));
            }
            Self::ChannelDelete { channel } => {
                server(channel.server_id(), &mut scopes);
                if let Some(category) = channel.category_id() {
                    scopes.push(Scope::Channel(category));
                }
                scopes.push(Scope::Channel(channel.id()));
            }

            Self::RoleCreate { server_id, .. } => server(Some(*server_id), &mut scopes),
            Self::RoleUpdate { new, .. } => server(Some(new.server_id), &mut scopes),
            Self::RoleDelete { role } => server(Some(role.server_id), &mut scopes),

            Self::MemberJoin { server_id, user_id }
            | Self::MemberLeave { server_id, user_id }
            | Self::UserChangeNickname {
                server_id, user_id, ..
            }
            | Self::UserRoleAdd {
                server_id, user_id, ..
            }
            | Self::UserRoleRemove {
                server_id, user_id, ..
            } => {
                server(Some(*server_id), &mut scopes);
                scopes.push(Scope::User(*user_id));
            }

            Self::MessageCreate {
                message_id,
                channel_id,
                server_id,
            }
            | Self::MessageEdit {
                message_id,
                channel_id,
                server_id,
                ..
            }
            | Self::MessageDelete {
                message_id,
                channel_id,
                server_id,
                ..
            }
            | Self::ReactionRemoveAll {
                message_id,
                channel_id,
                server_id,
            } => {
                server(*server_id, &mut scopes);
                scopes.push(Scope::Channel(*channel_id));
                scopes.push(Scope::Message(*message_id));
            }

            Self::ReactionAdd {
                message_id,
                channel_id,
                server_id,
                user_id,
                ..
            }
            | Self::ReactionRemove {
                message_id,
                channel_id,
                server_id,
                user_id,
                ..
            } => {
                server(*server_id, &mut scopes);
                scopes.push(Scope::Channel(*channel_id));
                scopes.push(Scope::Message(*message_id));
                scopes.push(Scope::User(*user_id));
            }

            Self::UserChangeStatus { user_id, .. }
            | Self::UserChangeActivity { user_id, .. }
            | Self::UserChangeName { user_id, .. }
            | Self::UserChangeAvatar { user_id, .. }
            | Self::UserUpdate { user_id } => scopes.push(Scope::User(*user_id)),

            Self::UserStartTyping {
                user_id,
                channel_id,
                server_id,
            } => {
                server(*server_id, &mut scopes);
                scopes.push(Scope::Channel(*channel_id));
                scopes.push(Scope::User(*user_id));
            }

            Self::EmojiCreate { server_id, .. } | Self::EmojiUpdate { server_id, .. } => {
                server(Some(*server_id), &mut scopes);
            }
            Self::EmojiDelete { emoji } => server(Some(emoji.server_id), &mut scopes),
        }
        scopes
    }

    /// Scopes whose listeners must be dropped once this event was dispatched
    ///
    /// Leaving a server retires its channels too. Users outlive the server,
    /// so their scopes stay.
    pub fn retired_scopes(&self) -> Vec<Scope> {
        match self {
            Self::ServerLeave { server } => std::iter::once(Scope::Server(server.id))
                .chain(server.channel_ids.iter().copied().map(Scope::Channel))
                .collect(),
            Self::ChannelDelete { channel } => vec![Scope::Channel(channel.id())],
            Self::MessageDelete { message_id, .. } => vec![Scope::Message(*message_id)],
            _ => Vec::new(),
        }
    }

    /// Server this event concerns, if any
    pub fn server_id(&self) -> Option<Snowflake> {
        self.scopes().into_iter().find_map(|scope| match scope {
            Scope::Server(id) => Some(id),
            _ => None,
        })
    }
}
