//! REST routes
//!
//! Each route knows its method, its path segments and the template it
//! shares a rate-limit bucket with. The major parameter (channel or server
//! id) splits a template into independent buckets.

use cord_core::Snowflake;
use reqwest::Method;

/// One REST endpoint with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    GatewayBot,
    Gateway,

    GetChannel { channel: Snowflake },
    DeleteChannel { channel: Snowflake },
    TriggerTyping { channel: Snowflake },

    CreateMessage { channel: Snowflake },
    GetMessage { channel: Snowflake, message: Snowflake },
    GetMessages { channel: Snowflake },
    EditMessage { channel: Snowflake, message: Snowflake },
    DeleteMessage { channel: Snowflake, message: Snowflake },
    BulkDeleteMessages { channel: Snowflake },
    PinMessage { channel: Snowflake, message: Snowflake },
    UnpinMessage { channel: Snowflake, message: Snowflake },

    /// `emoji` is the raw route segment, encoded when the url is built
    AddOwnReaction { channel: Snowflake, message: Snowflake, emoji: String },
    RemoveOwnReaction { channel: Snowflake, message: Snowflake, emoji: String },
    RemoveUserReaction { channel: Snowflake, message: Snowflake, emoji: String, user: Snowflake },
    RemoveAllReactions { channel: Snowflake, message: Snowflake },

    GetUser { user: Snowflake },
    GetCurrentUser,

    GetMember { server: Snowflake, user: Snowflake },
    ModifyMember { server: Snowflake, user: Snowflake },
    KickMember { server: Snowflake, user: Snowflake },
    BanMember { server: Snowflake, user: Snowflake },
    UnbanMember { server: Snowflake, user: Snowflake },
    AddMemberRole { server: Snowflake, user: Snowflake, role: Snowflake },
    RemoveMemberRole { server: Snowflake, user: Snowflake, role: Snowflake },

    LeaveServer { server: Snowflake },
}

impl Route {
    pub fn method(&self) -> Method {
        match self {
            Self::GatewayBot
            | Self::Gateway
            | Self::GetChannel { .. }
            | Self::GetMessage { .. }
            | Self::GetMessages { .. }
            | Self::GetUser { .. }
            | Self::GetCurrentUser
            | Self::GetMember { .. } => Method::GET,

            Self::TriggerTyping { .. } | Self::CreateMessage { .. } | Self::BulkDeleteMessages { .. } => {
                Method::POST
            }

            Self::EditMessage { .. } | Self::ModifyMember { .. } => Method::PATCH,

            Self::PinMessage { .. }
            | Self::AddOwnReaction { .. }
            | Self::BanMember { .. }
            | Self::AddMemberRole { .. } => Method::PUT,

            Self::DeleteChannel { .. }
            | Self::DeleteMessage { .. }
            | Self::UnpinMessage { .. }
            | Self::RemoveOwnReaction { .. }
            | Self::RemoveUserReaction { .. }
            | Self::RemoveAllReactions { .. }
            | Self::KickMember { .. }
            | Self::UnbanMember { .. }
            | Self::RemoveMemberRole { .. }
            | Self::LeaveServer { .. } => Method::DELETE,
        }
    }

    /// Path template shared by every call of this route
    pub fn template(&self) -> &'static str {
        match self {
            Self::GatewayBot => "/gateway/bot",
            Self::Gateway => "/gateway",
            Self::GetChannel { .. } | Self::DeleteChannel { .. } => "/channels/{channel}",
            Self::TriggerTyping { .. } => "/channels/{channel}/typing",
            Self::CreateMessage { .. } | Self::GetMessages { .. } => "/channels/{channel}/messages",
            Self::GetMessage { .. } | Self::EditMessage { .. } | Self::DeleteMessage { .. } => {
                "/channels/{channel}/messages/{message}"
            }
            Self::BulkDeleteMessages { .. } => "/channels/{channel}/messages/bulk-delete",
            Self::PinMessage { .. } | Self::UnpinMessage { .. } => "/channels/{channel}/pins/{message}",
            // All reaction routes share one bucket per channel
            Self::AddOwnReaction { .. }
            | Self::RemoveOwnReaction { .. }
            | Self::RemoveUserReaction { .. }
            | Self::RemoveAllReactions { .. } => "/channels/{channel}/messages/{message}/reactions",
            Self::GetUser { .. } => "/users/{user}",
            Self::GetCurrentUser => "/users/@me",
            Self::GetMember { .. } | Self::ModifyMember { .. } | Self::KickMember { .. } => {
                "/guilds/{server}/members/{user}"
            }
            Self::BanMember { .. } | Self::UnbanMember { .. } => "/guilds/{server}/bans/{user}",
            Self::AddMemberRole { .. } | Self::RemoveMemberRole { .. } => {
                "/guilds/{server}/members/{user}/roles/{role}"
            }
            Self::LeaveServer { .. } => "/users/@me/guilds/{server}",
        }
    }

    /// Channel or server id the bucket is scoped to
    pub fn major_parameter(&self) -> Option<Snowflake> {
        match self {
            Self::GatewayBot | Self::Gateway | Self::GetUser { .. } | Self::GetCurrentUser => None,

            Self::GetChannel { channel }
            | Self::DeleteChannel { channel }
            | Self::TriggerTyping { channel }
            | Self::CreateMessage { channel }
            | Self::GetMessage { channel, .. }
            | Self::GetMessages { channel }
            | Self::EditMessage { channel, .. }
            | Self::DeleteMessage { channel, .. }
            | Self::BulkDeleteMessages { channel }
            | Self::PinMessage { channel, .. }
            | Self::UnpinMessage { channel, .. }
            | Self::AddOwnReaction { channel, .. }
            | Self::RemoveOwnReaction { channel, .. }
            | Self::RemoveUserReaction { channel, .. }
            | Self::RemoveAllReactions { channel, .. } => Some(*channel),

            Self::GetMember { server, .. }
            | Self::ModifyMember { server, .. }
            | Self::KickMember { server, .. }
            | Self::BanMember { server, .. }
            | Self::UnbanMember { server, .. }
            | Self::AddMemberRole { server, .. }
            | Self::RemoveMemberRole { server, .. }
            | Self::LeaveServer { server } => Some(*server),
        }
    }

    /// Local bucket key, used until the server names the bucket
    pub fn bucket_key(&self) -> RouteKey {
        RouteKey {
            method: self.method(),
            template: self.template(),
            major: self.major_parameter(),
        }
    }

    /// Unencoded path segments
    pub fn segments(&self) -> Vec<String> {
        fn s(parts: &[&dyn ToString]) -> Vec<String> {
            parts.iter().map(|p| p.to_string()).collect()
        }

        match self {
            Self::GatewayBot => s(&[&"gateway", &"bot"]),
            Self::Gateway => s(&[&"gateway"]),
            Self::GetChannel { channel } | Self::DeleteChannel { channel } => s(&[&"channels", channel]),
            Self::TriggerTyping { channel } => s(&[&"channels", channel, &"typing"]),
            Self::CreateMessage { channel } | Self::GetMessages { channel } => {
                s(&[&"channels", channel, &"messages"])
            }
            Self::GetMessage { channel, message }
            | Self::EditMessage { channel, message }
            | Self::DeleteMessage { channel, message } => s(&[&"channels", channel, &"messages", message]),
            Self::BulkDeleteMessages { channel } => s(&[&"channels", channel, &"messages", &"bulk-delete"]),
            Self::PinMessage { channel, message } | Self::UnpinMessage { channel, message } => {
                s(&[&"channels", channel, &"pins", message])
            }
            Self::AddOwnReaction { channel, message, emoji }
            | Self::RemoveOwnReaction { channel, message, emoji } => {
                s(&[&"channels", channel, &"messages", message, &"reactions", emoji, &"@me"])
            }
            Self::RemoveUserReaction {
                channel,
                message,
                emoji,
                user,
            } => s(&[&"channels", channel, &"messages", message, &"reactions", emoji, user]),
            Self::RemoveAllReactions { channel, message } => {
                s(&[&"channels", channel, &"messages", message, &"reactions"])
            }
            Self::GetUser { user } => s(&[&"users", user]),
            Self::GetCurrentUser => s(&[&"users", &"@me"]),
            Self::GetMember { server, user }
            | Self::ModifyMember { server, user }
            | Self::KickMember { server, user } => s(&[&"guilds", server, &"members", user]),
            Self::BanMember { server, user } | Self::UnbanMember { server, user } => {
                s(&[&"guilds", server, &"bans", user])
            }
            Self::AddMemberRole { server, user, role } | Self::RemoveMemberRole { server, user, role } => {
                s(&[&"guilds", server, &"members", user, &"roles", role])
            }
            Self::LeaveServer { server } => s(&[&"users", &"@me", &"guilds", server]),
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method(), self.template())
    }
}

/// Bucket identity of a route before the server assigns one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub template: &'static str,
    pub major: Option<Snowflake>,
}
