//! Message and reaction payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MemberPayload, UserPayload};
use crate::entities::{Attachment, Embed};
use crate::value_objects::Snowflake;

/// Message object (MESSAGE_CREATE, REST)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: UserPayload,
    /// Set when a webhook posted the message
    #[serde(default)]
    pub webhook_id: Option<Snowflake>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reactions: Vec<ReactionCountPayload>,
    /// String or integer, echoed back from the send request
    #[serde(default)]
    pub nonce: Option<Value>,
}

/// MESSAGE_UPDATE payload; only the changed fields are present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageUpdatePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub embeds: Option<Vec<Embed>>,
    #[serde(default)]
    pub pinned: Option<bool>,
}

/// MESSAGE_DELETE payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MessageDeletePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// MESSAGE_DELETE_BULK payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleteBulkPayload {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// Reaction summary embedded in a message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionCountPayload {
    pub count: u32,
    #[serde(default)]
    pub me: bool,
    pub emoji: PartialEmojiPayload,
}

/// Emoji as it appears in reactions: unicode (no id) or custom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEmojiPayload {
    #[serde(default)]
    pub id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

/// MESSAGE_REACTION_ADD / MESSAGE_REACTION_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEventPayload {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub emoji: PartialEmojiPayload,
    /// Only present on add events inside a server
    #[serde(default)]
    pub member: Option<MemberPayload>,
}

/// MESSAGE_REACTION_REMOVE_ALL payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReactionRemoveAllPayload {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload() {
        let json = r#"{
            "id": "100",
            "channel_id": "20",
            "guild_id": "10",
            "author": {"id": "1", "username": "alice", "discriminator": "1234"},
            "content": "hello",
            "timestamp": "2017-07-11T17:27:07.299000+00:00",
            "edited_timestamp": null,
            "tts": false,
            "embeds": [{"title": "t", "description": "d"}],
            "attachments": [{"id": "5", "filename": "a.png", "size": 10, "url": "https://cdn/a.png"}],
            "reactions": [{"count": 2, "me": true, "emoji": {"id": null, "name": "👍"}}],
            "nonce": 42
        }"#;
        let message: MessagePayload = serde_json::from_str(json).unwrap();
        assert_eq!(message.content, "hello");
        assert!(message.timestamp.is_some());
        assert!(message.edited_timestamp.is_none());
        assert_eq!(message.embeds[0].title.as_deref(), Some("t"));
        assert_eq!(message.attachments[0].filename, "a.png");
        assert_eq!(message.reactions[0].count, 2);
        assert_eq!(message.nonce, Some(Value::from(42)));
    }

    #[test]
    fn test_reaction_event_payload() {
        let json = r#"{
            "user_id": "1", "channel_id": "20", "message_id": "100", "guild_id": "10",
            "emoji": {"id": "77", "name": "blob", "animated": true}
        }"#;
        let reaction: ReactionEventPayload = serde_json::from_str(json).unwrap();
        assert_eq!(reaction.emoji.id, Some(Snowflake::new(77)));
        assert!(reaction.emoji.animated);
        assert!(reaction.member.is_none());
    }
}
