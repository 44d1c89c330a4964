//! Gateway and REST payloads
//!
//! Ids: account 1, other user 2, server 10 with category 40, text
//! channels 20 and 21, voice channel 50 and roles 30 and 31.

use serde_json::{json, Value};

pub const SELF_ID: u64 = 1;
pub const OTHER_USER: u64 = 2;
pub const SERVER: u64 = 10;
pub const GENERAL: u64 = 20;
pub const SECOND: u64 = 21;
pub const CATEGORY: u64 = 40;
pub const VOICE: u64 = 50;

pub fn ready(servers: &[u64], resume_url: &str) -> Value {
    let guilds: Vec<Value> = servers
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    json!({
        "v": 10,
        "user": {"id": SELF_ID.to_string(), "username": "cord", "discriminator": "0001", "bot": true},
        "guilds": guilds,
        "session_id": "session-1",
        "resume_gateway_url": resume_url,
        "private_channels": []
    })
}

pub fn server() -> Value {
    json!({
        "id": SERVER.to_string(),
        "name": "Test Server",
        "owner_id": SELF_ID.to_string(),
        "large": false,
        "member_count": 2,
        "roles": [
            {"id": SERVER.to_string(), "name": "@everyone", "permissions": "3072", "position": 0},
            {"id": "30", "name": "mods", "permissions": "8192", "position": 1},
            {"id": "31", "name": "admins", "permissions": "8", "position": 2}
        ],
        "channels": [
            {"id": SECOND.to_string(), "type": 0, "name": "second", "position": 1, "parent_id": CATEGORY.to_string()},
            {"id": GENERAL.to_string(), "type": 0, "name": "general", "position": 0, "parent_id": CATEGORY.to_string()},
            {"id": CATEGORY.to_string(), "type": 4, "name": "Text", "position": 0},
            {"id": VOICE.to_string(), "type": 2, "name": "Voice", "position": 1, "bitrate": 64000}
        ],
        "members": [
            {"user": {"id": SELF_ID.to_string(), "username": "cord", "bot": true}, "roles": ["30"]},
            {"user": {"id": OTHER_USER.to_string(), "username": "bob"}, "nick": "bobby", "roles": ["30", "31"]}
        ],
        "emojis": [],
        "presences": []
    })
}

pub fn unavailable_server(id: u64) -> Value {
    json!({"id": id.to_string(), "unavailable": true})
}

pub fn message(id: u64, channel: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel.to_string(),
        "guild_id": SERVER.to_string(),
        "author": {"id": OTHER_USER.to_string(), "username": "bob"},
        "content": content,
        "timestamp": "2017-07-11T17:27:07.299000+00:00",
        "tts": false,
        "embeds": [],
        "attachments": []
    })
}

pub fn channel_delete(id: u64, parent: Option<u64>) -> Value {
    json!({
        "id": id.to_string(),
        "type": 0,
        "guild_id": SERVER.to_string(),
        "name": "general",
        "position": 0,
        "parent_id": parent.map(|p| p.to_string())
    })
}

pub fn member_remove(user: u64) -> Value {
    json!({
        "guild_id": SERVER.to_string(),
        "user": {"id": user.to_string(), "username": "bob"}
    })
}

pub fn reaction_add(message: u64, channel: u64, user: u64, emoji: &str) -> Value {
    json!({
        "user_id": user.to_string(),
        "channel_id": channel.to_string(),
        "message_id": message.to_string(),
        "guild_id": SERVER.to_string(),
        "emoji": {"id": null, "name": emoji}
    })
}

pub fn user(id: u64, name: &str) -> Value {
    json!({"id": id.to_string(), "username": name, "discriminator": "0002"})
}

/// Server with only its @everyone role and the account as member
pub fn bare_server(id: u64) -> Value {
    json!({
        "id": id.to_string(),
        "name": format!("Server {id}"),
        "owner_id": SELF_ID.to_string(),
        "member_count": 1,
        "roles": [{"id": id.to_string(), "name": "@everyone", "permissions": "0", "position": 0}],
        "channels": [],
        "members": [{"user": {"id": SELF_ID.to_string(), "username": "cord"}, "roles": []}]
    })
}
